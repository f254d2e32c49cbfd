//! # cloud-auditor
//!
//! A concurrency-bounded collector for cloud account configuration, with a
//! set of security rules evaluated over what it collects.
//!
//! ## Overview
//!
//! Collection is driven by a declarative call catalog. The primary phase
//! fans every catalog entry out over the regions of its service; postcall
//! waves then run calls whose inputs come from primary results (for
//! example, one `getBucketLogging` per CloudTrail bucket). Every result
//! lands in one addressable cache, frozen at the end of the run into a
//! [`cache::Snapshot`] that the rules read.
//!
//! ## Usage
//!
//! ### Collecting a Snapshot
//!
//! ```no_run
//! use std::sync::Arc;
//! use cloud_auditor::catalog::default_catalog;
//! use cloud_auditor::collectors::CollectorRegistry;
//! use cloud_auditor::config::CollectorConfig;
//! use cloud_auditor::engine::CollectionEngine;
//! use cloud_auditor::transport::AwsTransport;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CollectorConfig::default();
//! let transport_config = config.transport_config();
//! let engine = CollectionEngine::new(
//!     default_catalog(),
//!     config.region_catalog(),
//!     config.limits,
//!     Arc::new(AwsTransport::new(&transport_config)?),
//!     transport_config,
//!     CollectorRegistry::with_defaults(),
//! )?;
//!
//! let snapshot = engine.run().await;
//! println!("Collected {} cache slots", snapshot.len());
//! # Ok(())
//! # }
//! ```
//!
//! ### Scanning a Snapshot
//!
//! ```no_run
//! use cloud_auditor::cache::Snapshot;
//! use cloud_auditor::rules::{run_all, Status};
//!
//! # fn example(snapshot: &Snapshot) {
//! for result in run_all(snapshot, false) {
//!     for finding in &result.output.findings {
//!         if finding.status == Status::Fail {
//!             println!("{}: {}", result.rule.title, finding.message);
//!         }
//!     }
//! }
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`catalog`]: call descriptors, the built-in AWS catalog and its validation
//! - [`cache`]: the per-run result store and its frozen snapshot
//! - [`engine`]: primary and postcall schedulers
//! - [`collectors`]: generic and override collectors
//! - [`transport`]: signed AWS calls and response decoding
//! - [`rules`]: security checks over a snapshot
//! - [`config`]: YAML configuration and region catalog
//! - [`security`]: credential scrubbing
//! - [`utils`]: bounded fan-out, reports and summaries
//! - [`cli`]: command-line interface definitions

/// Per-run result store
pub mod cache;

/// Call catalog definitions and validation
pub mod catalog;

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Collectors executed for each unit of work
pub mod collectors;

/// Configuration management and region catalog
pub mod config;

/// Application constants and default values
pub mod constants;

/// Collection engine: primary phase, postcall waves and rate limiting
pub mod engine;

/// Security rules evaluated over a snapshot
pub mod rules;

/// Security utilities for credential protection
pub mod security;

/// Remote call plumbing and the AWS transport
pub mod transport;

/// Utility functions for fan-out, reporting and summaries
pub mod utils;
