//! Utility functions shared by the engine and the command-line driver.
//!
//! ## Components
//!
//! - **Bounded**: fan-out with an in-flight ceiling
//! - **Report**: findings table and security report output
//! - **Summary**: run summary for the log
//!
//! ### Printing a Scan
//!
//! ```no_run
//! use cloud_auditor::cache::Snapshot;
//! use cloud_auditor::rules::run_all;
//! use cloud_auditor::utils::report::findings_table;
//!
//! # fn example(snapshot: &Snapshot) {
//! let results = run_all(snapshot, false);
//! print!("{}", findings_table(&results));
//! # }
//! ```

/// Bounded-concurrency iteration over futures
pub mod bounded;

/// Scan output formatting
pub mod report;

/// Run summary generation
pub mod summary;
