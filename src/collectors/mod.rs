//! Per-unit collection strategies.
//!
//! Every unit of work the engine schedules (one catalog entry in one region)
//! is handed to a [`Collector`]. Two generic implementations cover the bulk
//! of the catalog; overrides cover the entries that need custom logic.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │           engine (scheduler)             │
//! ├──────────────────────────────────────────┤
//! │              Collector trait             │
//! │  ┌──────────────┬───────────┬─────────┐  │
//! │  │ InvokeCollec │ FanOut    │ override│  │
//! │  │ (primary)    │ (postcall)│ registry│  │
//! │  └──────────────┴───────────┴─────────┘  │
//! ├──────────────────────────────────────────┤
//! │        Transport  ──►  CacheStore        │
//! └──────────────────────────────────────────┘
//! ```

/// Collector trait, context and the generic collectors
pub mod collector;

/// Override collectors for IAM, EC2, ELB and SES
pub mod overrides;

/// Lookup of override collectors by catalog entry
pub mod registry;

pub use collector::{CollectContext, Collector, FanOutCollector, InvokeCollector};
pub use registry::CollectorRegistry;
