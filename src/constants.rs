//! Global constants for the cloud-auditor application.
//!
//! Defaults for configuration values live here so that the config layer,
//! the engine and the CLI agree on them.

// Concurrency ceilings
/// Services processed concurrently in either phase
pub const DEFAULT_SERVICE_CONCURRENCY: usize = 10;

/// Operations per service processed concurrently in the primary phase
pub const DEFAULT_OPERATION_CONCURRENCY: usize = 10;

/// Regions per operation processed concurrently
pub const MAX_REGIONS_AT_A_TIME: usize = 6;

/// Prerequisite items fetched concurrently per region in the postcall phase
pub const DEFAULT_ITEM_CONCURRENCY: usize = 10;

/// Operations within one service are serialized during postcall waves
pub const POSTCALL_OPERATION_CONCURRENCY: usize = 1;

// Provider defaults
/// Region used when a request carries no regional overlay
pub const DEFAULT_REGION: &str = "us-east-1";

/// HTTP request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Credential report polling
/// Attempts at generating the IAM credential report before giving up
pub const CREDENTIAL_REPORT_MAX_ATTEMPTS: usize = 10;

/// Delay between credential report generation attempts (ms)
pub const CREDENTIAL_REPORT_POLL_DELAY_MS: u64 = 2000;

// Batch sizes
/// Identities per GetIdentityDkimAttributes request
pub const SES_DKIM_BATCH_SIZE: usize = 100;

// Configuration
/// Version string written into generated configuration files
pub const CONFIG_VERSION: &str = "1.0";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "cloud_auditor.yaml";
