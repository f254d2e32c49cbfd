//! Security utilities.
//!
//! Credential scrubbing keeps access keys, signatures and session tokens out
//! of cached error descriptions and log output.

pub mod scrubber;

pub use scrubber::scrub_credentials;
