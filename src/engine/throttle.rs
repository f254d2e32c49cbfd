//! Fixed post-completion delay for rate-limited catalog entries.

use std::time::Duration;

use log::debug;

/// Sleep for `rate_limit`, if any.
///
/// Called after a unit finishes and before its concurrency permit is
/// released, so the next unit of the same level waits behind it. This is a
/// flat delay, not a token bucket.
pub async fn hold(rate_limit: Option<Duration>) {
    if let Some(delay) = rate_limit {
        debug!("Rate limit: holding for {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}
