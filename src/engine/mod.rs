//! The collection engine.
//!
//! A run has two phases. The primary phase fans every primary catalog entry
//! out over its service's regions. Postcall waves then run one after the
//! other, each fanning dependent entries out over the items found by the
//! calls they depend on. Both phases write into one [`CacheStore`], which is
//! frozen into a [`Snapshot`] when the last wave finishes.
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cloud_auditor::catalog::default_catalog;
//! use cloud_auditor::collectors::CollectorRegistry;
//! use cloud_auditor::config::{ConcurrencyLimits, RegionCatalog};
//! use cloud_auditor::engine::CollectionEngine;
//! use cloud_auditor::transport::{AwsTransport, TransportConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = TransportConfig::default();
//! let transport = Arc::new(AwsTransport::new(&config)?);
//! let engine = CollectionEngine::new(
//!     default_catalog(),
//!     RegionCatalog::default(),
//!     ConcurrencyLimits::default(),
//!     transport,
//!     config,
//!     CollectorRegistry::with_defaults(),
//! )?;
//!
//! let snapshot = engine.run().await;
//! println!("{}", serde_json::to_string_pretty(&snapshot)?);
//! # Ok(())
//! # }
//! ```

mod postcall;
mod primary;
pub mod throttle;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use log::{info, warn};
use serde_json::Value;

use crate::cache::{CacheEntry, CacheStore, Snapshot};
use crate::catalog::{CallCatalog, CallDescriptor, CatalogError};
use crate::collectors::{CollectContext, Collector, CollectorRegistry, FanOutCollector, InvokeCollector};
use crate::config::RegionCatalog;
use crate::security::scrub_credentials;
use crate::transport::{RequestContext, Transport, TransportConfig};

pub use crate::config::ConcurrencyLimits;

/// Runs a validated call catalog against a transport.
pub struct CollectionEngine {
    catalog: CallCatalog,
    regions: RegionCatalog,
    limits: ConcurrencyLimits,
    transport: Arc<dyn Transport>,
    context: RequestContext,
    registry: CollectorRegistry,
}

impl CollectionEngine {
    /// Build an engine, checking that every override entry has a collector.
    pub fn new(
        catalog: CallCatalog,
        regions: RegionCatalog,
        limits: ConcurrencyLimits,
        transport: Arc<dyn Transport>,
        transport_config: TransportConfig,
        registry: CollectorRegistry,
    ) -> Result<Self, CatalogError> {
        if let Some(missing) = catalog
            .overrides()
            .find(|descriptor| !registry.contains(&descriptor.service, &descriptor.operation))
        {
            return Err(CatalogError::MissingCollector {
                service: missing.service.clone(),
                operation: missing.operation.clone(),
            });
        }

        Ok(Self {
            catalog,
            regions,
            limits,
            transport,
            context: RequestContext::new(Arc::new(transport_config)),
            registry,
        })
    }

    pub fn catalog(&self) -> &CallCatalog {
        &self.catalog
    }

    pub fn limits(&self) -> ConcurrencyLimits {
        self.limits
    }

    /// Run both phases and return the frozen cache.
    pub async fn run(&self) -> Snapshot {
        let cache = CacheStore::new();
        let started = Instant::now();

        self.run_primary(&cache).await;
        self.run_postcalls(&cache).await;

        info!("Collection finished: {} cache slots in {:.2?}", cache.len(), started.elapsed());
        cache.into_snapshot()
    }

    /// Primary phase only: every primary entry in every region of its service.
    pub async fn run_primary(&self, cache: &CacheStore) {
        primary::run(self, cache).await;
    }

    /// Postcall phase only: every wave, in declared order.
    pub async fn run_postcalls(&self, cache: &CacheStore) {
        postcall::run(self, cache).await;
    }

    /// Execute one catalog entry in one region, then apply its rate limit
    /// while the caller still holds its concurrency permit.
    async fn run_unit(
        &self,
        descriptor: &CallDescriptor,
        region: &str,
        request: RequestContext,
        prerequisite: Option<&[Value]>,
        cache: &CacheStore,
    ) {
        let ctx = CollectContext {
            descriptor,
            region,
            request,
            transport: self.transport.as_ref(),
            prerequisite,
            item_limit: self.limits.items,
        };

        let result = if descriptor.is_override {
            match self.registry.get(&descriptor.service, &descriptor.operation) {
                Some(collector) => collector.collect(&ctx, cache).await,
                None => Err(anyhow!("no collector registered")),
            }
        } else if prerequisite.is_some() {
            FanOutCollector.collect(&ctx, cache).await
        } else {
            InvokeCollector.collect(&ctx, cache).await
        };

        if let Err(e) = result {
            record_failure(&ctx, cache, &e);
        }

        throttle::hold(descriptor.rate_limit()).await;
    }
}

/// Store a collector failure in the unit's region slot unless it already
/// holds a result.
fn record_failure(ctx: &CollectContext<'_>, cache: &CacheStore, error: &anyhow::Error) {
    let key = ctx.slot();
    let message = scrub_credentials(&format!("{:#}", error));
    warn!("Collector for {} failed: {}", key, message);

    if cache.get(&key).is_some_and(|entry| entry.is_populated()) {
        return;
    }
    // Only this unit writes its region slot, so nothing can fill it in between.
    let _ = cache.put(key, CacheEntry::with_error(message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;
    use crate::transport::MockTransport;

    #[test]
    fn test_missing_collector_is_fatal() {
        let result = CollectionEngine::new(
            default_catalog(),
            RegionCatalog::default(),
            ConcurrencyLimits::default(),
            Arc::new(MockTransport::new()),
            TransportConfig::default(),
            CollectorRegistry::new(),
        );
        assert_eq!(
            result.err(),
            Some(CatalogError::MissingCollector {
                service: "IAM".to_string(),
                operation: "generateCredentialReport".to_string(),
            })
        );
    }

    #[test]
    fn test_default_catalog_builds() {
        let engine = CollectionEngine::new(
            default_catalog(),
            RegionCatalog::default(),
            ConcurrencyLimits::default(),
            Arc::new(MockTransport::new()),
            TransportConfig::default(),
            CollectorRegistry::with_defaults(),
        );
        assert!(engine.is_ok());
    }
}
