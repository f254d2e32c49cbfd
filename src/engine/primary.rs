use log::{debug, info};

use super::CollectionEngine;
use crate::cache::CacheStore;
use crate::utils::bounded::for_each_bounded;

/// Fan every primary entry out over services, operations and regions, each
/// level under its own in-flight ceiling.
pub(super) async fn run(engine: &CollectionEngine, cache: &CacheStore) {
    let table = engine.catalog.primary();
    let limits = engine.limits;
    info!(
        "Primary phase: {} calls across {} services",
        table.len(),
        table.services().len()
    );

    for_each_bounded(table.services(), limits.services, |service| async move {
        for_each_bounded(&service.calls, limits.operations, |descriptor| async move {
            let regions = engine.regions.regions_for(&descriptor.service);
            debug!(
                "Running {}:{} in {} regions",
                descriptor.service,
                descriptor.operation,
                regions.len()
            );

            for_each_bounded(regions, limits.regions, |region| async move {
                let request = engine
                    .context
                    .for_region(region)
                    .with_signature(descriptor.signature_override);
                engine.run_unit(descriptor, region, request, None, cache).await;
            })
            .await;
        })
        .await;
    })
    .await;

    info!("Primary phase complete: {} cache slots", cache.len());
}
