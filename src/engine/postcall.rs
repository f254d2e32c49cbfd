use log::{debug, info};

use super::CollectionEngine;
use crate::cache::CacheStore;
use crate::catalog::{CallDescriptor, CallTable};
use crate::constants::POSTCALL_OPERATION_CONCURRENCY;
use crate::utils::bounded::for_each_bounded;

/// Run every postcall wave, strictly one after the other.
pub(super) async fn run(engine: &CollectionEngine, cache: &CacheStore) {
    for (index, wave) in engine.catalog.waves().iter().enumerate() {
        info!("Postcall wave {}: {} calls", index + 1, wave.len());
        run_wave(engine, wave, cache).await;
    }
}

async fn run_wave(engine: &CollectionEngine, wave: &CallTable, cache: &CacheStore) {
    let limits = engine.limits;

    for_each_bounded(wave.services(), limits.services, |service| async move {
        for_each_bounded(&service.calls, POSTCALL_OPERATION_CONCURRENCY, |descriptor| async move {
            let regions = engine.regions.regions_for(&descriptor.service);
            for_each_bounded(regions, limits.regions, |region| async move {
                run_dependent(engine, descriptor, region, cache).await;
            })
            .await;
        })
        .await;
    })
    .await;
}

/// One dependent entry in one region. Skipped without leaving a slot when
/// its prerequisite has no records in that region.
async fn run_dependent(engine: &CollectionEngine, descriptor: &CallDescriptor, region: &str, cache: &CacheStore) {
    let Some(dependency) = &descriptor.depends_on else {
        return;
    };
    let Some(records) = cache.records(&dependency.service, &dependency.operation, region) else {
        debug!(
            "Skipping {}:{} in {}: no {}:{} records",
            descriptor.service, descriptor.operation, region, dependency.service, dependency.operation
        );
        return;
    };

    let request = if descriptor.drop_region_from_request {
        engine.context.without_region()
    } else {
        engine.context.for_region(region)
    }
    .with_signature(descriptor.signature_override);

    debug!(
        "Running {}:{} in {} over {} items",
        descriptor.service,
        descriptor.operation,
        region,
        records.len()
    );
    engine
        .run_unit(descriptor, region, request, Some(&records), cache)
        .await;
}
