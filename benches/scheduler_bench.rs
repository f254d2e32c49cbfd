//! Benchmarks for the primary-phase scheduler against an in-memory transport.

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use tokio::runtime::Runtime;

use cloud_auditor::cache::CacheStore;
use cloud_auditor::catalog::{CallCatalog, CallDescriptor};
use cloud_auditor::collectors::CollectorRegistry;
use cloud_auditor::config::{ConcurrencyLimits, RegionCatalog};
use cloud_auditor::engine::CollectionEngine;
use cloud_auditor::transport::{ApiRequest, ProviderError, RequestContext, Transport, TransportConfig};

/// Answers every call immediately with a small list.
struct EchoTransport;

#[async_trait]
impl Transport for EchoTransport {
    async fn invoke(&self, ctx: &RequestContext, request: &ApiRequest) -> Result<Value, ProviderError> {
        Ok(json!({"Items": [{"Region": ctx.region(), "Operation": request.operation}]}))
    }
}

fn catalog(services: usize, operations: usize) -> CallCatalog {
    let primary = (0..services)
        .flat_map(|s| (0..operations).map(move |o| (s, o)))
        .map(|(s, o)| CallDescriptor::new(&format!("Service{}", s), &format!("describe{}", o)).property("Items"))
        .collect();
    CallCatalog::new(primary, vec![]).unwrap()
}

fn engine(services: usize, operations: usize, regions: &[String], limits: ConcurrencyLimits) -> CollectionEngine {
    let regions: Vec<&str> = regions.iter().map(String::as_str).collect();
    CollectionEngine::new(
        catalog(services, operations),
        RegionCatalog::uniform(&regions),
        limits,
        Arc::new(EchoTransport),
        TransportConfig::default(),
        CollectorRegistry::new(),
    )
    .unwrap()
}

/// Benchmark the primary phase over growing catalogs
fn bench_primary_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("primary_phase");
    let runtime = Runtime::new().unwrap();
    let regions: Vec<String> = (0..16).map(|n| format!("region-{}", n)).collect();

    for (services, operations) in [(1, 4), (8, 4), (32, 8)] {
        let engine = engine(services, operations, &regions, ConcurrencyLimits::default());
        let units = (services * operations * regions.len()) as u64;

        group.throughput(Throughput::Elements(units));
        group.bench_with_input(
            BenchmarkId::new("units", units),
            &engine,
            |b, engine| {
                b.to_async(&runtime).iter(|| async {
                    let cache = CacheStore::new();
                    engine.run_primary(&cache).await;
                    black_box(cache.len())
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the effect of the region ceiling on a fixed catalog
fn bench_region_limit(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_limit");
    let runtime = Runtime::new().unwrap();
    let regions: Vec<String> = (0..16).map(|n| format!("region-{}", n)).collect();

    for limit in [1, 4, 16] {
        let limits = ConcurrencyLimits { regions: limit, ..ConcurrencyLimits::default() };
        let engine = engine(8, 4, &regions, limits);

        group.bench_with_input(BenchmarkId::new("regions", limit), &engine, |b, engine| {
            b.to_async(&runtime).iter(|| async {
                let snapshot = engine.run().await;
                black_box(snapshot.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_primary_phase, bench_region_limit);
criterion_main!(benches);
