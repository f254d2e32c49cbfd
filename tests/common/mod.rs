//! Shared fixtures for the integration tests: an in-memory transport that
//! answers from scripted handlers and records every call it receives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use cloud_auditor::catalog::CallCatalog;
use cloud_auditor::collectors::CollectorRegistry;
use cloud_auditor::config::{ConcurrencyLimits, RegionCatalog};
use cloud_auditor::engine::CollectionEngine;
use cloud_auditor::transport::{
    ApiRequest, ProviderError, RequestContext, SignatureVersion, Transport, TransportConfig,
};

pub const BASE_REGION: &str = "us-west-2";

type Handler = Box<dyn Fn(&RequestContext, &ApiRequest) -> Result<Value, ProviderError> + Send + Sync>;

/// One call as seen by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub service: String,
    pub operation: String,
    /// Region the call was sent to.
    pub region: String,
    /// Region overlay of the request context, `None` when the base region was used.
    pub overlay_region: Option<String>,
    pub signature: SignatureVersion,
    pub params: Map<String, Value>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    handlers: HashMap<(String, String), Handler>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `service:operation` with `handler`.
    pub fn on<F>(mut self, service: &str, operation: &str, handler: F) -> Self
    where
        F: Fn(&RequestContext, &ApiRequest) -> Result<Value, ProviderError> + Send + Sync + 'static,
    {
        self.handlers
            .insert((service.to_lowercase(), operation.to_string()), Box::new(handler));
        self
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|call| call.operation == operation).collect()
    }

    /// Highest number of calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn invoke(&self, ctx: &RequestContext, request: &ApiRequest) -> Result<Value, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                service: request.service.clone(),
                operation: request.operation.clone(),
                region: ctx.region().to_string(),
                overlay_region: ctx.overlay().region.clone(),
                signature: ctx.signature(),
                params: request.params.clone(),
            });
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.handlers.get(&(request.service.to_lowercase(), request.operation.clone())) {
            Some(handler) => handler(ctx, request),
            None => Err(ProviderError::Service {
                code: "UnknownOperation".to_string(),
                message: format!("{} is not scripted", request),
                status: 400,
            }),
        }
    }
}

pub fn transport_config() -> TransportConfig {
    TransportConfig { region: BASE_REGION.to_string(), ..TransportConfig::default() }
}

/// Engine over `catalog` with a uniform region list and no override collectors.
pub fn engine(
    catalog: CallCatalog,
    regions: &[&str],
    limits: ConcurrencyLimits,
    transport: Arc<ScriptedTransport>,
) -> CollectionEngine {
    engine_with_registry(catalog, regions, limits, transport, CollectorRegistry::new())
}

pub fn engine_with_registry(
    catalog: CallCatalog,
    regions: &[&str],
    limits: ConcurrencyLimits,
    transport: Arc<ScriptedTransport>,
    registry: CollectorRegistry,
) -> CollectionEngine {
    CollectionEngine::new(
        catalog,
        RegionCatalog::uniform(regions),
        limits,
        transport,
        transport_config(),
        registry,
    )
    .expect("catalog should build")
}
