use anyhow::{anyhow, Result};
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::cache::{CacheEntry, CacheStore, SlotKey};
use crate::catalog::CallDescriptor;
use crate::security::scrub_credentials;
use crate::transport::{ApiRequest, ProviderError, RequestContext, Transport};
use crate::utils::bounded::for_each_bounded;

/// Everything a collector needs to process one region of one catalog entry.
pub struct CollectContext<'a> {
    pub descriptor: &'a CallDescriptor,
    /// Region key the results are filed under.
    pub region: &'a str,
    /// Outgoing request context, with region and signature overlays applied.
    pub request: RequestContext,
    pub transport: &'a dyn Transport,
    /// Records of the prerequisite region slot, for dependent calls.
    pub prerequisite: Option<&'a [Value]>,
    /// In-flight ceiling for per-item fan-out.
    pub item_limit: usize,
}

impl<'a> CollectContext<'a> {
    pub fn slot(&self) -> SlotKey {
        SlotKey::region(&self.descriptor.service, &self.descriptor.operation, self.region)
    }

    pub fn item_slot(&self, item: &str) -> SlotKey {
        SlotKey::item(&self.descriptor.service, &self.descriptor.operation, self.region, item)
    }

    /// Request for this entry's own operation.
    pub fn api_request(&self, params: Map<String, Value>) -> ApiRequest {
        ApiRequest::new(&self.descriptor.service, &self.descriptor.operation).with_params(params)
    }

    /// Issue any operation of this entry's service.
    pub async fn call(&self, operation: &str, params: Map<String, Value>) -> Result<Value, ProviderError> {
        let request = ApiRequest::new(&self.descriptor.service, operation).with_params(params);
        self.transport.invoke(&self.request, &request).await
    }

    pub fn prerequisite_records(&self) -> &'a [Value] {
        self.prerequisite.unwrap_or_default()
    }
}

/// Processes one region of one catalog entry and writes its own cache slots.
///
/// The returned future resolving is the completion signal. An `Err` is
/// recorded by the scheduler in the region slot if that slot is still empty.
#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self, ctx: &CollectContext<'_>, cache: &CacheStore) -> Result<()>;
}

/// Cache entry for a provider error, with credentials scrubbed.
pub fn error_entry(key: &SlotKey, err: &ProviderError) -> CacheEntry {
    let message = scrub_credentials(&err.to_string());
    warn!("{} failed: {}", key, message);
    CacheEntry::with_error(message)
}

/// Write a slot, logging instead of failing when it was already written.
pub fn store(cache: &CacheStore, key: SlotKey, entry: CacheEntry) {
    if let Err(e) = cache.put(key, entry) {
        warn!("{}", e);
    }
}

/// Textual id of a prerequisite item field; `None` for missing or non-scalar values.
pub fn item_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Generic invoke-and-extract for primary entries.
pub struct InvokeCollector;

#[async_trait::async_trait]
impl Collector for InvokeCollector {
    async fn collect(&self, ctx: &CollectContext<'_>, cache: &CacheStore) -> Result<()> {
        let key = ctx.slot();
        cache.reserve(key.clone());

        let request = ctx.api_request(ctx.descriptor.request_params(None));
        let entry = match ctx.transport.invoke(&ctx.request, &request).await {
            Ok(response) => match ctx.descriptor.extract.extract(response) {
                Some(data) => CacheEntry::with_data(data),
                None => {
                    debug!("{} returned no data at {:?}", key, ctx.descriptor.extract);
                    CacheEntry::empty()
                }
            },
            Err(e) => error_entry(&key, &e),
        };

        store(cache, key, entry);
        Ok(())
    }
}

/// Generic per-item fan-out for dependent entries.
///
/// Each prerequisite record yields one request carrying
/// `item[source_field]` as `request_field`, filed under that item id.
pub struct FanOutCollector;

#[async_trait::async_trait]
impl Collector for FanOutCollector {
    async fn collect(&self, ctx: &CollectContext<'_>, cache: &CacheStore) -> Result<()> {
        let filter = ctx.descriptor.item_filter.as_ref().ok_or_else(|| {
            anyhow!("{}:{} has no item filter", ctx.descriptor.service, ctx.descriptor.operation)
        })?;

        let mut work = Vec::new();
        for record in ctx.prerequisite_records() {
            let Some(value) = record.get(&filter.source_field) else {
                debug!("Skipping {} item without {}", ctx.slot(), filter.source_field);
                continue;
            };
            let Some(id) = item_id(value) else {
                debug!("Skipping {} item with unusable {}", ctx.slot(), filter.source_field);
                continue;
            };

            let key = ctx.item_slot(&id);
            if !cache.reserve(key.clone()) {
                debug!("{} already scheduled", key);
                continue;
            }
            work.push((key, value.clone()));
        }

        for_each_bounded(work, ctx.item_limit, |(key, value)| async move {
            let params = ctx.descriptor.request_params(Some((filter.request_field.as_str(), value)));
            let request = ctx.api_request(params);
            let entry = match ctx.transport.invoke(&ctx.request, &request).await {
                Ok(response) => match ctx.descriptor.extract.extract(response) {
                    Some(data) => CacheEntry::with_data(data),
                    None => CacheEntry::empty(),
                },
                Err(e) => error_entry(&key, &e),
            };
            store(cache, key, entry);
        })
        .await;

        Ok(())
    }
}
