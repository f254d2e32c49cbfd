use anyhow::Result;
use serde_json::{Map, Value};

use crate::cache::{CacheEntry, CacheStore};
use crate::collectors::collector::{error_entry, store, CollectContext, Collector};
use crate::constants::SES_DKIM_BATCH_SIZE;

/// Fetches DKIM attributes for every listed identity, in batches.
///
/// The per-batch `DkimAttributes` maps are merged into a single object keyed
/// by identity and written to the region slot. The first failing batch
/// stores its error instead.
pub struct DkimAttributesCollector;

#[async_trait::async_trait]
impl Collector for DkimAttributesCollector {
    async fn collect(&self, ctx: &CollectContext<'_>, cache: &CacheStore) -> Result<()> {
        let identities: Vec<Value> = ctx
            .prerequisite_records()
            .iter()
            .filter(|identity| identity.as_str().is_some_and(|s| !s.is_empty()))
            .cloned()
            .collect();
        if identities.is_empty() {
            return Ok(());
        }

        let key = ctx.slot();
        if !cache.reserve(key.clone()) {
            return Ok(());
        }

        let mut merged = Map::new();
        for batch in identities.chunks(SES_DKIM_BATCH_SIZE) {
            let mut params = Map::new();
            params.insert("Identities".to_string(), Value::Array(batch.to_vec()));

            match ctx.call(&ctx.descriptor.operation, params).await {
                Ok(response) => {
                    if let Some(Value::Object(attributes)) = response.get("DkimAttributes") {
                        merged.extend(attributes.clone());
                    }
                }
                Err(e) => {
                    store(cache, key.clone(), error_entry(&key, &e));
                    return Ok(());
                }
            }
        }

        store(cache, key, CacheEntry::with_data(Value::Object(merged)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SlotKey;
    use crate::catalog::CallDescriptor;
    use crate::transport::{MockTransport, RequestContext, TransportConfig};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_batches_and_merges() {
        let mut transport = MockTransport::new();
        transport.expect_invoke().times(3).returning(|_, request| {
            let batch = request.params["Identities"].as_array().cloned().unwrap_or_default();
            assert!(batch.len() <= SES_DKIM_BATCH_SIZE);
            let attributes: Map<String, Value> = batch
                .iter()
                .filter_map(Value::as_str)
                .map(|id| (id.to_string(), json!({"DkimEnabled": true})))
                .collect();
            Ok(json!({"DkimAttributes": attributes}))
        });

        let descriptor = CallDescriptor::new("SES", "getIdentityDkimAttributes")
            .depends_on("ses", "listIdentities")
            .overridden();
        let identities: Vec<Value> = (0..250).map(|i| json!(format!("domain{}.example", i))).collect();
        let ctx = CollectContext {
            descriptor: &descriptor,
            region: "eu-west-1",
            request: RequestContext::new(Arc::new(TransportConfig::default())).for_region("eu-west-1"),
            transport: &transport,
            prerequisite: Some(&identities),
            item_limit: 1,
        };
        let cache = CacheStore::new();
        DkimAttributesCollector.collect(&ctx, &cache).await.unwrap();

        let entry = cache.get(&SlotKey::region("ses", "getIdentityDkimAttributes", "eu-west-1")).unwrap();
        let data = entry.data().and_then(Value::as_object).unwrap();
        assert_eq!(data.len(), 250);
        assert_eq!(data["domain249.example"]["DkimEnabled"], true);
    }
}
