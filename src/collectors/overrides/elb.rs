use anyhow::Result;
use log::debug;
use serde_json::{json, Map, Value};

use crate::cache::{CacheEntry, CacheStore};
use crate::collectors::collector::{error_entry, item_id, store, CollectContext, Collector};
use crate::utils::bounded::for_each_bounded;

/// Policy names attached to the HTTPS listeners of one load balancer.
pub fn https_policy_names(load_balancer: &Value) -> Vec<Value> {
    let listeners = load_balancer
        .get("ListenerDescriptions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    listeners
        .iter()
        .filter(|listener| {
            listener
                .pointer("/Listener/Protocol")
                .and_then(Value::as_str)
                .is_some_and(|protocol| protocol.eq_ignore_ascii_case("HTTPS"))
        })
        .flat_map(|listener| {
            listener
                .get("PolicyNames")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

/// Describes the policies of HTTPS listeners, one item slot per load balancer.
pub struct LoadBalancerPoliciesCollector;

#[async_trait::async_trait]
impl Collector for LoadBalancerPoliciesCollector {
    async fn collect(&self, ctx: &CollectContext<'_>, cache: &CacheStore) -> Result<()> {
        let mut work = Vec::new();
        for load_balancer in ctx.prerequisite_records() {
            let Some(name) = load_balancer.get("LoadBalancerName").and_then(item_id) else {
                continue;
            };
            let policies = https_policy_names(load_balancer);
            if policies.is_empty() {
                debug!("{} has no HTTPS listener policies", name);
                continue;
            }
            let key = ctx.item_slot(&name);
            if cache.reserve(key.clone()) {
                work.push((key, name, policies));
            }
        }

        for_each_bounded(work, ctx.item_limit, |(key, name, policies)| async move {
            let mut params = Map::new();
            params.insert("LoadBalancerName".to_string(), Value::String(name));
            params.insert("PolicyNames".to_string(), Value::Array(policies));

            let entry = match ctx.call(&ctx.descriptor.operation, params).await {
                Ok(response) => {
                    let data = ctx.descriptor.extract.extract(response).unwrap_or_else(|| json!([]));
                    CacheEntry::with_data(data)
                }
                Err(e) => error_entry(&key, &e),
            };
            store(cache, key, entry);
        })
        .await;

        Ok(())
    }
}
