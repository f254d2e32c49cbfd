use std::collections::BTreeMap;

use anyhow::Result;
use log::debug;
use serde_json::{json, Map, Value};

use crate::cache::{CacheEntry, CacheStore};
use crate::collectors::collector::{error_entry, item_id, store, CollectContext, Collector};

/// Fetches the subnets of every prerequisite VPC in a single call.
///
/// Subnets are filed under one item slot per VPC id. Every VPC gets a slot,
/// holding an empty list when it has no subnets.
pub struct SubnetsCollector;

#[async_trait::async_trait]
impl Collector for SubnetsCollector {
    async fn collect(&self, ctx: &CollectContext<'_>, cache: &CacheStore) -> Result<()> {
        let vpc_ids: Vec<String> = ctx
            .prerequisite_records()
            .iter()
            .filter_map(|vpc| vpc.get("VpcId").and_then(item_id))
            .collect();

        let mut owned = Vec::new();
        for vpc_id in &vpc_ids {
            if cache.reserve(ctx.item_slot(vpc_id)) {
                owned.push(vpc_id.clone());
            }
        }
        if owned.is_empty() {
            debug!("No VPCs to describe subnets for in {}", ctx.region);
            return Ok(());
        }

        let mut params = Map::new();
        params.insert("Filters".to_string(), json!([{"Name": "vpc-id", "Values": owned}]));

        let subnets = match ctx.call(&ctx.descriptor.operation, params).await {
            Ok(response) => ctx.descriptor.extract.extract(response).or_else(|| Some(json!([]))),
            Err(e) => {
                for vpc_id in owned {
                    let key = ctx.item_slot(&vpc_id);
                    let entry = error_entry(&key, &e);
                    store(cache, key, entry);
                }
                return Ok(());
            }
        };

        let mut by_vpc: BTreeMap<String, Vec<Value>> =
            owned.iter().map(|id| (id.clone(), Vec::new())).collect();
        for subnet in subnets.as_ref().and_then(Value::as_array).into_iter().flatten() {
            let Some(vpc_id) = subnet.get("VpcId").and_then(item_id) else {
                continue;
            };
            if let Some(group) = by_vpc.get_mut(&vpc_id) {
                group.push(subnet.clone());
            }
        }

        for (vpc_id, group) in by_vpc {
            store(cache, ctx.item_slot(&vpc_id), CacheEntry::with_data(Value::Array(group)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SlotKey;
    use crate::catalog::CallDescriptor;
    use crate::transport::{MockTransport, ProviderError, RequestContext, TransportConfig};
    use std::sync::Arc;

    fn descriptor() -> CallDescriptor {
        CallDescriptor::new("EC2", "describeSubnets")
            .property("SubnetSet")
            .depends_on("ec2", "describeVpcs")
            .overridden()
    }

    #[tokio::test]
    async fn test_groups_subnets_by_vpc() {
        let mut transport = MockTransport::new();
        transport
            .expect_invoke()
            .withf(|_, request| {
                request.operation == "describeSubnets"
                    && request.params["Filters"][0]["Values"] == json!(["vpc-1", "vpc-2"])
            })
            .times(1)
            .returning(|_, _| {
                Ok(json!({"SubnetSet": [
                    {"SubnetId": "subnet-a", "VpcId": "vpc-1"},
                    {"SubnetId": "subnet-b", "VpcId": "vpc-1"}
                ]}))
            });

        let descriptor = descriptor();
        let vpcs = vec![json!({"VpcId": "vpc-1"}), json!({"VpcId": "vpc-2"})];
        let ctx = CollectContext {
            descriptor: &descriptor,
            region: "eu-west-1",
            request: RequestContext::new(Arc::new(TransportConfig::default())).for_region("eu-west-1"),
            transport: &transport,
            prerequisite: Some(&vpcs),
            item_limit: 4,
        };
        let cache = CacheStore::new();
        SubnetsCollector.collect(&ctx, &cache).await.unwrap();

        let first = cache.get(&SlotKey::item("ec2", "describeSubnets", "eu-west-1", "vpc-1")).unwrap();
        assert_eq!(first.records().unwrap().len(), 2);
        let second = cache.get(&SlotKey::item("ec2", "describeSubnets", "eu-west-1", "vpc-2")).unwrap();
        assert_eq!(second.data(), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_error_is_filed_per_vpc() {
        let mut transport = MockTransport::new();
        transport
            .expect_invoke()
            .returning(|_, _| Err(ProviderError::Transport("connection reset".into())));

        let descriptor = descriptor();
        let vpcs = vec![json!({"VpcId": "vpc-1"}), json!({"VpcId": "vpc-2"})];
        let ctx = CollectContext {
            descriptor: &descriptor,
            region: "eu-west-1",
            request: RequestContext::new(Arc::new(TransportConfig::default())),
            transport: &transport,
            prerequisite: Some(&vpcs),
            item_limit: 4,
        };
        let cache = CacheStore::new();
        SubnetsCollector.collect(&ctx, &cache).await.unwrap();

        for vpc in ["vpc-1", "vpc-2"] {
            let entry = cache.get(&SlotKey::item("ec2", "describeSubnets", "eu-west-1", vpc)).unwrap();
            assert_eq!(entry.error(), Some("Transport failure: connection reset"));
        }
    }
}
