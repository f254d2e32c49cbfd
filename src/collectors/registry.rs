use std::collections::HashMap;
use std::sync::Arc;

use super::collector::Collector;
use super::overrides::{
    CredentialReportCollector, DkimAttributesCollector, LoadBalancerPoliciesCollector, SubnetsCollector,
};

/// Override collectors keyed by (service key, operation).
#[derive(Default, Clone)]
pub struct CollectorRegistry {
    collectors: HashMap<(String, String), Arc<dyn Collector>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the collectors for every override in the built-in catalog.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("iam", "generateCredentialReport", Arc::new(CredentialReportCollector::default()));
        registry.register("ec2", "describeSubnets", Arc::new(SubnetsCollector));
        registry.register("elb", "describeLoadBalancerPolicies", Arc::new(LoadBalancerPoliciesCollector));
        registry.register("ses", "getIdentityDkimAttributes", Arc::new(DkimAttributesCollector));
        registry
    }

    /// Register `collector`, replacing any previous one for the same entry.
    pub fn register(&mut self, service: &str, operation: &str, collector: Arc<dyn Collector>) {
        self.collectors
            .insert((service.to_lowercase(), operation.to_string()), collector);
    }

    pub fn get(&self, service: &str, operation: &str) -> Option<Arc<dyn Collector>> {
        self.collectors
            .get(&(service.to_lowercase(), operation.to_string()))
            .cloned()
    }

    pub fn contains(&self, service: &str, operation: &str) -> bool {
        self.collectors
            .contains_key(&(service.to_lowercase(), operation.to_string()))
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}
