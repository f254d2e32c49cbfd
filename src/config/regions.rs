use std::collections::BTreeMap;

use log::debug;

use crate::constants::DEFAULT_REGION;

/// Regions queried for services without a dedicated list.
const STANDARD_REGIONS: &[&str] = &[
    "us-east-1",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-central-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "sa-east-1",
    "ap-south-1",
];

/// Global services, answered by a single endpoint.
const GLOBAL_SERVICES: &[&str] = &["iam", "s3", "cloudfront", "route53domains"];

const SES_REGIONS: &[&str] = &["us-east-1", "us-west-2", "eu-west-1"];

/// Ordered region ids per service key (lower-cased service name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCatalog {
    standard: Vec<String>,
    services: BTreeMap<String, Vec<String>>,
}

fn owned(regions: &[&str]) -> Vec<String> {
    regions.iter().map(|r| r.to_string()).collect()
}

impl Default for RegionCatalog {
    fn default() -> Self {
        let mut services = BTreeMap::new();
        for service in GLOBAL_SERVICES {
            services.insert(service.to_string(), vec![DEFAULT_REGION.to_string()]);
        }
        services.insert("ses".to_string(), owned(SES_REGIONS));

        Self { standard: owned(STANDARD_REGIONS), services }
    }
}

impl RegionCatalog {
    /// A catalog using the same list for every service.
    pub fn uniform(regions: &[&str]) -> Self {
        Self { standard: owned(regions), services: BTreeMap::new() }
    }

    /// Replace the region lists of individual services.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, Vec<String>>) -> Self {
        for (service, regions) in overrides {
            debug!("Region override for {}: {:?}", service, regions);
            self.services.insert(service.to_lowercase(), regions.clone());
        }
        self
    }

    pub fn regions_for(&self, service: &str) -> &[String] {
        self.services
            .get(&service.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&self.standard)
    }
}
