//! Declarative table of remote calls.
//!
//! The catalog lists every primary call (one per service/operation, run in
//! every region of the service) and an ordered list of postcall waves whose
//! entries depend on a primary call's results. It is validated once, when it
//! is built, so that scheduling never meets a malformed entry.

mod default_catalog;
mod descriptor;

pub use default_catalog::default_catalog;
pub use descriptor::{CallDescriptor, Dependency, ExtractPath, ItemFilter};

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal catalog configuration errors, raised before any call is issued.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("{service}:{operation} is declared more than once")]
    DuplicateCall { service: String, operation: String },

    #[error("{service}:{operation} depends on {dependency}, which is not an earlier catalog entry")]
    UnknownDependency { service: String, operation: String, dependency: String },

    #[error("postcall {service}:{operation} does not declare a dependency")]
    MissingDependency { service: String, operation: String },

    #[error("primary call {service}:{operation} must not declare a dependency")]
    UnexpectedDependency { service: String, operation: String },

    #[error("dependent call {service}:{operation} needs an item filter")]
    MissingItemFilter { service: String, operation: String },

    #[error("{service}:{operation} sets second_property without property")]
    InvalidExtractPath { service: String, operation: String },

    #[error("{service}:{operation} is marked as override but no collector is registered for it")]
    MissingCollector { service: String, operation: String },
}

/// Calls of one service, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCalls {
    pub service: String,
    pub calls: Vec<CallDescriptor>,
}

impl ServiceCalls {
    pub fn service_key(&self) -> String {
        self.service.to_lowercase()
    }
}

/// Descriptors grouped by service (compared case-insensitively), keeping the
/// order in which services and operations were first declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallTable {
    services: Vec<ServiceCalls>,
}

impl CallTable {
    fn from_descriptors(descriptors: Vec<CallDescriptor>) -> Self {
        let mut table = Self::default();
        for descriptor in descriptors {
            match table
                .services
                .iter_mut()
                .find(|group| group.service.eq_ignore_ascii_case(&descriptor.service))
            {
                Some(group) => group.calls.push(descriptor),
                None => table.services.push(ServiceCalls {
                    service: descriptor.service.clone(),
                    calls: vec![descriptor],
                }),
            }
        }
        table
    }

    pub fn services(&self) -> &[ServiceCalls] {
        &self.services
    }

    pub fn calls(&self) -> impl Iterator<Item = &CallDescriptor> {
        self.services.iter().flat_map(|group| group.calls.iter())
    }

    pub fn len(&self) -> usize {
        self.calls().count()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    fn retain(&mut self, mut keep: impl FnMut(&CallDescriptor) -> bool) {
        for group in &mut self.services {
            group.calls.retain(&mut keep);
        }
        self.services.retain(|group| !group.calls.is_empty());
    }
}

/// Validated primary table plus ordered postcall waves.
#[derive(Debug, Clone, PartialEq)]
pub struct CallCatalog {
    primary: CallTable,
    waves: Vec<CallTable>,
}

type CallId = (String, String);

fn call_id(service: &str, operation: &str) -> CallId {
    (service.to_lowercase(), operation.to_string())
}

impl CallCatalog {
    /// Build and validate a catalog.
    pub fn new(primary: Vec<CallDescriptor>, waves: Vec<Vec<CallDescriptor>>) -> Result<Self, CatalogError> {
        let catalog = Self {
            primary: CallTable::from_descriptors(primary),
            waves: waves.into_iter().map(CallTable::from_descriptors).collect(),
        };
        catalog.validate()?;
        debug!(
            "Catalog validated: {} primary calls, {} postcall waves",
            catalog.primary.len(),
            catalog.waves.len()
        );
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut declared: HashSet<CallId> = HashSet::new();
        let mut primary_ids: HashSet<CallId> = HashSet::new();

        for descriptor in self.primary.calls() {
            check_extract_path(descriptor)?;
            let id = call_id(&descriptor.service, &descriptor.operation);
            if !declared.insert(id.clone()) {
                return Err(duplicate(descriptor));
            }
            if descriptor.depends_on.is_some() {
                return Err(CatalogError::UnexpectedDependency {
                    service: descriptor.service.clone(),
                    operation: descriptor.operation.clone(),
                });
            }
            primary_ids.insert(id);
        }

        // Override entries of earlier waves may feed later waves.
        let mut earlier_overrides: HashSet<CallId> = HashSet::new();
        for wave in &self.waves {
            let mut wave_overrides = Vec::new();
            for descriptor in wave.calls() {
                check_extract_path(descriptor)?;
                let id = call_id(&descriptor.service, &descriptor.operation);
                if !declared.insert(id.clone()) {
                    return Err(duplicate(descriptor));
                }

                let dependency = descriptor.depends_on.as_ref().ok_or_else(|| CatalogError::MissingDependency {
                    service: descriptor.service.clone(),
                    operation: descriptor.operation.clone(),
                })?;
                let dependency_id = call_id(&dependency.service, &dependency.operation);
                if !primary_ids.contains(&dependency_id) && !earlier_overrides.contains(&dependency_id) {
                    return Err(CatalogError::UnknownDependency {
                        service: descriptor.service.clone(),
                        operation: descriptor.operation.clone(),
                        dependency: format!("{}:{}", dependency.service, dependency.operation),
                    });
                }

                if descriptor.is_override {
                    wave_overrides.push(id);
                } else if descriptor.item_filter.is_none() {
                    return Err(CatalogError::MissingItemFilter {
                        service: descriptor.service.clone(),
                        operation: descriptor.operation.clone(),
                    });
                }
            }
            earlier_overrides.extend(wave_overrides);
        }

        Ok(())
    }

    pub fn primary(&self) -> &CallTable {
        &self.primary
    }

    pub fn waves(&self) -> &[CallTable] {
        &self.waves
    }

    /// Look up any entry, primary or postcall.
    pub fn get(&self, service: &str, operation: &str) -> Option<&CallDescriptor> {
        std::iter::once(&self.primary)
            .chain(self.waves.iter())
            .flat_map(CallTable::calls)
            .find(|d| d.service.eq_ignore_ascii_case(service) && d.operation == operation)
    }

    /// Every override entry, across all phases.
    pub fn overrides(&self) -> impl Iterator<Item = &CallDescriptor> {
        std::iter::once(&self.primary)
            .chain(self.waves.iter())
            .flat_map(CallTable::calls)
            .filter(|d| d.is_override)
    }

    /// Restrict the catalog to the given services (case-insensitive).
    ///
    /// Postcalls whose prerequisite is no longer scheduled are dropped with
    /// them, so the result stays valid.
    pub fn restrict_to(&self, services: &[String]) -> Self {
        let wanted: HashSet<String> = services.iter().map(|s| s.to_lowercase()).collect();
        let mut restricted = self.clone();

        restricted.primary.retain(|d| wanted.contains(&d.service_key()));
        let mut available: HashSet<CallId> = restricted
            .primary
            .calls()
            .map(|d| call_id(&d.service, &d.operation))
            .collect();

        for wave in &mut restricted.waves {
            wave.retain(|d| {
                wanted.contains(&d.service_key())
                    && d.depends_on
                        .as_ref()
                        .is_some_and(|dep| available.contains(&call_id(&dep.service, &dep.operation)))
            });
            available.extend(wave.calls().filter(|d| d.is_override).map(|d| call_id(&d.service, &d.operation)));
        }
        restricted.waves.retain(|wave| !wave.is_empty());

        info!(
            "Catalog restricted to {} service(s): {} primary calls, {} postcall waves",
            wanted.len(),
            restricted.primary.len(),
            restricted.waves.len()
        );
        restricted
    }

    pub fn to_file(&self) -> CatalogFile {
        CatalogFile {
            primary: self.primary.calls().cloned().collect(),
            postcalls: self.waves.iter().map(|wave| wave.calls().cloned().collect()).collect(),
        }
    }
}

fn duplicate(descriptor: &CallDescriptor) -> CatalogError {
    CatalogError::DuplicateCall { service: descriptor.service.clone(), operation: descriptor.operation.clone() }
}

fn check_extract_path(descriptor: &CallDescriptor) -> Result<(), CatalogError> {
    if descriptor.extract.second_property.is_some() && descriptor.extract.property.is_none() {
        return Err(CatalogError::InvalidExtractPath {
            service: descriptor.service.clone(),
            operation: descriptor.operation.clone(),
        });
    }
    Ok(())
}

/// On-disk form of a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    pub primary: Vec<CallDescriptor>,
    #[serde(default)]
    pub postcalls: Vec<Vec<CallDescriptor>>,
}

impl CatalogFile {
    /// Load a catalog from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read catalog file: {}", path.display()))?;

        let file: CatalogFile = serde_yaml::from_str(&content).context("Failed to parse YAML catalog")?;

        debug!("Loaded catalog from {}", path.display());
        Ok(file)
    }

    /// Save a catalog to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize catalog to YAML")?;

        fs::write(path, yaml).context(format!("Failed to write catalog to {}", path.display()))?;

        info!("Saved catalog to {}", path.display());
        Ok(())
    }

    pub fn into_catalog(self) -> Result<CallCatalog, CatalogError> {
        CallCatalog::new(self.primary, self.postcalls)
    }
}

/// Load a catalog file when a path is given, otherwise the built-in catalog.
pub fn load_catalog(path: Option<&Path>) -> Result<CallCatalog> {
    match path {
        Some(path) => {
            let catalog = CatalogFile::from_yaml_file(path)?
                .into_catalog()
                .context(format!("Invalid catalog in {}", path.display()))?;
            info!("Using catalog from {}", path.display());
            Ok(catalog)
        }
        None => Ok(default_catalog()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn dependent(service: &str, operation: &str) -> CallDescriptor {
        CallDescriptor::new(service, operation)
            .depends_on("CloudTrail", "describeTrails")
            .item_filter("S3BucketName", "Bucket")
    }

    #[test]
    fn test_groups_services_in_declaration_order() {
        let catalog = CallCatalog::new(
            vec![
                CallDescriptor::new("EC2", "describeVpcs"),
                CallDescriptor::new("IAM", "listUsers"),
                CallDescriptor::new("ec2", "describeAddresses"),
            ],
            vec![],
        )
        .unwrap();
        let services: Vec<&str> = catalog.primary().services().iter().map(|g| g.service.as_str()).collect();
        assert_eq!(services, vec!["EC2", "IAM"]);
        assert_eq!(catalog.primary().services()[0].calls.len(), 2);
    }

    #[test]
    fn test_duplicate_call() {
        let err = CallCatalog::new(
            vec![CallDescriptor::new("EC2", "describeVpcs"), CallDescriptor::new("ec2", "describeVpcs")],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCall { .. }));
    }

    #[test]
    fn test_unknown_dependency() {
        let err = CallCatalog::new(vec![CallDescriptor::new("EC2", "describeVpcs")], vec![vec![dependent(
            "S3",
            "getBucketAcl",
        )]])
        .unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownDependency {
                service: "S3".into(),
                operation: "getBucketAcl".into(),
                dependency: "CloudTrail:describeTrails".into(),
            }
        );
    }

    #[test]
    fn test_dependent_without_item_filter() {
        let err = CallCatalog::new(
            vec![CallDescriptor::new("CloudTrail", "describeTrails")],
            vec![vec![CallDescriptor::new("S3", "getBucketAcl").depends_on("cloudtrail", "describeTrails")]],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::MissingItemFilter { .. }));
    }

    #[test]
    fn test_override_dependent_needs_no_item_filter() {
        let catalog = CallCatalog::new(
            vec![CallDescriptor::new("EC2", "describeVpcs")],
            vec![vec![CallDescriptor::new("EC2", "describeSubnets").depends_on("ec2", "describeVpcs").overridden()]],
        );
        assert!(catalog.is_ok());
    }

    #[test]
    fn test_later_wave_may_depend_on_earlier_override() {
        let catalog = CallCatalog::new(
            vec![CallDescriptor::new("EC2", "describeVpcs")],
            vec![
                vec![CallDescriptor::new("EC2", "describeSubnets").depends_on("EC2", "describeVpcs").overridden()],
                vec![CallDescriptor::new("EC2", "describeRouteTables")
                    .depends_on("EC2", "describeSubnets")
                    .item_filter("SubnetId", "SubnetId")],
            ],
        );
        assert!(catalog.is_ok());
    }

    #[test]
    fn test_primary_with_dependency_and_postcall_without() {
        let err = CallCatalog::new(vec![dependent("S3", "getBucketAcl")], vec![]).unwrap_err();
        assert!(matches!(err, CatalogError::UnexpectedDependency { .. }));

        let err = CallCatalog::new(
            vec![CallDescriptor::new("CloudTrail", "describeTrails")],
            vec![vec![CallDescriptor::new("S3", "getBucketAcl")]],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::MissingDependency { .. }));
    }

    #[test]
    fn test_second_property_requires_property() {
        let mut descriptor = CallDescriptor::new("CloudFront", "listDistributions");
        descriptor.extract.second_property = Some("Items".into());
        let err = CallCatalog::new(vec![descriptor], vec![]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidExtractPath { .. }));
    }

    #[test]
    fn test_restrict_drops_orphaned_postcalls() {
        let catalog = CallCatalog::new(
            vec![CallDescriptor::new("CloudTrail", "describeTrails"), CallDescriptor::new("KMS", "listKeys")],
            vec![vec![
                dependent("S3", "getBucketAcl"),
                CallDescriptor::new("KMS", "describeKey").depends_on("KMS", "listKeys").item_filter("KeyId", "KeyId"),
            ]],
        )
        .unwrap();

        let restricted = catalog.restrict_to(&["s3".to_string(), "kms".to_string()]);
        assert_eq!(restricted.primary().len(), 1);
        assert!(restricted.get("S3", "getBucketAcl").is_none());
        assert!(restricted.get("kms", "describeKey").is_some());
    }

    #[test]
    fn test_catalog_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");

        let catalog = CallCatalog::new(
            vec![CallDescriptor::new("SES", "listIdentities")
                .property("Identities")
                .params(json!({"IdentityType": "Domain"}))
                .rate_limit_ms(1000)],
            vec![],
        )
        .unwrap();
        catalog.to_file().save_to_yaml_file(&path).unwrap();

        let loaded = load_catalog(Some(&path)).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_invalid_catalog_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        fs::write(&path, "primary:\n  - service: S3\n    operation: getBucketAcl\n    depends_on: {service: x, operation: y}\n")
            .unwrap();
        assert!(load_catalog(Some(&path)).is_err());
    }
}
