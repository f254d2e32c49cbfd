//! Integration tests for the built-in catalog and catalog files on disk.

use std::fs;

use tempfile::tempdir;

use cloud_auditor::catalog::{default_catalog, load_catalog, CatalogError, CatalogFile};
use cloud_auditor::collectors::CollectorRegistry;

#[test]
fn test_default_catalog_survives_yaml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.yaml");

    default_catalog().to_file().save_to_yaml_file(&path).unwrap();
    let loaded = load_catalog(Some(&path)).unwrap();

    assert_eq!(loaded, default_catalog());
}

#[test]
fn test_load_without_path_uses_builtin() {
    assert_eq!(load_catalog(None).unwrap(), default_catalog());
}

#[test]
fn test_every_default_override_has_a_collector() {
    let registry = CollectorRegistry::with_defaults();
    for descriptor in default_catalog().overrides() {
        assert!(
            registry.contains(&descriptor.service, &descriptor.operation),
            "{}:{} has no collector",
            descriptor.service,
            descriptor.operation
        );
    }
}

#[test]
fn test_default_postcalls_depend_on_known_calls() {
    let catalog = default_catalog();
    for wave in catalog.waves() {
        for descriptor in wave.calls() {
            let dependency = descriptor.depends_on.as_ref().unwrap();
            assert!(
                catalog.get(&dependency.service, &dependency.operation).is_some(),
                "{}:{} depends on missing {}:{}",
                descriptor.service,
                descriptor.operation,
                dependency.service,
                dependency.operation
            );
        }
    }
}

#[test]
fn test_invalid_file_reports_validation_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(
        &path,
        r#"
primary:
  - service: EC2
    operation: describeVpcs
    property: VpcSet
postcalls:
  - - service: S3
      operation: getBucketAcl
      depends_on:
        service: CloudTrail
        operation: describeTrails
      item_filter:
        source_field: S3BucketName
        request_field: Bucket
"#,
    )
    .unwrap();

    let file = CatalogFile::from_yaml_file(&path).unwrap();
    assert_eq!(
        file.into_catalog(),
        Err(CatalogError::UnknownDependency {
            service: "S3".to_string(),
            operation: "getBucketAcl".to_string(),
            dependency: "CloudTrail:describeTrails".to_string(),
        })
    );

    let err = load_catalog(Some(&path)).unwrap_err();
    assert!(format!("{:#}", err).contains("not an earlier catalog entry"));
}

#[test]
fn test_unreadable_file() {
    let dir = tempdir().unwrap();
    assert!(load_catalog(Some(&dir.path().join("missing.yaml"))).is_err());
}

#[test]
fn test_restrict_keeps_fed_postcalls() {
    let catalog = default_catalog();

    let s3_only = catalog.restrict_to(&["s3".to_string()]);
    assert!(s3_only.waves().is_empty(), "bucket calls lose their CloudTrail feed");

    let with_trails = catalog.restrict_to(&["cloudtrail".to_string(), "S3".to_string()]);
    assert!(with_trails
        .primary()
        .calls()
        .all(|d| d.service_key() == "cloudtrail" || d.service_key() == "s3"));
    let wave_services: Vec<String> = with_trails.waves()[0].calls().map(|d| d.service_key()).collect();
    assert!(!wave_services.is_empty());
    assert!(wave_services.iter().all(|service| service == "s3"));
}
