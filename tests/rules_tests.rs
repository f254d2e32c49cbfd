//! End-to-end tests: collect a scripted account, then evaluate every rule
//! over the resulting snapshot.

mod common;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde_json::json;

use cloud_auditor::cache::Snapshot;
use cloud_auditor::catalog::{CallCatalog, CallDescriptor};
use cloud_auditor::collectors::CollectorRegistry;
use cloud_auditor::config::ConcurrencyLimits;
use cloud_auditor::rules::{run_all, RuleResult, Status};
use cloud_auditor::utils::report::{findings_table, security_report};

use common::{engine_with_registry, ScriptedTransport};

const REGION: &str = "us-east-1";

fn credential_report() -> String {
    let stale = (Utc::now() - Duration::days(200)).to_rfc3339();
    let recent = (Utc::now() - Duration::days(3)).to_rfc3339();
    let csv = format!(
        "user,arn,access_key_1_last_used_date,access_key_2_last_used_date\n\
         <root_account>,arn:aws:iam::123456789012:root,N/A,N/A\n\
         alice,arn:aws:iam::123456789012:user/alice,{},N/A\n\
         bob,arn:aws:iam::123456789012:user/bob,{},N/A\n",
        stale, recent
    );
    STANDARD.encode(csv)
}

fn account() -> ScriptedTransport {
    let report = credential_report();
    ScriptedTransport::new()
        .on("CloudTrail", "describeTrails", |_, _| {
            Ok(json!({"trailList": [{
                "Name": "main",
                "S3BucketName": "audit-logs",
                "IncludeGlobalServiceEvents": true,
                "LogFileValidationEnabled": true,
                "TrailARN": "arn:aws:cloudtrail:us-east-1:123456789012:trail/main"
            }]}))
        })
        .on("S3", "getBucketLogging", |_, _| Ok(json!({})))
        .on("EC2", "describeSecurityGroups", |_, _| {
            Ok(json!({"SecurityGroupInfo": [{
                "GroupId": "sg-0a1b",
                "GroupName": "file-share",
                "OwnerId": "123456789012",
                "IpPermissions": [{
                    "IpProtocol": "udp",
                    "FromPort": "445",
                    "ToPort": "445",
                    "IpRanges": [{"CidrIp": "0.0.0.0/0"}]
                }]
            }]}))
        })
        .on("IAM", "getAccountPasswordPolicy", |_, _| {
            Ok(json!({"PasswordPolicy": {"MinimumPasswordLength": 12}}))
        })
        .on("IAM", "generateCredentialReport", |_, _| Ok(json!({"State": "COMPLETE"})))
        .on("IAM", "getCredentialReport", move |_, _| Ok(json!({"Content": report.clone()})))
}

fn catalog() -> CallCatalog {
    CallCatalog::new(
        vec![
            CallDescriptor::new("CloudTrail", "describeTrails").property("trailList"),
            CallDescriptor::new("EC2", "describeSecurityGroups").property("SecurityGroupInfo"),
            CallDescriptor::new("IAM", "getAccountPasswordPolicy").property("PasswordPolicy"),
            CallDescriptor::new("IAM", "generateCredentialReport").overridden(),
        ],
        vec![vec![CallDescriptor::new("S3", "getBucketLogging")
            .depends_on("CloudTrail", "describeTrails")
            .item_filter("S3BucketName", "Bucket")
            .drop_region()]],
    )
    .unwrap()
}

fn collect() -> Snapshot {
    tokio_test::block_on(
        engine_with_registry(
            catalog(),
            &[REGION],
            ConcurrencyLimits::default(),
            Arc::new(account()),
            CollectorRegistry::with_defaults(),
        )
        .run(),
    )
}

fn statuses(results: &[RuleResult], title: &str) -> Vec<Status> {
    results
        .iter()
        .find(|result| result.rule.title == title)
        .map(|result| result.output.findings.iter().map(|finding| finding.status).collect())
        .unwrap_or_default()
}

#[test]
fn test_scan_collected_account() {
    let snapshot = collect();
    let results = run_all(&snapshot, false);
    assert_eq!(results.len(), 9);

    assert_eq!(statuses(&results, "CloudTrail Enabled"), vec![Status::Ok, Status::Ok]);
    assert_eq!(statuses(&results, "CloudTrail Encryption"), vec![Status::Fail]);
    assert_eq!(statuses(&results, "CloudTrail File Validation"), vec![Status::Ok]);
    assert_eq!(statuses(&results, "CloudTrail Bucket Access Logging"), vec![Status::Warn]);
    assert_eq!(statuses(&results, "Open CIFS"), vec![Status::Fail]);
    assert_eq!(statuses(&results, "Minimum Password Length"), vec![Status::Warn]);
    assert_eq!(statuses(&results, "Access Keys Last Used"), vec![Status::Fail, Status::Ok]);

    // Nothing collected for these, so they stay silent.
    assert!(statuses(&results, "Elastic IP Limit").is_empty());
    assert!(statuses(&results, "Insecure Ciphers").is_empty());

    let open = &results.iter().find(|r| r.rule.title == "Open CIFS").unwrap().output.findings[0];
    assert_eq!(open.resource.as_deref(), Some("arn:aws:ec2:us-east-1:123456789012:security-group/sg-0a1b"));
}

#[test]
fn test_scan_from_saved_snapshot() {
    let snapshot = collect();
    let saved = serde_json::to_string(&snapshot).unwrap();
    let reloaded = Snapshot::from_json(&serde_json::from_str(&saved).unwrap()).unwrap();

    assert_eq!(reloaded, snapshot);
    let before: Vec<_> = run_all(&snapshot, false).into_iter().map(|r| r.output).collect();
    let after: Vec<_> = run_all(&reloaded, false).into_iter().map(|r| r.output).collect();
    assert_eq!(before, after);
}

#[test]
fn test_source_lists_consulted_slices() {
    let snapshot = collect();
    let results = run_all(&snapshot, true);

    let logging = results
        .iter()
        .find(|r| r.rule.title == "CloudTrail Bucket Access Logging")
        .unwrap();
    let source = logging.output.source.as_ref().unwrap();
    assert_eq!(source["getBucketLogging"][REGION]["audit-logs"]["data"], json!({}));
    assert!(source["describeTrails"][REGION]["data"].is_array());
}

#[test]
fn test_reports_render_every_rule() {
    let results = run_all(&collect(), false);

    let table = findings_table(&results);
    assert!(table.contains("Open CIFS"));
    assert!(table.contains("FAIL"));

    let report = security_report(&results);
    assert!(report.contains("CloudTrail"));
    assert!(report.contains("IAM"));
}
