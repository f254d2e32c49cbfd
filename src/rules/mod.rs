//! Security rules evaluated over a collection snapshot.
//!
//! A rule reads the slots named by its `apis` and emits findings. Rules
//! never issue calls of their own; anything they need must have been
//! collected first.

mod cloudtrail;
mod ec2;
pub mod helpers;
mod iam;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::Snapshot;

pub use cloudtrail::{CloudTrailBucketAccessLogging, CloudTrailEnabled, CloudTrailEncryption, CloudTrailFileValidation};
pub use ec2::{ElasticIpLimit, InsecureCiphers, OpenCifs};
pub use iam::{AccessKeysLastUsed, MinPasswordLength};

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub enum Status {
    Ok = 0,
    Warn = 1,
    Fail = 2,
    Unknown = 3,
}

impl Status {
    /// Word printed in the findings table.
    pub fn word(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warn => "WARN",
            Status::Fail => "FAIL",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl Finding {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), region: None, resource: None }
    }

    pub fn in_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn for_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutput {
    pub findings: Vec<Finding>,
    /// The snapshot slices the rule consulted, keyed by operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
}

/// Descriptive metadata shown alongside a rule's findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMetadata {
    pub title: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub more_info: &'static str,
    pub link: &'static str,
    pub recommended_action: &'static str,
    /// Catalog entries read, as `Service:operation`.
    pub apis: &'static [&'static str],
}

pub trait Rule: Send + Sync {
    fn metadata(&self) -> &'static RuleMetadata;

    fn evaluate(&self, snapshot: &Snapshot) -> Vec<Finding>;

    fn title(&self) -> &'static str {
        self.metadata().title
    }

    fn category(&self) -> &'static str {
        self.metadata().category
    }

    fn run(&self, snapshot: &Snapshot, include_source: bool) -> RuleOutput {
        let findings = self.evaluate(snapshot);
        let source = include_source.then(|| source_of(snapshot, self.metadata().apis));
        RuleOutput { findings, source }
    }
}

/// Slices of the snapshot backing a list of `Service:operation` names.
pub fn source_of(snapshot: &Snapshot, apis: &[&str]) -> Value {
    let mut source = Map::new();
    for api in apis {
        if let Some((service, operation)) = api.split_once(':') {
            source.insert(operation.to_string(), snapshot.operation_slice(service, operation));
        }
    }
    Value::Object(source)
}

/// Every rule, in report order.
pub fn all_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(CloudTrailBucketAccessLogging),
        Box::new(CloudTrailEnabled),
        Box::new(CloudTrailEncryption),
        Box::new(CloudTrailFileValidation),
        Box::new(ElasticIpLimit),
        Box::new(InsecureCiphers),
        Box::new(OpenCifs),
        Box::new(AccessKeysLastUsed),
        Box::new(MinPasswordLength),
    ]
}

/// Result of one rule over a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub rule: &'static RuleMetadata,
    pub output: RuleOutput,
}

pub fn run_all(snapshot: &Snapshot, include_source: bool) -> Vec<RuleResult> {
    all_rules()
        .iter()
        .map(|rule| RuleResult { rule: rule.metadata(), output: rule.run(snapshot, include_source) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        assert_eq!(u8::from(Status::Ok), 0);
        assert_eq!(u8::from(Status::Unknown), 3);
        assert_eq!(serde_json::to_value(Status::Fail).unwrap(), json!(2));
        assert_eq!(Status::Warn.word(), "WARN");
    }

    #[test]
    fn test_nine_rules_with_metadata() {
        let rules = all_rules();
        assert_eq!(rules.len(), 9);
        for rule in &rules {
            let metadata = rule.metadata();
            assert!(!metadata.title.is_empty());
            assert!(!metadata.apis.is_empty(), "{} lists no apis", metadata.title);
            assert!(metadata.link.starts_with("http"));
        }
    }

    #[test]
    fn test_source_only_when_requested() {
        let snapshot = Snapshot::from_json(&json!({
            "cloudtrail": {"describeTrails": {"us-east-1": {"data": []}}}
        }))
        .unwrap();

        let without = CloudTrailEnabled.run(&snapshot, false);
        assert!(without.source.is_none());

        let with = CloudTrailEnabled.run(&snapshot, true);
        assert_eq!(with.source.unwrap()["describeTrails"]["us-east-1"], json!({"data": []}));
    }

    #[test]
    fn test_empty_snapshot_runs_every_rule() {
        let results = run_all(&Snapshot::default(), false);
        assert_eq!(results.len(), 9);
    }
}
