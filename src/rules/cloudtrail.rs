use serde_json::Value;

use super::helpers::{as_bool, as_str, lookup, Lookup};
use super::{Finding, Rule, RuleMetadata, Status};
use crate::cache::Snapshot;

const SERVICE: &str = "cloudtrail";
const DESCRIBE_TRAILS: &str = "describeTrails";

/// Trails of every region that reported `describeTrails`, as
/// `(region, lookup)` pairs.
fn trails_by_region(snapshot: &Snapshot) -> Vec<(&str, Lookup<'_>)> {
    snapshot
        .regions(SERVICE, DESCRIBE_TRAILS)
        .into_iter()
        .map(|region| (region, lookup(snapshot.get(SERVICE, DESCRIBE_TRAILS, region))))
        .filter(|(_, state)| *state != Lookup::Missing)
        .collect()
}

/// Per-trail check shared by the encryption and file validation rules.
fn per_trail(
    snapshot: &Snapshot,
    query_failure: &str,
    check: impl Fn(&Value) -> bool,
    passed: &str,
    failed: &str,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (region, state) in trails_by_region(snapshot) {
        let Lookup::Data(Value::Array(trails)) = state else {
            findings.push(Finding::new(Status::Unknown, query_failure).in_region(region));
            continue;
        };
        if trails.is_empty() {
            findings.push(Finding::new(Status::Fail, "CloudTrail is not enabled").in_region(region));
            continue;
        }
        if trails[0].is_null() {
            findings.push(
                Finding::new(Status::Fail, "CloudTrail is enabled but is not properly configured").in_region(region),
            );
            continue;
        }
        for trail in trails {
            let (status, message) = if check(trail) { (Status::Ok, passed) } else { (Status::Fail, failed) };
            let mut finding = Finding::new(status, message).in_region(region);
            if let Some(arn) = as_str(trail, "TrailARN") {
                finding = finding.for_resource(arn);
            }
            findings.push(finding);
        }
    }
    findings
}

pub struct CloudTrailEnabled;

static ENABLED: RuleMetadata = RuleMetadata {
    title: "CloudTrail Enabled",
    category: "CloudTrail",
    description: "Ensures CloudTrail is enabled for all regions within an account",
    more_info: "CloudTrail should be enabled for all regions in order to detect suspicious activity in regions that are not typically used.",
    link: "http://docs.aws.amazon.com/awscloudtrail/latest/userguide/cloudtrail-getting-started.html",
    recommended_action: "Enable CloudTrail for all regions and ensure that at least one region monitors global service events",
    apis: &["CloudTrail:describeTrails"],
};

impl Rule for CloudTrailEnabled {
    fn metadata(&self) -> &'static RuleMetadata {
        &ENABLED
    }

    fn evaluate(&self, snapshot: &Snapshot) -> Vec<Finding> {
        let mut findings = Vec::new();
        let mut global_monitored = false;

        for (region, state) in trails_by_region(snapshot) {
            let Lookup::Data(Value::Array(trails)) = state else {
                findings.push(Finding::new(Status::Unknown, "Unable to query for CloudTrail policy").in_region(region));
                continue;
            };
            match trails.first() {
                None => findings.push(Finding::new(Status::Fail, "CloudTrail is not enabled").in_region(region)),
                Some(Value::Null) => findings.push(
                    Finding::new(Status::Fail, "CloudTrail is enabled but is not properly configured").in_region(region),
                ),
                Some(first) => {
                    findings.push(Finding::new(Status::Ok, "CloudTrail is enabled").in_region(region));
                    global_monitored |= as_bool(first.get("IncludeGlobalServiceEvents"));
                }
            }
        }

        findings.push(if global_monitored {
            Finding::new(Status::Ok, "CloudTrail is monitoring global services")
        } else {
            Finding::new(Status::Fail, "CloudTrail is not monitoring global services")
        });
        findings
    }
}

pub struct CloudTrailEncryption;

static ENCRYPTION: RuleMetadata = RuleMetadata {
    title: "CloudTrail Encryption",
    category: "CloudTrail",
    description: "Ensures CloudTrail encryption at rest is enabled for logs",
    more_info: "CloudTrail log files contain sensitive information about an account and should be encrypted at rest for additional protection.",
    link: "http://docs.aws.amazon.com/awscloudtrail/latest/userguide/encrypting-cloudtrail-log-files-with-aws-kms.html",
    recommended_action: "Enable CloudTrail log encryption through the CloudTrail console or API",
    apis: &["CloudTrail:describeTrails"],
};

impl Rule for CloudTrailEncryption {
    fn metadata(&self) -> &'static RuleMetadata {
        &ENCRYPTION
    }

    fn evaluate(&self, snapshot: &Snapshot) -> Vec<Finding> {
        per_trail(
            snapshot,
            "Unable to query for CloudTrail encryption status",
            |trail| as_str(trail, "KmsKeyId").is_some(),
            "CloudTrail encryption is enabled",
            "CloudTrail encryption is not enabled",
        )
    }
}

pub struct CloudTrailFileValidation;

static FILE_VALIDATION: RuleMetadata = RuleMetadata {
    title: "CloudTrail File Validation",
    category: "CloudTrail",
    description: "Ensures CloudTrail file validation is enabled for all regions within an account",
    more_info: "CloudTrail file validation is essentially a hash of the file which can be used to ensure its integrity in the case of an account compromise.",
    link: "http://docs.aws.amazon.com/awscloudtrail/latest/userguide/cloudtrail-log-file-validation-enabling.html",
    recommended_action: "Enable CloudTrail file validation for all regions",
    apis: &["CloudTrail:describeTrails"],
};

impl Rule for CloudTrailFileValidation {
    fn metadata(&self) -> &'static RuleMetadata {
        &FILE_VALIDATION
    }

    fn evaluate(&self, snapshot: &Snapshot) -> Vec<Finding> {
        per_trail(
            snapshot,
            "Unable to query for CloudTrail file validation status",
            |trail| as_bool(trail.get("LogFileValidationEnabled")),
            "CloudTrail log file validation is enabled",
            "CloudTrail log file validation is not enabled",
        )
    }
}

pub struct CloudTrailBucketAccessLogging;

static BUCKET_ACCESS_LOGGING: RuleMetadata = RuleMetadata {
    title: "CloudTrail Bucket Access Logging",
    category: "CloudTrail",
    description: "Ensures CloudTrail logging bucket has access logging enabled to detect tampering of log files",
    more_info: "CloudTrail buckets should utilize access logging for an additional layer of auditing. If the log files are deleted or modified in any way, the additional access logs can help determine who made the changes.",
    link: "http://docs.aws.amazon.com/AmazonS3/latest/UG/ManagingBucketLogging.html",
    recommended_action: "Enable access logging on the CloudTrail bucket from the S3 console",
    apis: &["CloudTrail:describeTrails", "S3:getBucketLogging"],
};

/// Logging configuration of a bucket, from whichever region filed it.
fn bucket_logging<'a>(snapshot: &'a Snapshot, bucket: &str) -> Lookup<'a> {
    snapshot
        .regions("s3", "getBucketLogging")
        .into_iter()
        .map(|region| lookup(snapshot.get_item("s3", "getBucketLogging", region, bucket)))
        .find(|state| *state != Lookup::Missing)
        .unwrap_or(Lookup::Missing)
}

impl Rule for CloudTrailBucketAccessLogging {
    fn metadata(&self) -> &'static RuleMetadata {
        &BUCKET_ACCESS_LOGGING
    }

    fn evaluate(&self, snapshot: &Snapshot) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (region, state) in trails_by_region(snapshot) {
            let Lookup::Data(Value::Array(trails)) = state else {
                findings.push(Finding::new(Status::Unknown, "Unable to query for CloudTrail policy").in_region(region));
                continue;
            };
            if trails.is_empty() {
                findings.push(Finding::new(Status::Ok, "No S3 buckets to check").in_region(region));
                continue;
            }

            for bucket in trails.iter().filter_map(|trail| as_str(trail, "S3BucketName")) {
                let resource = format!("arn:aws:s3:::{}", bucket);
                let finding = match bucket_logging(snapshot, bucket) {
                    Lookup::Data(logging) if logging.get("LoggingEnabled").is_some_and(|v| !v.is_null()) => {
                        Finding::new(Status::Ok, format!("Bucket: {} has S3 access logs enabled", bucket))
                    }
                    Lookup::Data(_) => {
                        Finding::new(Status::Warn, format!("Bucket: {} has S3 access logs disabled", bucket))
                    }
                    _ => Finding::new(
                        Status::Unknown,
                        format!("Error querying for bucket policy for bucket: {}", bucket),
                    ),
                };
                findings.push(finding.in_region(region).for_resource(resource));
            }
        }
        findings
    }
}
