use chrono::Utc;
use serde_json::Value;

use super::helpers::{as_f64, as_str, days_ago, lookup, Lookup};
use super::{Finding, Rule, RuleMetadata, Status};
use crate::cache::Snapshot;
use crate::constants::DEFAULT_REGION;

pub struct MinPasswordLength;

static MIN_PASSWORD_LENGTH: RuleMetadata = RuleMetadata {
    title: "Minimum Password Length",
    category: "IAM",
    description: "Ensures password policy requires a password of at least 14 characters",
    more_info: "A strong password policy enforces minimum length, expirations, reuse, and symbol usage",
    link: "http://docs.aws.amazon.com/IAM/latest/UserGuide/Using_ManagingPasswordPolicies.html",
    recommended_action: "Increase the minimum length requirement for the password policy",
    apis: &["IAM:getAccountPasswordPolicy"],
};

impl Rule for MinPasswordLength {
    fn metadata(&self) -> &'static RuleMetadata {
        &MIN_PASSWORD_LENGTH
    }

    fn evaluate(&self, snapshot: &Snapshot) -> Vec<Finding> {
        let policy = match lookup(snapshot.get("iam", "getAccountPasswordPolicy", DEFAULT_REGION)) {
            Lookup::Missing => return Vec::new(),
            Lookup::Failed(_) => {
                return vec![Finding::new(Status::Unknown, "Unable to query for password policy status")]
            }
            Lookup::Data(policy) => policy,
        };

        let finding = match policy
            .get("MinimumPasswordLength")
            .and_then(as_f64)
            .filter(|length| *length > 0.0)
        {
            None => Finding::new(Status::Fail, "Password policy does not specify a minimum password length"),
            Some(length) if length < 10.0 => Finding::new(
                Status::Fail,
                format!("Minimum password length of: {} is less than 10 characters", length),
            ),
            Some(length) if length < 14.0 => Finding::new(
                Status::Warn,
                format!("Minimum password length of: {} is less than 14 characters", length),
            ),
            Some(length) => Finding::new(Status::Ok, format!("Minimum password length of: {} is suitable", length)),
        };
        vec![finding]
    }
}

pub struct AccessKeysLastUsed;

static ACCESS_KEYS_LAST_USED: RuleMetadata = RuleMetadata {
    title: "Access Keys Last Used",
    category: "IAM",
    description: "Detects access keys that have not been used for a period of time and that should be decommissioned",
    more_info: "Having numerous, unused access keys extends the attack surface. Access keys should be removed if they are no longer being used.",
    link: "http://docs.aws.amazon.com/IAM/latest/UserGuide/ManagingCredentials.html",
    recommended_action: "Log into the IAM portal and remove the offending access key.",
    apis: &["IAM:generateCredentialReport"],
};

const ROOT_ACCOUNT: &str = "<root_account>";
const KEY_FAIL_DAYS: i64 = 180;
const KEY_WARN_DAYS: i64 = 90;

fn key_finding(last_used: &str, key_number: u8, arn: Option<&str>) -> Finding {
    let finding = match days_ago(last_used, Utc::now()) {
        None => Finding::new(
            Status::Unknown,
            format!("Unable to read last use of access key {}: {}", key_number, last_used),
        ),
        Some(days) => {
            let message = format!("User access key {} was last used {} days ago", key_number, days);
            let status = if days > KEY_FAIL_DAYS {
                Status::Fail
            } else if days > KEY_WARN_DAYS {
                Status::Warn
            } else {
                Status::Ok
            };
            Finding::new(status, message)
        }
    };
    match arn {
        Some(arn) => finding.for_resource(arn),
        None => finding,
    }
}

impl Rule for AccessKeysLastUsed {
    fn metadata(&self) -> &'static RuleMetadata {
        &ACCESS_KEYS_LAST_USED
    }

    fn evaluate(&self, snapshot: &Snapshot) -> Vec<Finding> {
        let rows = match lookup(snapshot.get("iam", "generateCredentialReport", DEFAULT_REGION)) {
            Lookup::Missing => return Vec::new(),
            Lookup::Data(Value::Array(rows)) => rows,
            _ => return vec![Finding::new(Status::Unknown, "Unable to query for users")],
        };

        let mut findings = Vec::new();
        for row in rows.iter().filter(|row| as_str(row, "user") != Some(ROOT_ACCOUNT)) {
            let arn = as_str(row, "arn");
            for (key_number, field) in [(1, "access_key_1_last_used_date"), (2, "access_key_2_last_used_date")] {
                match as_str(row, field) {
                    Some(last_used) if last_used != "N/A" => findings.push(key_finding(last_used, key_number, arn)),
                    _ => {}
                }
            }
        }

        if findings.is_empty() {
            findings.push(Finding::new(Status::Ok, "No users using access keys found"));
        }
        findings
    }
}
