use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::cache::Snapshot;

/// Per-service slot counts of a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceCounts {
    pub slots: usize,
    pub with_data: usize,
    pub with_error: usize,
}

/// Count slots per service key.
pub fn count_slots(snapshot: &Snapshot) -> BTreeMap<String, ServiceCounts> {
    let mut counts: BTreeMap<String, ServiceCounts> = BTreeMap::new();
    for (key, entry) in snapshot.iter() {
        let service = counts.entry(key.service().to_string()).or_default();
        service.slots += 1;
        if entry.error().is_some() {
            service.with_error += 1;
        } else if entry.data().is_some() {
            service.with_data += 1;
        }
    }
    counts
}

/// Create a JSON summary of a collection run.
///
/// Generates a report with a run id, timing and per-service slot counts.
/// The snapshot itself is not included.
///
/// # Example Output
///
/// ```json
/// {
///   "run_id": "550e8400-e29b-41d4-a716-446655440000",
///   "started": "2024-01-15T14:30:52Z",
///   "finished": "2024-01-15T14:31:40Z",
///   "duration_seconds": 48.0,
///   "slot_count": 214,
///   "error_count": 12,
///   "services": {"ec2": {"slots": 66, "data": 60, "errors": 6}}
/// }
/// ```
pub fn create_run_summary(snapshot: &Snapshot, started: DateTime<Utc>, finished: DateTime<Utc>) -> Result<String> {
    let counts = count_slots(snapshot);
    let services: serde_json::Map<String, serde_json::Value> = counts
        .iter()
        .map(|(service, c)| {
            (
                service.clone(),
                json!({"slots": c.slots, "data": c.with_data, "errors": c.with_error}),
            )
        })
        .collect();

    let duration = (finished - started).num_milliseconds() as f64 / 1000.0;
    let summary = json!({
        "run_id": Uuid::new_v4().to_string(),
        "collector_version": env!("CARGO_PKG_VERSION"),
        "started": started.to_rfc3339(),
        "finished": finished.to_rfc3339(),
        "duration_seconds": duration,
        "slot_count": snapshot.len(),
        "error_count": counts.values().map(|c| c.with_error).sum::<usize>(),
        "services": services,
    });

    serde_json::to_string_pretty(&summary).context("Failed to serialize run summary to JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::Value;

    fn sample_snapshot() -> Snapshot {
        Snapshot::from_json(&json!({
            "ec2": {"describeVpcs": {
                "us-east-1": {"data": [{"VpcId": "vpc-1"}]},
                "eu-west-1": {"error": "AuthFailure"},
                "ap-south-1": {}
            }},
            "kms": {"describeKey": {"us-east-1": {"k1": {"data": {}}, "k2": {"data": {}}}}}
        }))
        .unwrap()
    }

    #[test]
    fn test_count_slots() {
        let counts = count_slots(&sample_snapshot());
        assert_eq!(counts["ec2"], ServiceCounts { slots: 3, with_data: 1, with_error: 1 });
        assert_eq!(counts["kms"], ServiceCounts { slots: 2, with_data: 2, with_error: 0 });
    }

    #[test]
    fn test_run_summary() {
        let started = Utc::now();
        let finished = started + Duration::seconds(48);
        let json_str = create_run_summary(&sample_snapshot(), started, finished).unwrap();
        let json: Value = serde_json::from_str(&json_str).unwrap();

        assert!(json["run_id"].is_string());
        assert!(json["collector_version"].is_string());
        assert_eq!(json["duration_seconds"], 48.0);
        assert_eq!(json["slot_count"], 5);
        assert_eq!(json["error_count"], 1);
        assert_eq!(json["services"]["ec2"]["errors"], 1);
        assert_eq!(json["services"]["kms"]["data"], 2);
    }
}
