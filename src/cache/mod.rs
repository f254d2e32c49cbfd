//! In-memory result store for one collection run.
//!
//! Every remote call lands in exactly one *slot*, addressed by
//! `service -> operation -> region -> (optional item id)`. The store is
//! additive only: a slot is reserved before its call is issued, written at
//! most once, and never removed. At the end of a run the store is frozen
//! into a [`Snapshot`] and handed to the rule layer.
//!
//! ```text
//! cache
//! └── ec2                              (service key, lower-cased)
//!     └── describeVpcs                 (operation)
//!         ├── us-east-1 -> {data: [...]}
//!         └── eu-west-1 -> {error: "..."}
//! └── s3
//!     └── getBucketLogging
//!         └── us-east-1
//!             ├── trail-bucket-1 -> {data: {...}}   (item slot)
//!             └── trail-bucket-2 -> {}
//! ```

mod snapshot;

pub use snapshot::Snapshot;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Address of one slot in the cache.
///
/// The service component is always stored lower-cased so that `EC2` and
/// `ec2` address the same namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    service: String,
    operation: String,
    region: String,
    item: Option<String>,
}

impl SlotKey {
    /// Key of a region-level slot (`cache[service][operation][region]`).
    pub fn region(service: &str, operation: &str, region: &str) -> Self {
        Self {
            service: service.to_lowercase(),
            operation: operation.to_string(),
            region: region.to_string(),
            item: None,
        }
    }

    /// Key of an item-level slot (`cache[service][operation][region][item]`).
    pub fn item(service: &str, operation: &str, region: &str, item: &str) -> Self {
        Self {
            item: Some(item.to_string()),
            ..Self::region(service, operation, region)
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn region_id(&self) -> &str {
        &self.region
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item.as_deref()
    }

    fn same_operation(&self, service: &str, operation: &str) -> bool {
        self.service == service && self.operation == operation
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[{}]", self.service, self.operation, self.region)?;
        if let Some(item) = &self.item {
            write!(f, "[{}]", item)?;
        }
        Ok(())
    }
}

/// Result of a single call: an error description, a payload, or neither.
///
/// The fields are private so that a slot can never carry both an error and
/// data; use the constructors to build one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCacheEntry")]
pub struct CacheEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CacheEntry {
    /// A slot that exists but holds no result ("no data").
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_data(data: Value) -> Self {
        Self { error: None, data: Some(data) }
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), data: None }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// The payload as a sequence, when it is one.
    pub fn records(&self) -> Option<&Vec<Value>> {
        self.data.as_ref().and_then(Value::as_array)
    }

    /// True once an error or a payload has been written.
    pub fn is_populated(&self) -> bool {
        self.error.is_some() || self.data.is_some()
    }
}

/// Wire form of a cache entry. Older snapshots name the error member `err`.
#[derive(Deserialize)]
struct RawCacheEntry {
    #[serde(default, alias = "err")]
    error: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

impl From<RawCacheEntry> for CacheEntry {
    fn from(raw: RawCacheEntry) -> Self {
        match raw.error {
            Some(Value::Null) | None => Self { error: None, data: raw.data.filter(|d| !d.is_null()) },
            Some(Value::String(message)) => Self::with_error(message),
            Some(other) => Self::with_error(other.to_string()),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SlotError {
    #[error("cache slot {0} has already been written")]
    AlreadyWritten(SlotKey),
}

/// Shared, additive-only store written by the schedulers and collectors.
///
/// The lock is only held for the duration of a single map operation and is
/// never held across an `.await`.
#[derive(Debug, Default)]
pub struct CacheStore {
    slots: RwLock<BTreeMap<SlotKey, CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty slot if it does not exist yet.
    ///
    /// Returns `true` when the slot was created by this call.
    pub fn reserve(&self, key: SlotKey) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(&key) {
            return false;
        }
        debug!("Reserved cache slot {}", key);
        slots.insert(key, CacheEntry::empty());
        true
    }

    /// Write a result into a slot, creating it if needed.
    ///
    /// A slot that already holds an error or data is never overwritten.
    pub fn put(&self, key: SlotKey, entry: CacheEntry) -> Result<(), SlotError> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.get(&key).is_some_and(CacheEntry::is_populated) {
            return Err(SlotError::AlreadyWritten(key));
        }
        slots.insert(key, entry);
        Ok(())
    }

    pub fn get(&self, key: &SlotKey) -> Option<CacheEntry> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).cloned()
    }

    pub fn contains(&self, key: &SlotKey) -> bool {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.contains_key(key)
    }

    /// Records held by a region-level slot, if it holds a non-empty sequence.
    pub fn records(&self, service: &str, operation: &str, region: &str) -> Option<Vec<Value>> {
        self.get(&SlotKey::region(service, operation, region))
            .and_then(|entry| entry.records().cloned())
            .filter(|records| !records.is_empty())
    }

    /// Number of item slots under one region of an operation.
    pub fn item_count(&self, service: &str, operation: &str, region: &str) -> usize {
        let start = SlotKey::region(service, operation, region);
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .range(start.clone()..)
            .take_while(|(key, _)| key.same_operation(&start.service, operation) && key.region == region)
            .filter(|(key, _)| key.item.is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Snapshot {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        Snapshot::from_slots(slots.clone())
    }

    /// Freeze the store at the end of a run.
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot::from_slots(self.slots.into_inner().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_namespace_is_lowercased() {
        let key = SlotKey::region("CloudTrail", "describeTrails", "us-east-1");
        assert_eq!(key.service(), "cloudtrail");
        assert_eq!(key.to_string(), "cloudtrail.describeTrails[us-east-1]");

        let item = SlotKey::item("S3", "getBucketAcl", "us-east-1", "logs");
        assert_eq!(item.to_string(), "s3.getBucketAcl[us-east-1][logs]");
    }

    #[test]
    fn test_reserve_then_put() {
        let cache = CacheStore::new();
        let key = SlotKey::region("ec2", "describeVpcs", "us-east-1");

        assert!(cache.reserve(key.clone()));
        assert!(!cache.reserve(key.clone()));
        assert_eq!(cache.get(&key), Some(CacheEntry::empty()));

        cache.put(key.clone(), CacheEntry::with_data(json!([{"VpcId": "vpc-1"}]))).unwrap();
        assert_eq!(cache.records("EC2", "describeVpcs", "us-east-1").unwrap().len(), 1);
    }

    #[test]
    fn test_populated_slot_is_never_overwritten() {
        let cache = CacheStore::new();
        let key = SlotKey::region("iam", "listUsers", "us-east-1");

        cache.put(key.clone(), CacheEntry::with_error("AccessDenied")).unwrap();
        let second = cache.put(key.clone(), CacheEntry::with_data(json!([])));

        assert_eq!(second, Err(SlotError::AlreadyWritten(key.clone())));
        assert_eq!(cache.get(&key).unwrap().error(), Some("AccessDenied"));
    }

    #[test]
    fn test_empty_sequence_is_not_records() {
        let cache = CacheStore::new();
        cache
            .put(SlotKey::region("kms", "listKeys", "eu-west-1"), CacheEntry::with_data(json!([])))
            .unwrap();
        assert!(cache.records("kms", "listKeys", "eu-west-1").is_none());
    }

    #[test]
    fn test_item_count() {
        let cache = CacheStore::new();
        cache.reserve(SlotKey::item("s3", "getBucketAcl", "us-east-1", "b1"));
        cache.reserve(SlotKey::item("s3", "getBucketAcl", "us-east-1", "b2"));
        cache.reserve(SlotKey::item("s3", "getBucketAcl", "us-west-2", "b3"));
        cache.reserve(SlotKey::item("s3", "getBucketLogging", "us-east-1", "b1"));

        assert_eq!(cache.item_count("s3", "getBucketAcl", "us-east-1"), 2);
        assert_eq!(cache.item_count("s3", "getBucketAcl", "us-west-2"), 1);
        assert_eq!(cache.item_count("s3", "getBucketVersioning", "us-east-1"), 0);
    }

    #[test]
    fn test_legacy_err_member_is_accepted() {
        let entry: CacheEntry =
            serde_json::from_value(json!({"err": "Throttling", "data": [1]})).unwrap();
        assert_eq!(entry.error(), Some("Throttling"));
        assert!(entry.data().is_none());
    }
}
