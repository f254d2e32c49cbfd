use std::borrow::Cow;
use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::{CacheEntry, SlotKey};

/// Entry members; every other key found under a region node is an item id.
const ENTRY_MEMBERS: &[&str] = &["error", "err", "data"];

/// Prefix written before item ids that would otherwise read as an entry
/// member, and before ids that already start with it.
const ITEM_ESCAPE: char = '~';

fn escape_item(item: &str) -> Cow<'_, str> {
    if ENTRY_MEMBERS.contains(&item) || item.starts_with(ITEM_ESCAPE) {
        Cow::Owned(format!("{}{}", ITEM_ESCAPE, item))
    } else {
        Cow::Borrowed(item)
    }
}

fn unescape_item(key: &str) -> &str {
    key.strip_prefix(ITEM_ESCAPE).unwrap_or(key)
}

/// Read-only view of a finished collection run.
///
/// Serializes to the nested layout consumed by rule modules:
/// `{service: {operation: {region: {error?, data?} | {item: {error?, data?}}}}}`.
/// Item ids that collide with `error`, `err` or `data` are written with a
/// leading `~`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    slots: BTreeMap<SlotKey, CacheEntry>,
}

#[derive(Serialize)]
struct RegionNode<'a> {
    #[serde(flatten)]
    entry: Option<&'a CacheEntry>,
    #[serde(flatten)]
    items: BTreeMap<Cow<'a, str>, &'a CacheEntry>,
}

type Nested<'a> = BTreeMap<&'a str, BTreeMap<&'a str, BTreeMap<&'a str, RegionNode<'a>>>>;

impl Snapshot {
    pub(super) fn from_slots(slots: BTreeMap<SlotKey, CacheEntry>) -> Self {
        Self { slots }
    }

    /// Region-level slot of an operation.
    pub fn get(&self, service: &str, operation: &str, region: &str) -> Option<&CacheEntry> {
        self.slots.get(&SlotKey::region(service, operation, region))
    }

    /// Item-level slot of a dependent operation.
    pub fn get_item(&self, service: &str, operation: &str, region: &str, item: &str) -> Option<&CacheEntry> {
        self.slots.get(&SlotKey::item(service, operation, region, item))
    }

    /// All item slots stored under one region of an operation.
    pub fn items<'a>(
        &'a self,
        service: &str,
        operation: &'a str,
        region: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a CacheEntry)> + 'a {
        let start = SlotKey::region(service, operation, region);
        let service = start.service.clone();
        self.slots
            .range(start..)
            .take_while(move |(key, _)| key.same_operation(&service, operation) && key.region == region)
            .filter_map(|(key, entry)| key.item_id().map(|item| (item, entry)))
    }

    /// Distinct regions holding at least one slot for an operation, in order.
    pub fn regions(&self, service: &str, operation: &str) -> Vec<&str> {
        let start = SlotKey::region(service, operation, "");
        let mut regions: Vec<&str> = self
            .slots
            .range(start.clone()..)
            .take_while(|(key, _)| key.same_operation(&start.service, operation))
            .map(|(key, _)| key.region_id())
            .collect();
        regions.dedup();
        regions
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &CacheEntry)> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Nested JSON of every slot of one operation, or `Value::Null` when the
    /// operation was never scheduled. Used by rules to report their sources.
    pub fn operation_slice(&self, service: &str, operation: &str) -> Value {
        let nested = self.nested();
        nested
            .get(service.to_lowercase().as_str())
            .and_then(|operations| operations.get(operation))
            .and_then(|regions| serde_json::to_value(regions).ok())
            .unwrap_or(Value::Null)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Rebuild a snapshot from its nested JSON form.
    pub fn from_json(value: &Value) -> Result<Self> {
        let services = value.as_object().ok_or_else(|| anyhow!("Snapshot root must be an object"))?;
        let mut slots = BTreeMap::new();

        for (service, operations) in services {
            for (operation, regions) in as_object(operations, service)? {
                for (region, node) in as_object(regions, operation)? {
                    let node = as_object(node, region)?;
                    let (members, items): (Map<String, Value>, Map<String, Value>) = node
                        .clone()
                        .into_iter()
                        .partition(|(key, _)| ENTRY_MEMBERS.contains(&key.as_str()));

                    if !members.is_empty() || items.is_empty() {
                        let entry: CacheEntry = serde_json::from_value(Value::Object(members))
                            .with_context(|| format!("Invalid entry at {}.{}[{}]", service, operation, region))?;
                        slots.insert(SlotKey::region(service, operation, region), entry);
                    }

                    for (item, entry) in items {
                        let entry: CacheEntry = serde_json::from_value(entry).with_context(|| {
                            format!("Invalid entry at {}.{}[{}][{}]", service, operation, region, item)
                        })?;
                        slots.insert(SlotKey::item(service, operation, region, unescape_item(&item)), entry);
                    }
                }
            }
        }

        Ok(Self { slots })
    }

    fn nested(&self) -> Nested<'_> {
        let mut nested: Nested<'_> = BTreeMap::new();
        for (key, entry) in &self.slots {
            let node = nested
                .entry(key.service())
                .or_default()
                .entry(key.operation())
                .or_default()
                .entry(key.region_id())
                .or_insert_with(|| RegionNode { entry: None, items: BTreeMap::new() });
            match key.item_id() {
                Some(item) => {
                    node.items.insert(escape_item(item), entry);
                }
                None => node.entry = Some(entry),
            }
        }
        nested
    }
}

fn as_object<'a>(value: &'a Value, at: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| anyhow!("Expected an object under '{}'", at))
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.nested().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Snapshot::from_json(&value).map_err(serde::de::Error::custom)
    }
}
