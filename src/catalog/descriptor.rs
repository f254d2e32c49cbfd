use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::transport::SignatureVersion;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Where the payload sits inside a raw response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_property: Option<String>,
}

impl ExtractPath {
    /// Pull the payload out of a response.
    ///
    /// Without a property the whole response is the payload. A property (or
    /// second property) that is absent or `null` yields `None`, which callers
    /// store as "no data" rather than as an error.
    pub fn extract(&self, response: Value) -> Option<Value> {
        let Some(property) = &self.property else {
            return Some(response);
        };

        let mut response = response;
        let first = response.get_mut(property).map(Value::take).filter(|v| !v.is_null())?;

        match &self.second_property {
            Some(second) => {
                let mut first = first;
                first.get_mut(second).map(Value::take).filter(|v| !v.is_null())
            }
            None => Some(first),
        }
    }
}

/// Prerequisite call whose region slot feeds a dependent call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub service: String,
    pub operation: String,
}

impl Dependency {
    pub fn service_key(&self) -> String {
        self.service.to_lowercase()
    }
}

/// Copies `item[source_field]` of each prerequisite record into the
/// dependent request as `request_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub source_field: String,
    pub request_field: String,
}

/// One entry of the call catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDescriptor {
    pub service: String,
    pub operation: String,
    #[serde(flatten)]
    pub extract: ExtractPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_params: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Dependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_filter: Option<ItemFilter>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub drop_region_from_request: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_override: Option<SignatureVersion>,
}

impl CallDescriptor {
    pub fn new(service: &str, operation: &str) -> Self {
        Self {
            service: service.to_string(),
            operation: operation.to_string(),
            extract: ExtractPath::default(),
            static_params: None,
            rate_limit_ms: None,
            is_override: false,
            depends_on: None,
            item_filter: None,
            drop_region_from_request: false,
            signature_override: None,
        }
    }

    pub fn property(mut self, property: &str) -> Self {
        self.extract.property = Some(property.to_string());
        self
    }

    pub fn second_property(mut self, property: &str) -> Self {
        self.extract.second_property = Some(property.to_string());
        self
    }

    /// Fixed request parameters. Non-object values are ignored.
    pub fn params(mut self, params: Value) -> Self {
        if let Value::Object(map) = params {
            self.static_params = Some(map);
        }
        self
    }

    pub fn rate_limit_ms(mut self, ms: u64) -> Self {
        self.rate_limit_ms = Some(ms);
        self
    }

    pub fn overridden(mut self) -> Self {
        self.is_override = true;
        self
    }

    pub fn depends_on(mut self, service: &str, operation: &str) -> Self {
        self.depends_on = Some(Dependency { service: service.to_string(), operation: operation.to_string() });
        self
    }

    pub fn item_filter(mut self, source_field: &str, request_field: &str) -> Self {
        self.item_filter = Some(ItemFilter {
            source_field: source_field.to_string(),
            request_field: request_field.to_string(),
        });
        self
    }

    pub fn drop_region(mut self) -> Self {
        self.drop_region_from_request = true;
        self
    }

    pub fn signature(mut self, signature: SignatureVersion) -> Self {
        self.signature_override = Some(signature);
        self
    }

    /// Lower-cased service name used as the cache namespace.
    pub fn service_key(&self) -> String {
        self.service.to_lowercase()
    }

    pub fn rate_limit(&self) -> Option<Duration> {
        self.rate_limit_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    /// Static parameters merged with the per-item request field.
    pub fn request_params(&self, item: Option<(&str, Value)>) -> Map<String, Value> {
        let mut params = self.static_params.clone().unwrap_or_default();
        if let Some((field, value)) = item {
            params.insert(field.to_string(), value);
        }
        params
    }
}
