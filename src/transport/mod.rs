//! Remote call plumbing.
//!
//! The engine never talks to a provider directly. Every call goes through a
//! [`Transport`] together with a [`RequestContext`]: the immutable, shared
//! [`TransportConfig`] (credentials, base region, timeout) plus a small
//! per-call [`CallOverlay`] carrying the region and signature quirks.

pub mod aws;
mod client;
mod endpoints;
mod s3;
pub mod xml;

pub use aws::AwsTransport;
pub use endpoints::{Endpoint, Protocol};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::constants::{DEFAULT_REGION, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Request-signing variant. `V4` unless a catalog entry says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureVersion {
    V2,
    #[default]
    V4,
}

impl fmt::Display for SignatureVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureVersion::V2 => write!(f, "v2"),
            SignatureVersion::V4 => write!(f, "v4"),
        }
    }
}

/// Long-lived access keys supplied through the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

/// Provider settings shared by every call of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub region: String,
    pub profile: Option<String>,
    pub credentials: Option<StaticCredentials>,
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            profile: None,
            credentials: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Per-call adjustments layered over the shared [`TransportConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOverlay {
    pub region: Option<String>,
    pub signature: Option<SignatureVersion>,
}

/// Everything a transport needs to issue one call.
///
/// Cheap to clone: the config is behind an `Arc` and the overlay is tiny.
#[derive(Debug, Clone)]
pub struct RequestContext {
    config: Arc<TransportConfig>,
    overlay: CallOverlay,
}

impl RequestContext {
    pub fn new(config: Arc<TransportConfig>) -> Self {
        Self { config, overlay: CallOverlay::default() }
    }

    /// Same context, scoped to `region`.
    pub fn for_region(&self, region: &str) -> Self {
        Self {
            config: Arc::clone(&self.config),
            overlay: CallOverlay { region: Some(region.to_string()), ..self.overlay.clone() },
        }
    }

    /// Same context with the regional overlay removed; calls fall back to
    /// the base region of the config.
    pub fn without_region(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            overlay: CallOverlay { region: None, ..self.overlay.clone() },
        }
    }

    pub fn with_signature(&self, signature: Option<SignatureVersion>) -> Self {
        match signature {
            Some(signature) => Self {
                config: Arc::clone(&self.config),
                overlay: CallOverlay { signature: Some(signature), ..self.overlay.clone() },
            },
            None => self.clone(),
        }
    }

    /// Region the call is sent to.
    pub fn region(&self) -> &str {
        self.overlay.region.as_deref().unwrap_or(&self.config.region)
    }

    pub fn signature(&self) -> SignatureVersion {
        self.overlay.signature.unwrap_or_default()
    }

    pub fn overlay(&self) -> &CallOverlay {
        &self.overlay
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

/// One remote operation with its already-merged parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub service: String,
    pub operation: String,
    pub params: Map<String, Value>,
}

impl ApiRequest {
    pub fn new(service: &str, operation: &str) -> Self {
        Self { service: service.to_string(), operation: operation.to_string(), params: Map::new() }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_param(mut self, name: &str, value: Value) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.operation)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{code}: {message}")]
    Service { code: String, message: String, status: u16 },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Unable to load credentials: {0}")]
    Credentials(String),

    #[error("Unsupported request: {0}")]
    Unsupported(String),
}

/// Issues a single remote call and returns the raw response as JSON.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(&self, ctx: &RequestContext, request: &ApiRequest) -> Result<Value, ProviderError>;
}
