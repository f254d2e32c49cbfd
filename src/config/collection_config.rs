use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::regions::RegionCatalog;
use crate::constants::{
    CONFIG_VERSION, DEFAULT_ITEM_CONCURRENCY, DEFAULT_OPERATION_CONCURRENCY, DEFAULT_REGION,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SERVICE_CONCURRENCY, MAX_REGIONS_AT_A_TIME,
};
use crate::transport::{StaticCredentials, TransportConfig};

/// In-flight ceilings for each fan-out level of the engine.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimits {
    pub services: usize,
    pub operations: usize,
    pub regions: usize,
    pub items: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            services: DEFAULT_SERVICE_CONCURRENCY,
            operations: DEFAULT_OPERATION_CONCURRENCY,
            regions: MAX_REGIONS_AT_A_TIME,
            items: DEFAULT_ITEM_CONCURRENCY,
        }
    }
}

impl ConcurrencyLimits {
    /// Every ceiling must admit at least one task, otherwise a phase never finishes.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.services > 0, "limits.services must be at least 1");
        ensure!(self.operations > 0, "limits.operations must be at least 1");
        ensure!(self.regions > 0, "limits.regions must be at least 1");
        ensure!(self.items > 0, "limits.items must be at least 1");
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CollectorConfig {
    pub version: String,
    pub description: String,
    /// Base region, used for calls issued without a regional overlay.
    pub region: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub credentials: Option<StaticCredentials>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub limits: ConcurrencyLimits,
    /// Per-service replacements of the built-in region lists.
    #[serde(default)]
    pub regions: BTreeMap<String, Vec<String>>,
    /// Optional call catalog file; the built-in catalog is used otherwise.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            description: "Default cloud audit collection".to_string(),
            region: DEFAULT_REGION.to_string(),
            profile: None,
            credentials: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            limits: ConcurrencyLimits::default(),
            regions: BTreeMap::new(),
            catalog: None,
        }
    }
}

impl CollectorConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: CollectorConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML config")?;
        config.limits.validate().context(format!("Invalid limits in {}", path.display()))?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Create a default configuration YAML file
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        CollectorConfig::default().save_to_yaml_file(path)
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            region: self.region.clone(),
            profile: self.profile.clone(),
            credentials: self.credentials.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn region_catalog(&self) -> RegionCatalog {
        RegionCatalog::default().with_overrides(&self.regions)
    }
}

/// Load configuration from a file or create a default one
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<CollectorConfig> {
    match config_path {
        Some(path) => {
            if path.exists() {
                CollectorConfig::from_yaml_file(path)
            } else {
                info!("Creating default config at {}", path.display());
                let default_config = CollectorConfig::default();
                default_config.save_to_yaml_file(path)?;
                Ok(default_config)
            }
        }
        None => {
            info!("No config path provided, using default configuration");
            Ok(CollectorConfig::default())
        }
    }
}
