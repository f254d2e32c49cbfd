// Configuration: YAML settings file plus the region catalog
mod collection_config;
mod regions;

pub use collection_config::{
    CollectorConfig,
    ConcurrencyLimits,
    load_or_create_config,
};

pub use regions::RegionCatalog;
