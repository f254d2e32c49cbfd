use async_trait::async_trait;
use log::{debug, warn};
use rusoto_core::{HttpClient, Region};
use rusoto_credential::{
    AwsCredentials, ChainProvider, CredentialsError, ProfileProvider, ProvideAwsCredentials, StaticProvider,
};

use super::{ProviderError, TransportConfig};

/// Where request credentials come from, in order of preference:
/// static keys from the config file, a named profile, then the default chain.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    Static(StaticProvider),
    Profile(ProfileProvider),
    Chain(ChainProvider),
}

impl CredentialSource {
    pub fn from_config(config: &TransportConfig) -> Self {
        if let Some(keys) = &config.credentials {
            debug!("Using static credentials from configuration");
            return CredentialSource::Static(StaticProvider::new(
                keys.access_key_id.clone(),
                keys.secret_access_key.clone(),
                keys.session_token.clone(),
                None,
            ));
        }

        if let Some(profile_name) = &config.profile {
            match ProfileProvider::new() {
                Ok(mut provider) => {
                    provider.set_profile(profile_name.as_str());
                    debug!("Using AWS profile '{}'", profile_name);
                    return CredentialSource::Profile(provider);
                }
                Err(e) => warn!("Failed to create AWS profile provider: {}, using default chain", e),
            }
        }

        CredentialSource::Chain(ChainProvider::new())
    }
}

#[async_trait]
impl ProvideAwsCredentials for CredentialSource {
    async fn credentials(&self) -> Result<AwsCredentials, CredentialsError> {
        match self {
            CredentialSource::Static(provider) => provider.credentials().await,
            CredentialSource::Profile(provider) => provider.credentials().await,
            CredentialSource::Chain(provider) => provider.credentials().await,
        }
    }
}

/// Parse a region id, falling back to the default region for unknown names.
pub fn parse_region(name: &str) -> Region {
    match name.parse::<Region>() {
        Ok(region) => region,
        Err(_) => {
            warn!("Invalid region '{}', using default", name);
            Region::default()
        }
    }
}

pub fn create_http_client() -> Result<HttpClient, ProviderError> {
    HttpClient::new().map_err(|e| ProviderError::Transport(format!("Failed to create HTTP client: {}", e)))
}
