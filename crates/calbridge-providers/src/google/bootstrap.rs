//! Lazy, shared loading of the identity client.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::BoxFuture;
use crate::error::{ProviderError, ProviderResult};

use super::config::SessionConfig;
use super::identity::{IdentityClient, IdentityEndpoints};

/// Produces an [`IdentityClient`].
pub trait ClientLoader: Send + Sync {
    /// Loads the client. Called at most once per successful bootstrap.
    fn load(&self) -> BoxFuture<'_, ProviderResult<IdentityClient>>;
}

/// Loads the client from the provider's OpenID discovery document.
#[derive(Debug, Clone)]
pub struct DiscoveryLoader {
    discovery_url: String,
    http_client: reqwest::Client,
}

impl DiscoveryLoader {
    /// Creates a loader for `discovery_url`.
    pub fn new(discovery_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            discovery_url: discovery_url.into(),
            http_client,
        }
    }

    /// Creates a loader from the session configuration.
    pub fn from_config(config: &SessionConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;
        Ok(Self::new(config.discovery_url.clone(), http_client))
    }

    async fn fetch(&self) -> ProviderResult<IdentityClient> {
        debug!("fetching discovery document from {}", self.discovery_url);
        let response = self
            .http_client
            .get(&self.discovery_url)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("discovery request failed: {}", e)).with_source(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::remote(
                status.as_u16(),
                format!("discovery document unavailable ({})", status),
            ));
        }

        let endpoints: IdentityEndpoints = response.json().await.map_err(|e| {
            ProviderError::invalid_response(format!("invalid discovery document: {}", e))
                .with_source(e)
        })?;

        Ok(IdentityClient::new(endpoints, self.http_client.clone()))
    }
}

impl ClientLoader for DiscoveryLoader {
    fn load(&self) -> BoxFuture<'_, ProviderResult<IdentityClient>> {
        Box::pin(self.fetch())
    }
}

/// Loads the identity client once and hands out shared handles.
///
/// Concurrent callers of [`ensure_loaded`](Self::ensure_loaded) wait on the
/// same load. A failed or timed-out load leaves the bootstrap unloaded, so
/// the next call tries again.
pub struct ProviderBootstrap {
    loader: Option<Box<dyn ClientLoader>>,
    load_timeout: Duration,
    client: OnceCell<Arc<IdentityClient>>,
}

impl std::fmt::Debug for ProviderBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBootstrap")
            .field("load_timeout", &self.load_timeout)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl ProviderBootstrap {
    /// Creates a bootstrap that loads through `loader`.
    pub fn new(loader: impl ClientLoader + 'static, load_timeout: Duration) -> Self {
        Self {
            loader: Some(Box::new(loader)),
            load_timeout,
            client: OnceCell::new(),
        }
    }

    /// Creates a bootstrap around a client that is already available.
    pub fn ready(client: IdentityClient) -> Self {
        Self {
            loader: None,
            load_timeout: Duration::ZERO,
            client: OnceCell::new_with(Some(Arc::new(client))),
        }
    }

    /// True once a client has been loaded.
    pub fn is_ready(&self) -> bool {
        self.client.initialized()
    }

    /// Returns the client, loading it first if needed.
    pub async fn ensure_loaded(&self) -> ProviderResult<Arc<IdentityClient>> {
        let client = self
            .client
            .get_or_try_init(|| self.load())
            .await?;
        Ok(Arc::clone(client))
    }

    async fn load(&self) -> ProviderResult<Arc<IdentityClient>> {
        let Some(loader) = self.loader.as_ref() else {
            return Err(ProviderError::load("no identity client loader configured"));
        };

        debug!("loading identity client");
        match tokio::time::timeout(self.load_timeout, loader.load()).await {
            Ok(Ok(client)) => {
                info!("identity client ready");
                Ok(Arc::new(client))
            }
            Ok(Err(e)) => Err(ProviderError::load(format!(
                "failed to load identity client: {}",
                e.message()
            ))
            .with_source(e)),
            Err(_) => Err(ProviderError::load(format!(
                "identity client did not load within {}s",
                self.load_timeout.as_secs_f32()
            ))),
        }
    }
}
