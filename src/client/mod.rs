//! Cloud Foundry API client implementation.

mod executor;

pub use executor::RequestExecutor;

use crate::auth::{CredentialSource, StaticTokenSource, TokenCache};
use crate::config::{CloudFoundryConfig, CloudFoundryConfigBuilder};
use crate::errors::{CloudFoundryResult, ConfigurationError};
use crate::jobs::JobsService;
use crate::observability::MetricsSnapshot;
use crate::services::ApplicationsService;
use crate::transport::{HttpTransport, ReqwestTransport};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Cloud Foundry API client.
///
/// Cheap to clone; clones share the token cache, transport, and metrics.
#[derive(Clone)]
pub struct CloudFoundryClient {
    executor: Arc<RequestExecutor>,
}

impl CloudFoundryClient {
    /// Creates a client using the default reqwest transport.
    pub fn new(
        config: CloudFoundryConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> CloudFoundryResult<Self> {
        config.validate()?;
        let transport = ReqwestTransport::from_config(&config)?;
        Self::with_transport(config, credentials, Arc::new(transport))
    }

    /// Creates a client using a custom transport.
    pub fn with_transport(
        config: CloudFoundryConfig,
        credentials: Arc<dyn CredentialSource>,
        transport: Arc<dyn HttpTransport>,
    ) -> CloudFoundryResult<Self> {
        config.validate()?;

        let tokens = Arc::new(TokenCache::with_refresh_buffer(
            credentials,
            config.token_refresh_buffer,
        ));

        Ok(Self {
            executor: Arc::new(RequestExecutor::new(config, transport, tokens)),
        })
    }

    /// Creates a new client builder.
    pub fn builder() -> CloudFoundryClientBuilder {
        CloudFoundryClientBuilder::new()
    }

    /// Gets the API root URL.
    pub fn api_url(&self) -> &Url {
        self.executor.api_url()
    }

    /// Gets the request executor, for operations without a typed facade.
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    /// Gets the token cache.
    pub fn token_cache(&self) -> &TokenCache {
        self.executor.tokens()
    }

    /// Returns a snapshot of the request metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.executor.metrics().snapshot()
    }

    // Service accessors

    /// Gets the applications service.
    pub fn applications(&self) -> ApplicationsService {
        ApplicationsService::new(self.executor.clone())
    }

    /// Gets the jobs service.
    pub fn jobs(&self) -> JobsService {
        JobsService::new(self.executor.clone())
    }
}

impl std::fmt::Debug for CloudFoundryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudFoundryClient")
            .field("api_url", &self.api_url().as_str())
            .finish()
    }
}

/// Builder for CloudFoundryClient.
pub struct CloudFoundryClientBuilder {
    config_builder: CloudFoundryConfigBuilder,
    credentials: Option<Arc<dyn CredentialSource>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl CloudFoundryClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            config_builder: CloudFoundryConfig::builder(),
            credentials: None,
            transport: None,
        }
    }

    /// Sets the API root URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.api_url(url);
        self
    }

    /// Sets the credential source.
    pub fn credentials(mut self, source: impl CredentialSource + 'static) -> Self {
        self.credentials = Some(Arc::new(source));
        self
    }

    /// Sets a shared credential source.
    pub fn credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(source);
        self
    }

    /// Uses a fixed bearer token.
    pub fn token(self, token: impl Into<String>) -> Self {
        self.credentials(StaticTokenSource::new(token))
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the User-Agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.user_agent(ua);
        self
    }

    /// Sets how long before expiry a token is refreshed.
    pub fn token_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.config_builder = self.config_builder.token_refresh_buffer(buffer);
        self
    }

    /// Accepts invalid TLS certificates.
    pub fn skip_ssl_validation(mut self, skip: bool) -> Self {
        self.config_builder = self.config_builder.skip_ssl_validation(skip);
        self
    }

    /// Builds the client.
    pub fn build(self) -> CloudFoundryResult<CloudFoundryClient> {
        let config = self.config_builder.build()?;
        let credentials = self.credentials.ok_or_else(|| {
            ConfigurationError::MissingCredentials("a credential source is required".to_string())
        })?;

        match self.transport {
            Some(transport) => CloudFoundryClient::with_transport(config, credentials, transport),
            None => CloudFoundryClient::new(config, credentials),
        }
    }
}

impl Default for CloudFoundryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
