//! Configuration types for the Cloud Foundry client.

use crate::errors::{CloudFoundryError, ConfigurationError};
use std::time::Duration;
use url::Url;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = "integrations-cloudfoundry/0.1.0";

/// Tokens are treated as expired this long before their expiry hint.
pub const DEFAULT_TOKEN_REFRESH_BUFFER: Duration = Duration::from_secs(60);

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum idle connections per host.
    pub max_idle_per_host: usize,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 20,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Cloud Foundry client configuration.
#[derive(Debug, Clone)]
pub struct CloudFoundryConfig {
    /// Cloud Controller API root, e.g. `https://api.example.org`.
    pub api_url: Url,
    /// Request timeout applied by the default transport.
    pub timeout: Duration,
    /// Connect timeout applied by the default transport.
    pub connect_timeout: Duration,
    /// User-Agent header.
    pub user_agent: String,
    /// How long before a token's expiry hint it is considered stale.
    pub token_refresh_buffer: Duration,
    /// Accept invalid TLS certificates (development foundations only).
    pub skip_ssl_validation: bool,
    /// Connection pool configuration.
    pub pool: PoolConfig,
}

impl CloudFoundryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CloudFoundryConfigBuilder {
        CloudFoundryConfigBuilder::new()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), CloudFoundryError> {
        match self.api_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigurationError::InvalidApiUrl(format!(
                    "unsupported scheme '{}'",
                    other
                ))
                .into())
            }
        }

        if self.api_url.cannot_be_a_base() {
            return Err(ConfigurationError::InvalidApiUrl(self.api_url.to_string()).into());
        }

        if self.user_agent.is_empty() {
            return Err(CloudFoundryError::configuration("User-Agent cannot be empty"));
        }

        if self.timeout.is_zero() {
            return Err(CloudFoundryError::configuration("timeout must be greater than zero"));
        }

        Ok(())
    }
}

/// Builder for CloudFoundryConfig.
#[derive(Debug, Default)]
pub struct CloudFoundryConfigBuilder {
    api_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    token_refresh_buffer: Option<Duration>,
    skip_ssl_validation: bool,
    pool: Option<PoolConfig>,
}

impl CloudFoundryConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API root URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the token refresh buffer.
    pub fn token_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.token_refresh_buffer = Some(buffer);
        self
    }

    /// Accepts invalid TLS certificates.
    pub fn skip_ssl_validation(mut self, skip: bool) -> Self {
        self.skip_ssl_validation = skip;
        self
    }

    /// Sets the connection pool configuration.
    pub fn pool(mut self, config: PoolConfig) -> Self {
        self.pool = Some(config);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<CloudFoundryConfig, CloudFoundryError> {
        let raw = self.api_url.ok_or_else(|| {
            ConfigurationError::InvalidApiUrl("API URL is required".to_string())
        })?;

        let api_url = Url::parse(&raw)
            .map_err(|e| ConfigurationError::InvalidApiUrl(format!("{}: {}", raw, e)))?;

        let config = CloudFoundryConfig {
            api_url,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            user_agent: self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            token_refresh_buffer: self
                .token_refresh_buffer
                .unwrap_or(DEFAULT_TOKEN_REFRESH_BUFFER),
            skip_ssl_validation: self.skip_ssl_validation,
            pool: self.pool.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
