//! Token source backed by a UAA `/oauth/token` endpoint.

use super::{BearerToken, CredentialSource};
use crate::config::CloudFoundryConfig;
use crate::errors::AuthenticationError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// Client id used by the `cf` CLI. UAA accepts it with an empty secret.
pub const DEFAULT_CLIENT_ID: &str = "cf";

const TOKEN_PATH: &str = "oauth/token";

/// The grant a [`UaaTokenSource`] uses to obtain its first token.
pub enum UaaGrant {
    /// Resource owner password grant.
    Password {
        /// User name.
        username: String,
        /// Password.
        password: SecretString,
    },
    /// Client credentials grant.
    ClientCredentials,
    /// Refresh token grant with a token obtained elsewhere.
    RefreshToken(SecretString),
}

impl UaaGrant {
    fn name(&self) -> &'static str {
        match self {
            UaaGrant::Password { .. } => "password",
            UaaGrant::ClientCredentials => "client_credentials",
            UaaGrant::RefreshToken(_) => "refresh_token",
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

/// Obtains tokens from UAA.
///
/// When UAA hands out a refresh token it is remembered and preferred for the
/// next fetch. If UAA rejects it, the source falls back to its configured
/// grant once.
pub struct UaaTokenSource {
    token_url: Url,
    client_id: String,
    client_secret: SecretString,
    grant: UaaGrant,
    refresh_token: RwLock<Option<SecretString>>,
    http_client: Client,
}

impl UaaTokenSource {
    /// Creates a source for the given UAA root and grant.
    pub fn new(uaa_url: &str, grant: UaaGrant) -> Result<Self, AuthenticationError> {
        let base = Url::parse(uaa_url).map_err(|e| {
            AuthenticationError::MissingCredentials(format!("Invalid UAA URL {}: {}", uaa_url, e))
        })?;
        let token_url = Url::parse(&format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            TOKEN_PATH
        ))
        .map_err(|e| AuthenticationError::MissingCredentials(e.to_string()))?;

        Ok(Self {
            token_url,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: SecretString::new(String::new()),
            grant,
            refresh_token: RwLock::new(None),
            http_client: Client::new(),
        })
    }

    /// Creates a source using the password grant.
    pub fn password(
        uaa_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, AuthenticationError> {
        Self::new(
            uaa_url,
            UaaGrant::Password {
                username: username.into(),
                password: SecretString::new(password.into()),
            },
        )
    }

    /// Creates a source using the client credentials grant.
    pub fn client_credentials(
        uaa_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, AuthenticationError> {
        Ok(Self::new(uaa_url, UaaGrant::ClientCredentials)?.with_client(client_id, client_secret))
    }

    /// Creates a source using an existing refresh token.
    pub fn refresh_token(
        uaa_url: &str,
        refresh_token: impl Into<String>,
    ) -> Result<Self, AuthenticationError> {
        Self::new(
            uaa_url,
            UaaGrant::RefreshToken(SecretString::new(refresh_token.into())),
        )
    }

    /// Sets the OAuth client used to authenticate against UAA.
    pub fn with_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = SecretString::new(client_secret.into());
        self
    }

    /// Sets the HTTP client used for token requests.
    ///
    /// The default client has no timeouts and verifies certificates. Use
    /// [`UaaTokenSource::with_config`] to apply the API client's settings.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Builds the token HTTP client from the timeouts, user agent and
    /// certificate validation of `config`.
    ///
    /// With `skip_ssl_validation` set, UAA certificates are not verified
    /// either.
    pub fn with_config(self, config: &CloudFoundryConfig) -> Result<Self, AuthenticationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.skip_ssl_validation)
            .build()
            .map_err(|e| {
                AuthenticationError::TokenFetchFailed(format!("Failed to create client: {}", e))
            })?;
        Ok(self.with_http_client(client))
    }

    /// Gets the token endpoint.
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    async fn request_token(
        &self,
        grant: &UaaGrant,
    ) -> Result<BearerToken, AuthenticationError> {
        let mut form: Vec<(&str, &str)> = vec![("grant_type", grant.name())];
        match grant {
            UaaGrant::Password { username, password } => {
                form.push(("username", username.as_str()));
                form.push(("password", password.expose_secret().as_str()));
            }
            UaaGrant::ClientCredentials => {}
            UaaGrant::RefreshToken(token) => {
                form.push(("refresh_token", token.expose_secret().as_str()))
            }
        }

        debug!(url = %self.token_url, grant_type = grant.name(), "Requesting UAA token");

        let response = self
            .http_client
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                AuthenticationError::TokenFetchFailed(format!("HTTP request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                    AuthenticationError::InvalidGrant(format!(
                        "{} grant rejected with status {}: {}",
                        grant.name(),
                        status,
                        text
                    ))
                }
                _ => AuthenticationError::TokenFetchFailed(format!(
                    "Token request failed with status {}: {}",
                    status, text
                )),
            });
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AuthenticationError::TokenFetchFailed(format!("Failed to parse response: {}", e))
        })?;

        if let Some(refresh) = token_response.refresh_token {
            *self.refresh_token.write().await = Some(SecretString::new(refresh));
        }

        let expires_at = token_response
            .expires_in
            .map(|seconds| Utc::now() + Duration::seconds(seconds));

        Ok(BearerToken::new(token_response.access_token, expires_at))
    }
}

#[async_trait]
impl CredentialSource for UaaTokenSource {
    async fn fetch_token(&self) -> Result<BearerToken, AuthenticationError> {
        let remembered = self.refresh_token.read().await.clone();

        if let Some(refresh) = remembered {
            match self.request_token(&UaaGrant::RefreshToken(refresh)).await {
                Ok(token) => return Ok(token),
                Err(AuthenticationError::InvalidGrant(reason)) => {
                    debug!(reason = %reason, "Remembered refresh token rejected");
                    *self.refresh_token.write().await = None;
                }
                Err(e) => return Err(e),
            }
        }

        self.request_token(&self.grant).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_url() {
        let source = UaaTokenSource::password("https://uaa.example.org/", "admin", "pw").unwrap();
        assert_eq!(source.token_url().as_str(), "https://uaa.example.org/oauth/token");
    }

    #[test]
    fn test_with_config_keeps_token_url() {
        let config = CloudFoundryConfig::builder()
            .api_url("https://api.example.org")
            .skip_ssl_validation(true)
            .build()
            .unwrap();
        let source = UaaTokenSource::password("https://uaa.example.org", "admin", "pw")
            .unwrap()
            .with_config(&config)
            .unwrap();
        assert_eq!(source.token_url().as_str(), "https://uaa.example.org/oauth/token");
    }

    #[test]
    fn test_invalid_uaa_url() {
        assert!(matches!(
            UaaTokenSource::refresh_token("not a url", "t"),
            Err(AuthenticationError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_grant_names() {
        assert_eq!(UaaGrant::ClientCredentials.name(), "client_credentials");
        assert_eq!(
            UaaGrant::RefreshToken(SecretString::new("t".to_string())).name(),
            "refresh_token"
        );
    }
}
