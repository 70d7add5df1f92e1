//! Authentication for the Cloud Foundry API.
//!
//! Every request carries a bearer token. Tokens come from a
//! [`CredentialSource`] and are held by the process-wide [`TokenCache`], which
//! coalesces concurrent refreshes into a single fetch.
//!
//! # Examples
//!
//! ```no_run
//! use integrations_cloudfoundry::auth::{TokenCache, UaaTokenSource};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = UaaTokenSource::password(
//!     "https://uaa.example.org",
//!     "admin",
//!     "secret",
//! )?;
//!
//! let cache = TokenCache::new(Arc::new(source));
//! let token = cache.acquire().await?;
//! println!("Authorization: {}", token.authorization_header());
//! # Ok(())
//! # }
//! ```

mod cache;
mod uaa;

pub use cache::TokenCache;
pub use uaa::{UaaGrant, UaaTokenSource};

use crate::errors::AuthenticationError;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Supplies bearer tokens.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Mints a token. Every call is a real fetch; caching is the
    /// [`TokenCache`]'s job.
    async fn fetch_token(&self) -> Result<BearerToken, AuthenticationError>;
}

/// An opaque bearer credential with an optional expiry hint.
#[derive(Debug, Clone)]
pub struct BearerToken {
    value: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl BearerToken {
    /// Creates a token.
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: SecretString::new(value.into()),
            expires_at,
        }
    }

    /// Creates a token, reading the expiry hint from the `exp` claim when the
    /// value is a JWT.
    pub fn from_jwt(value: impl Into<String>) -> Self {
        let value = value.into();
        let expires_at = jwt_expiry(&value);
        Self::new(value, expires_at)
    }

    /// Gets the expiry hint.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the expiry hint has passed. Tokens without a hint never
    /// expire on their own; only a rejection replaces them.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |at| Utc::now() >= at)
    }

    /// Returns true if the token expires within `buffer`.
    pub fn needs_refresh(&self, buffer: Duration) -> bool {
        self.expires_at.map_or(false, |at| Utc::now() + buffer >= at)
    }

    /// Returns the `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("bearer {}", self.value.expose_secret())
    }

    pub(crate) fn same_value(&self, other: &BearerToken) -> bool {
        self.value.expose_secret() == other.value.expose_secret()
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claim.exp?, 0)
}

/// A fixed token, e.g. one handed over by the `cf` CLI.
pub struct StaticTokenSource {
    token: BearerToken,
}

impl StaticTokenSource {
    /// Creates a source that always returns `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: BearerToken::from_jwt(token),
        }
    }

    /// Reads the token from an environment variable.
    pub fn from_env(var_name: &str) -> Result<Self, AuthenticationError> {
        let value = std::env::var(var_name).map_err(|_| {
            AuthenticationError::MissingCredentials(format!(
                "Environment variable {} not set",
                var_name
            ))
        })?;

        // Values copied from `cf oauth-token` carry a scheme prefix.
        let value = value
            .strip_prefix("bearer ")
            .or_else(|| value.strip_prefix("Bearer "))
            .unwrap_or(&value)
            .to_string();

        Ok(Self::new(value))
    }
}

#[async_trait]
impl CredentialSource for StaticTokenSource {
    async fn fetch_token(&self) -> Result<BearerToken, AuthenticationError> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"user_name":"admin"}}"#, exp));
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_token_without_hint_never_expires() {
        let token = BearerToken::new("opaque", None);
        assert!(!token.is_expired());
        assert!(!token.needs_refresh(Duration::hours(24)));
    }

    #[test]
    fn test_token_expiry() {
        let token = BearerToken::new("t", Some(Utc::now() + Duration::hours(1)));
        assert!(!token.is_expired());
        assert!(!token.needs_refresh(Duration::minutes(5)));
        assert!(token.needs_refresh(Duration::hours(2)));

        let expired = BearerToken::new("t", Some(Utc::now() - Duration::seconds(1)));
        assert!(expired.is_expired());
    }

    #[test]
    fn test_authorization_header() {
        let token = BearerToken::new("test_token", None);
        assert_eq!(token.authorization_header(), "bearer test_token");
    }

    #[test]
    fn test_jwt_expiry_hint() {
        let token = BearerToken::from_jwt(jwt_with_exp(1_900_000_000));
        assert_eq!(token.expires_at().unwrap().timestamp(), 1_900_000_000);

        let opaque = BearerToken::from_jwt("not-a-jwt");
        assert!(opaque.expires_at().is_none());
    }

    #[test]
    fn test_debug_does_not_leak_value() {
        let token = BearerToken::new("super-secret", None);
        assert!(!format!("{:?}", token).contains("super-secret"));
    }

    #[tokio::test]
    async fn test_static_source_from_env() {
        std::env::set_var("CF_TEST_STATIC_TOKEN", "bearer abc.def");
        let source = StaticTokenSource::from_env("CF_TEST_STATIC_TOKEN").unwrap();
        let token = source.fetch_token().await.unwrap();
        assert_eq!(token.authorization_header(), "bearer abc.def");

        assert!(StaticTokenSource::from_env("CF_TEST_UNSET_TOKEN_VAR").is_err());
    }
}
