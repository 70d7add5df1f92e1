//! Error types for the Cloud Foundry client.
//!
//! Every failure a caller can observe falls into one of a small number of
//! categories, each with its own variant on [`CloudFoundryError`]:
//!
//! - [`TemplateError`]: the operation could not be rendered (missing path parameter).
//! - [`RequestError`]: a typed request failed validation or could not be serialized.
//! - [`AuthenticationError`]: a token could not be obtained, or the API rejected it twice.
//! - [`TransportError`]: the network exchange itself failed.
//! - [`ApiError`]: the API answered with a non-success status.
//! - [`DecodingError`]: the API answered with success but the body broke the contract.
//! - [`ConfigurationError`]: the client was configured incorrectly.

use std::fmt;
use thiserror::Error;

/// Result type alias for Cloud Foundry operations.
pub type CloudFoundryResult<T> = Result<T, CloudFoundryError>;

/// Top-level error type for the Cloud Foundry client.
#[derive(Debug, Error)]
pub enum CloudFoundryError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The operation descriptor could not be rendered.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// The request was rejected before being sent.
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// Authentication error.
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// Network-level failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The API rejected the operation.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A success response did not match the expected shape.
    #[error("Decoding error: {0}")]
    Decoding(#[from] DecodingError),
}

impl CloudFoundryError {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        CloudFoundryError::Configuration(ConfigurationError::InvalidConfiguration(msg.into()))
    }

    /// Creates a request validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        CloudFoundryError::Request(RequestError::Validation(msg.into()))
    }

    /// Creates a decoding error.
    pub fn decoding(msg: impl Into<String>) -> Self {
        CloudFoundryError::Decoding(DecodingError::InvalidBody(msg.into()))
    }

    /// Returns the HTTP status code if the error came from an API response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CloudFoundryError::Api(e) => Some(e.status),
            CloudFoundryError::Authentication(AuthenticationError::Rejected { status, .. }) => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Returns the API error, if this is one.
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            CloudFoundryError::Api(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if the API reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Returns true if the error is caused by the caller's own input.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            CloudFoundryError::Template(_)
                | CloudFoundryError::Request(_)
                | CloudFoundryError::Configuration(_)
        )
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Missing credentials.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Invalid API URL.
    #[error("Invalid API URL: {0}")]
    InvalidApiUrl(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors rendering an operation descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A placeholder in the path template has no value.
    #[error("missing value for path parameter '{name}' in '{template}'")]
    MissingParameter {
        /// Placeholder name.
        name: String,
        /// The template being rendered.
        template: String,
    },

    /// The path template is malformed.
    #[error("malformed path template '{template}': {reason}")]
    Malformed {
        /// The template being rendered.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The rendered URL is not valid.
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}

/// Request errors raised before anything is sent.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request body could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Authentication errors.
///
/// This type is `Clone` so that the outcome of one shared token refresh can be
/// handed to every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum AuthenticationError {
    /// The credential source could not produce a token.
    #[error("Token fetch failed: {0}")]
    TokenFetchFailed(String),

    /// The token endpoint rejected the grant.
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    /// The API rejected the bearer token even after a refresh.
    #[error("Authentication rejected (HTTP {status}) for {method} {url}")]
    Rejected {
        /// HTTP status of the final rejection.
        status: u16,
        /// Request method.
        method: String,
        /// Request URL.
        url: String,
    },

    /// No credentials are available.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Timeout.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Any other HTTP-level failure.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::ConnectionFailed(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Decoding errors for success responses that break the wire contract.
#[derive(Debug, Error)]
pub enum DecodingError {
    /// The body did not parse against the expected shape.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    /// A body was expected but the response had none.
    #[error("Response for {0} had no body")]
    MissingBody(String),

    /// A 202 response did not carry a usable `Location` header.
    #[error("Invalid or missing Location header: {0}")]
    InvalidLocation(String),

    /// The response did not have the expected form (e.g. a job was expected).
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// The request an error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// HTTP method.
    pub method: String,
    /// Full request URL.
    pub url: String,
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A non-success response from the Cloud Foundry API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Numeric Cloud Controller error code (e.g. `10010`), if provided.
    pub code: Option<i64>,
    /// Error title (e.g. `CF-ResourceNotFound`), if provided.
    pub title: Option<String>,
    /// Human readable description.
    pub description: String,
    /// Additional errors reported in the same envelope.
    pub additional: Vec<ApiErrorDetail>,
    /// The request that failed.
    pub request: RequestContext,
}

/// One entry of a v3 error envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorDetail {
    /// Numeric error code.
    pub code: Option<i64>,
    /// Error title.
    pub title: Option<String>,
    /// Human readable detail.
    pub detail: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref title) = self.title {
            write!(f, " {}", title)?;
        }
        if let Some(code) = self.code {
            write!(f, " ({})", code)?;
        }
        write!(f, ": {} [{}]", self.description, self.request)
    }
}

impl ApiError {
    /// Gets the numeric error code.
    pub fn code(&self) -> Option<i64> {
        self.code
    }

    /// Gets the error title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Gets the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true for 5xx responses.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}
