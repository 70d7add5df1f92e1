//! # Cloud Foundry Integration Library
//!
//! A Cloud Foundry v3 API client with:
//! - Bearer token caching with single-flight refresh
//! - One refresh-and-replay when the API rejects a token
//! - Uniform error decoding across v2, v3, and UAA error bodies
//! - Lazy pagination over list endpoints
//! - Job handles for asynchronous operations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use integrations_cloudfoundry::services::ListApplicationsRequest;
//! use integrations_cloudfoundry::{CloudFoundryClient, UaaTokenSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CloudFoundryClient::builder()
//!         .api_url("https://api.example.org")
//!         .credentials(UaaTokenSource::password(
//!             "https://uaa.example.org",
//!             "admin",
//!             "secret",
//!         )?)
//!         .build()?;
//!
//!     let mut apps = client
//!         .applications()
//!         .list(&ListApplicationsRequest::new().per_page(50))?;
//!     while let Some(app) = apps.next().await {
//!         let app = app?;
//!         println!("{} {:?}", app.name, app.state);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// Authentication
pub mod auth;

// HTTP client and transport
pub mod client;
pub mod request;
pub mod response;
pub mod transport;

// Pagination and jobs
pub mod jobs;
pub mod pagination;

// API Services
pub mod services;

// Observability
pub mod observability;

// Mocks for testing
pub mod mocks;

// Re-exports for convenience
pub use auth::{BearerToken, CredentialSource, StaticTokenSource, TokenCache, UaaGrant, UaaTokenSource};
pub use client::{CloudFoundryClient, CloudFoundryClientBuilder, RequestExecutor};
pub use config::{CloudFoundryConfig, CloudFoundryConfigBuilder};
pub use errors::{ApiError, CloudFoundryError, CloudFoundryResult};
pub use jobs::{Completion, JobHandle, JobState, JobStatus};
pub use pagination::{PageEnvelope, Paginator};
pub use request::OperationDescriptor;
pub use response::MappedResponse;
pub use types::*;
