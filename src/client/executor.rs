//! Request executor with authentication, replay-on-rejection, and response mapping.

use crate::auth::{BearerToken, TokenCache};
use crate::config::CloudFoundryConfig;
use crate::errors::{AuthenticationError, CloudFoundryError, CloudFoundryResult};
use crate::jobs::Completion;
use crate::observability::{Metrics, RequestTimer, TracingHooks};
use crate::pagination::{PageEnvelope, Paginator};
use crate::request::resolve_link;
use crate::response::{map_completion, map_response, request_context, MappedResponse};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

/// Issues authenticated exchanges against the API.
///
/// Every request carries the cached bearer token. When the API answers 401,
/// the token is refreshed once and the exchange replayed once; a second 401
/// is final. Nothing else is retried.
pub struct RequestExecutor {
    /// Configuration
    config: CloudFoundryConfig,
    /// HTTP transport
    transport: Arc<dyn HttpTransport>,
    /// Token cache shared by every request of this client
    tokens: Arc<TokenCache>,
    /// Request metrics
    metrics: Arc<Metrics>,
}

impl RequestExecutor {
    /// Creates a new request executor.
    pub fn new(
        config: CloudFoundryConfig,
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenCache>,
    ) -> Self {
        Self {
            config,
            transport,
            tokens,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Gets the API root URL.
    pub fn api_url(&self) -> &Url {
        &self.config.api_url
    }

    /// Gets the configuration.
    pub fn config(&self) -> &CloudFoundryConfig {
        &self.config
    }

    /// Gets the token cache.
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Gets the metrics collector.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Sends `request` with the current bearer token, refreshing and
    /// replaying once if the API rejects it.
    ///
    /// Non-401 statuses are returned unchanged for the caller to map.
    pub async fn invoke(&self, request: HttpRequest) -> CloudFoundryResult<HttpResponse> {
        let token = self.tokens.acquire().await?;
        let response = self.send_with(&request, &token).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let method = request.method.to_string();
        let url = request.url.to_string();
        TracingHooks::on_auth_rejected(&method, &url, true);
        self.metrics.record_replay();

        let fresh = self.tokens.refresh_stale(&token).await?;
        let response = self.send_with(&request, &fresh).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            TracingHooks::on_auth_rejected(&method, &url, false);
            return Err(AuthenticationError::Rejected {
                status: response.status.as_u16(),
                method,
                url,
            }
            .into());
        }

        Ok(response)
    }

    /// Sends `request` and decodes the resource in the response.
    pub async fn execute<T: DeserializeOwned>(&self, request: HttpRequest) -> CloudFoundryResult<T> {
        let context = request_context(&request);
        let response = self.invoke(request).await?;
        map_response(response, &context)?.into_resource(&context)
    }

    /// Sends `request` and classifies the response without requiring a
    /// particular outcome.
    pub async fn execute_mapped<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> CloudFoundryResult<MappedResponse<T>> {
        let context = request_context(&request);
        let response = self.invoke(request).await?;
        map_response(response, &context)
    }

    /// Sends `request` for an operation that either completes inline or
    /// continues as a job.
    pub async fn execute_completion(&self, request: HttpRequest) -> CloudFoundryResult<Completion> {
        let context = request_context(&request);
        let response = self.invoke(request).await?;
        map_completion(response, &context)
    }

    /// Fetches one page of a list endpoint.
    pub async fn fetch_page<R: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> CloudFoundryResult<PageEnvelope<R>> {
        let url = request.url.to_string();
        let page: PageEnvelope<R> = self.execute(request).await?;

        self.metrics.record_page();
        TracingHooks::on_page_fetched(&url, page.len(), page.has_next());
        Ok(page)
    }

    /// Returns a lazy stream over every resource of a list endpoint,
    /// starting with `first`.
    pub fn paginate<R>(self: &Arc<Self>, first: HttpRequest) -> Paginator<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let executor = Arc::clone(self);
        Paginator::new(first, move |request| {
            let executor = Arc::clone(&executor);
            async move { executor.fetch_page(request).await }
        })
    }

    /// GETs an absolute URL handed out by the API, or a path below the API
    /// root.
    pub async fn get_url<T: DeserializeOwned>(&self, url: &str) -> CloudFoundryResult<T> {
        let url = resolve_link(&self.config.api_url, url)?;

        let mut request = HttpRequest::new(HttpMethod::Get, url);
        request.set_header(ACCEPT, HeaderValue::from_static("application/json"));
        self.execute(request).await
    }

    async fn send_with(
        &self,
        request: &HttpRequest,
        token: &BearerToken,
    ) -> CloudFoundryResult<HttpResponse> {
        let mut request = request.clone();

        let mut authorization = HeaderValue::from_str(&token.authorization_header())
            .map_err(|_| {
                AuthenticationError::TokenFetchFailed(
                    "token contains characters not allowed in a header".to_string(),
                )
            })?;
        authorization.set_sensitive(true);
        request.set_header(AUTHORIZATION, authorization);

        let user_agent = HeaderValue::from_str(&self.config.user_agent)
            .map_err(|e| CloudFoundryError::configuration(format!("Invalid user agent: {}", e)))?;
        request.set_header(USER_AGENT, user_agent);

        let method = request.method.to_string();
        let url = request.url.to_string();
        TracingHooks::on_request_start(&method, &url, &request.headers);
        let timer = RequestTimer::new(self.metrics.clone());

        match self.transport.send(request).await {
            Ok(response) => {
                TracingHooks::on_request_complete(
                    &method,
                    &url,
                    response.status.as_u16(),
                    timer.elapsed(),
                );
                if response.is_success() {
                    timer.success();
                } else {
                    timer.failure();
                }
                Ok(response)
            }
            Err(e) => {
                TracingHooks::on_request_error(&method, &url, &e.to_string());
                timer.failure();
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("api_url", &self.config.api_url.as_str())
            .field("tokens", &self.tokens)
            .finish()
    }
}
