//! Mock implementations for testing code built on the Cloud Foundry client.
//!
//! [`MockTransport`] replays scripted responses in order and records every
//! request it receives. [`MockCredentialSource`] mints numbered tokens and
//! counts how often it was asked.

use crate::auth::{BearerToken, CredentialSource};
use crate::errors::{AuthenticationError, TransportError};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A scripted response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: String,
    /// Headers.
    pub headers: Vec<(String, String)>,
    /// Delay before responding.
    pub delay: Option<Duration>,
}

impl MockResponse {
    /// Creates a response with the given status and no body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            headers: Vec::new(),
            delay: None,
        }
    }

    /// Creates a 200 OK response with a JSON body.
    pub fn ok<T: Serialize>(body: &T) -> Self {
        Self::status(200).with_json(body)
    }

    /// Creates a 201 Created response with a JSON body.
    pub fn created<T: Serialize>(body: &T) -> Self {
        Self::status(201).with_json(body)
    }

    /// Creates a 202 Accepted response pointing at a job.
    pub fn accepted(location: &str) -> Self {
        Self::status(202).with_header("Location", location)
    }

    /// Creates a 204 No Content response.
    pub fn no_content() -> Self {
        Self::status(204)
    }

    /// Creates a 401 Unauthorized response in the v3 error format.
    pub fn unauthorized() -> Self {
        Self::error(401, 10002, "CF-NotAuthenticated", "Authentication error")
    }

    /// Creates a 404 Not Found response in the v3 error format.
    pub fn not_found(detail: &str) -> Self {
        Self::error(404, 10010, "CF-ResourceNotFound", detail)
    }

    /// Creates an error response in the v3 error format.
    pub fn error(status: u16, code: i64, title: &str, detail: &str) -> Self {
        Self::status(status).with_json(&serde_json::json!({
            "errors": [{ "code": code, "title": title, "detail": detail }]
        }))
    }

    /// Sets a JSON body.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = serde_json::to_string(body).unwrap_or_default();
        self.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        self
    }

    /// Sets a raw body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Delays the response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn into_http(self) -> HttpResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }

        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::new(status, headers, Bytes::from(self.body))
    }
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Full URL.
    pub url: String,
    /// Authorization header, if any.
    pub authorization: Option<String>,
    /// Request body as text.
    pub body: Option<String>,
}

impl MockRequest {
    /// Returns the URL path.
    pub fn path(&self) -> String {
        url::Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default()
    }
}

/// A transport that answers with scripted responses, in order.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: Arc<RwLock<VecDeque<MockResponse>>>,
    requests: Arc<RwLock<Vec<MockRequest>>>,
}

impl MockTransport {
    /// Creates a transport with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push(&self, response: MockResponse) -> &Self {
        if let Ok(mut responses) = self.responses.write() {
            responses.push_back(response);
        }
        self
    }

    /// Queues a response, builder style.
    pub fn with_response(self, response: MockResponse) -> Self {
        self.push(response);
        self
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Returns the number of scripted responses not yet served.
    pub fn remaining(&self) -> usize {
        self.responses.read().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let recorded = MockRequest {
            method: request.method,
            url: request.url.to_string(),
            authorization: request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            body: request
                .body
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
        };
        if let Ok(mut requests) = self.requests.write() {
            requests.push(recorded);
        }

        let next = self
            .responses
            .write()
            .ok()
            .and_then(|mut responses| responses.pop_front());

        let response = next.ok_or_else(|| {
            TransportError::ConnectionFailed(format!(
                "no mock response queued for {} {}",
                request.method, request.url
            ))
        })?;

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(response.into_http())
    }
}

/// A credential source that mints `token-1`, `token-2`, ... and counts
/// its fetches.
#[derive(Debug, Clone, Default)]
pub struct MockCredentialSource {
    fetches: Arc<AtomicUsize>,
    delay: Option<Duration>,
    failure: Option<AuthenticationError>,
}

impl MockCredentialSource {
    /// Creates a source that succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes every fetch fail with `error`.
    pub fn failing(mut self, error: AuthenticationError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Returns how many times a token was requested.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for MockCredentialSource {
    async fn fetch_token(&self) -> Result<BearerToken, AuthenticationError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.failure {
            Some(ref error) => Err(error.clone()),
            None => Ok(BearerToken::new(format!("token-{}", n), None)),
        }
    }
}
