//! Integration tests using WireMock
//!
//! These tests drive the client through the reqwest transport against a mock
//! HTTP server, covering authentication, error decoding, pagination, and jobs.

mod applications;
mod auth;
mod jobs;

use integrations_cloudfoundry::mocks::MockCredentialSource;
use integrations_cloudfoundry::CloudFoundryClient;
use serde_json::{json, Value};
use wiremock::MockServer;

/// Helper to create a mock server
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Helper to create a client pointing at the mock server
pub fn client_for(server: &MockServer, credentials: &MockCredentialSource) -> CloudFoundryClient {
    CloudFoundryClient::builder()
        .api_url(server.uri())
        .credentials(credentials.clone())
        .build()
        .expect("Failed to build client")
}

/// An application resource as the API returns it.
pub fn app_json(guid: &str, name: &str) -> Value {
    json!({
        "guid": guid,
        "name": name,
        "state": "STARTED",
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:05:00Z",
        "lifecycle": {
            "type": "buildpack",
            "data": {"buildpacks": ["ruby_buildpack"], "stack": "cflinuxfs4"}
        },
        "relationships": {"space": {"data": {"guid": "space-1"}}},
        "metadata": {"labels": {}, "annotations": {}},
        "links": {}
    })
}

/// A list response page.
pub fn page_json(resources: Vec<Value>, total: u64, next: Option<String>) -> Value {
    json!({
        "pagination": {
            "total_results": total,
            "total_pages": 2,
            "first": null,
            "last": null,
            "next": next.map(|href| json!({"href": href})),
            "previous": null
        },
        "resources": resources
    })
}

/// A v3 error envelope.
pub fn error_json(code: i64, title: &str, detail: &str) -> Value {
    json!({"errors": [{"code": code, "title": title, "detail": detail}]})
}
