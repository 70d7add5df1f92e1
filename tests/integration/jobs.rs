//! Integration tests for job tracking

use super::*;
use integrations_cloudfoundry::{JobHandle, JobState};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn job_json(uri: &str, state: &str) -> Value {
    json!({
        "guid": "job-123",
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:00:05Z",
        "operation": "app.delete",
        "state": state,
        "errors": [],
        "warnings": [],
        "links": {"self": {"href": format!("{}/v3/jobs/job-123", uri)}}
    })
}

#[tokio::test]
async fn test_delete_then_poll_job() {
    let mock_server = setup_mock_server().await;
    let location = format!("{}/v3/jobs/job-123", mock_server.uri());

    Mock::given(method("DELETE"))
        .and(path("/v3/apps/app-1"))
        .respond_with(ResponseTemplate::new(202).insert_header("location", location.as_str()))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/jobs/job-123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(job_json(&mock_server.uri(), "COMPLETE")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());

    let completion = client.applications().delete("app-1").await.unwrap();
    let handle = completion.job().cloned().unwrap();

    let status = client.jobs().poll(&handle).await.unwrap();

    assert_eq!(status.state(), JobState::Complete);
    assert!(status.is_terminal());
    assert_eq!(status.handle().job_id(), "job-123");
    assert_eq!(status.job().operation.as_deref(), Some("app.delete"));
}

#[tokio::test]
async fn test_poll_relative_status_link() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v3/jobs/job-123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(job_json(&mock_server.uri(), "PROCESSING")),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());
    let handle = JobHandle::from_location("/v3/jobs/job-123").unwrap();

    let status = client.jobs().poll(&handle).await.unwrap();

    assert_eq!(status.state(), JobState::Processing);
    assert!(!status.is_terminal());
}

#[tokio::test]
async fn test_get_failed_job_reports_errors() {
    let mock_server = setup_mock_server().await;
    let mut body = job_json(&mock_server.uri(), "FAILED");
    body["errors"] = json!([{
        "code": 10008,
        "title": "CF-UnprocessableEntity",
        "detail": "something went wrong"
    }]);

    Mock::given(method("GET"))
        .and(path("/v3/jobs/job-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());

    let status = client.jobs().get("job-123").await.unwrap();

    assert_eq!(status.state(), JobState::Failed);
    assert_eq!(status.errors().len(), 1);
    assert_eq!(status.errors()[0].code, Some(10008));
    assert_eq!(status.errors()[0].detail.as_deref(), Some("something went wrong"));
}
