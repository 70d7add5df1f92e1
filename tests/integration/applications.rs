//! Integration tests for application operations

use super::*;
use futures::StreamExt;
use integrations_cloudfoundry::errors::AuthenticationError;
use integrations_cloudfoundry::services::{
    CreateApplicationRequest, ListApplicationsRequest, ListDropletsRequest, ScaleProcessRequest,
};
use integrations_cloudfoundry::{
    ApplicationState, CloudFoundryError, Completion, DropletState, ProcessInstanceState,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_get_application_sends_bearer_and_accept() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/app-1"))
        .and(header("authorization", "bearer token-1"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(app_json("app-1", "web")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let credentials = MockCredentialSource::new();
    let client = client_for(&mock_server, &credentials);

    let app = client.applications().get("app-1").await.unwrap();

    assert_eq!(app.guid(), "app-1");
    assert_eq!(app.state, ApplicationState::Started);
    assert_eq!(credentials.fetch_count(), 1);
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_and_request_replayed_once() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/app-1"))
        .and(header("authorization", "bearer token-1"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(error_json(
                10002,
                "CF-NotAuthenticated",
                "Authentication error",
            )),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/app-1"))
        .and(header("authorization", "bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(app_json("app-1", "web")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let credentials = MockCredentialSource::new();
    let client = client_for(&mock_server, &credentials);

    let app = client.applications().get("app-1").await;

    tokio_test::assert_ok!(&app);
    assert_eq!(client.token_cache().refresh_count(), 1);
    assert_eq!(credentials.fetch_count(), 2);
    assert_eq!(client.metrics().requests_replayed, 1);
}

#[tokio::test]
async fn test_second_rejection_is_final() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/app-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&mock_server)
        .await;

    let credentials = MockCredentialSource::new();
    let client = client_for(&mock_server, &credentials);

    let err = client.applications().get("app-1").await.unwrap_err();

    assert!(matches!(
        err,
        CloudFoundryError::Authentication(AuthenticationError::Rejected { status: 401, .. })
    ));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_not_found_decodes_v3_error_envelope() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(error_json(
                10010,
                "CF-ResourceNotFound",
                "App not found",
            )),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());

    let err = client.applications().get("missing").await.unwrap_err();

    assert!(err.is_not_found());
    let api = err.as_api_error().unwrap();
    assert_eq!(api.code, Some(10010));
    assert_eq!(api.title.as_deref(), Some("CF-ResourceNotFound"));
    assert_eq!(api.description, "App not found");
    assert_eq!(api.request.method, "GET");
    assert!(api.request.url.ends_with("/v3/apps/missing"));
}

#[tokio::test]
async fn test_v2_error_envelope() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/v3/apps/app-1/actions/start"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 170004,
            "description": "App staging failed",
            "error_code": "CF-BuildpackCompileFailed"
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());

    let err = client.applications().start("app-1").await.unwrap_err();

    let api = err.as_api_error().unwrap();
    assert_eq!(api.status, 422);
    assert_eq!(api.code, Some(170004));
    assert_eq!(api.title.as_deref(), Some("CF-BuildpackCompileFailed"));
    assert_eq!(api.description, "App staging failed");
}

#[tokio::test]
async fn test_list_follows_next_links_lazily() {
    let mock_server = setup_mock_server().await;
    let next = format!("{}/v3/apps?page=2&per_page=2", mock_server.uri());

    // Registered first so it wins over the unfiltered page-one mock.
    Mock::given(method("GET"))
        .and(path("/v3/apps"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            vec![app_json("app-3", "three")],
            3,
            None,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/apps"))
        .and(query_param("per_page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            vec![app_json("app-1", "one"), app_json("app-2", "two")],
            3,
            Some(next),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());
    let mut apps = client
        .applications()
        .list(&ListApplicationsRequest::new().per_page(2))
        .unwrap();

    assert!(mock_server.received_requests().await.unwrap().is_empty());

    let first = apps.next().await.unwrap().unwrap();
    let second = apps.next().await.unwrap().unwrap();
    assert_eq!(first.name, "one");
    assert_eq!(second.name, "two");
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);

    let rest: Vec<_> = apps.collect().await;
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].as_ref().unwrap().name, "three");
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
    assert_eq!(client.metrics().pages_fetched, 2);
}

#[tokio::test]
async fn test_list_single_page_with_filters() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v3/apps"))
        .and(query_param("names", "web"))
        .and(query_param("space_guids", "space-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            vec![app_json("app-1", "web")],
            1,
            None,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());
    let apps = client
        .applications()
        .list(&ListApplicationsRequest::new().name("web").space_guid("space-1"))
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].space_guid(), Some("space-1"));
}

#[tokio::test]
async fn test_create_application_sends_json_body() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/v3/apps"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "name": "web",
            "relationships": {"space": {"data": {"guid": "space-1"}}},
            "environment_variables": {"GREETING": "hello"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(app_json("app-9", "web")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());
    let request = CreateApplicationRequest::new("web", "space-1")
        .unwrap()
        .environment_variable("GREETING", "hello");

    let app = client.applications().create(&request).await.unwrap();

    assert_eq!(app.guid(), "app-9");
}

#[tokio::test]
async fn test_scale_process() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("PUT"))
        .and(path("/v3/apps/app-1/processes/web/actions/scale"))
        .and(body_json(json!({"instances": 3, "memory_in_mb": 512})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "guid": "proc-1",
            "type": "web",
            "command": null,
            "instances": 3,
            "memory_in_mb": 512,
            "disk_in_mb": 1024,
            "health_check": {"type": "port", "data": {}},
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:05:00Z",
            "links": {}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());
    let process = client
        .applications()
        .scale(
            "app-1",
            "web",
            &ScaleProcessRequest::new().instances(3).memory_in_mb(512),
        )
        .await
        .unwrap();

    assert_eq!(process.instances, 3);
    assert_eq!(process.memory_in_mb, 512);
}

fn droplet_json(guid: &str, state: &str) -> serde_json::Value {
    json!({
        "guid": guid,
        "state": state,
        "error": null,
        "lifecycle": {"type": "buildpack", "data": {}},
        "process_types": {"web": "bundle exec rackup"},
        "checksum": {"type": "sha256", "value": "abc"},
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": null,
        "links": {}
    })
}

#[tokio::test]
async fn test_list_droplets_follows_next_links() {
    let mock_server = setup_mock_server().await;
    let next = format!("{}/v3/apps/app-1/droplets?page=2", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/v3/apps/app-1/droplets"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            vec![droplet_json("drop-2", "STAGED")],
            2,
            None,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/app-1/droplets"))
        .and(query_param("states", "STAGED,EXPIRED"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            vec![droplet_json("drop-1", "EXPIRED")],
            2,
            Some(next),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());
    let droplets = client
        .applications()
        .list_droplets(
            "app-1",
            &ListDropletsRequest::new()
                .state(DropletState::Staged)
                .state(DropletState::Expired),
        )
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    let guids: Vec<_> = droplets.iter().map(|d| d.resource.guid.as_str()).collect();
    assert_eq!(guids, vec!["drop-1", "drop-2"]);
    assert_eq!(droplets[1].state, DropletState::Staged);
    assert_eq!(client.metrics().pages_fetched, 2);
}

#[tokio::test]
async fn test_set_current_droplet_sends_relationship() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("PATCH"))
        .and(path("/v3/apps/app-1/relationships/current_droplet"))
        .and(body_json(json!({"data": {"guid": "drop-1"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"guid": "drop-1"},
            "links": {
                "self": {"href": "https://api.example.org/v3/apps/app-1/relationships/current_droplet"}
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());
    let relationship = client
        .applications()
        .set_current_droplet("app-1", "drop-1")
        .await
        .unwrap();

    assert_eq!(relationship.guid(), Some("drop-1"));
}

#[tokio::test]
async fn test_get_current_droplet() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/app-1/droplets/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(droplet_json("drop-1", "STAGED")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());
    let droplet = client
        .applications()
        .get_current_droplet("app-1")
        .await
        .unwrap();

    assert_eq!(droplet.resource.guid, "drop-1");
    assert_eq!(
        droplet.process_types.get("web").map(String::as_str),
        Some("bundle exec rackup")
    );
}

#[tokio::test]
async fn test_get_process_statistics_unwraps_resources() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/app-1/processes/web/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [
                {
                    "type": "web",
                    "index": 0,
                    "state": "RUNNING",
                    "usage": {"time": "2024-03-01T10:00:00Z", "cpu": 0.02, "mem": 1024, "disk": 2048},
                    "host": "10.0.0.1",
                    "instance_ports": [{"external": 61000, "internal": 8080}],
                    "uptime": 120,
                    "mem_quota": 536870912,
                    "disk_quota": 1073741824,
                    "fds_quota": 16384
                },
                {"type": "web", "index": 1, "state": "CRASHED"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());
    let stats = client
        .applications()
        .get_process_statistics("app-1", "web")
        .await
        .unwrap();

    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].state, ProcessInstanceState::Running);
    assert_eq!(stats[0].instance_ports[0].external, 61000);
    assert_eq!(stats[1].state, ProcessInstanceState::Crashed);
    assert!(stats[1].usage.is_none());
}

#[tokio::test]
async fn test_get_environment() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v3/apps/app-1/env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "staging_env_json": {"GEM_CACHE": "http://gem-cache.example.org"},
            "running_env_json": {"HTTP_PROXY": "http://proxy.example.org"},
            "environment_variables": {"RAILS_ENV": "production"},
            "system_env_json": {"VCAP_SERVICES": {}},
            "application_env_json": {"VCAP_APPLICATION": {"limits": {"fds": 16384}}}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());
    let env = client.applications().get_environment("app-1").await.unwrap();

    assert_eq!(env.environment_variables["RAILS_ENV"], json!("production"));
    assert!(env.system_env_json.contains_key("VCAP_SERVICES"));
}

#[tokio::test]
async fn test_delete_returns_job_handle() {
    let mock_server = setup_mock_server().await;
    let location = format!("{}/v3/jobs/job-123", mock_server.uri());

    Mock::given(method("DELETE"))
        .and(path("/v3/apps/app-1"))
        .respond_with(ResponseTemplate::new(202).insert_header("location", location.as_str()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, &MockCredentialSource::new());

    let completion = client.applications().delete("app-1").await.unwrap();

    match completion {
        Completion::Accepted(handle) => {
            assert_eq!(handle.job_id(), "job-123");
            assert_eq!(handle.status_link(), location);
        }
        other => panic!("expected a job handle, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_input_sends_nothing() {
    let mock_server = setup_mock_server().await;
    let credentials = MockCredentialSource::new();
    let client = client_for(&mock_server, &credentials);

    let err = client.applications().get(" ").await.unwrap_err();
    assert!(err.is_caller_error());

    let err = client
        .applications()
        .list(&ListApplicationsRequest::new().per_page(0))
        .err()
        .unwrap();
    assert!(err.is_caller_error());

    assert!(mock_server.received_requests().await.unwrap().is_empty());
    assert_eq!(credentials.fetch_count(), 0);
}
