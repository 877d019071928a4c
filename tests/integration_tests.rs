//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: YAML config → token exchange → paginated
//! listing → bulk hydration

use falcon_client::config::ConfigFile;
use falcon_client::http::{REMAINING_HEADER, RETRY_AFTER_HEADER};
use falcon_client::{ApiClient, Error, HydrateRequest, PageControl};
use futures::TryStreamExt;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use wiremock::matchers::{body_string_contains, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Device {
    device_id: String,
    hostname: String,
}

fn write_config(server: &MockServer) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r"
base_url: {}
credentials:
  client_id: integration-id
  client_secret: integration-secret
retry:
  max_attempts: 3
  initial_delay_secs: 0
  timeout_secs: 10
rate_limit:
  reserve_limit: 10
  cooldown_secs: 0
  retry_after_margin_secs: 0
",
        server.uri()
    )
    .unwrap();
    file
}

fn client_from_file(file: &tempfile::NamedTempFile) -> ApiClient {
    let config = ConfigFile::from_file(file.path())
        .unwrap()
        .into_client_config()
        .unwrap();
    ApiClient::new(config).unwrap()
}

async fn mount_token(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("client_id=integration-id"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "access_token": "integration-token",
            "expires_in": 1799,
            "token_type": "bearer"
        })))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_device_ids(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/devices/queries/devices/v1"))
        .and(query_param("filter", "platform_name:'Linux'"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": { "pagination": { "offset": 3, "limit": 2, "total": 3 } },
            "resources": ["id-3"],
            "errors": []
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/devices/queries/devices/v1"))
        .and(query_param("filter", "platform_name:'Linux'"))
        .and(query_param_is_missing("offset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": { "pagination": { "offset": 2, "limit": 2, "total": 3 } },
            "resources": ["id-1", "id-2"],
            "errors": []
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn device(n: u32) -> serde_json::Value {
    json!({ "device_id": format!("id-{n}"), "hostname": format!("host-{n}") })
}

#[tokio::test]
async fn test_config_file_to_hydrated_records() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 1).await;
    mount_device_ids(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/devices/entities/devices/v2"))
        .and(query_param("ids", "id-1"))
        .and(query_param("ids", "id-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {},
            "resources": [device(1), device(2)],
            "errors": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/devices/entities/devices/v2"))
        .and(query_param("ids", "id-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {},
            "resources": [device(3)],
            "errors": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let file = write_config(&mock_server);
    let client = client_from_file(&file);

    let query = falcon_client::query_params([("filter", "platform_name:'Linux'")]);
    let mut devices: Vec<Device> = Vec::new();
    let summary = client
        .paginator()
        .run_hydrated(
            "/devices/queries/devices/v1",
            &query,
            &HydrateRequest::new("/devices/entities/devices/v2"),
            |records: Vec<Device>| {
                devices.extend(records);
                async { Ok(PageControl::Continue) }
            },
        )
        .await
        .unwrap();

    assert_eq!(summary.items, 3);
    assert_eq!(
        devices.iter().map(|d| d.hostname.as_str()).collect::<Vec<_>>(),
        vec!["host-1", "host-2", "host-3"]
    );
}

#[tokio::test]
async fn test_stream_recovers_from_quota_exhaustion() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 1).await;

    // Second page is refused once with the quota drained
    let now = chrono::Utc::now().timestamp().to_string();
    Mock::given(method("GET"))
        .and(path("/devices/queries/devices/v1"))
        .and(query_param("offset", "2"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header(REMAINING_HEADER, "0")
                .insert_header(RETRY_AFTER_HEADER, now.as_str()),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_device_ids(&mock_server).await;

    let file = write_config(&mock_server);
    let client = client_from_file(&file);

    let query = falcon_client::query_params([("filter", "platform_name:'Linux'")]);
    let paginator = client.paginator();
    let ids: Vec<String> = paginator
        .pages::<String>("/devices/queries/devices/v1", &query)
        .map_ok(|page| page.items)
        .try_concat()
        .await
        .unwrap();

    assert_eq!(ids, vec!["id-1", "id-2", "id-3"]);
}

#[tokio::test]
async fn test_rejected_credentials_surface_as_authentication_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{ "code": 400, "message": "invalid client" }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let file = write_config(&mock_server);
    let client = client_from_file(&file);

    let err = client
        .paginator()
        .run::<String, _, _>("/devices/queries/devices/v1", &[], |_| async {
            Ok(PageControl::Continue)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }));
}

#[tokio::test]
async fn test_environment_supplies_missing_secret() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 1).await;

    let yaml = format!(
        "base_url: {}\ncredentials:\n  client_id: integration-id\n",
        mock_server.uri()
    );
    let file = ConfigFile::from_yaml_str(&yaml).unwrap();
    assert!(matches!(
        file.clone().into_client_config(),
        Err(Error::MissingConfigField { .. })
    ));

    let config = file
        .apply_vars(|key| (key == "FALCON_CLIENT_SECRET").then(|| "from-env".to_string()))
        .into_client_config()
        .unwrap();
    let client = ApiClient::new(config).unwrap();

    let token = client.authenticate().await.unwrap();
    assert_eq!(token.secret(), "integration-token");
}
