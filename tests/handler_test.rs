mod common;

use httpmock::prelude::*;
use layer_ingest::app::handler::API_KEY_SECRET;
use layer_ingest::{Handler, LayerCatalog, StoreClient};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

fn store_client(server: &MockServer) -> StoreClient {
    StoreClient::new(&server.base_url(), "sandbox", None, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_api_key_secret_targets_fixed_project() {
    let work_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/shape/fldArea.zip");
        then.status(200)
            .body(common::zipped_layer("fldArea", &common::polygon_dataset(4, 1)));
    });
    let discover_upload = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/projects/discover/spatial/layers/npd-fields/shapefile")
            .header("authorization", "Bearer from-secrets");
        then.status(200);
    });
    let sandbox_upload = server.mock(|when, then| {
        when.method(POST).path_contains("/projects/sandbox/");
        then.status(200);
    });

    let config = common::config(&server.url("/shape"), work_dir.path());
    let handler = Handler::new(config, LayerCatalog::builtin(), "discover");
    let secrets = HashMap::from([(API_KEY_SECRET.to_string(), "from-secrets".to_string())]);

    let response = handler
        .handle(
            store_client(&server),
            Some(&secrets),
            &json!({"layers": ["npd-fields"], "simplify": "True"}),
        )
        .await;

    assert!(response.is_succeeded());
    assert!(response.error.is_none());
    discover_upload.assert();
    sandbox_upload.assert_hits(0);
}

#[tokio::test]
async fn test_without_secrets_uses_given_client() {
    let work_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/shape/blkArea.zip");
        then.status(200)
            .body(common::zipped_layer("blkArea", &common::polygon_dataset(2, 0)));
    });
    let sandbox_upload = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/projects/sandbox/spatial/layers/npd-blocks/shapefile");
        then.status(200);
    });

    let config = common::config(&server.url("/shape"), work_dir.path());
    let handler = Handler::new(config, LayerCatalog::builtin(), "discover");

    let batch = handler
        .run(
            store_client(&server),
            None,
            &json!({"layers": ["npd-blocks"], "simplify": "False"}),
        )
        .await
        .unwrap();

    sandbox_upload.assert();
    assert_eq!(batch.done_count(), 1);
}

#[tokio::test]
async fn test_layer_failure_still_reports_succeeded() {
    let work_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/shape/qadArea.zip");
        then.status(503);
    });

    let config = common::config(&server.url("/shape"), work_dir.path());
    let handler = Handler::new(config, LayerCatalog::builtin(), "discover");

    let response = handler
        .handle(store_client(&server), None, &json!({"layers": ["npd-quadrants"]}))
        .await;

    assert_eq!(response.status, "succeeded");
}

#[tokio::test]
async fn test_unknown_layer_fails_before_any_work() {
    let work_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let anything = server.mock(|when, then| {
        when.path_contains("/");
        then.status(200);
    });

    let config = common::config(&server.url("/shape"), work_dir.path());
    let handler = Handler::new(config, LayerCatalog::builtin(), "discover");

    let response = handler
        .handle(store_client(&server), None, &json!({"layers": ["npd-unknown"]}))
        .await;

    assert_eq!(response.status, "failed");
    assert!(response.error.unwrap().contains("npd-unknown"));
    anything.assert_hits(0);
}

#[tokio::test]
async fn test_debug_payload_skips_everything() {
    let work_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let anything = server.mock(|when, then| {
        when.path_contains("/");
        then.status(200);
    });

    let config = common::config(&server.url("/shape"), work_dir.path());
    let handler = Handler::new(config, LayerCatalog::builtin(), "discover");

    let response = handler
        .handle(store_client(&server), None, &json!({"debug": "True"}))
        .await;

    assert!(response.is_succeeded());
    anything.assert_hits(0);
}
