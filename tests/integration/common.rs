//! Fake registry helpers shared by the integration tests

use registry_repos::config::Config;
use registry_repos::state::Dataset;
use registry_repos::storage::{CheckpointStore, JsonStore};
use registry_repos::Metadata;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the fake registry
pub fn test_config(server: &MockServer, data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.feed.registry_url = format!("{}/registry", server.uri());
    config.feed.retry_base_millis = 10;
    config.feed.request_timeout_secs = 30;
    config.output.data_dir = data_dir.to_path_buf();
    config
}

/// Serves the database info with the given high-water mark
pub async fn mount_info(server: &MockServer, latest: u64) {
    mount_info_with(server, latest, Duration::ZERO).await;
}

pub async fn mount_info_with(server: &MockServer, latest: u64, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/registry"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"db_name": "registry", "update_seq": latest}))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Serves a changes page for requests starting after `since`
pub async fn mount_changes(server: &MockServer, since: u64, results: Value) {
    mount_changes_with(server, since, results, Duration::ZERO).await;
}

pub async fn mount_changes_with(server: &MockServer, since: u64, results: Value, delay: Duration) {
    let last_seq = results
        .as_array()
        .and_then(|changes| changes.last())
        .and_then(|change| change["seq"].as_u64())
        .unwrap_or(since);

    Mock::given(method("GET"))
        .and(path("/registry/_changes"))
        .and(query_param("since", since.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": results, "last_seq": last_seq}))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Serves a package document
pub async fn mount_doc(server: &MockServer, id: &str, body: Value) {
    mount_doc_with(server, id, ResponseTemplate::new(200).set_body_json(body), None).await;
}

/// Serves a package document for the next request only
pub async fn mount_doc_once(server: &MockServer, id: &str, body: Value) {
    mount_doc_with(server, id, ResponseTemplate::new(200).set_body_json(body), Some(1)).await;
}

/// Serves a bare status for a package document
pub async fn mount_doc_status(server: &MockServer, id: &str, status: u16) {
    mount_doc_with(server, id, ResponseTemplate::new(status), None).await;
}

pub async fn mount_doc_with(
    server: &MockServer,
    id: &str,
    response: ResponseTemplate,
    times: Option<u64>,
) {
    let mock = Mock::given(method("GET"))
        .and(path(format!("/registry/{}", id)))
        .respond_with(response);

    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

/// Loads the stored checkpoint, panicking when there is none
pub fn stored(data_dir: &Path) -> (Metadata, Dataset) {
    JsonStore::new(data_dir)
        .load()
        .expect("checkpoint readable")
        .expect("checkpoint present")
}

/// Reads `metadata.json` as raw JSON to check the on-disk shape
pub fn raw_metadata(data_dir: &Path) -> Value {
    let text = std::fs::read_to_string(data_dir.join("metadata.json")).expect("metadata written");
    serde_json::from_str(&text).expect("metadata is JSON")
}
