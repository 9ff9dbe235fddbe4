//! Full update runs against a fake registry

use crate::common::*;
use registry_repos::state::RunStats;
use registry_repos::storage::JsonStore;
use registry_repos::{run_update, RegistryError, RunControl, RunStatus};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{MockServer, ResponseTemplate};

#[tokio::test]
async fn test_insert_update_invalid_delete_scenario() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_info(&server, 4).await;
    mount_changes(
        &server,
        0,
        json!([
            {"seq": 1, "id": "p"},
            {"seq": 2, "id": "p"},
            {"seq": 3, "id": "p"},
            {"seq": 4, "id": "p", "deleted": true}
        ]),
    )
    .await;
    mount_doc_once(
        &server,
        "p",
        json!({"repository": {"type": "git", "url": "git+https://github.com/a/b.git"}}),
    )
    .await;
    mount_doc_once(&server, "p", json!({"repository": "https://gitlab.com/a/b.git"})).await;
    mount_doc_once(&server, "p", json!({"name": "p"})).await;

    let mut config = test_config(&server, dir.path());
    // one fetch at a time so each document answers the matching change
    config.feed.concurrency = 1;

    let store = JsonStore::new(dir.path());
    let metadata = run_update(&config, &store, RunControl::new()).await.unwrap();

    assert_eq!(
        metadata.stats,
        RunStats {
            changes: 4,
            inserts: 1,
            updates: 2,
            deletes: 1,
            invalid: 1,
            ..Default::default()
        }
    );
    assert_eq!(metadata.packages, 0);
    assert_eq!(metadata.repos.total(), 0);
    assert_eq!(metadata.last_sequence, 4);
    assert_eq!(metadata.runs.count(RunStatus::Ok), 1);

    let (_, dataset) = stored(dir.path());
    assert!(dataset.is_empty());
    assert!(metadata.consistency_issues(&dataset).is_empty());
}

#[tokio::test]
async fn test_slow_fetch_does_not_reorder_changes() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_info(&server, 3).await;
    mount_changes(
        &server,
        0,
        json!([
            {"seq": 1, "id": "slow"},
            {"seq": 2, "id": "fast"},
            {"seq": 3, "id": "slow", "deleted": true}
        ]),
    )
    .await;
    mount_doc_with(
        &server,
        "slow",
        ResponseTemplate::new(200)
            .set_body_json(json!({"repository": "https://github.com/a/slow"}))
            .set_delay(Duration::from_millis(400)),
        None,
    )
    .await;
    mount_doc(&server, "fast", json!({"repository": "https://gitlab.com/a/fast"})).await;

    let store = JsonStore::new(dir.path());
    let config = test_config(&server, dir.path());
    let metadata = run_update(&config, &store, RunControl::new()).await.unwrap();

    let (_, dataset) = stored(dir.path());
    assert!(!dataset.contains_key("slow"), "deletion at seq 3 must win");
    assert_eq!(
        dataset.get("fast"),
        Some(&Some("https://gitlab.com/a/fast".to_string()))
    );
    assert_eq!(metadata.repos.github, 0);
    assert_eq!(metadata.repos.gitlab, 1);
    assert_eq!(metadata.packages, 1);
}

#[tokio::test]
async fn test_packages_file_is_sorted_with_null_marker() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_info(&server, 3).await;
    mount_changes(
        &server,
        0,
        json!([
            {"seq": 1, "id": "zeta"},
            {"seq": 2, "id": "alpha"},
            {"seq": 3, "id": "mid"}
        ]),
    )
    .await;
    mount_doc(&server, "zeta", json!({"repository": "github:z/zeta"})).await;
    mount_doc(&server, "alpha", json!({"repository": {"url": "svn://old/alpha"}})).await;
    mount_doc(&server, "mid", json!({"repository": "https://example.org/mid.git"})).await;

    let store = JsonStore::new(dir.path());
    let config = test_config(&server, dir.path());
    let metadata = run_update(&config, &store, RunControl::new()).await.unwrap();

    let text = std::fs::read_to_string(dir.path().join("packages.json")).unwrap();
    assert_eq!(
        text,
        "{\n  \"alpha\": null,\n  \"mid\": \"https://example.org/mid.git\",\n  \"zeta\": \"https://github.com/z/zeta\"\n}\n"
    );
    assert_eq!(metadata.repos.unset, 1);
    assert_eq!(metadata.repos.others, 1);
    assert_eq!(metadata.repos.github, 1);
    assert_eq!(metadata.stats.invalid, 1);
}

#[tokio::test]
async fn test_not_found_heals_on_later_change() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let store = JsonStore::new(dir.path());
    let config = test_config(&server, dir.path());

    // first run: the document is gone when fetched
    mount_info(&server, 5).await;
    mount_changes(&server, 0, json!([{"seq": 5, "id": "x"}])).await;
    mount_doc_status(&server, "x", 404).await;

    let first = run_update(&config, &store, RunControl::new()).await.unwrap();
    assert_eq!(first.stats.not_found, 1);
    assert!(first.not_found.contains("x"));
    assert_eq!(first.not_found.sequences("x"), Some(&[5][..]));
    assert_eq!(first.last_sequence, 5);
    assert_eq!(first.stats.changes, 0);
    assert_eq!(first.runs.count(RunStatus::Init), 1);
    assert!(!dir.path().join("packages.json").exists());

    // second run: the package is back
    server.reset().await;
    mount_info(&server, 9).await;
    mount_changes(&server, 5, json!([{"seq": 9, "id": "x"}])).await;
    mount_doc(&server, "x", json!({"repository": "https://github.com/x/x"})).await;

    let second = run_update(&config, &store, RunControl::new()).await.unwrap();
    assert_eq!(second.stats.not_found, 0);
    assert!(!second.not_found.contains("x"));
    assert!(second.not_found.is_empty());
    assert_eq!(second.last_sequence, 9);

    let (metadata, dataset) = stored(dir.path());
    assert_eq!(dataset.get("x"), Some(&Some("https://github.com/x/x".to_string())));
    assert!(metadata.consistency_issues(&dataset).is_empty());
}

#[tokio::test]
async fn test_repeated_not_found_counts_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_info(&server, 7).await;
    mount_changes(
        &server,
        0,
        json!([{"seq": 5, "id": "x"}, {"seq": 7, "id": "x"}]),
    )
    .await;
    mount_doc_status(&server, "x", 404).await;

    let store = JsonStore::new(dir.path());
    let config = test_config(&server, dir.path());
    let metadata = run_update(&config, &store, RunControl::new()).await.unwrap();

    assert_eq!(metadata.stats.not_found, 1);
    assert_eq!(metadata.not_found.sequences("x"), Some(&[5, 7][..]));

    let raw = raw_metadata(dir.path());
    assert_eq!(raw["not_found"], json!([["x", [5, 7]]]));
}

#[tokio::test]
async fn test_item_failure_is_fatal_and_still_checkpointed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_info(&server, 3).await;
    mount_changes(
        &server,
        0,
        json!([
            {"seq": 1, "id": "good"},
            {"seq": 2, "id": "bad"},
            {"seq": 3, "id": "later"}
        ]),
    )
    .await;
    mount_doc(&server, "good", json!({"repository": "https://github.com/a/good"})).await;
    mount_doc_status(&server, "bad", 500).await;
    mount_doc(&server, "later", json!({"repository": "https://github.com/a/later"})).await;

    let store = JsonStore::new(dir.path());
    let config = test_config(&server, dir.path());
    let err = run_update(&config, &store, RunControl::new()).await.unwrap_err();
    assert!(matches!(err, RegistryError::Status { status: 500, .. }));

    let (metadata, dataset) = stored(dir.path());
    assert!(metadata.error);
    assert_eq!(metadata.last_sequence, 1);
    assert_eq!(metadata.runs.count(RunStatus::Error), 1);
    assert!(dataset.contains_key("good"));
    assert!(!dataset.contains_key("later"));

    let raw = raw_metadata(dir.path());
    assert_eq!(raw["batch"]["status"], "error");
    assert!(raw["batch"]["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_poison_change_is_isolated_then_skipped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_info(&server, 3).await;
    mount_changes(
        &server,
        0,
        json!([
            {"seq": 1, "id": "good"},
            {"seq": 2, "id": "bad"},
            {"seq": 3, "id": "later"}
        ]),
    )
    .await;
    mount_changes(
        &server,
        1,
        json!([{"seq": 2, "id": "bad"}, {"seq": 3, "id": "later"}]),
    )
    .await;
    mount_changes(&server, 2, json!([{"seq": 3, "id": "later"}])).await;
    mount_doc(&server, "good", json!({"repository": "https://github.com/a/good"})).await;
    mount_doc_status(&server, "bad", 500).await;
    mount_doc(&server, "later", json!({"repository": "https://github.com/a/later"})).await;

    let store = JsonStore::new(dir.path());
    let config = test_config(&server, dir.path());

    // full batch fails on seq 2
    assert!(run_update(&config, &store, RunControl::new()).await.is_err());

    // narrowed to the single suspicious change, which fails again
    assert!(run_update(&config, &store, RunControl::new()).await.is_err());
    let (metadata, _) = stored(dir.path());
    assert_eq!(metadata.batch.as_ref().unwrap().limit, 1);
    assert_eq!(metadata.last_sequence, 1);

    // skipped, the run resumes after it
    let metadata = run_update(&config, &store, RunControl::new()).await.unwrap();
    assert_eq!(metadata.ignored, vec![2]);
    assert_eq!(metadata.stats.ignored, 1);
    assert_eq!(metadata.last_sequence, 3);
    assert!(!metadata.error);

    let (_, dataset) = stored(dir.path());
    assert!(dataset.contains_key("later"));
    assert!(!dataset.contains_key("bad"));
}

#[tokio::test]
async fn test_empty_batches_are_init_then_empty() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_info(&server, 0).await;

    let store = JsonStore::new(dir.path());
    let config = test_config(&server, dir.path());

    let first = run_update(&config, &store, RunControl::new()).await.unwrap();
    assert_eq!(first.runs.count(RunStatus::Init), 1);
    assert!(!first.error);

    let second = run_update(&config, &store, RunControl::new()).await.unwrap();
    assert_eq!(second.runs.count(RunStatus::Empty), 1);
    assert_eq!(second.runs.total, 2);
    assert!(!second.error);

    assert!(!dir.path().join("packages.json").exists());
    assert_eq!(raw_metadata(dir.path())["batch"]["status"], "empty");
}

#[tokio::test]
async fn test_batch_limit_resumes_where_it_stopped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_info(&server, 1_000).await;
    mount_changes(
        &server,
        0,
        json!([
            {"seq": 1, "id": "a", "deleted": true},
            {"seq": 2, "id": "b", "deleted": true},
            {"seq": 3, "id": "c", "deleted": true},
            {"seq": 4, "id": "d", "deleted": true}
        ]),
    )
    .await;
    mount_changes(
        &server,
        2,
        json!([
            {"seq": 3, "id": "c", "deleted": true},
            {"seq": 4, "id": "d", "deleted": true}
        ]),
    )
    .await;

    let store = JsonStore::new(dir.path());
    let mut config = test_config(&server, dir.path());
    config.batch.limit = 2;

    let first = run_update(&config, &store, RunControl::new()).await.unwrap();
    assert_eq!(first.last_sequence, 2);
    assert_eq!(first.latest_sequence, 1_000);
    assert_eq!(first.stats.deletes, 2);

    let second = run_update(&config, &store, RunControl::new()).await.unwrap();
    assert_eq!(second.last_sequence, 4);
    assert_eq!(second.latest_sequence, 1_000);
    assert_eq!(second.stats.deletes, 4);
    assert_eq!(second.runs.count(RunStatus::Ok), 2);
}

#[tokio::test]
async fn test_page_server_errors_are_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_info(&server, 1).await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/registry/_changes"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_changes(&server, 0, json!([{"seq": 1, "id": "a"}])).await;
    mount_doc(&server, "a", json!({"repository": "https://github.com/a/a"})).await;

    let store = JsonStore::new(dir.path());
    let config = test_config(&server, dir.path());
    let metadata = run_update(&config, &store, RunControl::new()).await.unwrap();

    assert_eq!(metadata.packages, 1);
    assert_eq!(metadata.runs.count(RunStatus::Ok), 1);
}
