//! Change cache recording and replay across runs

use crate::common::*;
use registry_repos::storage::JsonStore;
use registry_repos::{run_update, RunControl};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::MockServer;

async fn mount_four_changes(server: &MockServer) {
    mount_info(server, 4).await;
    mount_changes(
        server,
        0,
        json!([
            {"seq": 1, "id": "a"},
            {"seq": 2, "id": "b"},
            {"seq": 3, "id": "c"},
            {"seq": 4, "id": "d", "deleted": true}
        ]),
    )
    .await;
    mount_doc(
        server,
        "a",
        json!({
            "name": "a",
            "versions": {"1.0.0": {}},
            "repository": {"type": "git", "url": "git+https://github.com/x/a.git"}
        }),
    )
    .await;
    mount_doc(
        server,
        "b",
        json!({"name": "b", "repository": "https://gitlab.com/x/b"}),
    )
    .await;
    mount_doc(server, "c", json!({"name": "c", "readme": "no repository here"})).await;
}

#[tokio::test]
async fn test_cache_segment_holds_trimmed_changes() {
    let server = MockServer::start().await;
    let data = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    mount_four_changes(&server).await;

    let mut config = test_config(&server, data.path());
    config.cache.dir = Some(cache.path().to_path_buf());
    config.cache.write = true;

    let store = JsonStore::new(data.path());
    run_update(&config, &store, RunControl::new()).await.unwrap();

    let text = std::fs::read_to_string(cache.path().join("0.json")).unwrap();
    assert!(text.contains("\n\t{"), "segments are tab indented");

    let segment: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        segment,
        json!([
            {"seq": 1, "id": "a", "doc": {"repository": {"type": "git", "url": "git+https://github.com/x/a.git"}}},
            {"seq": 2, "id": "b", "doc": {"repository": "https://gitlab.com/x/b"}},
            {"seq": 3, "id": "c", "doc": {}},
            {"seq": 4, "id": "d", "deleted": true}
        ])
    );
}

#[tokio::test]
async fn test_replay_matches_live_run() {
    let server = MockServer::start().await;
    let live = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    mount_four_changes(&server).await;

    let mut config = test_config(&server, live.path());
    config.cache.dir = Some(cache.path().to_path_buf());
    config.cache.write = true;
    let live_metadata = run_update(&config, &JsonStore::new(live.path()), RunControl::new())
        .await
        .unwrap();

    // replay with the registry only answering the high-water mark
    server.reset().await;
    mount_info(&server, 4).await;

    let replay = TempDir::new().unwrap();
    let mut config = test_config(&server, replay.path());
    config.cache.dir = Some(cache.path().to_path_buf());
    config.cache.read = true;
    let replay_metadata = run_update(&config, &JsonStore::new(replay.path()), RunControl::new())
        .await
        .unwrap();

    let live_packages = std::fs::read(live.path().join("packages.json")).unwrap();
    let replay_packages = std::fs::read(replay.path().join("packages.json")).unwrap();
    assert_eq!(live_packages, replay_packages);

    assert_eq!(replay_metadata.packages, live_metadata.packages);
    assert_eq!(replay_metadata.last_sequence, live_metadata.last_sequence);
    assert_eq!(replay_metadata.latest_sequence, live_metadata.latest_sequence);
    assert_eq!(replay_metadata.repos, live_metadata.repos);
    assert_eq!(replay_metadata.stats, live_metadata.stats);
    assert_eq!(replay_metadata.runs, live_metadata.runs);

    // replayed changes are not cached a second time
    assert!(!cache.path().join("1.json").exists());
}

#[tokio::test]
async fn test_replay_then_follow_live_feed() {
    let server = MockServer::start().await;
    let data = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();

    std::fs::write(
        cache.path().join("0.json"),
        r#"[{"seq":1,"id":"a","doc":{"repository":"https://github.com/x/a"}},{"seq":2,"id":"b","doc":{}}]"#,
    )
    .unwrap();

    mount_info(&server, 3).await;
    mount_changes(&server, 2, json!([{"seq": 3, "id": "b"}])).await;
    mount_doc(&server, "b", json!({"repository": "https://gitlab.com/x/b"})).await;

    let mut config = test_config(&server, data.path());
    config.cache.dir = Some(cache.path().to_path_buf());
    config.cache.read = true;

    let metadata = run_update(&config, &JsonStore::new(data.path()), RunControl::new())
        .await
        .unwrap();

    assert_eq!(metadata.last_sequence, 3);
    assert_eq!(metadata.stats.changes, 3);
    assert_eq!(metadata.stats.inserts, 2);
    assert_eq!(metadata.stats.updates, 1);
    assert_eq!(metadata.repos.github, 1);
    assert_eq!(metadata.repos.gitlab, 1);
    assert_eq!(metadata.repos.unset, 0);

    let batch = metadata.batch.as_ref().unwrap();
    assert_eq!(batch.since, 2);
    assert_eq!(batch.found, 3);
}

#[tokio::test]
async fn test_unreadable_cache_falls_back_to_network() {
    let server = MockServer::start().await;
    let data = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    std::fs::write(cache.path().join("0.json"), "not json").unwrap();

    mount_info(&server, 1).await;
    mount_changes(&server, 0, json!([{"seq": 1, "id": "a"}])).await;
    mount_doc(&server, "a", json!({"repository": "https://github.com/x/a"})).await;

    let mut config = test_config(&server, data.path());
    config.cache.dir = Some(cache.path().to_path_buf());
    config.cache.read = true;

    let metadata = run_update(&config, &JsonStore::new(data.path()), RunControl::new())
        .await
        .unwrap();

    assert_eq!(metadata.packages, 1);
    assert_eq!(metadata.last_sequence, 1);
}
