mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockServer, API_TOKEN, EDGE_CONFIG_ID};
use edge_config_wrapper::{
    ApiWrapperOptions, CommitTracker, ConnectMode, Error, PendingCommit, PluggableStorage,
    RemoteStoreError, StorageWrapper,
};
use serde_json::json;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn api_wrapper(server: &MockServer, tracker: &Arc<CommitTracker>) -> StorageWrapper {
    StorageWrapper::api(
        ApiWrapperOptions::new(tracker.clone())
            .edge_config_id(EDGE_CONFIG_ID)
            .api_token(API_TOKEN)
            .edge_config_key("flags")
            .team_id("team_1")
            .api_url(&server.api_url()),
    )
}

#[tokio::test]
async fn test_full_cycle_commits_dataset() {
    let server = MockServer::start().await;
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    storage.connect().await.unwrap();
    assert!(storage.is_connected().await);
    assert_eq!(storage.get("key").await.unwrap(), None);

    assert!(storage.set("key", "value1").await.unwrap());
    assert_eq!(storage.get("key").await.unwrap(), Some("value1".into()));
    assert_eq!(
        storage.get_and_set("key", "value2").await.unwrap(),
        Some("value1".into())
    );
    assert_eq!(storage.get("key").await.unwrap(), Some("value2".into()));
    assert!(storage.del("key").await.unwrap());
    assert_eq!(storage.get("key").await.unwrap(), None);

    for expected in 1..=4 {
        assert_eq!(storage.increment("count1").await.unwrap(), expected);
    }
    for expected in 1..=3 {
        assert_eq!(storage.increment("count2").await.unwrap(), expected);
    }
    assert_eq!(storage.decrement("count1").await.unwrap(), 3);
    assert_eq!(storage.decrement("count2").await.unwrap(), 2);

    assert_eq!(
        storage.get_keys_by_prefix("c").await.unwrap(),
        strings(&["count1", "count2"])
    );
    assert_eq!(storage.get_keys_by_prefix("count2").await.unwrap(), strings(&["count2"]));
    // counters are not strings
    assert_eq!(
        storage.get_many(&strings(&["count1", "missing", "count2"])).await.unwrap(),
        vec![None, None, None]
    );

    assert!(storage.add_items("set", &strings(&["item1", "item2"])).await.unwrap());
    assert!(storage.add_items("set", &strings(&["item3"])).await.unwrap());
    assert_eq!(
        storage.get_set_items("set").await.unwrap(),
        strings(&["item1", "item2", "item3"])
    );
    assert!(storage.remove_items("set", &strings(&["item1", "item3"])).await.unwrap());
    assert!(!storage.set_contains("set", "item1").await.unwrap());
    assert!(storage.set_contains("set", "item2").await.unwrap());

    storage.disconnect().await.unwrap();
    assert_eq!(tracker.pending(), 1);
    tracker.settle().await.unwrap();

    assert_eq!(
        server.item("flags"),
        Some(json!({ "count1": 3, "count2": 2, "set": ["item2"] }))
    );
    assert_eq!(storage.snapshot().await, None);
    assert!(!storage.is_connected().await);
    assert_eq!(storage.get("count1").await.unwrap(), None);

    let requests = server.with(|s| s.requests.clone());
    assert_eq!(
        requests,
        vec![
            format!("GET {}/flags teamId=team_1", EDGE_CONFIG_ID),
            format!("PATCH {} teamId=team_1", EDGE_CONFIG_ID),
        ]
    );
}

#[tokio::test]
async fn test_upsert_request_body() {
    let server = MockServer::start().await;
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    storage.connect().await.unwrap();
    storage.set("SPLITIO.splits.till", "10").await.unwrap();
    storage.disconnect().await.unwrap();
    tracker.settle().await.unwrap();

    let patches = server.with(|s| s.patches.clone());
    assert_eq!(
        patches,
        vec![json!({
            "items": [{
                "operation": "upsert",
                "key": "flags",
                "value": { "SPLITIO.splits.till": "10" }
            }]
        })]
    );
}

#[tokio::test]
async fn test_connect_loads_existing_item() {
    let server = MockServer::start().await;
    server.with(|s| {
        s.items.insert(
            "flags".into(),
            json!({ "key": "v", "count1": 3, "set": ["a", "b"] }),
        )
    });
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    storage.connect().await.unwrap();
    assert_eq!(storage.get("key").await.unwrap(), Some("v".into()));
    assert_eq!(storage.increment("count1").await.unwrap(), 4);
    assert!(storage.set_contains("set", "b").await.unwrap());
}

#[tokio::test]
async fn test_increment_over_non_numeric_value() {
    let server = MockServer::start().await;
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    storage.connect().await.unwrap();
    storage.set("count", "not-a-number").await.unwrap();
    assert_eq!(storage.increment("count").await.unwrap(), 1);
}

#[tokio::test]
async fn test_increment_decrement_round_trip() {
    let server = MockServer::start().await;
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    storage.connect().await.unwrap();
    for _ in 0..7 {
        storage.increment("c").await.unwrap();
    }
    let mut last = None;
    for _ in 0..7 {
        last = Some(storage.decrement("c").await.unwrap());
    }
    assert_eq!(last, Some(0));
}

#[tokio::test]
async fn test_add_then_remove_items() {
    let server = MockServer::start().await;
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    storage.connect().await.unwrap();
    storage.add_items("set", &strings(&["a", "b"])).await.unwrap();
    storage.add_items("set", &strings(&["a", "b"])).await.unwrap();
    assert_eq!(storage.get_set_items("set").await.unwrap(), strings(&["a", "b"]));
    storage.remove_items("set", &strings(&["a"])).await.unwrap();
    assert_eq!(storage.get_set_items("set").await.unwrap(), strings(&["b"]));
    // removing from a missing set does not create it
    storage.remove_items("other", &strings(&["a"])).await.unwrap();
    assert!(storage.get_keys_by_prefix("other").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_failure_surfaces_status() {
    let server = MockServer::start().await;
    server.with(|s| s.fetch_status = Some(500));
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    let err = storage.connect().await.unwrap_err();
    assert!(matches!(
        err,
        Error::RemoteStore(RemoteStoreError::Status(500))
    ));
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let server = MockServer::start().await;
    let tracker = Arc::new(CommitTracker::new());
    let storage = StorageWrapper::api(
        ApiWrapperOptions::new(tracker.clone())
            .edge_config_id(EDGE_CONFIG_ID)
            .api_token("wrong")
            .edge_config_key("flags")
            .api_url(&server.api_url()),
    );

    assert!(matches!(
        storage.connect().await,
        Err(Error::RemoteStore(RemoteStoreError::Status(401)))
    ));
}

#[tokio::test]
async fn test_failed_upsert_settles_with_error() {
    let server = MockServer::start().await;
    server.with(|s| s.upsert_status = Some(500));
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    storage.connect().await.unwrap();
    storage.set("key", "value").await.unwrap();
    storage.disconnect().await.unwrap();

    assert!(matches!(
        tracker.settle().await,
        Err(Error::RemoteStore(RemoteStoreError::Status(500)))
    ));
    assert_eq!(server.item("flags"), None);
    assert_eq!(storage.get("key").await.unwrap(), None);
}

#[tokio::test]
async fn test_background_connect_eventually_loads() {
    let server = MockServer::start().await;
    server.with(|s| {
        s.items.insert("flags".into(), json!({ "key": "remote" }));
    });
    let tracker = Arc::new(CommitTracker::new());
    let storage = StorageWrapper::api(
        ApiWrapperOptions::new(tracker.clone())
            .edge_config_id(EDGE_CONFIG_ID)
            .api_token(API_TOKEN)
            .edge_config_key("flags")
            .api_url(&server.api_url())
            .connect_mode(ConnectMode::Background),
    );

    storage.connect().await.unwrap();
    assert!(storage.is_connected().await);

    let mut loaded = None;
    for _ in 0..100 {
        loaded = storage.get("key").await.unwrap();
        if loaded.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(loaded, Some("remote".into()));
}

#[tokio::test]
async fn test_closure_hook_receives_commit() {
    let server = MockServer::start().await;
    let commits: Arc<std::sync::Mutex<Vec<PendingCommit>>> = Arc::default();
    let sink = Arc::clone(&commits);
    let hook = move |commit: PendingCommit| sink.lock().unwrap().push(commit);

    let storage = StorageWrapper::api(
        ApiWrapperOptions::new(Arc::new(hook))
            .edge_config_id(EDGE_CONFIG_ID)
            .api_token(API_TOKEN)
            .edge_config_key("flags")
            .api_url(&server.api_url()),
    );

    storage.connect().await.unwrap();
    storage.set("key", "value").await.unwrap();
    storage.disconnect().await.unwrap();

    // nothing is sent until the host drives the commit
    assert!(server.with(|s| s.patches.is_empty()));
    let commit = commits.lock().unwrap().pop().unwrap();
    commit.await.unwrap();
    assert_eq!(server.item("flags"), Some(json!({ "key": "value" })));
}

// ── Failed connects never reach the remote item ─────────────

fn snapshot_item() -> serde_json::Value {
    json!({ "SPLITIO.splits.till": "100", "k": "v" })
}

#[tokio::test]
async fn test_failed_connect_leaves_wrapper_unset() {
    let server = MockServer::start().await;
    server.with(|s| {
        s.items.insert("flags".into(), snapshot_item());
        s.fetch_status = Some(503);
    });
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    assert!(matches!(
        storage.connect().await,
        Err(Error::RemoteStore(RemoteStoreError::Status(503)))
    ));
    assert!(!storage.is_connected().await);
    assert!(matches!(storage.set("x", "y").await, Err(Error::NotConnected)));
    assert!(matches!(storage.increment("c").await, Err(Error::NotConnected)));

    storage.disconnect().await.unwrap();
    assert_eq!(tracker.pending(), 0);
    tracker.settle().await.unwrap();
    assert!(server.with(|s| s.patches.is_empty()));
    assert_eq!(server.item("flags"), Some(snapshot_item()));
}

#[tokio::test]
async fn test_failed_reconnect_does_not_keep_previous_dataset() {
    let server = MockServer::start().await;
    server.with(|s| s.items.insert("flags".into(), snapshot_item()));
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    storage.connect().await.unwrap();
    assert_eq!(storage.get("k").await.unwrap(), Some("v".into()));

    server.with(|s| s.fetch_status = Some(500));
    assert!(storage.connect().await.is_err());
    assert!(!storage.is_connected().await);
    assert_eq!(storage.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn test_disconnect_without_connect_commits_nothing() {
    let server = MockServer::start().await;
    server.with(|s| s.items.insert("flags".into(), snapshot_item()));
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    storage.disconnect().await.unwrap();
    assert_eq!(tracker.pending(), 0);
    assert!(server.with(|s| s.requests.is_empty()));
    assert_eq!(server.item("flags"), Some(snapshot_item()));
}

#[tokio::test]
async fn test_repeated_disconnect_commits_once() {
    let server = MockServer::start().await;
    server.with(|s| s.items.insert("flags".into(), snapshot_item()));
    let tracker = Arc::new(CommitTracker::new());
    let storage = api_wrapper(&server, &tracker);

    storage.connect().await.unwrap();
    storage.set("k", "v2").await.unwrap();
    storage.disconnect().await.unwrap();
    tracker.settle().await.unwrap();

    storage.disconnect().await.unwrap();
    assert_eq!(tracker.pending(), 0);
    assert_eq!(server.with(|s| s.patches.len()), 1);
    assert_eq!(
        server.item("flags"),
        Some(json!({ "SPLITIO.splits.till": "100", "k": "v2" }))
    );
}

#[tokio::test]
async fn test_background_fetch_failure_unsets_dataset() {
    let server = MockServer::start().await;
    server.with(|s| {
        s.items.insert("flags".into(), snapshot_item());
        s.fetch_status = Some(500);
    });
    let tracker = Arc::new(CommitTracker::new());
    let storage = StorageWrapper::api(
        ApiWrapperOptions::new(tracker.clone())
            .edge_config_id(EDGE_CONFIG_ID)
            .api_token(API_TOKEN)
            .edge_config_key("flags")
            .api_url(&server.api_url())
            .connect_mode(ConnectMode::Background),
    );

    storage.connect().await.unwrap();
    let mut connected = true;
    for _ in 0..100 {
        connected = storage.is_connected().await;
        if !connected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!connected);
    assert!(matches!(storage.set("x", "y").await, Err(Error::NotConnected)));

    storage.disconnect().await.unwrap();
    assert_eq!(tracker.pending(), 0);
    assert!(server.with(|s| s.patches.is_empty()));
    assert_eq!(server.item("flags"), Some(snapshot_item()));
}

#[tokio::test]
async fn test_item_key_is_percent_encoded() {
    let server = MockServer::start().await;
    server.with(|s| s.items.insert("split flags".into(), json!({ "key": "v" })));
    let tracker = Arc::new(CommitTracker::new());
    let storage = StorageWrapper::api(
        ApiWrapperOptions::new(tracker.clone())
            .edge_config_id(EDGE_CONFIG_ID)
            .api_token(API_TOKEN)
            .edge_config_key("split flags")
            .api_url(&server.api_url()),
    );

    storage.connect().await.unwrap();
    assert_eq!(storage.get("key").await.unwrap(), Some("v".into()));
    assert_eq!(storage.item_key(), "split flags");

    let requests = server.with(|s| s.requests.clone());
    assert_eq!(requests, vec![format!("GET {}/split flags teamId=-", EDGE_CONFIG_ID)]);
}
