/*
    notifier_flow.rs - GlobalNotifier against the in-memory engine

    Drives the multiplexer end to end: initial download, admission,
    per-store ordering, store removal, failures and destroy.
*/

use notifier_core::engine::{EngineError, MemoryEngine};
use notifier_core::notifier::{GlobalNotifier, NotifierError, NotifierState};
use notifier_core::test_utils::{
    test_notifier_config, wait_until, Drained, RecordingNotifierCallback, DEFAULT_TEST_TIMEOUT,
    SHORT_TEST_TIMEOUT,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn start(callback: RecordingNotifierCallback) -> (Arc<MemoryEngine>, Arc<RecordingNotifierCallback>, GlobalNotifier) {
    let engine = Arc::new(MemoryEngine::new("/data"));
    let callback = Arc::new(callback);
    let notifier = GlobalNotifier::create(test_notifier_config(), callback.clone(), engine.clone()).unwrap();
    notifier.start().unwrap();
    (engine, callback, notifier)
}

fn touch(engine: &MemoryEngine, path: &str, value: i64) {
    engine
        .commit(path, |tx| {
            tx.upsert("items", "counter", json!(value));
        })
        .unwrap();
}

#[tokio::test]
async fn test_download_complete_reported_once() {
    let (engine, callback, notifier) = start(RecordingNotifierCallback::admitting_all());
    assert_eq!(notifier.state(), NotifierState::Downloading);

    engine.complete_download();
    engine.complete_download();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || notifier.state() == NotifierState::Ready).await);

    tokio::time::sleep(SHORT_TEST_TIMEOUT).await;
    assert_eq!(callback.download_completions(), 1);
    assert!(callback.errors().is_empty());
    notifier.destroy();
}

#[tokio::test]
async fn test_commits_on_one_store_arrive_in_order() {
    let (engine, callback, notifier) = start(RecordingNotifierCallback::admitting_all());
    engine.complete_download();

    for value in 1..=3 {
        touch(&engine, "/tenant/a", value);
    }
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || callback.delivered().len() == 3).await);

    let expected: Vec<Drained> = [(None, 1), (Some(1), 2), (Some(2), 3)]
        .into_iter()
        .map(|(previous_version, version)| Drained {
            path: "/tenant/a".to_string(),
            previous_version,
            version,
        })
        .collect();
    assert_eq!(callback.delivered(), expected);
    notifier.destroy();
}

#[tokio::test]
async fn test_rejected_store_never_delivers() {
    let (engine, callback, notifier) = start(RecordingNotifierCallback::rejecting(&["/private"]));
    engine.complete_download();

    for value in 1..=3 {
        touch(&engine, "/private", value);
        touch(&engine, "/public", value);
    }
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || callback.delivered().len() == 3).await);
    tokio::time::sleep(SHORT_TEST_TIMEOUT).await;

    assert!(callback.delivered().iter().all(|n| n.path == "/public"));
    assert_eq!(callback.offered(), vec!["/private", "/public"]);
    notifier.destroy();
}

#[tokio::test]
async fn test_commits_during_download_wait_for_ready() {
    let (engine, callback, notifier) = start(RecordingNotifierCallback::admitting_all());

    touch(&engine, "/a", 1);
    touch(&engine, "/b", 1);
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || notifier.pending() == 2).await);
    assert!(callback.delivered().is_empty());

    engine.complete_download();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || callback.delivered().len() == 2).await);
    assert!(callback.delivered().iter().all(|n| n.previous_version.is_none()));
    assert_eq!(notifier.pending(), 0);
    notifier.destroy();
}

#[tokio::test]
async fn test_existing_stores_are_first_versions() {
    let engine = Arc::new(MemoryEngine::new("/data"));
    touch(&engine, "/a", 1);
    touch(&engine, "/a", 2);

    let callback = Arc::new(RecordingNotifierCallback::admitting_all());
    let notifier = GlobalNotifier::create(test_notifier_config(), callback.clone(), engine.clone()).unwrap();
    notifier.start().unwrap();
    engine.complete_download();

    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || callback.delivered().len() == 1).await);
    assert_eq!(
        callback.delivered()[0],
        Drained { path: "/a".to_string(), previous_version: None, version: 2 }
    );
    notifier.destroy();
}

#[tokio::test]
async fn test_removed_store_is_reconsidered() {
    let (engine, callback, notifier) = start(RecordingNotifierCallback::admitting_all());
    engine.complete_download();

    touch(&engine, "/a", 1);
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || callback.delivered().len() == 1).await);

    assert!(engine.remove_store("/a"));
    touch(&engine, "/a", 1);
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || callback.delivered().len() == 2).await);

    assert_eq!(callback.offered(), vec!["/a", "/a"]);
    assert_eq!(callback.delivered()[1].previous_version, None);
    notifier.destroy();
}

#[tokio::test]
async fn test_destroy_orphans_pending_notifications() {
    let (engine, callback, notifier) = start(RecordingNotifierCallback::admitting_all());
    touch(&engine, "/a", 1);
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || notifier.pending() == 1).await);

    assert!(notifier.destroy());
    notifier.stopped().await;
    assert_eq!(notifier.pending(), 0);
    assert!(notifier.next_changed_realm().is_none());

    engine.complete_download();
    tokio::time::sleep(SHORT_TEST_TIMEOUT).await;
    assert_eq!(callback.download_completions(), 0);
    assert!(callback.delivered().is_empty());
    assert_eq!(engine.watcher_count(), 0);
}

#[tokio::test]
async fn test_download_timeout() {
    let engine = Arc::new(MemoryEngine::new("/data"));
    let callback = Arc::new(RecordingNotifierCallback::admitting_all());
    let mut config = test_notifier_config();
    config.download_timeout = Some(Duration::from_millis(50));

    let notifier = GlobalNotifier::create(config, callback.clone(), engine.clone()).unwrap();
    notifier.start().unwrap();
    notifier.stopped().await;

    assert_eq!(notifier.state(), NotifierState::Errored);
    assert_eq!(callback.errors(), vec![NotifierError::DownloadTimeout(Duration::from_millis(50))]);
    assert_eq!(callback.errors()[0].system_code(), Some(110));
}

#[tokio::test]
async fn test_no_delivery_after_runtime_error() {
    let (engine, callback, notifier) = start(RecordingNotifierCallback::admitting_all());
    engine.complete_download();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || notifier.state() == NotifierState::Ready).await);

    engine.fail(EngineError::Internal("replica corrupted".to_string()));
    notifier.stopped().await;
    assert_eq!(notifier.state(), NotifierState::Errored);

    touch(&engine, "/a", 1);
    tokio::time::sleep(SHORT_TEST_TIMEOUT).await;
    assert!(callback.delivered().is_empty());
    assert_eq!(callback.errors().len(), 1);
}

#[tokio::test]
async fn test_independent_notifiers_share_an_engine() {
    let engine = Arc::new(MemoryEngine::new("/data"));
    let all = Arc::new(RecordingNotifierCallback::admitting_all());
    let some = Arc::new(RecordingNotifierCallback::rejecting(&["/a"]));

    let first = GlobalNotifier::create(test_notifier_config(), all.clone(), engine.clone()).unwrap();
    let second = GlobalNotifier::create(test_notifier_config(), some.clone(), engine.clone()).unwrap();
    first.start().unwrap();
    second.start().unwrap();
    assert_ne!(first.id(), second.id());

    engine.complete_download();
    touch(&engine, "/a", 1);
    touch(&engine, "/b", 1);

    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || all.delivered().len() == 2).await);
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || some.delivered().len() == 1).await);
    assert_eq!(some.delivered()[0].path, "/b");

    first.destroy();
    assert_eq!(engine.watcher_count(), 1);
    second.destroy();
    assert_eq!(engine.watcher_count(), 0);
}
