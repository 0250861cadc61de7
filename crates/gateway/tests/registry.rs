//! Registry operations: creation, deletion and recovery from durable state.

mod common;

use serde_json::json;

use common::{eventually, wait_status, Harness, CALLBACK};
use sr_domain::status::SessionStatus;
use sr_gateway::runtime::{DeleteOutcome, NewSession, SessionError, SessionRegistry};
use sr_sessions::SessionRecord;
use sr_transport::mock::MockBehavior;
use sr_transport::TransportEvent;

fn request(id: &str) -> NewSession {
    NewSession {
        id: id.into(),
        callback_url: CALLBACK.into(),
        message_callback_url: None,
    }
}

// ── create ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_persists_record_and_rejects_duplicates() {
    let h = Harness::new(MockBehavior::default());
    h.create("s1", None).await;

    let record = h.state.store.load("s1").unwrap().unwrap();
    assert_eq!(record.callback_url, CALLBACK);
    assert!(!record.relay_messages);

    let err = h.registry().create(request("s1")).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyExists(id) if id == "s1"));
    assert_eq!(h.registry().len(), 1);
}

#[tokio::test]
async fn create_releases_its_id_lock() {
    let h = Harness::new(MockBehavior::default());
    h.create("s1", None).await;
    assert_eq!(h.registry().lock_entries(), 0);

    h.registry().create(request("s1")).await.unwrap_err();
    assert_eq!(h.registry().lock_entries(), 0);

    h.state
        .store
        .save("r1", &SessionRecord::new(CALLBACK, None))
        .unwrap();
    h.registry().recover().await.unwrap();
    assert_eq!(h.registry().lock_entries(), 0);
}

#[tokio::test]
async fn concurrent_creates_yield_one_session() {
    let h = Harness::new(MockBehavior::default());
    let (a, b) = tokio::join!(
        h.registry().create(request("s1")),
        h.registry().create(request("s1")),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_err() { a } else { b };
    assert!(matches!(loser, Err(SessionError::AlreadyExists(_))));
    h.client("s1").await;
    assert_eq!(h.transport.opened().len(), 1);
}

#[tokio::test]
async fn create_validates_input() {
    let h = Harness::new(MockBehavior::default());

    let err = h.registry().create(request("")).await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(m) if m == "id is required"));

    let mut no_callback = request("s1");
    no_callback.callback_url = "  ".into();
    let err = h.registry().create(no_callback).await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(m) if m == "callbackUrl is required"));

    let err = h.registry().create(request("../escape")).await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));
    assert!(h.registry().is_empty());
}

// ── delete ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_before_bring_up_settles_is_refused() {
    let h = Harness::new(MockBehavior::default());
    let handle = h.create("s1", None).await;
    wait_status(&handle, SessionStatus::Initialized).await;

    let err = h.registry().delete("s1").await.unwrap_err();
    assert!(matches!(err, SessionError::NotReadyForAction(_)));
    assert!(h.registry().get("s1").is_some());
    assert!(h.state.store.load("s1").unwrap().is_some());
}

#[tokio::test]
async fn delete_ready_session_destroys_transport_and_purges() {
    let h = Harness::new(MockBehavior {
        credentials: Some(json!({ "token": "abc" })),
        ..Default::default()
    });
    h.ready_session("s1", None).await;
    let client = h.client("s1").await;
    let credentials = h.registry().deps().credentials.clone();
    eventually(|| matches!(credentials.load("s1"), Ok(Some(_)))).await;

    let outcome = h.registry().delete("s1").await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Removed);
    assert!(client.is_destroyed());
    assert!(h.registry().get("s1").is_none());
    assert!(h.state.store.load("s1").unwrap().is_none());
    assert!(credentials.load("s1").unwrap().is_none());
}

#[tokio::test]
async fn delete_disconnected_session_skips_destroy() {
    let h = Harness::new(MockBehavior::default());
    let handle = h.ready_session("s1", None).await;
    let client = h.client("s1").await;
    client
        .emit(TransportEvent::Disconnected {
            reason: "LOGOUT".into(),
        })
        .await;
    wait_status(&handle, SessionStatus::Disconnected).await;

    assert_eq!(h.registry().delete("s1").await.unwrap(), DeleteOutcome::Removed);
    assert!(!client.is_destroyed());
    assert!(h.state.store.load("s1").unwrap().is_none());
}

#[tokio::test]
async fn failed_destroy_still_purges_and_frees_the_id() {
    let h = Harness::new(MockBehavior {
        fail_destroy: true,
        ..Default::default()
    });
    h.ready_session("s1", None).await;

    let err = h.registry().delete("s1").await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(_)));
    assert!(h.registry().get("s1").is_none());
    assert!(h.state.store.load("s1").unwrap().is_none());

    h.create("s1", None).await;
    eventually(|| h.transport.opened().len() == 2).await;
}

#[tokio::test]
async fn delete_of_unloaded_id_purges_leftovers() {
    let h = Harness::new(MockBehavior::default());
    h.state
        .store
        .save("ghost", &SessionRecord::new(CALLBACK, None))
        .unwrap();

    assert_eq!(h.registry().delete("ghost").await.unwrap(), DeleteOutcome::NotLoaded);
    assert!(h.state.store.load("ghost").unwrap().is_none());
    assert_eq!(h.registry().delete("ghost").await.unwrap(), DeleteOutcome::NotLoaded);
}

// ── recover ────────────────────────────────────────────────────────────

#[tokio::test]
async fn recovery_skips_unreadable_and_deleted_records() {
    let h = Harness::new(MockBehavior::default());
    let store = &h.state.store;

    let mut live = SessionRecord::new(CALLBACK, Some("http://hooks.test/m".into()));
    live.relay_messages = true;
    store.save("live", &live).unwrap();

    let mut gone = SessionRecord::new(CALLBACK, None);
    gone.deleted = true;
    store.save("gone", &gone).unwrap();

    std::fs::write(store.dir().join("bad.json"), "garbage").unwrap();

    let report = h.registry().recover().await.unwrap();
    assert_eq!(report.recovered, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(h.registry().ids(), vec!["live".to_string()]);

    let view = h.registry().get("live").unwrap().view();
    assert!(view.relay_messages);
    h.client("live").await;
    let opened = h.transport.opened();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].resume);
}

#[tokio::test]
async fn recovery_does_not_duplicate_live_sessions() {
    let h = Harness::new(MockBehavior::default());
    h.create("s1", None).await;

    let report = h.registry().recover().await.unwrap();
    assert_eq!(report.recovered, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(h.registry().len(), 1);
}

#[tokio::test]
async fn recovered_relay_flag_requires_a_url() {
    let h = Harness::new(MockBehavior::default());
    let mut record = SessionRecord::new(CALLBACK, None);
    record.relay_messages = true;
    h.state.store.save("s1", &record).unwrap();

    let registry = SessionRegistry::new(h.registry().deps().clone());
    registry.recover().await.unwrap();
    assert!(!registry.get("s1").unwrap().view().relay_messages);
    registry.shutdown().await;
}
