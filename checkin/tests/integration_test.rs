//! End-to-end check-in sessions running through the Store

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use std::sync::Arc;
use std::time::Duration;
use turnstile_checkin::console::Command;
use turnstile_checkin::feedback::{SinkEvent, RESET_MESSAGE};
use turnstile_checkin::session::{self, build_store};
use turnstile_checkin::{
    CheckOutcome, CheckinAction, CheckinEnvironment, CheckinState, CheckinStore, Config,
    FileKeyValueStore, InputSource, RecordingSink, ScanCooldown, StaticTicketSource, TicketCode,
    UsedTicketRepository, USED_TICKETS_KEY,
};
use turnstile_core::environment::Clock;
use turnstile_core::key_value::KeyValueStore;
use turnstile_runtime::retry::RetryPolicy;
use turnstile_testing::{
    manual_clock, test_clock, FailingKeyValueStore, InMemoryKeyValueStore, ManualClock,
};

const WAIT: Duration = Duration::from_secs(2);

struct Session {
    store: CheckinStore,
    sink: RecordingSink,
}

fn session_over(kv: Arc<dyn KeyValueStore>, clock: ManualClock, clear_after: Duration) -> Session {
    let sink = RecordingSink::new();
    let env = CheckinEnvironment::new(
        UsedTicketRepository::new(kv, RetryPolicy::none()),
        Arc::new(sink.clone()),
        Arc::new(clock),
    )
    .with_feedback_clear_after(clear_after);
    let store = build_store(CheckinState::new(ScanCooldown::default()), env);
    Session { store, sink }
}

async fn started(kv: Arc<dyn KeyValueStore>, codes: &[&str]) -> Session {
    let session = session_over(kv, manual_clock(), Duration::from_secs(60));
    session::start(&session.store, &StaticTicketSource::new(codes.iter().copied()))
        .await
        .unwrap();
    session
}

async fn check(store: &CheckinStore, action: CheckinAction) -> Option<CheckOutcome> {
    let _ = store.send(action).await.unwrap();
    store.state(|s| s.last_outcome.clone()).await
}

fn code(raw: &str) -> TicketCode {
    TicketCode::parse(raw).unwrap()
}

fn is_persist_result(action: &CheckinAction) -> bool {
    matches!(
        action,
        CheckinAction::UsedCodesPersisted { .. } | CheckinAction::PersistenceFailed { .. }
    )
}

#[tokio::test]
async fn concrete_scenario() {
    let kv = InMemoryKeyValueStore::new();
    let Session { store, .. } = started(Arc::new(kv.clone()), &["A1", "B2"]).await;

    assert_eq!(check(&store, CheckinAction::manual("A1")).await, Some(CheckOutcome::Valid(code("A1"))));
    assert_eq!(
        check(&store, CheckinAction::manual("A1")).await,
        Some(CheckOutcome::AlreadyUsed(code("A1")))
    );
    assert_eq!(check(&store, CheckinAction::manual("C3")).await, Some(CheckOutcome::Invalid(code("C3"))));
    assert_eq!(check(&store, CheckinAction::manual("")).await, Some(CheckOutcome::EmptyInput));

    store
        .send_and_wait_for(CheckinAction::ResetUsed, is_persist_result, WAIT)
        .await
        .unwrap();

    assert_eq!(check(&store, CheckinAction::manual("A1")).await, Some(CheckOutcome::Valid(code("A1"))));
}

#[tokio::test]
async fn redemption_survives_restart_and_reset_removes_key() {
    let kv = InMemoryKeyValueStore::new();

    let first = started(Arc::new(kv.clone()), &["A1", "B2"]).await;
    let persisted = first
        .store
        .send_and_wait_for(CheckinAction::manual("A1"), is_persist_result, WAIT)
        .await
        .unwrap();
    assert_eq!(
        persisted,
        CheckinAction::UsedCodesPersisted { count: 1, revision: 1 }
    );
    assert_eq!(kv.text(USED_TICKETS_KEY).as_deref(), Some(r#"["A1"]"#));

    let second = started(Arc::new(kv.clone()), &["A1", "B2"]).await;
    assert_eq!(
        check(&second.store, CheckinAction::manual("A1")).await,
        Some(CheckOutcome::AlreadyUsed(code("A1")))
    );

    second
        .store
        .send_and_wait_for(CheckinAction::ResetUsed, is_persist_result, WAIT)
        .await
        .unwrap();
    assert!(!kv.contains_key(USED_TICKETS_KEY));
}

#[tokio::test]
async fn persisted_list_keeps_redemption_order() {
    let kv = InMemoryKeyValueStore::new();
    let Session { store, .. } = started(Arc::new(kv.clone()), &["A1", "B2", "C3"]).await;

    for raw in ["C3", "A1"] {
        store
            .send_and_wait_for(CheckinAction::manual(raw), is_persist_result, WAIT)
            .await
            .unwrap();
    }

    assert_eq!(kv.text(USED_TICKETS_KEY).as_deref(), Some(r#"["C3","A1"]"#));
}

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().join("data"),
        ..Config::default()
    };

    let first = started(Arc::new(FileKeyValueStore::new(&config.data_dir)), &["A1"]).await;
    first
        .store
        .send_and_wait_for(CheckinAction::manual("A1"), is_persist_result, WAIT)
        .await
        .unwrap();
    drop(first);

    let second = started(Arc::new(FileKeyValueStore::new(&config.data_dir)), &["A1"]).await;
    assert_eq!(
        check(&second.store, CheckinAction::manual(" A1 ")).await,
        Some(CheckOutcome::AlreadyUsed(code("A1")))
    );
}

#[tokio::test]
async fn failing_store_still_redeems_once_and_reports_degraded() {
    let kv = FailingKeyValueStore::always_failing();
    let Session { store, .. } = started(Arc::new(kv.clone()), &["A1"]).await;

    let result = store
        .send_and_wait_for(CheckinAction::manual("A1"), is_persist_result, WAIT)
        .await
        .unwrap();
    assert!(matches!(result, CheckinAction::PersistenceFailed { .. }));

    assert_eq!(
        check(&store, CheckinAction::manual("A1")).await,
        Some(CheckOutcome::AlreadyUsed(code("A1")))
    );

    let report = store.state(|s| s.health_report(test_clock().now())).await;
    assert!(report.is_degraded());
    assert!(
        report
            .check("used_ticket_store")
            .unwrap()
            .status
            .is_degraded()
    );
    assert!(report.check("ticket_source").unwrap().status.is_healthy());
}

#[tokio::test]
async fn store_recovering_marks_persistence_healthy() {
    let kv = FailingKeyValueStore::wrapping(InMemoryKeyValueStore::new());
    let Session { store, .. } = started(Arc::new(kv.clone()), &["A1", "B2"]).await;

    kv.set_fail_writes(true);
    store
        .send_and_wait_for(CheckinAction::manual("A1"), is_persist_result, WAIT)
        .await
        .unwrap();
    assert!(store.state(|s| s.persistence.is_degraded()).await);

    kv.set_fail_writes(false);
    store
        .send_and_wait_for(CheckinAction::manual("B2"), is_persist_result, WAIT)
        .await
        .unwrap();
    assert!(!store.state(|s| s.persistence.is_degraded()).await);
    assert_eq!(kv.inner().text(USED_TICKETS_KEY).as_deref(), Some(r#"["A1","B2"]"#));
}

#[tokio::test]
async fn scans_inside_cooldown_are_dropped_but_manual_entries_are_not() {
    let clock = manual_clock();
    let session = session_over(
        Arc::new(InMemoryKeyValueStore::new()),
        clock.clone(),
        Duration::from_secs(60),
    );
    session::start(&session.store, &StaticTicketSource::new(["A1", "B2", "C3"]))
        .await
        .unwrap();
    let store = &session.store;

    assert_eq!(check(store, CheckinAction::scan("A1")).await, Some(CheckOutcome::Valid(code("A1"))));

    clock.advance(Duration::from_millis(300));
    assert_eq!(
        check(store, CheckinAction::scan("B2")).await,
        Some(CheckOutcome::Valid(code("A1"))),
        "scan inside the window must not reach the validator"
    );
    assert!(!store.state(|s| s.validator.is_used("B2")).await);

    assert_eq!(check(store, CheckinAction::manual("C3")).await, Some(CheckOutcome::Valid(code("C3"))));

    clock.advance(Duration::from_millis(1200));
    assert_eq!(check(store, CheckinAction::scan("B2")).await, Some(CheckOutcome::Valid(code("B2"))));
}

#[tokio::test]
async fn newer_banner_is_not_cleared_by_older_timer() {
    let session = session_over(
        Arc::new(InMemoryKeyValueStore::new()),
        manual_clock(),
        Duration::from_millis(80),
    );
    session::start(&session.store, &StaticTicketSource::new(["A1"]))
        .await
        .unwrap();
    let store = &session.store;
    let mut actions = store.subscribe_actions();

    let _ = store.send(CheckinAction::manual("C3")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    let _ = store.send(CheckinAction::manual("A1")).await.unwrap();

    // First timer fires for generation 1 while generation 2 is showing.
    loop {
        let action = tokio::time::timeout(WAIT, actions.recv()).await.unwrap().unwrap();
        if action == (CheckinAction::FeedbackExpired { generation: 1 }) {
            break;
        }
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
    let banner = store.state(|s| s.feedback.clone()).await.expect("banner still shown");
    assert_eq!(banner.message, "Ticket \"A1\" is VALID. Welcome!");

    // Second timer clears it.
    loop {
        let action = tokio::time::timeout(WAIT, actions.recv()).await.unwrap().unwrap();
        if action == (CheckinAction::FeedbackExpired { generation: 2 }) {
            break;
        }
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(store.state(|s| s.feedback.is_none()).await);
}

#[tokio::test]
async fn sink_sees_banners_and_reset_message() {
    let Session { store, sink } = started(Arc::new(InMemoryKeyValueStore::new()), &["A1"]).await;

    store
        .send_and_wait_for(CheckinAction::manual("A1"), is_persist_result, WAIT)
        .await
        .unwrap();
    store
        .send_and_wait_for(CheckinAction::ResetUsed, is_persist_result, WAIT)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let messages = sink.messages();
    assert!(messages.contains(&"Ticket \"A1\" is VALID. Welcome!".to_string()));
    assert!(messages.contains(&RESET_MESSAGE.to_string()));
    assert!(!sink.events().contains(&SinkEvent::Cleared));
}

#[tokio::test]
async fn concurrent_checks_of_one_code_admit_exactly_once() {
    let kv = InMemoryKeyValueStore::new();
    let Session { store, .. } = started(Arc::new(kv.clone()), &["A1"]).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let _ = store.send(CheckinAction::manual("A1")).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.state(|s| s.validator.used_count()).await, 1);
    assert_eq!(store.state(|s| s.persist_revision).await, 1);
}

#[tokio::test]
async fn scanned_command_text_is_checked_not_executed() {
    let kv = InMemoryKeyValueStore::new();
    let Session { store, .. } = started(Arc::new(kv.clone()), &["A1"]).await;
    store
        .send_and_wait_for(CheckinAction::manual("A1"), is_persist_result, WAIT)
        .await
        .unwrap();

    let action = Command::parse(":reset", InputSource::Scan).into_action().unwrap();
    assert_eq!(check(&store, action).await, Some(CheckOutcome::Invalid(code(":reset"))));

    assert!(store.state(|s| s.validator.is_used("A1")).await);
    assert_eq!(kv.text(USED_TICKETS_KEY).as_deref(), Some(r#"["A1"]"#));
}
