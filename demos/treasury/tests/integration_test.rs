//! Integration tests for the treasury example
//!
//! These tests run the full supervised runtime against the in-process
//! ledger.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use rascl_core::identifiers::Phase;
use rascl_runtime::require_auth;
use rascl_testing::EventRecorder;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_pending, assert_ready_ok, task};
use treasury::{build, token_for, Ledger, Treasury};

const WAIT: Duration = Duration::from_secs(5);
const CLOSED_PORT: &str = "http://127.0.0.1:9/rates";

#[tokio::test]
async fn test_balance_waits_for_login() {
    let rascl = build(Arc::new(Ledger::sample()), CLOSED_PORT).unwrap();
    let recorder = EventRecorder::start(rascl.store());
    let supervisor = rascl.start();
    let store = rascl.store();

    let mut gate = task::spawn(require_auth(
        store,
        |e| e.event_type == "LOGIN_SUCCESS",
        |s| s.get(Treasury::Login).and_then(|e| e.success.clone()),
    ));
    assert_pending!(gate.poll());

    let balance = rascl.actions(Treasury::GetBalance).unwrap();
    store.send(balance.enqueue(vec![json!("operating")])).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.count("GET_BALANCE_REQUEST"), 0);
    assert_pending!(gate.poll());

    let login = rascl.actions(Treasury::Login).unwrap();
    store.send(login.request(vec![json!("alice")])).await.unwrap();
    let done = recorder
        .wait_for(|e| e.event_type == "GET_BALANCE_SUCCESS", WAIT)
        .await
        .unwrap();

    assert!(gate.is_woken());
    assert_eq!(assert_ready_ok!(gate.poll()), json!(token_for("alice")));
    assert_eq!(done.payload.to_value().unwrap()["balance"], json!(125_000));

    let slot = store.state(|s| s.get(Treasury::GetBalance).cloned()).await.unwrap();
    assert_eq!(slot.request, Some(vec![json!("token-alice"), json!("operating")]));
    assert!(!slot.is_fetching);

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_maintenance_is_a_failure_and_unknown_account_a_mistake() {
    let ledger = Arc::new(Ledger::sample());
    let rascl = build(Arc::clone(&ledger), CLOSED_PORT).unwrap();
    let supervisor = rascl.start();
    let store = rascl.store();
    let transfers = rascl.actions(Treasury::ListTransfers).unwrap();
    let terminal = |e: &rascl_core::action::LifecycleEvent| {
        transfers.ids().phase_of(&e.event_type).is_some_and(Phase::is_terminal)
    };

    ledger.set_maintenance(true).await;
    let failed = store
        .send_and_wait_for(transfers.request(vec![json!("operating")]), terminal, WAIT)
        .await
        .unwrap();
    assert_eq!(failed.event_type, "LIST_TRANSFERS_FAILURE");

    ledger.set_maintenance(false).await;
    let missing = store
        .send_and_wait_for(transfers.request(vec![]), terminal, WAIT)
        .await
        .unwrap();
    assert_eq!(missing.event_type, "LIST_TRANSFERS_MISTAKE");

    // Mistake replaced the failure slot
    let slot = store.state(|s| s.get(Treasury::ListTransfers).cloned()).await.unwrap();
    assert!(slot.failure.is_none());
    assert_eq!(slot.mistake.unwrap().status, Some(400));

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_rates_service_is_offline() {
    let rascl = build(Arc::new(Ledger::sample()), CLOSED_PORT).unwrap();
    let supervisor = rascl.start();
    let rates = rascl.actions(Treasury::FetchRates).unwrap();

    let outcome = rascl
        .store()
        .send_and_wait_for(
            rates.request(vec![]),
            |e| rates.ids().phase_of(&e.event_type).is_some_and(Phase::is_terminal),
            WAIT,
        )
        .await
        .unwrap();

    assert_eq!(outcome.event_type, "FETCH_RATES_OFFLINE");
    assert!(outcome.error);

    supervisor.stop().await.unwrap();
}
