//! Treasury example binary
//!
//! Walks one auth-gated lookup, one server fault and one unreachable remote
//! service through RASCL and prints the resulting state.
//!
//! `RATES_URL` overrides the exchange-rate endpoint (default: a closed local
//! port, which classifies as offline).

use anyhow::Context;
use rascl_core::action::LifecycleEvent;
use rascl_core::identifiers::Phase;
use rascl_runtime::metrics::MetricsServer;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use treasury::{build, Ledger, Treasury};

const WAIT: Duration = Duration::from_secs(10);

fn is_terminal_for(endpoint: Treasury) -> impl Fn(&LifecycleEvent) -> bool {
    let ids = rascl_core::identifiers::derive_identifiers(endpoint.name());
    move |event: &LifecycleEvent| ids.phase_of(&event.event_type).is_some_and(Phase::is_terminal)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treasury=debug,rascl_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut metrics = MetricsServer::new("127.0.0.1:9000".parse()?);
    metrics.start()?;

    println!("=== Treasury Example: RASCL request lifecycles ===\n");

    let rates_url = std::env::var("RATES_URL").unwrap_or_else(|_| "http://127.0.0.1:9/rates".to_string());
    let ledger = Arc::new(Ledger::sample());
    let rascl = build(Arc::clone(&ledger), rates_url)?;

    println!("Registered lifecycle types:");
    for (name, ids) in rascl.types() {
        println!("  {name}: {} .. {}", ids.enqueue, ids.offline);
    }

    let supervisor = rascl.start();
    tracing::info!(endpoints = ?supervisor.endpoints().collect::<Vec<_>>(), "Treasury runtime started");
    let store = rascl.store();
    let actions = |endpoint: Treasury| {
        rascl
            .actions(endpoint)
            .with_context(|| format!("endpoint {endpoint} is not registered"))
    };

    // Balance lookup parks until somebody logs in
    println!("\n>>> Enqueue: getBalance(operating)");
    store
        .send(actions(Treasury::GetBalance)?.enqueue(vec![json!("operating")]))
        .await?;
    let waiting = store.state(|s| s.get(Treasury::GetBalance).map(|e| e.is_fetching)).await;
    println!("getBalance waiting for login: {}", waiting.unwrap_or_default());

    println!("\n>>> Request: login(alice)");
    let balance_done = store.send_and_wait_for(
        actions(Treasury::Login)?.request(vec![json!("alice")]),
        is_terminal_for(Treasury::GetBalance),
        WAIT,
    );
    let balance = balance_done.await?;
    println!("{} {}", balance.event_type, serde_json::to_string(&balance.payload)?);

    println!("\n>>> Request: listTransfers(operating) during maintenance");
    ledger.set_maintenance(true).await;
    let transfers = store
        .send_and_wait_for(
            actions(Treasury::ListTransfers)?.request(vec![json!("operating")]),
            is_terminal_for(Treasury::ListTransfers),
            WAIT,
        )
        .await?;
    println!("{} {}", transfers.event_type, serde_json::to_string(&transfers.payload)?);

    println!("\n>>> Request: fetchRates()");
    let rates = store
        .send_and_wait_for(
            actions(Treasury::FetchRates)?.request(vec![]),
            is_terminal_for(Treasury::FetchRates),
            WAIT,
        )
        .await?;
    println!("{} {}", rates.event_type, serde_json::to_string(&rates.payload)?);

    let snapshot = store.snapshot().await;
    println!("\nFinal state:\n{}", serde_json::to_string_pretty(&snapshot)?);

    if let Some(text) = metrics.render() {
        println!("\nMetrics:\n{text}");
    }

    supervisor.stop().await?;
    println!("\n=== Shutdown complete ===");
    Ok(())
}
