//! # Treasury Example
//!
//! A small treasury client demonstrating RASCL request lifecycles.
//!
//! This example showcases:
//! - Naming endpoints with `#[derive(Endpoint)]`
//! - An in-process backend ([`Ledger`]) with latency and failure modes
//! - An auth-gated endpoint that waits for a login before calling
//! - A `reqwest` endpoint whose transport errors are classified
//!
//! ## Flow
//!
//! ```text
//! GET_BALANCE_ENQUEUE ─▶ (wait for LOGIN_SUCCESS)
//! LOGIN_REQUEST ─▶ LOGIN_SUCCESS "token-alice"
//!                ─▶ GET_BALANCE_REQUEST ["token-alice", "operating"]
//!                ─▶ GET_BALANCE_SUCCESS { account, balance }
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use treasury::{build, Ledger, Treasury};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let rascl = build(Arc::new(Ledger::sample()), "http://127.0.0.1:8080/rates")?;
//! let supervisor = rascl.start();
//!
//! let login = rascl.actions(Treasury::Login).ok_or_else(|| anyhow::anyhow!("no login"))?;
//! rascl.store().send(login.request(vec!["alice".into()])).await?;
//!
//! supervisor.stop().await?;
//! # Ok(())
//! # }
//! ```

use rascl_core::endpoint::ApiMap;
use rascl_core::error::{CallError, ConfigError};
use rascl_core::http::json_response;
use rascl_macros::Endpoint;
use rascl_runtime::{AuthGatedWorker, Rascl, RuntimeError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Endpoints of the treasury API
#[derive(Endpoint, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Treasury {
    /// Exchange a user name for a session token
    Login,
    /// Balance of one account; needs a token
    GetBalance,
    /// Recent transfers of one account
    ListTransfers,
    /// Exchange rates from a remote service
    FetchRates,
}

/// Session token handed out for `user`
#[must_use]
pub fn token_for(user: &str) -> String {
    format!("token-{user}")
}

#[derive(Debug, Default)]
struct Books {
    balances: HashMap<String, i64>,
    transfers: HashMap<String, Vec<Value>>,
    sessions: Vec<String>,
    maintenance: bool,
}

/// In-process stand-in for the treasury backend
///
/// Every call waits `latency` first, so overlapping requests can be
/// observed.
#[derive(Debug)]
pub struct Ledger {
    books: RwLock<Books>,
    latency: Duration,
}

impl Ledger {
    /// Empty ledger with the given latency
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self {
            books: RwLock::new(Books::default()),
            latency,
        }
    }

    /// Ledger with two accounts and a few transfers
    #[must_use]
    pub fn sample() -> Self {
        let mut books = Books::default();
        books.balances.insert("operating".to_string(), 125_000);
        books.balances.insert("payroll".to_string(), 48_200);
        books.transfers.insert(
            "operating".to_string(),
            vec![
                json!({"to": "payroll", "amount": 40_000}),
                json!({"to": "vendor-17", "amount": 2_150}),
            ],
        );
        Self {
            books: RwLock::new(books),
            latency: Duration::from_millis(25),
        }
    }

    /// Make transfer listings fail with 503
    pub async fn set_maintenance(&self, maintenance: bool) {
        self.books.write().await.maintenance = maintenance;
    }

    /// `login(user)` → token
    ///
    /// # Errors
    ///
    /// 400 when no user name is given.
    pub async fn login(&self, args: Vec<Value>) -> Result<Value, CallError> {
        tokio::time::sleep(self.latency).await;
        let user = arg_str(&args, 0).ok_or_else(|| CallError::http(400, "Bad Request"))?;
        let token = token_for(user);
        self.books.write().await.sessions.push(token.clone());
        Ok(Value::String(token))
    }

    /// `getBalance(token, account)` → `{ account, balance }`
    ///
    /// # Errors
    ///
    /// 401 for an unknown token, 404 for an unknown account.
    pub async fn get_balance(&self, args: Vec<Value>) -> Result<Value, CallError> {
        tokio::time::sleep(self.latency).await;
        let books = self.books.read().await;
        let authorized = arg_str(&args, 0).is_some_and(|token| books.sessions.iter().any(|s| s == token));
        if !authorized {
            return Err(CallError::http(401, "Unauthorized"));
        }
        let account = arg_str(&args, 1).unwrap_or_default();
        books
            .balances
            .get(account)
            .map(|balance| json!({"account": account, "balance": balance}))
            .ok_or_else(|| CallError::http(404, "Not Found"))
    }

    /// `listTransfers(account)` → transfers, newest last
    ///
    /// # Errors
    ///
    /// 503 while in maintenance, 400 without an account.
    pub async fn list_transfers(&self, args: Vec<Value>) -> Result<Value, CallError> {
        tokio::time::sleep(self.latency).await;
        let books = self.books.read().await;
        if books.maintenance {
            return Err(CallError::http(503, "Service Unavailable"));
        }
        let account = arg_str(&args, 0).ok_or_else(|| CallError::http(400, "Bad Request"))?;
        Ok(Value::Array(books.transfers.get(account).cloned().unwrap_or_default()))
    }
}

fn arg_str(args: &[Value], index: usize) -> Option<&str> {
    args.get(index).and_then(Value::as_str)
}

/// Register the treasury endpoints
///
/// `rates_url` is fetched with `reqwest` by [`Treasury::FetchRates`].
///
/// # Errors
///
/// Returns [`ConfigError`] if the endpoint names collide.
pub fn api_map(ledger: Arc<Ledger>, rates_url: impl Into<String>) -> Result<ApiMap, ConfigError> {
    let rates_url: Arc<str> = Arc::from(rates_url.into());
    // Rates service is internal; never route it through a system proxy
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .no_proxy()
        .build()
        .unwrap_or_default();

    let login = Arc::clone(&ledger);
    let balance = Arc::clone(&ledger);
    let transfers = ledger;

    ApiMap::builder()
        .endpoint(Treasury::Login, move |args: Vec<Value>| {
            let ledger = Arc::clone(&login);
            async move { ledger.login(args).await }
        })
        .endpoint(Treasury::GetBalance, move |args: Vec<Value>| {
            let ledger = Arc::clone(&balance);
            async move { ledger.get_balance(args).await }
        })
        .endpoint(Treasury::ListTransfers, move |args: Vec<Value>| {
            let ledger = Arc::clone(&transfers);
            async move { ledger.list_transfers(args).await }
        })
        .endpoint(Treasury::FetchRates, move |_args: Vec<Value>| {
            let client = client.clone();
            let url = Arc::clone(&rates_url);
            async move {
                let response = client.get(&*url).send().await?;
                json_response(response).await
            }
        })
        .build()
}

/// Build the treasury runtime: balance lookups wait for a login
///
/// # Errors
///
/// Returns [`RuntimeError`] if the API map or its overrides are invalid.
pub fn build(ledger: Arc<Ledger>, rates_url: impl Into<String>) -> Result<Rascl, RuntimeError> {
    let api = api_map(ledger, rates_url)?;
    Rascl::builder(api)
        .auth_gated(
            Treasury::GetBalance,
            AuthGatedWorker::from_endpoint(Treasury::Login.name()),
        )
        .build()
}
