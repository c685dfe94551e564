// Token refresh logic
//
// `RefreshGate` is the single-flight coordinator: the first caller to need a
// refresh runs it, everyone arriving while it runs waits on a oneshot, and all
// of them get the same outcome. The waiter list is drained under the lock in
// the same step that returns the gate to idle.

use reqwest::Client;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

use super::types::{ApiEnvelope, RefreshData};
use crate::error::truncate_body;

/// Refresh endpoint path
pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Why a refresh did not produce a usable session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure(pub String);

impl std::fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub type RefreshOutcome = Result<(), RefreshFailure>;

/// Exchange the current session for a new access token.
///
/// Goes straight to the client so a 401 here can never recurse into another refresh.
pub async fn request_refresh(
    client: &Client,
    base_url: &str,
    refresh_token: Option<&str>,
) -> Result<RefreshData, RefreshFailure> {
    tracing::info!("Refreshing access token...");

    let url = format!("{}{}", base_url, REFRESH_PATH);
    let mut request = client
        .post(&url)
        .header(reqwest::header::ACCEPT, "application/json");
    if let Some(token) = refresh_token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| RefreshFailure(format!("refresh request failed: {}", e)))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        tracing::warn!(
            status = status.as_u16(),
            body = %truncate_body(&body),
            "Token refresh rejected"
        );
        return Err(RefreshFailure(format!(
            "refresh rejected with status {}",
            status.as_u16()
        )));
    }

    if body.trim().is_empty() {
        return Ok(RefreshData::default());
    }

    let envelope: ApiEnvelope<RefreshData> = serde_json::from_str(&body)
        .map_err(|e| RefreshFailure(format!("malformed refresh response: {}", e)))?;
    if !envelope.success {
        let reason = envelope
            .error
            .or(envelope.message)
            .unwrap_or_else(|| "server reported failure".to_string());
        return Err(RefreshFailure(format!("refresh rejected: {}", reason)));
    }

    tracing::info!("Access token refreshed");
    Ok(envelope.data.unwrap_or_default())
}

struct GateInner {
    /// Number of completed refreshes
    generation: u64,

    /// Outcome of the most recent completed refresh
    last: Option<RefreshOutcome>,

    /// `Some` while a refresh is in flight
    waiters: Option<Vec<oneshot::Sender<RefreshOutcome>>>,
}

/// Single-flight refresh coordinator
pub struct RefreshGate {
    inner: Mutex<GateInner>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GateInner {
                generation: 0,
                last: None,
                waiters: None,
            }),
        }
    }

    /// Generation to remember when sending a request
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().waiters.is_some()
    }

    /// Obtain a refresh outcome for a request sent under generation `seen`.
    ///
    /// Joins a refresh in flight, reuses the outcome of one that completed
    /// after `seen`, or runs `refresh` as the leader.
    pub async fn refresh<F, Fut>(&self, seen: u64, refresh: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome>,
    {
        let waiter = {
            let mut inner = self.lock();
            match inner.waiters.as_mut() {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    tracing::debug!(queued = waiters.len(), "Waiting on refresh in flight");
                    Some(rx)
                }
                None => {
                    if inner.generation != seen {
                        if let Some(outcome) = inner.last.clone() {
                            tracing::debug!("Reusing outcome of a completed refresh");
                            return outcome;
                        }
                    }
                    inner.waiters = Some(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return rx
                .await
                .unwrap_or_else(|_| Err(RefreshFailure("refresh abandoned".to_string())));
        }

        let mut leader = LeaderGuard {
            gate: self,
            finished: false,
        };
        let outcome = refresh().await;
        leader.finish(outcome.clone());
        outcome
    }

    fn complete(&self, outcome: RefreshOutcome) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.last = Some(outcome.clone());
        let waiters = inner.waiters.take().unwrap_or_default();
        tracing::debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "Refresh complete, releasing queue"
        );
        for waiter in waiters {
            // A waiter whose request was dropped is simply gone
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the queue even if the leader's future is dropped mid-refresh
struct LeaderGuard<'a> {
    gate: &'a RefreshGate,
    finished: bool,
}

impl LeaderGuard<'_> {
    fn finish(&mut self, outcome: RefreshOutcome) {
        self.finished = true;
        self.gate.complete(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Refresh leader dropped, failing queued requests");
            self.gate
                .complete(Err(RefreshFailure("refresh abandoned".to_string())));
        }
    }
}
