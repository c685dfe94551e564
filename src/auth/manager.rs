use chrono::Utc;
use reqwest::header::RETRY_AFTER;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

use super::state::SessionStatus;
use super::types::{ApiEnvelope, Credential, LoginData, LoginRequest, SessionState};
use crate::error::{LoginError, Result, SessionError};
use crate::http_client::SessionHttpClient;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// Cheap authenticated request used to check the session at startup
pub const SESSION_CHECK_PATH: &str = "/api/expenses?limit=1";

/// Cooldown applied when a 429 carries no retry hint
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Session manager
/// Owns the login/logout/check-auth lifecycle on top of the retrying client
pub struct SessionManager {
    http: Arc<SessionHttpClient>,
}

impl SessionManager {
    pub fn new(http: Arc<SessionHttpClient>) -> Self {
        Self { http }
    }

    /// Client for data requests made on behalf of this session
    pub fn http(&self) -> &Arc<SessionHttpClient> {
        &self.http
    }

    pub fn state(&self) -> SessionState {
        self.status().current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.status().subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.state() == SessionState::Unknown || self.status().is_checking()
    }

    /// Resolve the initial session state. Never fails; errors become `Unauthenticated`.
    pub async fn check_auth(&self) -> SessionState {
        let status = self.status();
        let _checking = CheckingGuard::start(status);
        let epoch = status.epoch();

        self.http.store().migrate_legacy();

        let state = match self.http.request(Method::GET, SESSION_CHECK_PATH, None).await {
            Ok(response) if response.status().is_success() => SessionState::Authenticated,
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Session check rejected");
                SessionState::Unauthenticated
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session check failed");
                SessionState::Unauthenticated
            }
        };

        status.set_if_current(epoch, state);
        status.current()
    }

    /// Exchange the passcode for a session.
    ///
    /// On any failure the credential store is left empty.
    pub async fn login(&self, passcode: &str) -> Result<()> {
        match self.try_login(passcode).await {
            Ok(()) => {
                self.status().transition(SessionState::Authenticated);
                tracing::info!("Login successful");
                Ok(())
            }
            Err(e) => {
                self.http.store().clear();
                self.status().transition(SessionState::Unauthenticated);
                tracing::warn!(error = %e, "Login failed");
                Err(e)
            }
        }
    }

    async fn try_login(&self, passcode: &str) -> Result<()> {
        let body = serde_json::to_value(LoginRequest { passcode })
            .map_err(|e| SessionError::Internal(e.into()))?;
        let response = self
            .http
            .request(Method::POST, LOGIN_PATH, Some(&body))
            .await?;

        let status = response.status();
        let retry_after_header = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response.text().await.unwrap_or_default();
        let parsed: Option<Value> = serde_json::from_str(&text).ok();

        match status.as_u16() {
            429 => {
                let retry_after_seconds = parsed
                    .as_ref()
                    .and_then(retry_after_from_body)
                    .or(retry_after_header)
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                return Err(LoginError::RateLimited {
                    retry_after_seconds,
                }
                .into());
            }
            401 | 403 => {
                let reason = parsed
                    .as_ref()
                    .and_then(server_reason)
                    .unwrap_or_else(|| "Invalid passcode".to_string());
                return Err(LoginError::InvalidPasscode(reason).into());
            }
            code if !status.is_success() => {
                let reason = parsed
                    .as_ref()
                    .and_then(server_reason)
                    .unwrap_or_else(|| format!("status {}", code));
                return Err(LoginError::Rejected(reason).into());
            }
            _ => {}
        }

        let envelope: ApiEnvelope<LoginData> = serde_json::from_str(&text)
            .map_err(|e| LoginError::Malformed(e.to_string()))?;
        if !envelope.success {
            let reason = envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| "server reported failure".to_string());
            return Err(LoginError::Malformed(reason).into());
        }
        let data = envelope
            .data
            .ok_or_else(|| LoginError::Malformed("missing data".to_string()))?;

        match data.token {
            Some(token) => {
                let credential = build_credential(token, data.refresh_token, data.expires_in)?;
                self.http.store().save(&credential)?;
            }
            None if self.http.transport().sends_header() => {
                return Err(LoginError::Malformed("missing token".to_string()).into());
            }
            // Cookie transport: the session lives in the cookie jar
            None => {}
        }

        Ok(())
    }

    /// End the session. The server is told best-effort; local state is always cleared.
    pub async fn logout(&self) {
        // An expired access token can't identify the session, the refresh token still can
        let token = self.http.store().session_token();
        match self
            .http
            .send_once(&Method::POST, LOGOUT_PATH, None, token.as_deref())
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Server session revoked");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Logout not acknowledged by server");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to notify server of logout");
            }
        }

        self.http.store().clear();
        self.status().transition(SessionState::Unauthenticated);
    }

    fn status(&self) -> &SessionStatus {
        self.http.status()
    }
}

/// Validate the login token, falling back to `expires_in` when it has no `exp`
fn build_credential(
    token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
) -> Result<Credential> {
    let mut credential = Credential::from_token(token)
        .map_err(|e| LoginError::Malformed(e.to_string()))?
        .with_refresh_token(refresh_token);
    if credential.expires_at.is_none() {
        if let Some(secs) = expires_in.filter(|s| *s > 0) {
            credential.expires_at = Some(Utc::now().timestamp_millis() + (secs as i64) * 1000);
        }
    }
    Ok(credential)
}

fn retry_after_from_body(body: &Value) -> Option<u64> {
    body.get("retry_after_seconds")
        .or_else(|| body.get("data").and_then(|d| d.get("retry_after_seconds")))
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.ceil() as u64)))
}

fn server_reason(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// Keeps `is_loading` true for the duration of a check, even if it is cancelled
struct CheckingGuard<'a>(&'a SessionStatus);

impl<'a> CheckingGuard<'a> {
    fn start(status: &'a SessionStatus) -> Self {
        status.set_checking(true);
        Self(status)
    }
}

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_checking(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::make_test_token;
    use serde_json::json;

    #[test]
    fn test_retry_after_from_body() {
        assert_eq!(
            retry_after_from_body(&json!({"retry_after_seconds": 60})),
            Some(60)
        );
        assert_eq!(
            retry_after_from_body(&json!({"data": {"retry_after_seconds": 30}})),
            Some(30)
        );
        assert_eq!(
            retry_after_from_body(&json!({"retry_after_seconds": 12.2})),
            Some(13)
        );
        assert_eq!(retry_after_from_body(&json!({"error": "slow down"})), None);
    }

    #[test]
    fn test_server_reason_prefers_error() {
        assert_eq!(
            server_reason(&json!({"error": "Invalid passcode", "message": "x"})).as_deref(),
            Some("Invalid passcode")
        );
        assert_eq!(
            server_reason(&json!({"message": "Nope"})).as_deref(),
            Some("Nope")
        );
        assert_eq!(server_reason(&json!({"success": false})), None);
    }

    #[test]
    fn test_build_credential_uses_expires_in_without_exp() {
        let before = Utc::now().timestamp_millis();
        let credential = build_credential(make_test_token(None), None, Some(3600)).unwrap();
        let expires_at = credential.expires_at.unwrap();
        assert!(expires_at >= before + 3_600_000);
    }

    #[test]
    fn test_build_credential_prefers_exp_claim() {
        let exp = Utc::now().timestamp() + 120;
        let credential =
            build_credential(make_test_token(Some(exp)), Some("r".to_string()), Some(3600))
                .unwrap();
        assert_eq!(credential.expires_at, Some(exp * 1000));
        assert_eq!(credential.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn test_build_credential_malformed_token_is_login_error() {
        let err = build_credential("opaque".to_string(), None, None).unwrap_err();
        assert!(matches!(err, SessionError::Login(LoginError::Malformed(_))));
    }
}
