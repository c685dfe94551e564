use anyhow::Context;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::refresh::{request_refresh, RefreshFailure, RefreshGate, RefreshOutcome};
use crate::auth::{Credential, CredentialStore, SessionState, SessionStatus, TransportMode};
use crate::error::{Result, SessionError};

/// Prefix shared by login, logout and refresh
const AUTH_PATH_PREFIX: &str = "/api/auth/";

/// HTTP client for the expense API with transparent session refresh
pub struct SessionHttpClient {
    /// Shared HTTP client with connection pooling and cookie jar
    client: Client,

    /// API origin, without a trailing slash
    base_url: String,

    /// How credentials are attached
    transport: TransportMode,

    /// Credential persistence
    store: CredentialStore,

    /// Session state shared with the session manager
    status: Arc<SessionStatus>,

    /// Single-flight refresh coordination
    gate: RefreshGate,
}

impl SessionHttpClient {
    /// Create a new HTTP client
    pub fn new(
        base_url: &str,
        transport: TransportMode,
        store: CredentialStore,
        status: Arc<SessionStatus>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            store,
            status,
            gate: RefreshGate::new(),
        })
    }

    /// Perform a request, refreshing the session once on 401.
    ///
    /// Any status other than an unrecoverable 401 is returned to the caller as is.
    /// Authentication endpoints never trigger a refresh.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let generation = self.gate.generation();
        let token = self.current_token();

        let response = self.send_once(&method, path, body, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED || is_auth_endpoint(path) {
            return Ok(response);
        }

        tracing::warn!(
            method = %method,
            path = path,
            "Received 401, refreshing session and retrying..."
        );

        if let Err(failure) = self
            .gate
            .refresh(generation, || self.refresh_session())
            .await
        {
            tracing::error!(path = path, reason = %failure, "Session refresh failed");
            return Err(SessionError::RefreshFailed(failure.0));
        }

        let token = self.current_token();
        let retried = self.send_once(&method, path, body, token.as_deref()).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::error!(
                method = %method,
                path = path,
                "Request still unauthorized after refresh"
            );
            return Err(SessionError::AuthExpired);
        }

        Ok(retried)
    }

    /// GET and decode the JSON body of a successful response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(Method::GET, path, None).await?;
        decode_json(path, response).await
    }

    /// POST a JSON body and decode the JSON body of a successful response
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)
            .with_context(|| format!("Failed to serialize request body for {}", path))?;
        let response = self.request(Method::POST, path, Some(&body)).await?;
        decode_json(path, response).await
    }

    /// Send a single request with the given token attached, no refresh handling
    pub(crate) async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = %method, url = %url, "Sending HTTP request");

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json");

        if self.transport.sends_header() {
            if let Some(token) = token {
                match HeaderValue::from_str(&format!("Bearer {}", token)) {
                    Ok(value) => builder = builder.header(AUTHORIZATION, value),
                    Err(_) => {
                        tracing::warn!("Stored token is not a valid header value, sending without it")
                    }
                }
            }
        }

        if let Some(body) = body {
            builder = builder.json(body);
        }

        match builder.send().await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), url = %url, "Received HTTP response");
                Ok(response)
            }
            Err(e) => {
                // Categorize the error for better debugging
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else if e.is_body() {
                    "body_error"
                } else if e.is_decode() {
                    "decode_error"
                } else {
                    "unknown"
                };

                tracing::warn!(
                    error_kind = error_kind,
                    error = %e,
                    url = %url,
                    "HTTP request error"
                );

                Err(SessionError::Network(format!(
                    "{} (kind: {})",
                    e, error_kind
                )))
            }
        }
    }

    /// Leader side of the refresh protocol
    async fn refresh_session(&self) -> RefreshOutcome {
        let epoch = self.status.epoch();
        // Read on its own: the access token may already have expired
        let refresh_token = if self.transport.sends_header() {
            self.store.refresh_token()
        } else {
            None
        };

        let data = match request_refresh(&self.client, &self.base_url, refresh_token.as_deref()).await {
            Ok(data) => data,
            Err(failure) => {
                self.end_session(epoch);
                return Err(failure);
            }
        };

        if self.status.epoch() != epoch {
            tracing::warn!("Session changed while refreshing, discarding refreshed token");
            return Err(RefreshFailure(
                "session changed during refresh".to_string(),
            ));
        }

        match data.access_token {
            Some(access_token) => {
                let rotated = data.refresh_token.or(refresh_token);
                let saved = Credential::from_token(access_token)
                    .map(|c| c.with_refresh_token(rotated))
                    .and_then(|c| self.store.save(&c));
                if let Err(e) = saved {
                    self.end_session(epoch);
                    return Err(RefreshFailure(format!(
                        "refreshed token rejected: {}",
                        e
                    )));
                }
            }
            None if self.transport.sends_header() => {
                self.end_session(epoch);
                return Err(RefreshFailure(
                    "refresh response carried no access token".to_string(),
                ));
            }
            // Cookie transport: the server renewed the cookie
            None => {}
        }

        self.status.set_if_current(epoch, SessionState::Authenticated);
        Ok(())
    }

    /// Forget the session after a failed refresh, unless a newer one replaced it
    fn end_session(&self, epoch: u64) {
        if self.status.epoch() != epoch {
            return;
        }
        self.store.clear();
        self.status
            .set_if_current(epoch, SessionState::Unauthenticated);
    }

    fn current_token(&self) -> Option<String> {
        self.store.load().map(|c| c.token)
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> TransportMode {
        self.transport
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn status(&self) -> &Arc<SessionStatus> {
        &self.status
    }

    pub fn gate(&self) -> &RefreshGate {
        &self.gate
    }
}

/// True for login, logout and refresh
pub fn is_auth_endpoint(path: &str) -> bool {
    path.starts_with(AUTH_PATH_PREFIX)
}

async fn decode_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SessionError::Network(format!("failed to read response body: {}", e)))?;

    if !status.is_success() {
        tracing::error!(
            status = status.as_u16(),
            path = path,
            "HTTP request failed with error response"
        );
        return Err(SessionError::from_status(status.as_u16(), &body));
    }

    serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse JSON response from {}", path))
        .map_err(SessionError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStorage;

    fn client_for(url: &str, transport: TransportMode) -> SessionHttpClient {
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        SessionHttpClient::new(url, transport, store, Arc::new(SessionStatus::new()), 5, 10)
            .unwrap()
    }

    #[test]
    fn test_is_auth_endpoint() {
        assert!(is_auth_endpoint("/api/auth/login"));
        assert!(is_auth_endpoint("/api/auth/logout"));
        assert!(is_auth_endpoint("/api/auth/refresh"));
        assert!(!is_auth_endpoint("/api/expenses"));
        assert!(!is_auth_endpoint("/api/authors"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = client_for("http://localhost:8787/", TransportMode::Bearer);
        assert_eq!(client.base_url(), "http://localhost:8787");
    }

    #[tokio::test]
    async fn test_network_error_does_not_refresh() {
        // Nothing listens on port 9 on a test machine
        let client = client_for("http://127.0.0.1:9", TransportMode::Bearer);
        let err = client
            .request(Method::GET, "/api/expenses", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Network(_)));
        assert_eq!(client.gate().generation(), 0);
    }

    #[tokio::test]
    async fn test_auth_endpoint_401_returned_as_is() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/auth/login")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/api/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server.url(), TransportMode::Bearer);
        let response = client
            .request(Method::POST, "/api/auth/login", None)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_cookie_mode_sends_no_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/payment-methods")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"success": true, "data": []}"#)
            .create_async()
            .await;

        let client = client_for(&server.url(), TransportMode::Cookie);
        let token = crate::auth::token::make_test_token(None);
        client
            .store()
            .save(&Credential::from_token(token).unwrap())
            .unwrap();

        let response = client
            .request(Method::GET, "/api/payment-methods", None)
            .await
            .unwrap();
        assert!(response.status().is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_json_maps_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/categories/all")
            .with_status(500)
            .with_body("database unavailable")
            .create_async()
            .await;

        let client = client_for(&server.url(), TransportMode::Bearer);
        let err = client
            .get_json::<Value>("/api/categories/all")
            .await
            .unwrap_err();
        match err {
            SessionError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "database unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_json_sends_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/expenses")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(serde_json::json!({"amount": 12.5})))
            .with_status(201)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let client = client_for(&server.url(), TransportMode::Bearer);
        let value: Value = client
            .post_json("/api/expenses", &serde_json::json!({"amount": 12.5}))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        mock.assert_async().await;
    }
}
