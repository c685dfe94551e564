// Authentication types

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// How credentials travel on outbound requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// `Authorization: Bearer <token>` header (default)
    Bearer,

    /// Same-origin cookie kept by the HTTP client's cookie jar
    Cookie,

    /// Header and cookie together
    Both,
}

impl TransportMode {
    pub fn sends_header(self) -> bool {
        matches!(self, TransportMode::Bearer | TransportMode::Both)
    }
}

/// Tri-state session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not checked yet
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// Bearer credential as persisted by the credential store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Milliseconds since epoch, from the JWT `exp` claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Milliseconds since epoch
    pub created_at: i64,
}

impl Credential {
    /// Build a credential from a raw token, validating its shape and expiry
    pub fn from_token(token: impl Into<String>) -> crate::error::Result<Self> {
        let token = token.into();
        let expires_at = super::token::validate(&token)?;
        Ok(Self {
            token,
            refresh_token: None,
            expires_at,
            created_at: Utc::now().timestamp_millis(),
        })
    }

    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    /// Whether the stored expiry has passed
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| exp <= Utc::now().timestamp_millis())
            .unwrap_or(false)
    }

    /// Short token prefix for logs
    pub fn redacted(&self) -> String {
        redact(&self.token)
    }
}

pub(crate) fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}...", prefix)
}

/// `{success, data, message?, error?}` envelope used by every endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Login request body
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub passcode: &'a str,
}

/// `data` of a successful login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    #[serde(default, alias = "accessToken")]
    pub token: Option<String>,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `data` of a successful refresh
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshData {
    #[serde(default, rename = "accessToken", alias = "token")]
    pub access_token: Option<String>,
    #[serde(default, rename = "refreshToken", alias = "refresh_token")]
    pub refresh_token: Option<String>,
}
