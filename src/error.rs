// Error handling module
// Defines the session error taxonomy shared by the store, client and manager

use std::time::Duration;

use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors surfaced by the session subsystem
#[derive(Error, Debug)]
pub enum SessionError {
    /// No response at all (connect failure, timeout, broken body)
    #[error("Network error: {0}")]
    Network(String),

    /// 401 that survived a successful refresh and one resend
    #[error("Authentication expired")]
    AuthExpired,

    /// The refresh call itself failed; credentials have been cleared
    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    /// Login rejected or unusable
    #[error(transparent)]
    Login(#[from] LoginError),

    /// Token rejected at store time (malformed or expired)
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Non-success response from the expense API
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Credential storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Reasons a login attempt fails
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// 401/403 from the login endpoint
    #[error("{0}")]
    InvalidPasscode(String),

    /// 429 from the login endpoint
    #[error(
        "Too many login attempts. Please try again in {}.",
        cooldown_text(.retry_after_seconds)
    )]
    RateLimited { retry_after_seconds: u64 },

    /// Any other non-success status
    #[error("Login failed: {0}")]
    Rejected(String),

    /// 2xx but the body is not usable
    #[error("Login failed: malformed response ({0})")]
    Malformed(String),
}

impl LoginError {
    /// How long the login form should stay disabled, if at all
    pub fn cooldown(&self) -> Option<Duration> {
        match self {
            LoginError::RateLimited {
                retry_after_seconds,
            } => Some(Duration::from_secs(*retry_after_seconds)),
            _ => None,
        }
    }
}

impl SessionError {
    /// Build an API error from a status and a (possibly huge) body
    pub fn from_status(status: u16, body: &str) -> Self {
        SessionError::Api {
            status,
            message: truncate_body(body),
        }
    }

    /// True for errors that mean the user has to sign in again
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            SessionError::AuthExpired | SessionError::RefreshFailed(_)
        )
    }
}

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}... (truncated, {} total bytes)",
        &body[..end],
        body.len()
    )
}

fn cooldown_text(seconds: &u64) -> String {
    format_cooldown(*seconds)
}

/// Render a cooldown as "1 minute", "45 seconds", "2 minutes 5 seconds"
pub fn format_cooldown(seconds: u64) -> String {
    fn unit(n: u64, name: &str) -> String {
        if n == 1 {
            format!("1 {}", name)
        } else {
            format!("{} {}s", n, name)
        }
    }

    let minutes = seconds / 60;
    let rest = seconds % 60;
    match (minutes, rest) {
        (0, s) => unit(s, "second"),
        (m, 0) => unit(m, "minute"),
        (m, s) => format!("{} {}", unit(m, "minute"), unit(s, "second")),
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SessionError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = SessionError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 500 - boom");

        let err = SessionError::InvalidCredential("token expired".to_string());
        assert_eq!(err.to_string(), "Invalid credential: token expired");
    }

    #[test]
    fn test_rate_limited_message_mentions_minute() {
        let err = LoginError::RateLimited {
            retry_after_seconds: 60,
        };
        assert_eq!(
            err.to_string(),
            "Too many login attempts. Please try again in 1 minute."
        );
        assert_eq!(err.cooldown(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_login_error_is_transparent() {
        let err: SessionError = LoginError::InvalidPasscode("Invalid passcode".to_string()).into();
        assert_eq!(err.to_string(), "Invalid passcode");
        assert!(!err.requires_login());
    }

    #[test]
    fn test_cooldown_only_for_rate_limit() {
        assert_eq!(LoginError::Rejected("500".to_string()).cooldown(), None);
        assert_eq!(LoginError::Malformed("no token".to_string()).cooldown(), None);
    }

    #[test]
    fn test_format_cooldown() {
        assert_eq!(format_cooldown(1), "1 second");
        assert_eq!(format_cooldown(45), "45 seconds");
        assert_eq!(format_cooldown(60), "1 minute");
        assert_eq!(format_cooldown(90), "1 minute 30 seconds");
        assert_eq!(format_cooldown(120), "2 minutes");
        assert_eq!(format_cooldown(0), "0 seconds");
    }

    #[test]
    fn test_truncate_body() {
        let short = "short body";
        assert_eq!(truncate_body(short), short);

        let long = "x".repeat(600);
        let truncated = truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.ends_with("(truncated, 600 total bytes)"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let long = "é".repeat(400);
        let truncated = truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }

    #[test]
    fn test_requires_login() {
        assert!(SessionError::AuthExpired.requires_login());
        assert!(SessionError::RefreshFailed("401".to_string()).requires_login());
        assert!(!SessionError::Network("timeout".to_string()).requires_login());
    }
}
