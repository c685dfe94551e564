// Authentication module
// Manages the credential lifecycle, session state and single-flight refresh

mod credentials;
mod manager;
pub mod refresh;
mod state;
mod storage;
pub mod token;
mod types;

pub use credentials::{CredentialStore, LEGACY_STORAGE_KEY, REFRESH_STORAGE_KEY, STORAGE_KEY};
pub use manager::{SessionManager, SESSION_CHECK_PATH, LOGIN_PATH, LOGOUT_PATH};
pub use refresh::{RefreshFailure, RefreshGate, REFRESH_PATH};
pub use state::SessionStatus;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use types::{ApiEnvelope, Credential, SessionState, TransportMode};
