// Credential persistence with read-time re-validation
//
// The blob written to storage is XOR-ed with a fixed key and base64 encoded.
// That only keeps the token from being readable at a glance; anyone with the
// file and this source can recover it. It is not encryption.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;

use super::storage::Storage;
use super::token;
use super::types::Credential;
use crate::error::{Result, SessionError};

/// Current-format storage key
pub const STORAGE_KEY: &str = "secure_auth_data";

/// Refresh token, kept apart so it outlives an expired access token
pub const REFRESH_STORAGE_KEY: &str = "secure_refresh_token";

/// Plain-text token written by older clients
pub const LEGACY_STORAGE_KEY: &str = "auth_token";

const OBFUSCATION_KEY: &[u8] = b"expense-tracker-encryption-key-v1";

/// Validating credential store over any [`Storage`] backend
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Validate and persist a credential.
    ///
    /// On any failure the current-format entries are removed, so a rejected
    /// save never leaves an older credential behind.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let result = self.try_save(credential);
        if result.is_err() {
            self.remove_quietly(STORAGE_KEY);
            self.remove_quietly(REFRESH_STORAGE_KEY);
        }
        result
    }

    fn try_save(&self, credential: &Credential) -> Result<()> {
        token::validate(&credential.token)?;
        if credential.is_expired() {
            return Err(SessionError::InvalidCredential(
                "credential has expired".to_string(),
            ));
        }

        let json = serde_json::to_string(credential)
            .map_err(|e| SessionError::Internal(e.into()))?;
        self.storage
            .set(STORAGE_KEY, &obfuscate(&json))
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        let refresh_written = match &credential.refresh_token {
            Some(refresh_token) => self.storage.set(REFRESH_STORAGE_KEY, &obfuscate(refresh_token)),
            None => self.storage.remove(REFRESH_STORAGE_KEY),
        };
        refresh_written.map_err(|e| SessionError::Storage(e.to_string()))?;

        tracing::debug!(token = %credential.redacted(), "Stored credential");
        Ok(())
    }

    /// Read the stored credential if it is still valid.
    ///
    /// Expired or corrupted access entries are deleted and reported as absent.
    /// The refresh token survives that; only [`clear`](Self::clear) removes it.
    pub fn load(&self) -> Option<Credential> {
        let blob = match self.storage.get(STORAGE_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read credential storage");
                return None;
            }
        };

        let mut credential = match decode_blob(&blob) {
            Ok(credential) => credential,
            Err(reason) => {
                tracing::warn!(reason = %reason, "Stored credential is corrupted");
                self.remove_quietly(STORAGE_KEY);
                return None;
            }
        };

        if credential.is_expired() {
            tracing::warn!("Stored credential has expired");
            self.remove_quietly(STORAGE_KEY);
            return None;
        }

        if let Err(e) = token::validate(&credential.token) {
            tracing::warn!(error = %e, "Stored credential is invalid");
            self.remove_quietly(STORAGE_KEY);
            return None;
        }

        if let Some(refresh_token) = self.refresh_token() {
            credential.refresh_token = Some(refresh_token);
        }
        Some(credential)
    }

    /// Stored refresh token, independent of the access token's expiry
    pub fn refresh_token(&self) -> Option<String> {
        let blob = match self.storage.get(REFRESH_STORAGE_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read refresh token storage");
                return None;
            }
        };
        match deobfuscate(&blob) {
            Ok(refresh_token) if !refresh_token.is_empty() => Some(refresh_token),
            Ok(_) => None,
            Err(reason) => {
                tracing::warn!(reason = %reason, "Stored refresh token is corrupted");
                self.remove_quietly(REFRESH_STORAGE_KEY);
                None
            }
        }
    }

    /// Best credential to present when the server should identify the session:
    /// the access token while valid, otherwise the refresh token
    pub fn session_token(&self) -> Option<String> {
        self.load()
            .map(|credential| credential.token)
            .or_else(|| self.refresh_token())
    }

    /// Whether [`load`](Self::load) would return a credential
    pub fn has_valid(&self) -> bool {
        self.load().is_some()
    }

    /// Stored expiry (ms since epoch) without re-validating the token
    pub fn expires_at(&self) -> Option<i64> {
        let blob = self.storage.get(STORAGE_KEY).ok().flatten()?;
        decode_blob(&blob).ok()?.expires_at
    }

    /// Remove the credential and any legacy leftovers. Idempotent.
    pub fn clear(&self) {
        self.remove_quietly(STORAGE_KEY);
        self.remove_quietly(REFRESH_STORAGE_KEY);
        self.remove_quietly(LEGACY_STORAGE_KEY);
    }

    /// Upgrade a plain-text legacy token to the current format.
    ///
    /// Returns true only when a migration happened. Safe to call on every start.
    pub fn migrate_legacy(&self) -> bool {
        let legacy = match self.storage.get(LEGACY_STORAGE_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read legacy credential");
                return false;
            }
        };

        match self.storage.get(STORAGE_KEY) {
            Ok(None) => {}
            Ok(Some(_)) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read credential storage");
                return false;
            }
        }

        tracing::info!("Migrating legacy token to the current storage format");
        let migrated = Credential::from_token(legacy).and_then(|credential| self.save(&credential));
        match migrated {
            Ok(()) => {
                self.remove_quietly(LEGACY_STORAGE_KEY);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to migrate legacy token");
                false
            }
        }
    }

    fn remove_quietly(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            tracing::error!(key, error = %e, "Failed to remove credential entry");
        }
    }
}

fn xor_with_key(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .zip(OBFUSCATION_KEY.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

fn obfuscate(plain: &str) -> String {
    STANDARD.encode(xor_with_key(plain.as_bytes()))
}

fn deobfuscate(blob: &str) -> std::result::Result<String, String> {
    let bytes = STANDARD.decode(blob.trim()).map_err(|e| e.to_string())?;
    String::from_utf8(xor_with_key(&bytes)).map_err(|e| e.to_string())
}

fn decode_blob(blob: &str) -> std::result::Result<Credential, String> {
    let json = deobfuscate(blob)?;
    serde_json::from_str(&json).map_err(|e| e.to_string())
}
