//! Credential storage and verification.

use super::secret::generate_secret;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

/// Default lifetime of an issued credential (15 minutes).
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(15 * 60);

/// Number of random bytes in a secret (hex-encoded to twice as many chars).
pub const SECRET_BYTES: usize = 16;

/// Upper bound for lifetimes that do not fit a `chrono::Duration`.
const MAX_TTL_DAYS: i64 = 365;

/// Errors from issuing credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A credential already exists for the request id.
    #[error("token already exists for request {0}")]
    AlreadyExists(String),

    /// The OS random source failed.
    #[error("cannot generate token: {0}")]
    SecretGeneration(#[from] rand::Error),
}

/// Reasons a listener is refused.
///
/// All variants map to the same "unauthorized" response; the distinction
/// only shows up in logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token was presented.
    #[error("client connected without authorization header")]
    MissingToken,

    /// No credential has been issued for the request id.
    #[error("no token found for request {0}")]
    UnknownRequest(String),

    /// The presented token does not match.
    #[error("client provided invalid token for request {0}")]
    InvalidToken(String),

    /// The credential has expired.
    #[error("client provided expired token for request {0}")]
    Expired(String),
}

/// A secret bound to one request id, valid until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl Credential {
    /// Creates a credential from its parts.
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// The secret a listener must present.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Expiry instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Expiry as unix seconds.
    pub fn expires_at_unix(&self) -> i64 {
        self.expires_at.timestamp()
    }

    /// Returns true once `now` is past the expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    fn matches(&self, presented: &str) -> bool {
        self.secret.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

/// Concurrent map of request id to credential.
pub struct CredentialStore {
    tokens: DashMap<String, Credential>,
    ttl: chrono::Duration,
}

impl CredentialStore {
    /// Creates an empty store whose credentials live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or_else(|_| chrono::Duration::days(MAX_TTL_DAYS));
        Self {
            tokens: DashMap::new(),
            ttl,
        }
    }

    /// Issues a fresh credential for `key`.
    ///
    /// Fails with [`CredentialError::AlreadyExists`] if one is already
    /// stored, expired or not; the existing credential stays valid.
    pub fn issue(&self, key: &str) -> Result<Credential, CredentialError> {
        let secret = generate_secret(SECRET_BYTES)?;
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let credential = Credential::new(secret, expires_at);

        self.insert(key, credential.clone())?;
        debug!(request_id = key, expires_at = %expires_at, "Issued stream token");
        Ok(credential)
    }

    /// Stores an existing credential for `key` unless one is present.
    pub fn insert(&self, key: &str, credential: Credential) -> Result<(), CredentialError> {
        match self.tokens.entry(key.to_string()) {
            Entry::Occupied(_) => Err(CredentialError::AlreadyExists(key.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(credential);
                Ok(())
            }
        }
    }

    /// Returns the credential for `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<Credential> {
        self.tokens.get(key).map(|c| c.clone())
    }

    /// Removes the credential for `key`.
    ///
    /// Returns true if a credential was removed, so callers can account for
    /// each release exactly once.
    pub fn revoke(&self, key: &str) -> bool {
        self.tokens.remove(key).is_some()
    }

    /// Checks a presented bearer token against the credential for `key`.
    pub fn verify(&self, key: &str, presented: Option<&str>) -> Result<(), AuthError> {
        let presented = presented
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let credential = self
            .lookup(key)
            .ok_or_else(|| AuthError::UnknownRequest(key.to_string()))?;

        if !credential.matches(presented) {
            return Err(AuthError::InvalidToken(key.to_string()));
        }
        if credential.is_expired_at(Utc::now()) {
            return Err(AuthError::Expired(key.to_string()));
        }
        Ok(())
    }

    /// Removes every expired credential. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// Removes credentials that are expired as of `now`.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .tokens
            .iter()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect();

        expired
            .iter()
            .filter(|key| {
                self.tokens
                    .remove_if(key.as_str(), |_, c| c.is_expired_at(now))
                    .is_some()
            })
            .count()
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if no credentials are stored.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL_TTL)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("tokens", &self.tokens.len())
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish()
    }
}
