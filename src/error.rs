//! Typed failures surfaced to token consumers.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::exchange::AuthError;

/// Everything `token_for` can fail with.
///
/// Cloneable because a single exchange result is shared between every caller
/// that joined the same in-flight refresh or derivation.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("no company credential on record; run the authorization flow first")]
    NotAuthenticated,

    #[error("authorization code exchange rejected: {0}")]
    AuthorizationFailed(AuthError),

    #[error("company token refresh rejected, re-authentication required: {0}")]
    RefreshFailed(AuthError),

    #[error("location token derivation for '{location_id}' rejected: {source}")]
    DerivationFailed {
        location_id: String,
        #[source]
        source: AuthError,
    },

    #[error("token store failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("transient failure talking to the token endpoint: {0}")]
    Transient(AuthError),

    #[error("token exchange task did not complete: {0}")]
    Aborted(String),

    #[error("company credential was replaced while the exchange was running")]
    Superseded,
}

impl TokenError {
    /// Only network-level and upstream-availability failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TokenError::Transient(_))
    }

    /// Caller has to run the authorization-code flow again.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            TokenError::NotAuthenticated
                | TokenError::AuthorizationFailed(_)
                | TokenError::RefreshFailed(_)
        )
    }

    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::NotAuthenticated => "not_authenticated",
            TokenError::AuthorizationFailed(_) => "authorization_failed",
            TokenError::RefreshFailed(_) => "refresh_failed",
            TokenError::DerivationFailed { .. } => "derivation_failed",
            TokenError::Persistence(_) => "persistence",
            TokenError::Transient(_) => "transient",
            TokenError::Aborted(_) => "aborted",
            TokenError::Superseded => "superseded",
        }
    }
}

/// Load/save failures of the token store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("token file '{path}' is not valid: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: Arc<serde_json::Error>,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source: Arc::new(source) }
    }

    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Corrupt { path: path.into(), source: Arc::new(source) }
    }
}
