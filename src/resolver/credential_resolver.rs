use std::fmt;

use tracing::{debug, warn};

use crate::error::TokenError;
use crate::exchange::ExchangeClient;
use crate::lifecycle::LifecycleManager;
use crate::observability::metrics::get_metrics;
use crate::store::TokenStore;

/// Which token a tool call runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenScope {
    /// Agency-wide operations.
    Company,
    /// Sub-account operations for one location.
    Location(String),
    /// Caller-supplied token, used verbatim and never cached.
    Explicit(String),
}

impl TokenScope {
    /// Location when an id is given, company otherwise.
    pub fn from_location(location_id: Option<String>) -> Self {
        match location_id {
            Some(id) if !id.trim().is_empty() => TokenScope::Location(id),
            _ => TokenScope::Company,
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenScope::Company => write!(f, "company"),
            TokenScope::Location(id) => write!(f, "location:{}", id),
            TokenScope::Explicit(_) => write!(f, "explicit"),
        }
    }
}

/// Single entry point tool-call code uses to get a bearer token.
pub struct CredentialResolver<S, C> {
    manager: LifecycleManager<S, C>,
}

impl<S, C> Clone for CredentialResolver<S, C> {
    fn clone(&self) -> Self {
        Self { manager: self.manager.clone() }
    }
}

impl<S, C> CredentialResolver<S, C>
where
    S: TokenStore + 'static,
    C: ExchangeClient + 'static,
{
    pub fn new(manager: LifecycleManager<S, C>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &LifecycleManager<S, C> {
        &self.manager
    }

    pub async fn token_for(&self, scope: &TokenScope) -> Result<String, TokenError> {
        self.resolve(scope, false).await
    }

    /// Like `token_for`, but a location token is re-derived even when the
    /// cached one has not expired. Use after upstream rejected the token.
    pub async fn renew_token_for(&self, scope: &TokenScope) -> Result<String, TokenError> {
        self.resolve(scope, true).await
    }

    async fn resolve(&self, scope: &TokenScope, force: bool) -> Result<String, TokenError> {
        debug!(scope = %scope, force, "resolving token");
        let result = match scope {
            TokenScope::Explicit(token) => return Ok(token.clone()),
            TokenScope::Company => self.manager.get_company_token().await,
            TokenScope::Location(location_id) if force => {
                self.manager.renew_location_token(location_id).await
            }
            TokenScope::Location(location_id) => self.manager.get_location_token(location_id).await,
        };

        if let Err(err) = &result {
            warn!(scope = %scope, reason = err.reason(), "token resolution failed: {}", err);
            get_metrics()
                .await
                .resolve_failures
                .with_label_values(&[err.reason()])
                .inc();
        }
        result
    }
}
