//! Stateless calls against the upstream OAuth endpoints.
//!
//! Nothing here caches or retries: every call is a single round-trip whose
//! outcome is either a credential record or an [`AuthError`].

pub mod http_client;
pub mod response;

use std::fmt;
use std::future::Future;

use serde_json::Value;
use crate::credentials::{CompanyCredential, LocationCredential};

pub use http_client::HttpExchangeClient;

pub trait ExchangeClient: Send + Sync {
    /// Initial grant: authorization code -> company credential.
    fn exchange_code(
        &self,
        auth_code: &str,
        redirect_uri: &str,
    ) -> impl Future<Output = Result<CompanyCredential, AuthError>> + Send;

    /// The returned record carries whatever refresh token upstream answered with.
    fn refresh_company(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<CompanyCredential, AuthError>> + Send;

    /// Company token -> location scoped token.
    fn derive_location(
        &self,
        company_access_token: &str,
        company_id: &str,
        location_id: &str,
    ) -> impl Future<Output = Result<LocationCredential, AuthError>> + Send;
}

impl<T: ExchangeClient> ExchangeClient for std::sync::Arc<T> {
    fn exchange_code(
        &self,
        auth_code: &str,
        redirect_uri: &str,
    ) -> impl Future<Output = Result<CompanyCredential, AuthError>> + Send {
        (**self).exchange_code(auth_code, redirect_uri)
    }

    fn refresh_company(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<CompanyCredential, AuthError>> + Send {
        (**self).refresh_company(refresh_token)
    }

    fn derive_location(
        &self,
        company_access_token: &str,
        company_id: &str,
        location_id: &str,
    ) -> impl Future<Output = Result<LocationCredential, AuthError>> + Send {
        (**self).derive_location(company_access_token, company_id, location_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    AuthorizationCode,
    Refresh,
    Derivation,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::AuthorizationCode => "authorization_code",
            ExchangeKind::Refresh => "refresh",
            ExchangeKind::Derivation => "derivation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// 4xx: bad grant, revoked token, unknown location, missing scope
    Rejected,
    /// 429
    RateLimited,
    /// 5xx
    Upstream,
    /// connect / timeout / broken body
    Network,
    /// 2xx whose body cannot be turned into a credential
    InvalidResponse,
}

impl AuthErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorKind::Rejected => "rejected",
            AuthErrorKind::RateLimited => "rate_limited",
            AuthErrorKind::Upstream => "upstream",
            AuthErrorKind::Network => "network",
            AuthErrorKind::InvalidResponse => "invalid_response",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub http_status: Option<u16>,
    pub body: String,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "{} (http {}): {}", self.kind, status, self.body),
            None => write!(f, "{}: {}", self.kind, self.body),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn new(kind: AuthErrorKind, http_status: Option<u16>, body: impl Into<String>) -> Self {
        Self { kind, http_status, body: body.into() }
    }

    /// Classify a non-2xx answer.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let kind = match status {
            429 => AuthErrorKind::RateLimited,
            500..=599 => AuthErrorKind::Upstream,
            _ => AuthErrorKind::Rejected,
        };
        Self::new(kind, Some(status), body)
    }

    pub fn network(err: impl fmt::Display) -> Self {
        Self::new(AuthErrorKind::Network, None, err.to_string())
    }

    pub fn invalid_response(http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InvalidResponse, http_status, message)
    }

    /// Worth asking again later; rejections and malformed answers are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            AuthErrorKind::Network | AuthErrorKind::RateLimited | AuthErrorKind::Upstream
        )
    }

    /// OAuth `error` code (`invalid_grant`, `invalid_client`, ...) from a JSON body.
    pub fn oauth_error(&self) -> Option<String> {
        serde_json::from_str::<Value>(&self.body)
            .ok()?
            .get("error")?
            .as_str()
            .map(str::to_owned)
    }
}
