//! # CRM Token Agent Library
//!
//! Two-tier OAuth credential management: one company token obtained through
//! the authorization-code flow, and per-location tokens derived from it on
//! demand. Tokens are cached, refreshed lazily and persisted across restarts.
//!
//! Modules:
//! - `config`: service configuration, loading and validation
//! - `credentials`: company/location credential records
//! - `store`: persistence of the credential state
//! - `exchange`: stateless calls against the OAuth endpoints
//! - `lifecycle`: cache, refresh/derivation and single-flight coordination
//! - `resolver`: `token_for(scope)` entry point for tool-call code
//! - `authorize`: consent URL and redirect listener
//! - `server`: HTTP surface over the resolver

pub mod authorize;
pub mod config;
pub mod credentials;
pub mod error;
pub mod exchange;
pub mod helpers;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod resolver;
pub mod server;
pub mod store;
pub mod tests;
pub mod utils;

pub use crate::config::service::ServiceConfig;
pub use crate::error::{StoreError, TokenError};
pub use crate::lifecycle::LifecycleManager;
pub use crate::resolver::{CredentialResolver, TokenScope};
