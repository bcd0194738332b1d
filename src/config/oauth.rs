use std::fmt;

use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_API_VERSION, DEFAULT_AUTHORIZE_URL, DEFAULT_HTTP_TIMEOUT_MS,
    DEFAULT_REDIRECT_URI, DEFAULT_SCOPES, DEFAULT_USER_TYPE,
};

/// ================================
/// Upstream OAuth application identity
/// ================================
#[derive(Deserialize, Clone)]
pub struct OAuthConfig {
    /// token + locationToken endpoints live under this url
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// user-facing consent page
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// sent as `Version` header on every call
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_user_type")]
    pub user_type: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("base_url", &self.base_url)
            .field("authorize_url", &self.authorize_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("redirect_uri", &self.redirect_uri)
            .field("api_version", &self.api_version)
            .field("user_type", &self.user_type)
            .field("scopes", &self.scopes)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_authorize_url() -> String {
    DEFAULT_AUTHORIZE_URL.to_string()
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_user_type() -> String {
    DEFAULT_USER_TYPE.to_string()
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}
