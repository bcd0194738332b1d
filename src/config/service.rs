use serde::Deserialize;

use crate::config::{oauth::OAuthConfig, settings::SettingsConfig};
use crate::utils::constants::DEFAULT_TOKEN_STORE_PATH;


/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// ================================
/// Token persistence
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

fn default_store_path() -> String {
    DEFAULT_TOKEN_STORE_PATH.to_string()
}
