//! First-time authorization: consent URL and the local redirect listener.

pub mod callback;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use reqwest::Url;

use crate::config::oauth::OAuthConfig;

pub use callback::{wait_for_code, CallbackError, CallbackParams};

/// Opaque value echoed back on the redirect; binds the callback to this run.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Consent page the user opens to grant the app access.
pub fn authorize_url(config: &OAuthConfig, state: &str) -> Result<Url> {
    let mut url = Url::parse(&config.authorize_url)
        .with_context(|| format!("invalid authorize url '{}'", config.authorize_url))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("client_id", &config.client_id)
        .append_pair("scope", &config.scopes.join(" "))
        .append_pair("state", state);
    Ok(url)
}
