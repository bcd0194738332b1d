//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * oauth client identity and endpoint urls
//!   * redirect uri shape (callback listener binds its path)
//!   * safety margin / retry / logging / metrics invariants
//!   * token store path

use tracing::{error, info};

use crate::config::oauth::OAuthConfig;
use crate::config::service::{ServiceConfig, StoreConfig};
use crate::config::settings::{RetryConfig, SettingsConfig};

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_oauth(&cfg.oauth, &mut errors);
    validate_store(&cfg.store, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &settings.retry {
        validate_retry("settings.retry", retry, errors);
    }

    // a margin of a day or more would refresh every token on every request
    if settings.safety_margin_seconds >= 60 * 60 * 24 {
        errors.push(format!(
            "settings.safety_margin_seconds ({}) is unreasonably large",
            settings.safety_margin_seconds
        ));
    }

    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port == 0 {
        errors.push("settings.server.port must be a valid port number, not 0".to_string());
    }

    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if let Some(attempts) = retry.attempts {
        if attempts == 0 {
            errors.push(format!("{}.attempts must be > 0", path));
        }
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "{}.max_delay_ms ({}) must be >= base_delay_ms ({})",
                path, max, base
            ));
        }
    }
}

/// OAUTH APPLICATION IDENTITY
fn validate_oauth(oauth: &OAuthConfig, errors: &mut Vec<String>) {
    if oauth.client_id.trim().is_empty() {
        errors.push("oauth.client_id must not be empty".to_string());
    }
    if oauth.client_secret.trim().is_empty() {
        errors.push("oauth.client_secret must not be empty".to_string());
    }

    for (field, value) in [
        ("oauth.base_url", &oauth.base_url),
        ("oauth.authorize_url", &oauth.authorize_url),
    ] {
        if !is_http_url(value) {
            errors.push(format!("{} '{}' must be an http(s) url", field, value));
        }
    }

    match reqwest::Url::parse(&oauth.redirect_uri) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            if url.path() == "/" {
                errors.push(format!(
                    "oauth.redirect_uri '{}' must include a callback path",
                    oauth.redirect_uri
                ));
            }
        }
        _ => errors.push(format!(
            "oauth.redirect_uri '{}' must be an http(s) url",
            oauth.redirect_uri
        )),
    }

    if oauth.api_version.trim().is_empty() {
        errors.push("oauth.api_version must not be empty".to_string());
    }
    if oauth.scopes.is_empty() {
        errors.push("oauth.scopes must include at least one scope".to_string());
    }
    if let Some(scope) = oauth.scopes.iter().find(|s| s.chars().any(char::is_whitespace)) {
        errors.push(format!("oauth.scopes entry '{}' must not contain whitespace", scope));
    }
    if oauth.timeout_ms == 0 {
        errors.push("oauth.timeout_ms must be > 0".to_string());
    }
}

fn validate_store(store: &StoreConfig, errors: &mut Vec<String>) {
    if store.path.trim().is_empty() {
        errors.push("store.path must not be empty".to_string());
    }
    if store.path.ends_with('/') {
        errors.push(format!("store.path '{}' must point to a file", store.path));
    }
}

fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}
