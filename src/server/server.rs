use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::config::settings::SettingsConfig;
use crate::exchange::HttpExchangeClient;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::resilience::retry::RetrySettings;
use crate::resolver::CredentialResolver;
use crate::server::routes::token_router;
use crate::store::FileStore;

pub type ServedResolver = CredentialResolver<FileStore, HttpExchangeClient>;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub resolver: ServedResolver,
    pub retry: RetrySettings,
}

impl AppState {
    pub fn new(metrics: &Metrics, resolver: ServedResolver, retry: RetrySettings) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            resolver,
            retry,
        }
    }
}

pub async fn build_router(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .merge(token_router())
        .merge(state.metrics_state.router(&settings_config.metrics).await)
        .with_state(state)
}

/// Serve the token endpoints (and metrics when enabled) until ctrl-c.
pub async fn start(settings_config: &SettingsConfig, resolver: ServedResolver) -> Result<()> {
    let metrics = get_metrics().await;
    let retry = RetrySettings::from_config(settings_config.retry.as_ref());
    let state = AppState::new(metrics, resolver, retry);
    let app = build_router(settings_config, state).await;

    let bind_addr = &settings_config.server.host;
    let port = &settings_config.server.port;
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port))
        .await
        .with_context(|| format!("cannot bind {}:{}", bind_addr, port))?;
    info!("token server listening on {}:{}", bind_addr, port);

    metrics.up.set(1);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await;
    metrics.up.set(0);

    served.context("token server failed")
}
