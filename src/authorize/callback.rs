use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use http::StatusCode;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Query string the consent page redirects back with.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("authorization denied: {error} ({description})")]
    Denied { error: String, description: String },

    #[error("state parameter does not match this authorization request")]
    StateMismatch,

    #[error("redirect carried neither a code nor an error")]
    MissingCode,

    #[error("no authorization redirect received in time")]
    Timeout,
}

impl CallbackError {
    /// Whether the authorization attempt is over. A stray or forged redirect
    /// is answered but the listener keeps waiting for the real one.
    pub fn ends_flow(&self) -> bool {
        matches!(self, CallbackError::Denied { .. } | CallbackError::Timeout)
    }
}

impl CallbackParams {
    /// Authorization code, once the redirect is known to answer our request.
    pub fn into_code(self, expected_state: &str) -> Result<String, CallbackError> {
        if self.state.as_deref() != Some(expected_state) {
            return Err(CallbackError::StateMismatch);
        }
        if let Some(error) = self.error {
            return Err(CallbackError::Denied {
                error,
                description: self.error_description.unwrap_or_default(),
            });
        }
        match self.code {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(CallbackError::MissingCode),
        }
    }
}

type Outcome = Result<String, CallbackError>;

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<String>,
    outcome: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

/// Listen on the redirect uri until a redirect answering `expected_state`
/// arrives and return its code.
pub async fn wait_for_code(redirect_uri: &str, expected_state: &str, timeout: Duration) -> Result<String> {
    let url = Url::parse(redirect_uri)
        .with_context(|| format!("invalid redirect uri '{}'", redirect_uri))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("redirect uri '{}' has no host", redirect_uri))?
        .to_owned();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("redirect uri '{}' has no port", redirect_uri))?;

    let (sender, receiver) = oneshot::channel::<Outcome>();
    let state = CallbackState {
        expected_state: Arc::new(expected_state.to_owned()),
        outcome: Arc::new(Mutex::new(Some(sender))),
    };
    let app = Router::new()
        .route(url.path(), get(handle_callback))
        .with_state(state);

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("cannot listen on {}:{}", host, port))?;
    info!("waiting for authorization redirect on {}", redirect_uri);

    let (shutdown, shutdown_signal) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_signal.await;
        });
        if let Err(e) = server.await {
            warn!("callback listener failed: {}", e);
        }
    });

    let outcome = tokio::time::timeout(timeout, receiver).await;
    let _ = shutdown.send(());

    match outcome {
        Ok(Ok(result)) => result.map_err(Into::into),
        Ok(Err(_)) => Err(anyhow!("callback listener stopped before a redirect arrived")),
        Err(_) => Err(CallbackError::Timeout.into()),
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<String>) {
    let outcome = params.into_code(&state.expected_state);
    let response = match &outcome {
        Ok(_) => (
            StatusCode::OK,
            Html(page("Authorization complete", "You can close this window.")),
        ),
        Err(err) => {
            warn!("authorization redirect rejected: {}", err);
            (StatusCode::BAD_REQUEST, Html(page("Authorization failed", &err.to_string())))
        }
    };

    let settled = match &outcome {
        Ok(_) => true,
        Err(err) => err.ends_flow(),
    };
    if settled {
        let sender = state
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(outcome);
        }
    }
    response
}

fn page(title: &str, message: &str) -> String {
    format!(
        "<!doctype html><html><head><title>{0}</title></head><body><h1>{0}</h1><p>{1}</p></body></html>",
        escape_html(title),
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '<' => "&lt;".to_owned(),
            '>' => "&gt;".to_owned(),
            '&' => "&amp;".to_owned(),
            '"' => "&quot;".to_owned(),
            '\'' => "&#39;".to_owned(),
            other => other.to_string(),
        })
        .collect()
}
