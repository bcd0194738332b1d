use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::TokenError;
use crate::resolver::TokenScope;
use crate::server::server::AppState;

#[derive(Debug, Serialize)]
pub struct TokenBody {
    pub access_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    #[serde(default)]
    pub force_refresh: bool,
}

pub fn token_router() -> Router<AppState> {
    Router::new()
        .route("/tokens/company", get(company_token))
        .route("/tokens/locations/{location_id}", get(location_token))
}

async fn company_token(State(state): State<AppState>) -> Response {
    resolve(&state, TokenScope::Company, false).await
}

async fn location_token(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
    Query(query): Query<LocationQuery>,
) -> Response {
    resolve(&state, TokenScope::Location(location_id), query.force_refresh).await
}

async fn resolve(state: &AppState, scope: TokenScope, force: bool) -> Response {
    let resolver = &state.resolver;
    let scope = &scope;
    let result = state
        .retry
        .run_with_retry(|| async move {
            if force {
                resolver.renew_token_for(scope).await
            } else {
                resolver.token_for(scope).await
            }
        })
        .await;
    match result {
        Ok(access_token) => Json(TokenBody { access_token }).into_response(),
        Err(err) => error_response(&err),
    }
}

pub fn status_for(err: &TokenError) -> StatusCode {
    match err {
        TokenError::NotAuthenticated
        | TokenError::AuthorizationFailed(_)
        | TokenError::RefreshFailed(_) => StatusCode::UNAUTHORIZED,
        TokenError::DerivationFailed { .. } => StatusCode::FORBIDDEN,
        TokenError::Transient(_) | TokenError::Superseded => StatusCode::SERVICE_UNAVAILABLE,
        TokenError::Persistence(_) | TokenError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &TokenError) -> Response {
    let body = json!({
        "error": err.reason(),
        "message": err.to_string(),
    });
    (status_for(err), Json(body)).into_response()
}
