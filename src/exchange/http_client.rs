use std::time::Duration;

use chrono::Utc;
use http::header::ACCEPT;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::oauth::OAuthConfig;
use crate::credentials::{CompanyCredential, LocationCredential};
use crate::exchange::response::TokenResponse;
use crate::exchange::{AuthError, ExchangeClient, ExchangeKind};
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::utils::constants::{API_VERSION_HEADER, LOCATION_TOKEN_PATH, TOKEN_PATH};

/// reqwest implementation of the three upstream exchanges.
#[derive(Debug, Clone)]
pub struct HttpExchangeClient {
    client: Client,
    config: OAuthConfig,
}

impl HttpExchangeClient {
    pub fn new(config: OAuthConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: Client, config: OAuthConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// One form POST; any 2xx is success (locationToken answers 201).
    async fn post_form(
        &self,
        kind: ExchangeKind,
        path: &str,
        bearer: Option<&str>,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let metrics = get_metrics().await;
        let start = get_instant();
        metrics.exchange_requests.with_label_values(&[kind.as_str()]).inc();

        let mut request = self
            .client
            .post(self.url(path))
            .header(API_VERSION_HEADER, &self.config.api_version)
            .header(ACCEPT, "application/json")
            .form(form);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        debug!("exchange '{}' -> {}", kind.as_str(), path);
        let result = async {
            let response = request.send().await.map_err(AuthError::network)?;
            let status = response.status();
            let body = response.text().await.map_err(AuthError::network)?;
            if !status.is_success() {
                return Err(AuthError::from_status(status.as_u16(), body));
            }
            TokenResponse::parse(status.as_u16(), &body)
        }
        .await;

        metrics
            .exchange_duration
            .with_label_values(&[kind.as_str()])
            .observe(start.elapsed().as_secs_f64());

        result.inspect_err(|err| {
            warn!("exchange '{}' failed: {}", kind.as_str(), err);
            metrics
                .exchange_failures
                .with_label_values(&[kind.as_str(), err.kind.as_str()])
                .inc();
        })
    }
}

impl ExchangeClient for HttpExchangeClient {
    async fn exchange_code(
        &self,
        auth_code: &str,
        redirect_uri: &str,
    ) -> Result<CompanyCredential, AuthError> {
        let issued_at = Utc::now();
        let form = [
            ("grant_type", "authorization_code"),
            ("code", auth_code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("user_type", self.config.user_type.as_str()),
        ];
        let credential = self
            .post_form(ExchangeKind::AuthorizationCode, TOKEN_PATH, None, &form)
            .await?
            .into_company(issued_at, None)?;
        info!(company_id = %credential.company_id, expires_at = %credential.expires_at, "authorization code exchanged");
        Ok(credential)
    }

    async fn refresh_company(&self, refresh_token: &str) -> Result<CompanyCredential, AuthError> {
        let issued_at = Utc::now();
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("user_type", self.config.user_type.as_str()),
        ];
        let credential = self
            .post_form(ExchangeKind::Refresh, TOKEN_PATH, None, &form)
            .await?
            .into_company(issued_at, Some(refresh_token))?;
        info!(company_id = %credential.company_id, expires_at = %credential.expires_at, "company token refreshed");
        Ok(credential)
    }

    async fn derive_location(
        &self,
        company_access_token: &str,
        company_id: &str,
        location_id: &str,
    ) -> Result<LocationCredential, AuthError> {
        let issued_at = Utc::now();
        let form = [("companyId", company_id), ("locationId", location_id)];
        let credential = self
            .post_form(
                ExchangeKind::Derivation,
                LOCATION_TOKEN_PATH,
                Some(company_access_token),
                &form,
            )
            .await?
            .into_location(issued_at, company_id, location_id)?;
        info!(location_id = %location_id, expires_at = %credential.expires_at, "location token derived");
        Ok(credential)
    }
}
