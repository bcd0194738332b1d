use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::credentials::claims::company_id_from_token;
use crate::credentials::record::BEARER_TOKEN_TYPE;
use crate::credentials::{parse_scope_set, CompanyCredential, LocationCredential};
use crate::exchange::AuthError;
use crate::utils::constants::DEFAULT_LOCATION_TOKEN_TTL_SECS;

/// Body of `/oauth/token` and `/oauth/locationToken` answers.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default, rename = "userType")]
    pub user_type: Option<String>,
    /// string or number depending on the endpoint
    #[serde(default, rename = "companyId")]
    pub company_id: Option<Value>,
    #[serde(default, rename = "locationId")]
    pub location_id: Option<String>,
}

impl TokenResponse {
    pub fn parse(status: u16, body: &str) -> Result<Self, AuthError> {
        serde_json::from_str::<TokenResponse>(body)
            .map_err(|e| AuthError::invalid_response(Some(status), format!("unexpected token response: {}", e)))
            .and_then(|response| {
                if response.access_token.is_empty() {
                    Err(AuthError::invalid_response(Some(status), "token response carries an empty access_token"))
                } else {
                    Ok(response)
                }
            })
    }

    /// Company tier record. `sent_refresh_token` is carried over only when the
    /// answer omits a refresh token of its own.
    pub fn into_company(
        self,
        issued_at: DateTime<Utc>,
        sent_refresh_token: Option<&str>,
    ) -> Result<CompanyCredential, AuthError> {
        let expires_in = self
            .expires_in
            .ok_or_else(|| AuthError::invalid_response(None, "company token response has no expires_in"))?;

        let refresh_token = self
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| sent_refresh_token.map(str::to_owned))
            .ok_or_else(|| AuthError::invalid_response(None, "company token response has no refresh_token"))?;

        let company_id = company_id_from_token(&self.access_token)
            .or_else(|| self.response_company_id())
            .ok_or_else(|| AuthError::invalid_response(None, "company id is neither in the token claims nor in the response"))?;

        Ok(CompanyCredential {
            access_token: self.access_token,
            refresh_token,
            token_type: self.token_type.unwrap_or_else(|| BEARER_TOKEN_TYPE.to_owned()),
            issued_at,
            expires_at: expiry(issued_at, expires_in)?,
            company_id,
            scope_set: parse_scope_set(self.scope.as_deref()),
            user_type: self.user_type,
        })
    }

    pub fn into_location(
        self,
        issued_at: DateTime<Utc>,
        company_id: &str,
        location_id: &str,
    ) -> Result<LocationCredential, AuthError> {
        let expires_in = self.expires_in.unwrap_or(DEFAULT_LOCATION_TOKEN_TTL_SECS);

        Ok(LocationCredential {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(|| BEARER_TOKEN_TYPE.to_owned()),
            issued_at,
            expires_at: expiry(issued_at, expires_in)?,
            location_id: location_id.to_owned(),
            company_id: company_id.to_owned(),
            scope_set: parse_scope_set(self.scope.as_deref()),
            user_type: self.user_type,
        })
    }

    fn response_company_id(&self) -> Option<String> {
        match self.company_id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// `issued_at + expires_in`, rejecting negative or unrepresentable lifetimes.
fn expiry(issued_at: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, AuthError> {
    if expires_in < 0 {
        return Err(AuthError::invalid_response(None, format!("negative expires_in {}", expires_in)));
    }
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::invalid_response(None, format!("expires_in {} is out of range", expires_in)))
}
