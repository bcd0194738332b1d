use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const BEARER_TOKEN_TYPE: &str = "Bearer";

/// Agency/company tier credential: the root every location token is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyCredential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    /// absolute instant, never a relative ttl
    pub expires_at: DateTime<Utc>,
    pub company_id: String,
    #[serde(default)]
    pub scope_set: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

/// Location (sub-account) tier credential. Upstream never issues a refresh token
/// for it, so it is re-derived from the company token once stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCredential {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub location_id: String,
    /// back-reference to the company the token was derived from
    pub company_id: String,
    #[serde(default)]
    pub scope_set: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

/// Either tier, tagged for status listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum CredentialRecord {
    Company(CompanyCredential),
    Location(LocationCredential),
}

pub trait Expiring {
    fn expires_at(&self) -> DateTime<Utc>;

    /// A token is usable as-is only while `now < expires_at - safety_margin`.
    fn is_fresh(&self, now: DateTime<Utc>, safety_margin: Duration) -> bool {
        self.expires_at()
            .checked_sub_signed(safety_margin)
            .is_some_and(|deadline| now < deadline)
    }

    fn seconds_left(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at() - now).num_seconds()
    }
}

impl Expiring for CompanyCredential {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Expiring for LocationCredential {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Expiring for CredentialRecord {
    fn expires_at(&self) -> DateTime<Utc> {
        match self {
            CredentialRecord::Company(c) => c.expires_at,
            CredentialRecord::Location(l) => l.expires_at,
        }
    }
}

impl CredentialRecord {
    pub fn access_token(&self) -> &str {
        match self {
            CredentialRecord::Company(c) => &c.access_token,
            CredentialRecord::Location(l) => &l.access_token,
        }
    }

    /// `company` or the location id
    pub fn label(&self) -> &str {
        match self {
            CredentialRecord::Company(_) => "company",
            CredentialRecord::Location(l) => &l.location_id,
        }
    }
}

/// Space separated OAuth `scope` string into an ordered set.
pub fn parse_scope_set(scope: Option<&str>) -> BTreeSet<String> {
    scope
        .map(|s| s.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

fn default_token_type() -> String {
    BEARER_TOKEN_TYPE.to_owned()
}
