//! Shared constants and invariants

pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_TOKEN_STORE_PATH: &str = "./config/tokens.json";

// Upstream API
pub const DEFAULT_API_BASE_URL: &str = "https://services.leadconnectorhq.com";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://marketplace.gohighlevel.com/oauth/chooselocation";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/oauth/callback";
pub const DEFAULT_API_VERSION: &str = "2021-07-28";
pub const DEFAULT_USER_TYPE: &str = "Company";
pub const API_VERSION_HEADER: &str = "Version";

pub const TOKEN_PATH: &str = "/oauth/token";
pub const LOCATION_TOKEN_PATH: &str = "/oauth/locationToken";

/// upstream omits expires_in on some location token responses
pub const DEFAULT_LOCATION_TOKEN_TTL_SECS: i64 = 86_400;

pub const DEFAULT_SCOPES: &[&str] = &[
    "contacts.readonly",
    "contacts.write",
    "conversations.readonly",
    "conversations.write",
    "conversations/message.readonly",
    "conversations/message.write",
    "locations.readonly",
    "opportunities.readonly",
    "opportunities.write",
    "calendars.readonly",
    "calendars.write",
    "calendars/events.readonly",
    "calendars/events.write",
    "forms.readonly",
    "forms.write",
];

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 2_000;
