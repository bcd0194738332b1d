pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::sync::Barrier;

use crate::config::oauth::OAuthConfig;
use crate::credentials::{CompanyCredential, LocationCredential};
use crate::error::StoreError;
use crate::exchange::{AuthError, ExchangeClient};
use crate::lifecycle::LifecycleManager;
use crate::store::{MemoryStore, PersistedState, TokenStore};

pub const COMPANY_ID: &str = "company_1";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// Unsigned JWT carrying `claims`; only the payload segment matters here.
pub fn fake_jwt(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

pub fn company_credential(access_token: &str, refresh_token: &str, expires_in: i64) -> CompanyCredential {
    let issued_at = Utc::now();
    CompanyCredential {
        access_token: access_token.to_owned(),
        refresh_token: refresh_token.to_owned(),
        token_type: "Bearer".to_owned(),
        issued_at,
        expires_at: issued_at + ChronoDuration::seconds(expires_in),
        company_id: COMPANY_ID.to_owned(),
        scope_set: Default::default(),
        user_type: Some("Company".to_owned()),
    }
}

pub fn location_credential(location_id: &str, access_token: &str, expires_in: i64) -> LocationCredential {
    let issued_at = Utc::now();
    LocationCredential {
        access_token: access_token.to_owned(),
        token_type: "Bearer".to_owned(),
        issued_at,
        expires_at: issued_at + ChronoDuration::seconds(expires_in),
        location_id: location_id.to_owned(),
        company_id: COMPANY_ID.to_owned(),
        scope_set: Default::default(),
        user_type: Some("Location".to_owned()),
    }
}

/// State with a company token valid for a day.
pub fn authorized_state() -> PersistedState {
    PersistedState {
        company: Some(company_credential("company-access-0", "company-refresh-0", 86_399)),
        ..Default::default()
    }
}

pub fn oauth_config(base_url: &str) -> OAuthConfig {
    OAuthConfig {
        base_url: base_url.to_owned(),
        authorize_url: "https://marketplace.example.com/oauth/chooselocation".to_owned(),
        client_id: "client-id".to_owned(),
        client_secret: "client-secret".to_owned(),
        redirect_uri: "http://localhost:8080/oauth/callback".to_owned(),
        api_version: "2021-07-28".to_owned(),
        user_type: "Company".to_owned(),
        scopes: vec!["contacts.readonly".to_owned(), "locations.readonly".to_owned()],
        timeout_ms: 2_000,
    }
}

pub type TestManager = LifecycleManager<Arc<MemoryStore>, Arc<FakeExchange>>;

pub fn manager_with(
    state: PersistedState,
    exchange: FakeExchange,
) -> (TestManager, Arc<MemoryStore>, Arc<FakeExchange>) {
    let store = Arc::new(MemoryStore::with_state(state.clone()));
    let exchange = Arc::new(exchange);
    let manager = LifecycleManager::with_state(
        Arc::clone(&store),
        Arc::clone(&exchange),
        ChronoDuration::seconds(60),
        state,
    );
    (manager, store, exchange)
}

/// Scripted exchange client counting every call.
pub struct FakeExchange {
    company_id: String,
    code_company_ids: Vec<String>,
    refresh_failure: Option<AuthError>,
    refresh_delay: Option<Duration>,
    derive_failure: Option<AuthError>,
    derive_delay: Option<Duration>,
    derive_gate: Option<Arc<Barrier>>,
    fixed_company_tokens: Option<(String, String)>,
    code_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    derive_calls: AtomicUsize,
    derive_bearers: Mutex<Vec<String>>,
}

impl Default for FakeExchange {
    fn default() -> Self {
        Self {
            company_id: COMPANY_ID.to_owned(),
            code_company_ids: Vec::new(),
            refresh_failure: None,
            refresh_delay: None,
            derive_failure: None,
            derive_delay: None,
            derive_gate: None,
            fixed_company_tokens: None,
            code_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            derive_calls: AtomicUsize::new(0),
            derive_bearers: Mutex::new(Vec::new()),
        }
    }
}

impl FakeExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_refresh(mut self, err: AuthError) -> Self {
        self.refresh_failure = Some(err);
        self
    }

    pub fn failing_derive(mut self, err: AuthError) -> Self {
        self.derive_failure = Some(err);
        self
    }

    pub fn slow_refresh(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    /// The n-th code exchange installs `company_ids[n - 1]` instead of the default company.
    pub fn code_company_ids(mut self, company_ids: &[&str]) -> Self {
        self.code_company_ids = company_ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn slow_derive(mut self, delay: Duration) -> Self {
        self.derive_delay = Some(delay);
        self
    }

    /// Every derive waits on `gate` before answering.
    pub fn gated_derive(mut self, gate: Arc<Barrier>) -> Self {
        self.derive_gate = Some(gate);
        self
    }

    /// Refresh answers with these tokens instead of new ones.
    pub fn fixed_company_tokens(mut self, access_token: &str, refresh_token: &str) -> Self {
        self.fixed_company_tokens = Some((access_token.to_owned(), refresh_token.to_owned()));
        self
    }

    pub fn code_calls(&self) -> usize {
        self.code_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn derive_calls(&self) -> usize {
        self.derive_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.code_calls() + self.refresh_calls() + self.derive_calls()
    }

    /// Company tokens the derivations were authorized with, in call order.
    pub fn derive_bearers(&self) -> Vec<String> {
        self.derive_bearers.lock().unwrap().clone()
    }

    fn company(&self, n: usize) -> CompanyCredential {
        let (access, refresh) = self
            .fixed_company_tokens
            .clone()
            .unwrap_or_else(|| (format!("company-access-{}", n), format!("company-refresh-{}", n)));
        let mut credential = company_credential(&access, &refresh, 86_399);
        credential.company_id = self.company_id.clone();
        credential
    }
}

impl ExchangeClient for FakeExchange {
    async fn exchange_code(&self, _auth_code: &str, _redirect_uri: &str) -> Result<CompanyCredential, AuthError> {
        let n = self.code_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut credential = company_credential(
            &format!("company-code-access-{}", n),
            &format!("company-code-refresh-{}", n),
            86_399,
        );
        credential.company_id = self
            .code_company_ids
            .get(n - 1)
            .cloned()
            .unwrap_or_else(|| self.company_id.clone());
        Ok(credential)
    }

    async fn refresh_company(&self, _refresh_token: &str) -> Result<CompanyCredential, AuthError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.refresh_failure {
            return Err(err.clone());
        }
        Ok(self.company(n))
    }

    async fn derive_location(
        &self,
        company_access_token: &str,
        company_id: &str,
        location_id: &str,
    ) -> Result<LocationCredential, AuthError> {
        let n = self.derive_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.derive_bearers.lock().unwrap().push(company_access_token.to_owned());

        if let Some(gate) = &self.derive_gate {
            gate.wait().await;
        }
        if let Some(delay) = self.derive_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.derive_failure {
            return Err(err.clone());
        }

        let mut credential = location_credential(location_id, &format!("loc-{}-{}", location_id, n), 86_400);
        credential.company_id = company_id.to_owned();
        Ok(credential)
    }
}

/// Store whose saves always fail; loads return `state`.
pub struct BrokenStore {
    pub state: Option<PersistedState>,
    pub fail_load: bool,
    saves: AtomicUsize,
}

impl BrokenStore {
    pub fn new(state: Option<PersistedState>) -> Self {
        Self { state, fail_load: false, saves: AtomicUsize::new(0) }
    }

    pub fn unreadable() -> Self {
        Self { state: None, fail_load: true, saves: AtomicUsize::new(0) }
    }

    pub fn save_attempts(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl TokenStore for BrokenStore {
    async fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        if self.fail_load {
            return Err(StoreError::io(
                "/unreadable/tokens.json",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
            ));
        }
        Ok(self.state.clone())
    }

    async fn save(&self, _state: &PersistedState) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::io(
            "/read-only/tokens.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only file system"),
        ))
    }
}

pub fn build_reqwest_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}
