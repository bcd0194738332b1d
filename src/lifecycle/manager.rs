use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::credentials::{CompanyCredential, Expiring, LocationCredential};
use crate::error::{StoreError, TokenError};
use crate::exchange::{AuthError, ExchangeClient};
use crate::helpers::time::now;
use crate::lifecycle::flight::{FlightKey, FlightResult, Flights};
use crate::observability::metrics::get_metrics;
use crate::store::{PersistedState, TokenStore};

static HIT_MSG: &str = "hit";
static MISS_MSG: &str = "miss";

/// A derivation whose company was replaced mid-flight is re-run at most this many times in total.
const MAX_DERIVE_ATTEMPTS: usize = 2;

/// Owns the authoritative in-memory credentials and decides, per request,
/// whether a cached token is usable, must be refreshed or must be derived.
///
/// Refresh is lazy: nothing happens until a token is asked for. Concurrent
/// requests for the same key share one upstream exchange.
pub struct LifecycleManager<S, C> {
    inner: Arc<Inner<S, C>>,
}

struct Inner<S, C> {
    store: S,
    client: C,
    safety_margin: Duration,
    state: RwLock<PersistedState>,
    /// bumped under the state write lock whenever the company credential is
    /// installed or removed; exchange results are only applied to the generation they started from
    company_generation: AtomicU64,
    flights: Arc<Flights>,
    /// serializes store writes so each save holds a consistent company + locations snapshot
    persist_lock: Mutex<()>,
}

impl<S, C> Clone for LifecycleManager<S, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S, C> LifecycleManager<S, C>
where
    S: TokenStore + 'static,
    C: ExchangeClient + 'static,
{
    /// Load whatever the store holds and start serving from it.
    pub async fn open(store: S, client: C, safety_margin: Duration) -> Result<Self, TokenError> {
        let state = match store.load().await {
            Ok(state) => state.unwrap_or_default(),
            Err(err) => {
                get_metrics().await.store_failures.with_label_values(&["load"]).inc();
                return Err(err.into());
            }
        };
        Ok(Self::with_state(store, client, safety_margin, state))
    }

    /// Start from `state` without reading the store.
    pub fn with_state(store: S, client: C, safety_margin: Duration, state: PersistedState) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                client,
                safety_margin,
                state: RwLock::new(state),
                company_generation: AtomicU64::new(0),
                flights: Flights::new(),
                persist_lock: Mutex::new(()),
            }),
        }
    }

    pub fn safety_margin(&self) -> Duration {
        self.inner.safety_margin
    }

    /// Valid company access token, refreshing first when stale.
    pub async fn get_company_token(&self) -> Result<String, TokenError> {
        if let Some(token) = self.cached_company_token().await? {
            return Ok(token);
        }
        self.fly(FlightKey::Company, self.clone().refresh_company_flight()).await
    }

    /// Valid token for one location, deriving a new one from the company token
    /// when missing or stale.
    pub async fn get_location_token(&self, location_id: &str) -> Result<String, TokenError> {
        if let Some(token) = self.cached_location_token(location_id).await {
            return Ok(token);
        }
        let key = FlightKey::Location(location_id.to_owned());
        self.fly(key, self.clone().derive_location_flight(location_id.to_owned(), false))
            .await
    }

    /// Derive a new token for `location_id` even if the cached one looks valid,
    /// e.g. after upstream rejected it. Joins a derivation already in flight.
    pub async fn renew_location_token(&self, location_id: &str) -> Result<String, TokenError> {
        info!(location_id = %location_id, "forced location token renewal");
        let key = FlightKey::Location(location_id.to_owned());
        self.fly(key, self.clone().derive_location_flight(location_id.to_owned(), true))
            .await
    }

    /// Install the company credential obtained from an authorization code.
    /// Location credentials derived for another company are dropped.
    pub async fn authorize_with_code(
        &self,
        auth_code: &str,
        redirect_uri: &str,
    ) -> Result<CompanyCredential, TokenError> {
        let credential = self
            .inner
            .client
            .exchange_code(auth_code, redirect_uri)
            .await
            .map_err(|err| classify(err, TokenError::AuthorizationFailed))?;

        {
            let mut state = self.inner.state.write().await;
            state
                .locations
                .retain(|_, location| location.company_id == credential.company_id);
            state.company = Some(credential.clone());
            self.inner.company_generation.fetch_add(1, Ordering::SeqCst);
            record_company_expiry(&credential).await;
            record_location_count(state.locations.len()).await;
        }
        info!(company_id = %credential.company_id, "company credential installed");

        self.persist().await?;
        Ok(credential)
    }

    /// Explicit de-authorization: forget the company credential and every
    /// location credential derived from it.
    pub async fn deauthorize(&self) -> Result<(), TokenError> {
        {
            let mut state = self.inner.state.write().await;
            *state = PersistedState::default();
            self.inner.company_generation.fetch_add(1, Ordering::SeqCst);
            record_location_count(0).await;
        }
        info!("all credentials removed");
        self.persist().await.map_err(Into::into)
    }

    /// Drop one cached location credential; the next request re-derives it.
    pub async fn evict_location(&self, location_id: &str) -> bool {
        let removed = {
            let mut state = self.inner.state.write().await;
            let removed = state.locations.remove(location_id).is_some();
            record_location_count(state.locations.len()).await;
            removed
        };
        if removed {
            debug!(location_id = %location_id, "location credential evicted");
            self.persist_quietly().await;
        }
        removed
    }

    /// Copy of the in-memory state.
    pub async fn snapshot(&self) -> PersistedState {
        self.inner.state.read().await.clone()
    }

    /// Save the current state now, surfacing store failures.
    pub async fn flush(&self) -> Result<(), TokenError> {
        self.persist().await.map_err(Into::into)
    }

    async fn fly<Fut>(&self, key: FlightKey, exchange: Fut) -> FlightResult
    where
        Fut: std::future::Future<Output = FlightResult> + Send + 'static,
    {
        let tier = key.tier();
        let (flight, joined) = self.inner.flights.join_or_start(key, exchange);
        if joined {
            get_metrics().await.flight_joins.with_label_values(&[tier]).inc();
        } else {
            debug!(tier, in_flight = self.inner.flights.in_flight(), "token exchange started");
        }
        flight.await
    }

    fn generation(&self) -> u64 {
        self.inner.company_generation.load(Ordering::SeqCst)
    }

    /// `Err(NotAuthenticated)` without a company credential, `Ok(None)` when stale.
    async fn cached_company_token(&self) -> Result<Option<String>, TokenError> {
        let state = self.inner.state.read().await;
        let company = state.company.as_ref().ok_or(TokenError::NotAuthenticated)?;
        let fresh = company.is_fresh(now(), self.inner.safety_margin);
        record_lookup("company", fresh).await;
        Ok(fresh.then(|| company.access_token.clone()))
    }

    async fn cached_location_token(&self, location_id: &str) -> Option<String> {
        let state = self.inner.state.read().await;
        let token = state
            .locations
            .get(location_id)
            .filter(|location| location.is_fresh(now(), self.inner.safety_margin))
            .map(|location| location.access_token.clone());
        record_lookup("location", token.is_some()).await;
        token
    }

    async fn refresh_company_flight(self) -> FlightResult {
        // another flight may have landed between the lookup and this start
        let (refresh_token, generation) = {
            let state = self.inner.state.read().await;
            let company = state.company.as_ref().ok_or(TokenError::NotAuthenticated)?;
            if company.is_fresh(now(), self.inner.safety_margin) {
                return Ok(company.access_token.clone());
            }
            (company.refresh_token.clone(), self.generation())
        };

        info!("company token stale, refreshing");
        let refreshed = self
            .inner
            .client
            .refresh_company(&refresh_token)
            .await
            .map_err(|err| classify(err, TokenError::RefreshFailed))
            .inspect_err(|err| error!("company token refresh failed: {}", err))?;

        let token = refreshed.access_token.clone();
        let installed = {
            let mut state = self.inner.state.write().await;
            if state.company.is_some() && self.generation() == generation {
                record_company_expiry(&refreshed).await;
                state.company = Some(refreshed);
                true
            } else {
                false
            }
        };

        if !installed {
            warn!("company credential changed while refreshing, discarding refreshed token");
            return self.cached_company_token().await?.ok_or(TokenError::Superseded);
        }
        self.persist_quietly().await;
        Ok(token)
    }

    async fn derive_location_flight(self, location_id: String, force: bool) -> FlightResult {
        if !force {
            if let Some(token) = self.cached_location_token(&location_id).await {
                return Ok(token);
            }
        }

        for attempt in 1..=MAX_DERIVE_ATTEMPTS {
            let generation = self.generation();
            let company_token = self.get_company_token().await?;
            let company_id = self
                .inner
                .state
                .read()
                .await
                .company
                .as_ref()
                .map(|company| company.company_id.clone())
                .ok_or(TokenError::NotAuthenticated)?;

            info!(location_id = %location_id, attempt, "deriving location token");
            let derived = self
                .inner
                .client
                .derive_location(&company_token, &company_id, &location_id)
                .await
                .map_err(|source| {
                    if source.is_transient() {
                        TokenError::Transient(source)
                    } else {
                        TokenError::DerivationFailed { location_id: location_id.clone(), source }
                    }
                })
                .inspect_err(|err| warn!("location token derivation failed: {}", err))?;

            let token = derived.access_token.clone();
            let installed = {
                let mut state = self.inner.state.write().await;
                let same_company = state
                    .company
                    .as_ref()
                    .is_some_and(|company| company.company_id == company_id);
                if same_company && self.generation() == generation {
                    record_location_expiry(&derived).await;
                    state.locations.insert(location_id.clone(), derived);
                    record_location_count(state.locations.len()).await;
                    true
                } else {
                    false
                }
            };

            if installed {
                self.persist_quietly().await;
                return Ok(token);
            }
            warn!(location_id = %location_id, "company credential changed while deriving, discarding location token");
        }

        // a company removed in the meantime surfaces as NotAuthenticated
        self.cached_company_token().await?;
        Err(TokenError::Superseded)
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let _guard = self.inner.persist_lock.lock().await;
        let snapshot = self.inner.state.read().await.clone();
        match self.inner.store.save(&snapshot).await {
            Ok(()) => Ok(()),
            Err(err) => {
                get_metrics().await.store_failures.with_label_values(&["save"]).inc();
                Err(err)
            }
        }
    }

    /// The exchange already succeeded; a failed save only costs the on-disk copy.
    async fn persist_quietly(&self) {
        if let Err(err) = self.persist().await {
            error!("persisting token state failed, keeping in-memory copy: {}", err);
        }
    }
}

/// Transient failures stay retryable; everything else becomes the terminal variant.
fn classify(err: AuthError, terminal: fn(AuthError) -> TokenError) -> TokenError {
    if err.is_transient() {
        TokenError::Transient(err)
    } else {
        terminal(err)
    }
}

async fn record_lookup(tier: &str, hit: bool) {
    get_metrics()
        .await
        .cache_lookups
        .with_label_values(&[tier, if hit { HIT_MSG } else { MISS_MSG }])
        .inc();
}

async fn record_company_expiry(company: &CompanyCredential) {
    get_metrics()
        .await
        .token_expiry_unix
        .with_label_values(&["company", company.company_id.as_str()])
        .set(company.expires_at.timestamp());
}

async fn record_location_expiry(location: &LocationCredential) {
    get_metrics()
        .await
        .token_expiry_unix
        .with_label_values(&["location", location.location_id.as_str()])
        .set(location.expires_at.timestamp());
}

async fn record_location_count(count: usize) {
    get_metrics().await.cached_location_tokens.set(count as i64);
}
