use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;


// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Exchange metrics
    pub exchange_requests: IntCounterVec,
    pub exchange_failures: IntCounterVec,
    pub exchange_duration: HistogramVec,

    // Cache metrics
    pub cache_lookups: IntCounterVec,
    pub flight_joins: IntCounterVec,
    pub cached_location_tokens: IntGauge,
    pub token_expiry_unix: IntGaugeVec,

    // Store metrics
    pub store_failures: IntCounterVec,

    // Resolver / runtime
    pub resolve_failures: IntCounterVec,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("crmtokenagent".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Exchange
            exchange_requests: IntCounterVec::new(Opts::new("exchange_requests_total", "Token endpoint calls by exchange kind"),&["kind"],).unwrap(),
            exchange_failures: IntCounterVec::new(Opts::new("exchange_failures_total", "Token endpoint failures by exchange kind and reason"),&["kind", "reason"],).unwrap(),
            exchange_duration: HistogramVec::new(HistogramOpts::new("exchange_duration_seconds", "Token endpoint round-trip seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["kind"],).unwrap(),

            // Cache
            cache_lookups: IntCounterVec::new(Opts::new("cache_lookups_total", "Token lookups by tier and outcome"),&["tier", "outcome"],).unwrap(),
            flight_joins: IntCounterVec::new(Opts::new("flight_joins_total", "Callers that joined an exchange already in flight"),&["tier"],).unwrap(),
            cached_location_tokens: IntGauge::new("cached_location_tokens", "Location credentials held in memory").unwrap(),
            token_expiry_unix: IntGaugeVec::new(Opts::new("token_expiry_unix_seconds", "Token expiry timestamp"),&["tier", "id"],).unwrap(),

            // Store
            store_failures: IntCounterVec::new(Opts::new("store_failures_total", "Token store load/save failures"),&["op"],).unwrap(),

            resolve_failures: IntCounterVec::new(Opts::new("resolve_failures_total", "token_for failures by reason"),&["reason"],).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.exchange_requests.clone())).unwrap();
        reg.register(Box::new(metrics.exchange_failures.clone())).unwrap();
        reg.register(Box::new(metrics.exchange_duration.clone())).unwrap();
        reg.register(Box::new(metrics.cache_lookups.clone())).unwrap();
        reg.register(Box::new(metrics.flight_joins.clone())).unwrap();
        reg.register(Box::new(metrics.cached_location_tokens.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.store_failures.clone())).unwrap();
        reg.register(Box::new(metrics.resolve_failures.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
