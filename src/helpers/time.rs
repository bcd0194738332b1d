use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

use crate::utils::constants::DEFAULT_SAFETY_MARGIN_SECS;

/// Configured margin, falling back to the service default.
pub fn get_token_safety_margin(safety_margin_seconds: Option<u64>) -> Duration {
    let seconds = safety_margin_seconds.unwrap_or(DEFAULT_SAFETY_MARGIN_SECS);
    Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX / 1000))
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn get_instant() -> Instant {
    Instant::now()
}
