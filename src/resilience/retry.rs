use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;
use crate::error::TokenError;
use crate::utils::constants::{
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
};

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl RetrySettings {
    pub fn from_config(config: Option<&RetryConfig>) -> Self {
        let defaults = Self::default();
        match config {
            Some(config) => Self {
                attempts: config.attempts.unwrap_or(defaults.attempts).max(1),
                base_delay_ms: config.base_delay_ms.unwrap_or(defaults.base_delay_ms),
                max_delay_ms: config.max_delay_ms.unwrap_or(defaults.max_delay_ms),
            },
            None => defaults,
        }
    }

    /// Retries only errors that report `is_retryable()`; anything else is returned at once.
    pub async fn run_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T, TokenError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TokenError>>,
    {
        let mut delay = self.base_delay_ms;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    warn!("attempt {attempt}/{} failed: {e}", self.attempts);
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(self.max_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!("all {attempt} attempts failed: {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}
