use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts; None retries until success
    pub max_retries: Option<u32>,
    /// Delay before the next attempt (base value)
    pub base_delay: Duration,
    /// Double the delay after each failure, capped at 60s
    pub exponential_backoff: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Some(3),
            base_delay: Duration::from_secs(2),
            exponential_backoff: true,
        }
    }
}

impl RetryConfig {
    /// Retry forever with a fixed delay
    pub fn forever(delay: Duration) -> Self {
        Self {
            max_retries: None,
            base_delay: delay,
            exponential_backoff: false,
        }
    }
}

/// Run `operation` until it succeeds or the attempt budget is spent.
///
/// `label` names the operation in logs. On exhaustion the last error is returned.
pub async fn retry_async<F, Fut, T, E>(label: &str, mut operation: F, config: RetryConfig) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.base_delay;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(operation = label, attempt, "✅ Succeeded after retrying");
                }
                return Ok(result);
            }
            Err(e) => {
                error!(operation = label, attempt, "❌ Attempt failed: {e}");

                if let Some(max) = config.max_retries
                    && attempt >= max
                {
                    error!(operation = label, "🚫 Maximum attempts ({max}) reached");
                    return Err(e);
                }

                sleep(delay).await;

                if config.exponential_backoff {
                    delay = std::cmp::min(delay * 2, Duration::from_secs(60));
                }
            }
        }
    }
}
