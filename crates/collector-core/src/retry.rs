//! Caller-side retry wrapper around collect attempts.

use std::time::Duration;

use collector_types::proto::Response;
use collector_types::{CollectorError, ErrorCode};

/// Retry policy for a caller issuing collect requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub retryable_codes: Vec<ErrorCode>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            retryable_codes: vec![ErrorCode::ResourceExhausted, ErrorCode::DeadlineExceeded],
        }
    }
}

/// Runs `f` up to `max_attempts` times, sleeping with multiplicative backoff
/// between attempts. Only errors whose code appears in `retryable_codes` are
/// retried; anything else is returned immediately.
pub async fn collect_with_retry<F, Fut>(
    f: F,
    cfg: &RetryConfig,
) -> Result<Response, CollectorError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Response, CollectorError>>,
{
    let mut backoff = cfg.initial_backoff;
    let mut last_err = None;

    for attempt in 0..cfg.max_attempts {
        if attempt > 0 {
            tokio::time::sleep(backoff).await;
            backoff = backoff.mul_f64(cfg.backoff_multiplier).min(cfg.max_backoff);
        }

        match f().await {
            Ok(response) => return Ok(response),
            Err(e) if cfg.retryable_codes.contains(&e.code()) => {
                tracing::info!(attempt = attempt + 1, code = %e.code(), "collect attempt failed, retrying");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| CollectorError::Internal("no attempts were made".into())))
}
