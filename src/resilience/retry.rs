use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;
use crate::resilience::error::TokenError;

pub const MAX_RETRIES_DEFAULT: u32 = 3;
pub const BASE_DELAY_MS_DEFAULT: u64 = 1000;
pub const JITTER_MS_DEFAULT: u64 = 1000;

#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// additional attempts after the first one
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// upper bound of the uniform jitter added to every delay
    pub jitter_ms: u64,
    pub max_delay_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES_DEFAULT,
            base_delay_ms: BASE_DELAY_MS_DEFAULT,
            jitter_ms: JITTER_MS_DEFAULT,
            max_delay_ms: None,
        }
    }
}

impl From<&Option<RetryConfig>> for RetrySettings {
    fn from(retry: &Option<RetryConfig>) -> Self {
        Self {
            max_retries: retry.as_ref().and_then(|r| r.max_retries).unwrap_or(MAX_RETRIES_DEFAULT),
            base_delay_ms: retry.as_ref().and_then(|r| r.base_delay_ms).unwrap_or(BASE_DELAY_MS_DEFAULT),
            jitter_ms: retry.as_ref().and_then(|r| r.jitter_ms).unwrap_or(JITTER_MS_DEFAULT),
            max_delay_ms: retry.as_ref().and_then(|r| r.max_delay_ms),
        }
    }
}

impl RetrySettings {
    /// Delay before the retry that follows failed attempt `attempt` (0-based),
    /// without jitter.
    pub fn base_backoff(&self, attempt: u32, multiplier: u32) -> Duration {
        let factor = (multiplier as u64).saturating_pow(attempt);
        let mut delay_ms = self.base_delay_ms.saturating_mul(factor);
        if let Some(max_delay_ms) = self.max_delay_ms {
            delay_ms = delay_ms.min(max_delay_ms);
        }
        Duration::from_millis(delay_ms)
    }

    /// `base_delay * multiplier^attempt + uniform_jitter(0, jitter_ms)`
    pub fn backoff(&self, attempt: u32, multiplier: u32) -> Duration {
        let jitter = match self.jitter_ms {
            0 => 0,
            jitter_ms => rand::thread_rng().gen_range(0..jitter_ms),
        };
        self.base_backoff(attempt, multiplier) + Duration::from_millis(jitter)
    }

    /// Run `operation` until it succeeds, fails terminally or the retry budget
    /// is spent. `on_attempt` observes every attempt with the delay chosen
    /// after it (if any).
    pub async fn run_with_retry<F, Fut, T, O>(
        &self,
        credential: &str,
        mut operation: F,
        mut on_attempt: O,
    ) -> Result<T, TokenError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TokenError>>,
        O: FnMut(u32, Option<Duration>, Result<(), &TokenError>),
    {
        let total = self.max_retries + 1;
        let mut last_retryable: Option<TokenError> = None;

        for attempt in 0..total {
            match operation().await {
                Ok(value) => {
                    on_attempt(attempt + 1, None, Ok(()));
                    return Ok(value);
                }
                Err(e) => match e.backoff_multiplier() {
                    Some(multiplier) if attempt + 1 < total => {
                        let delay = self.backoff(attempt, multiplier);
                        warn!(
                            credential,
                            attempt = attempt + 1,
                            total,
                            delay_ms = delay.as_millis() as u64,
                            "attempt failed: {e}"
                        );
                        on_attempt(attempt + 1, Some(delay), Err(&e));
                        last_retryable = Some(e);
                        sleep(delay).await;
                    }
                    Some(_) => {
                        error!(credential, "all {total} attempts failed: {e}");
                        on_attempt(attempt + 1, None, Err(&e));
                        return Err(e);
                    }
                    None => {
                        error!(credential, attempt = attempt + 1, "terminal failure: {e}");
                        on_attempt(attempt + 1, None, Err(&e));
                        return Err(e);
                    }
                },
            }
        }

        Err(last_retryable.unwrap_or_else(|| TokenError::RetriesExhausted {
            credential: credential.to_owned(),
            attempts: total,
        }))
    }
}
