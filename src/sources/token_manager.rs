use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::token::CachedToken;
use crate::config::credentials::ResolvedCredential;
use crate::config::settings::SettingsConfig;
use crate::helpers::time::now_i64;
use crate::observability::metrics::Metrics;
use crate::parser::claims::decode_expiry;
use crate::resilience::error::TokenError;
use crate::resilience::retry::RetrySettings;
use crate::sinks::TokenSink;
use crate::sources::fetch::{FetchToken, RefreshAttempt};

/// Refresh policy shared by every credential of a run
#[derive(Debug, Clone)]
pub struct TokenPolicy {
    pub safety_margin_seconds: u64,
    pub refresh_cooldown: Duration,
    pub retry: RetrySettings,
}

impl From<&SettingsConfig> for TokenPolicy {
    fn from(settings: &SettingsConfig) -> Self {
        Self {
            safety_margin_seconds: settings.safety_margin_seconds(),
            refresh_cooldown: Duration::from_secs(settings.refresh_cooldown_seconds()),
            retry: RetrySettings::from(&settings.retry),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// nothing cached
    Empty,
    /// cached and outside the safety margin
    Valid,
    /// cached but inside the safety margin or with unknown expiry
    Stale,
    /// a refresh round-trip is in flight
    Refreshing,
}

#[derive(Debug, Default)]
struct TokenState {
    cached: Option<CachedToken>,
    /// set by a failed refresh, cleared by a successful one
    last_failure_at: Option<Instant>,
}

/// Cached token of one credential and the policy that keeps it fresh.
///
/// The whole decide-and-refresh sequence of `get_token` runs under one lock,
/// so concurrent cache misses collapse into a single network refresh.
pub struct TokenManager {
    credential: ResolvedCredential,
    client: Client,
    policy: TokenPolicy,
    sink: TokenSink,
    metrics: Arc<Metrics>,
    state: Mutex<TokenState>,
    refreshing: AtomicBool,
}

impl TokenManager {
    pub fn new(
        credential: ResolvedCredential,
        client: Client,
        policy: TokenPolicy,
        sink: TokenSink,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            credential,
            client,
            policy,
            sink,
            metrics,
            state: Mutex::new(TokenState::default()),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.credential.name
    }

    /// Seed the cache with the persisted token, if any. The token is reused
    /// only while its decoded expiry says so.
    pub async fn restore(&self) {
        let name = self.name();
        match self.sink.load(name).await {
            Ok(Some(value)) => {
                let token = CachedToken::from_raw(value);
                info!(
                    credential = name,
                    expires_at = token.expires_at,
                    fresh = token.is_fresh(self.policy.safety_margin_seconds),
                    "persisted token restored"
                );
                self.state.lock().await.cached = Some(token);
            }
            Ok(None) => debug!(credential = name, "no persisted token"),
            Err(e) => warn!(credential = name, "persisted token unreadable: {}", e),
        }
    }

    /// Return a usable token, refreshing it when forced, missing or about to
    /// expire. Within the cooldown after a failed refresh the last known
    /// value is returned instead of calling the identity endpoint again.
    pub async fn get_token(&self, force_refresh: bool) -> Result<String, TokenError> {
        let name = self.name();
        let mut state = self.state.lock().await;

        if !force_refresh {
            if let Some(token) = state.cached.as_ref().filter(|t| t.is_fresh(self.policy.safety_margin_seconds)) {
                self.metrics.token_cache_hits.with_label_values(&[name]).inc();
                debug!(credential = name, remaining_seconds = token.remaining_seconds(self.policy.safety_margin_seconds), "token served from cache");
                return Ok(token.value.to_owned());
            }
        }

        if let Some(last_failure_at) = state.last_failure_at {
            let elapsed = last_failure_at.elapsed();
            if elapsed < self.policy.refresh_cooldown {
                warn!(
                    credential = name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "refresh failed within cooldown, serving last known token"
                );
                return state
                    .cached
                    .as_ref()
                    .map(|t| t.value.to_owned())
                    .ok_or_else(|| TokenError::TokenUnavailable { credential: name.to_owned() });
            }
        }

        match self.fetch_validated().await {
            Ok(token) => {
                state.last_failure_at = None;
                match self.sink.store(name, &token.value).await {
                    Ok(()) => debug!(credential = name, "refreshed token persisted"),
                    Err(e) => warn!(credential = name, "refreshed token not persisted: {}", e),
                }
                if let Some(exp) = token.expires_at {
                    self.metrics.token_expiry_unix.with_label_values(&[name]).set(exp);
                }
                let value = token.value.to_owned();
                state.cached = Some(token);
                Ok(value)
            }
            Err(e) => {
                state.last_failure_at = Some(Instant::now());
                match state.cached.as_ref() {
                    Some(stale) => {
                        warn!(credential = name, "refresh failed, serving stale token: {}", e);
                        Ok(stale.value.to_owned())
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Network round-trip for a new token, with retries. Does not touch the
    /// cache; `get_token(true)` is the caching path. Waits for any refresh
    /// already running through `get_token`.
    pub async fn refresh_token(&self) -> Result<CachedToken, TokenError> {
        let _state = self.state.lock().await;
        self.fetch_validated().await
    }

    /// Caller holds the state lock
    async fn fetch_validated(&self) -> Result<CachedToken, TokenError> {
        let name = self.name();
        // configuration problems are never retried
        self.credential.refresh_request()?;

        let _refreshing = RefreshingFlag::raise(&self.refreshing);
        let start = Instant::now();
        info!(credential = name, "refreshing token");

        let result = self
            .policy
            .retry
            .run_with_retry(
                name,
                || self.credential.fetch_token(&self.client),
                |attempt, delay, outcome| RefreshAttempt::new(attempt, delay, outcome).record(name, &self.metrics),
            )
            .await
            .and_then(|value| validate_refreshed(name, value));

        self.metrics
            .token_refresh_duration
            .with_label_values(&[name])
            .observe(start.elapsed().as_secs_f64());

        match &result {
            Ok(token) => info!(credential = name, expires_at = token.expires_at, "token refreshed"),
            Err(e) => {
                self.metrics.token_refresh_failures.with_label_values(&[name, e.reason()]).inc();
            }
        }
        result
    }

    /// Drop the cached token; the next `get_token` refreshes unless a refresh
    /// has just failed
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.cached.take().is_some() {
            info!(credential = self.name(), "cached token invalidated");
        }
    }

    pub async fn status(&self) -> TokenStatus {
        if self.refreshing.load(Ordering::SeqCst) {
            return TokenStatus::Refreshing;
        }
        match self.state.lock().await.cached.as_ref() {
            None => TokenStatus::Empty,
            Some(t) if t.is_fresh(self.policy.safety_margin_seconds) => TokenStatus::Valid,
            Some(_) => TokenStatus::Stale,
        }
    }
}

/// A refreshed token must carry an expiry strictly in the future
fn validate_refreshed(credential: &str, value: String) -> Result<CachedToken, TokenError> {
    let malformed = |message: String| TokenError::MalformedToken { credential: credential.to_owned(), message };
    match decode_expiry(&value) {
        None => Err(malformed("refreshed token has no decodable expiry".to_owned())),
        Some(exp) if exp <= now_i64() => Err(malformed(format!("refreshed token already expired at {}", exp))),
        Some(exp) => Ok(CachedToken::new(value, Some(exp))),
    }
}

struct RefreshingFlag<'a>(&'a AtomicBool);

impl<'a> RefreshingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
