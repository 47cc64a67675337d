use anyhow::Result;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Metrics of one run. Built once in `main` and handed to every component
/// that records something.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token metrics
    pub token_refresh_requests: IntCounterVec,
    pub token_refresh_failures: IntCounterVec,
    pub token_refresh_duration: HistogramVec,
    pub token_cache_hits: IntCounterVec,
    pub token_expiry_unix: IntGaugeVec,

    // Authenticated calls
    pub auth_retries: IntCounterVec,

    // Migration
    pub records_sent: IntCounterVec,
    pub records_failed: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>> {
        let registry = Registry::new_custom(Some("ledgermigrate".into()), None)?;

        let metrics = Arc::new(Self {
            // Token
            token_refresh_requests: IntCounterVec::new(Opts::new("token_refresh_requests_total", "Refresh round-trips by credential and attempt outcome"), &["credential", "outcome"])?,
            token_refresh_failures: IntCounterVec::new(Opts::new("token_refresh_failures_total", "Failed refresh operations by reason"), &["credential", "reason"])?,
            token_refresh_duration: HistogramVec::new(HistogramOpts::new("token_refresh_duration_seconds", "Refresh duration seconds, retries included").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]), &["credential"])?,
            token_cache_hits: IntCounterVec::new(Opts::new("token_cache_hits_total", "Tokens served from cache"), &["credential"])?,
            token_expiry_unix: IntGaugeVec::new(Opts::new("token_expiry_unix_seconds", "Expiry of the cached token"), &["credential"])?,

            auth_retries: IntCounterVec::new(Opts::new("auth_retries_total", "Calls repeated after a 401"), &["credential"])?,

            // Migration
            records_sent: IntCounterVec::new(Opts::new("records_sent_total", "Records submitted by target and status"), &["target", "status"])?,
            records_failed: IntCounterVec::new(Opts::new("records_failed_total", "Records not submitted by target and reason"), &["target", "reason"])?,

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_refresh_requests.clone()))?;
        reg.register(Box::new(metrics.token_refresh_failures.clone()))?;
        reg.register(Box::new(metrics.token_refresh_duration.clone()))?;
        reg.register(Box::new(metrics.token_cache_hits.clone()))?;
        reg.register(Box::new(metrics.token_expiry_unix.clone()))?;
        reg.register(Box::new(metrics.auth_retries.clone()))?;
        reg.register(Box::new(metrics.records_sent.clone()))?;
        reg.register(Box::new(metrics.records_failed.clone()))?;

        Ok(metrics)
    }

    /// Prometheus text exposition of everything recorded so far
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let text = self.render()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, text).await?;
        info!("metrics written to {}", path.display());
        Ok(())
    }
}
