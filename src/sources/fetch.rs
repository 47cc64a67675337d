//! One refresh round-trip against a credential's identity endpoint.
//!
//! Retries, caching and persistence live in the token manager; this module
//! only issues the request and classifies what came back.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::credentials::ResolvedCredential;
use crate::observability::metrics::Metrics;
use crate::resilience::error::TokenError;

pub trait FetchToken {
    fn fetch_token(
        &self,
        client: &Client,
    ) -> impl std::future::Future<Output = Result<String, TokenError>> + Send;
}

/// Everything a refresh request needs, borrowed from the credential
#[derive(Debug)]
pub struct RefreshRequest<'a> {
    pub endpoint: &'a str,
    pub body: &'a Value,
    pub api_key: &'a str,
}

impl ResolvedCredential {
    /// Fail fast, without any network call, when a refresh cannot be built
    pub fn refresh_request(&self) -> Result<RefreshRequest<'_>, TokenError> {
        let missing = |what: &str| TokenError::Configuration {
            credential: self.name.to_owned(),
            message: format!("{} is not set", what),
        };
        Ok(RefreshRequest {
            endpoint: self.endpoint.as_deref().filter(|e| !e.trim().is_empty()).ok_or_else(|| missing("refresh endpoint"))?,
            body: self.request_body.as_ref().ok_or_else(|| missing("refresh request body"))?,
            api_key: self.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| missing("api key"))?,
        })
    }
}

impl FetchToken for ResolvedCredential {
    async fn fetch_token(&self, client: &Client) -> Result<String, TokenError> {
        let request = self.refresh_request()?;

        let response = client
            .post(request.endpoint)
            .header(self.api_key_header.as_str(), request.api_key)
            .json(request.body)
            .send()
            .await
            .map_err(|e| TokenError::from_transport(&self.name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::from_status(&self.name, status.as_u16(), body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TokenError::from_transport(&self.name, &e))?;

        body.get(&self.response_field)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| TokenError::MalformedToken {
                credential: self.name.to_owned(),
                message: format!("response field '{}' is missing or not a string", self.response_field),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure(&'static str),
    TerminalFailure(&'static str),
}

impl AttemptOutcome {
    fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::RetryableFailure(_) => "retryable",
            AttemptOutcome::TerminalFailure(_) => "terminal",
        }
    }
}

/// Record of one round-trip inside a single refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshAttempt {
    pub attempt: u32,
    /// backoff chosen before the next attempt
    pub delay: Option<Duration>,
    pub outcome: AttemptOutcome,
}

impl RefreshAttempt {
    pub fn new(attempt: u32, delay: Option<Duration>, result: Result<(), &TokenError>) -> Self {
        let outcome = match result {
            Ok(()) => AttemptOutcome::Success,
            Err(e) if e.is_retryable() => AttemptOutcome::RetryableFailure(e.reason()),
            Err(e) => AttemptOutcome::TerminalFailure(e.reason()),
        };
        Self { attempt, delay, outcome }
    }

    pub fn record(&self, credential: &str, metrics: &Metrics) {
        debug!(
            credential,
            attempt = self.attempt,
            delay_ms = self.delay.map(|d| d.as_millis() as u64),
            outcome = ?self.outcome,
            "refresh attempt"
        );
        metrics
            .token_refresh_requests
            .with_label_values(&[credential, self.outcome.label()])
            .inc();
    }
}
