use http::{HeaderMap, HeaderName, HeaderValue, Method};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::error::RequestError;
use crate::config::settings::MAX_401_RETRIES_DEFAULT;
use crate::config::targets::AuthHeaderConfig;
use crate::observability::metrics::Metrics;
use crate::sources::registry::TokenManagers;

/// One outbound call authorized by a credential's token
#[derive(Debug, Clone)]
pub struct AuthenticatedRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub credential: &'a str,
    pub body: Option<&'a Value>,
    pub auth: &'a AuthHeaderConfig,
    /// sent as is, next to the auth header
    pub headers: &'a HeaderMap,
}

/// HTTP client that attaches a bearer token and re-authenticates once the
/// target answers 401.
#[derive(Clone)]
pub struct AuthenticatedClient {
    client: Client,
    managers: TokenManagers,
    metrics: Arc<Metrics>,
    max_401_retries: u32,
    default_auth: AuthHeaderConfig,
}

impl AuthenticatedClient {
    pub fn new(client: Client, managers: TokenManagers, metrics: Arc<Metrics>) -> Self {
        Self {
            client,
            managers,
            metrics,
            max_401_retries: MAX_401_RETRIES_DEFAULT,
            default_auth: AuthHeaderConfig::default(),
        }
    }

    /// Total attempts of one call while the target keeps answering 401
    pub fn with_max_401_retries(mut self, max_401_retries: u32) -> Self {
        self.max_401_retries = max_401_retries.max(1);
        self
    }

    pub fn managers(&self) -> &TokenManagers {
        &self.managers
    }

    /// `Authorization: Bearer <token>` call with at most `max_401_retries`
    /// attempts. The last response is returned whatever its status.
    pub async fn send_authenticated(
        &self,
        method: Method,
        url: &str,
        credential: &str,
        body: Option<&Value>,
    ) -> Result<Response, RequestError> {
        let headers = HeaderMap::new();
        self.send(AuthenticatedRequest {
            method,
            url,
            credential,
            body,
            auth: &self.default_auth,
            headers: &headers,
        })
        .await
    }

    pub async fn send(&self, request: AuthenticatedRequest<'_>) -> Result<Response, RequestError> {
        let auth_header = HeaderName::from_bytes(request.auth.header.as_bytes()).map_err(|e| {
            RequestError::InvalidHeader { name: request.auth.header.to_owned(), message: e.to_string() }
        })?;

        let mut attempt = 1;
        let mut force_refresh = false;
        loop {
            let token = self.managers.get_token(request.credential, force_refresh).await?;
            let auth_value = HeaderValue::from_str(&format!("{}{}", request.auth.prefix, token)).map_err(|e| {
                RequestError::InvalidHeader { name: request.auth.header.to_owned(), message: e.to_string() }
            })?;

            let mut builder = self
                .client
                .request(request.method.clone(), request.url)
                .headers(request.headers.clone())
                .header(auth_header.clone(), auth_value);
            if let Some(body) = request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|source| RequestError::Transport {
                url: request.url.to_owned(),
                source,
            })?;
            debug!(
                credential = request.credential,
                url = request.url,
                attempt,
                status = response.status().as_u16(),
                "authenticated call"
            );

            if response.status() != StatusCode::UNAUTHORIZED || attempt >= self.max_401_retries {
                return Ok(response);
            }

            warn!(
                credential = request.credential,
                url = request.url,
                attempt,
                "target answered 401, re-authenticating"
            );
            self.metrics.auth_retries.with_label_values(&[request.credential]).inc();
            self.managers.invalidate(request.credential).await;
            force_refresh = true;
            attempt += 1;
        }
    }
}
