// tests/common/mod.rs
pub use axum::{routing::post, Json, Router};
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use http::StatusCode;
use reqwest::Client;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::credentials::ResolvedCredential;
use crate::helpers::time::now_i64;
use crate::observability::metrics::Metrics;
use crate::parser::claims::sample_jwt;
use crate::resilience::retry::RetrySettings;
use crate::sinks::directory::DirectorySink;
use crate::sinks::TokenSink;
use crate::sources::token_manager::{TokenManager, TokenPolicy};

pub const TOKEN_PATH: &str = "/token";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// POST endpoint answering the n-th call with `responses[n]` (the last one
/// repeats) after `delay`. The counter holds the number of calls seen.
pub async fn spawn_sequenced(
    path: &str,
    responses: Vec<(StatusCode, Value)>,
    delay: Duration,
) -> (JoinHandle<()>, SocketAddr, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();
    let responses = Arc::new(responses);

    let router = Router::new().route(
        path,
        post(move || {
            let c = counter_clone.clone();
            let responses = responses.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                let (status, body) = responses[n.min(responses.len() - 1)].clone();
                (status, Json(body))
            }
        }),
    );
    let (handle, addr) = spawn_axum(router).await;
    (handle, addr, counter)
}

/// Unsigned JWT expiring `seconds` from now; `id` tells tokens apart
pub fn jwt_expiring_in(seconds: i64, id: &str) -> String {
    sample_jwt(&json!({"exp": now_i64() + seconds, "jti": id}).to_string())
}

/// Identity endpoint response carrying `token`
pub fn token_response(token: &str) -> (StatusCode, Value) {
    (StatusCode::OK, json!({"accessToken": token}))
}

pub fn credential(name: &str, addr: SocketAddr) -> ResolvedCredential {
    ResolvedCredential {
        name: name.to_owned(),
        endpoint: Some(format!("http://{}{}", addr, TOKEN_PATH)),
        request_body: Some(json!({"clientId": "migration", "clientSecret": "secret"})),
        api_key: Some("api-key".to_owned()),
        api_key_header: "x-api-key".to_owned(),
        response_field: "accessToken".to_owned(),
    }
}

/// Production margins and cooldown, millisecond backoff
pub fn fast_policy(max_retries: u32) -> TokenPolicy {
    TokenPolicy {
        safety_margin_seconds: 60,
        refresh_cooldown: Duration::from_secs(5),
        retry: RetrySettings { max_retries, base_delay_ms: 5, jitter_ms: 0, max_delay_ms: None },
    }
}

pub fn directory_sink(dir: &std::path::Path) -> TokenSink {
    TokenSink::Directory(DirectorySink::new(dir))
}

pub fn build_manager(credential: ResolvedCredential, policy: TokenPolicy, sink: TokenSink) -> (Arc<TokenManager>, Arc<Metrics>) {
    let metrics = Metrics::new().expect("metrics");
    let manager = TokenManager::new(credential, build_reqwest_client(), policy, sink, metrics.clone());
    (Arc::new(manager), metrics)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}
