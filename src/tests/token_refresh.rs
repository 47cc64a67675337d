// Refresh path of a single token manager against a local identity endpoint:
// caching inside the safety margin, persisted tokens, failure classification.

use http::StatusCode;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::resilience::error::TokenError;
use crate::sinks::TokenSink;
use crate::sources::token_manager::TokenStatus;
use crate::tests::common::{
    build_manager, credential, directory_sink, fast_policy, json, jwt_expiring_in, spawn_sequenced, token_response,
    TOKEN_PATH,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fresh_token_is_served_from_cache() {
    let jwt = jwt_expiring_in(3600, "a-1");
    let (h, addr, hits) = spawn_sequenced(TOKEN_PATH, vec![token_response(&jwt)], Duration::ZERO).await;
    let (manager, metrics) = build_manager(credential("A", addr), fast_policy(3), TokenSink::Disabled);

    assert_eq!(manager.status().await, TokenStatus::Empty);
    let first = manager.get_token(false).await.unwrap();
    let second = manager.get_token(false).await.unwrap();

    assert_eq!(first, jwt);
    assert_eq!(second, jwt);
    assert_eq!(hits.load(Ordering::SeqCst), 1, "second call must not reach the identity endpoint");
    assert_eq!(manager.status().await, TokenStatus::Valid);

    let rendered = metrics.render().unwrap();
    assert!(rendered.contains("ledgermigrate_token_cache_hits_total{credential=\"A\"} 1"));
    assert!(rendered.contains("ledgermigrate_token_refresh_requests_total{credential=\"A\",outcome=\"success\"} 1"));

    h.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn expired_persisted_token_forces_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let sink = directory_sink(dir.path());
    sink.store("A", &jwt_expiring_in(-10, "old")).await.unwrap();

    let fresh = jwt_expiring_in(3600, "new");
    let (h, addr, hits) = spawn_sequenced(TOKEN_PATH, vec![token_response(&fresh)], Duration::ZERO).await;
    let (manager, _) = build_manager(credential("A", addr), fast_policy(3), sink.clone());

    manager.restore().await;
    assert_eq!(manager.status().await, TokenStatus::Stale);

    assert_eq!(manager.get_token(false).await.unwrap(), fresh);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(sink.load("A").await.unwrap().as_deref(), Some(fresh.as_str()), "refreshed token is persisted");

    h.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn valid_persisted_token_is_reused_without_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let sink = directory_sink(dir.path());
    let persisted = jwt_expiring_in(3600, "persisted");
    sink.store("A", &persisted).await.unwrap();

    let (h, addr, hits) = spawn_sequenced(TOKEN_PATH, vec![token_response("unused")], Duration::ZERO).await;
    let (manager, _) = build_manager(credential("A", addr), fast_policy(3), sink);
    manager.restore().await;

    assert_eq!(manager.get_token(false).await.unwrap(), persisted);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    h.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_persisted_token_is_refreshed() {
    let dir = tempfile::tempdir().unwrap();
    let sink = directory_sink(dir.path());
    sink.store("A", "not-a-jwt").await.unwrap();

    let fresh = jwt_expiring_in(3600, "new");
    let (h, addr, hits) = spawn_sequenced(TOKEN_PATH, vec![token_response(&fresh)], Duration::ZERO).await;
    let (manager, _) = build_manager(credential("A", addr), fast_policy(3), sink);
    manager.restore().await;

    assert_eq!(manager.status().await, TokenStatus::Stale);
    assert_eq!(manager.get_token(false).await.unwrap(), fresh);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    h.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn forced_refresh_bypasses_a_fresh_cache() {
    let first = jwt_expiring_in(3600, "1");
    let second = jwt_expiring_in(3600, "2");
    let (h, addr, hits) =
        spawn_sequenced(TOKEN_PATH, vec![token_response(&first), token_response(&second)], Duration::ZERO).await;
    let (manager, _) = build_manager(credential("A", addr), fast_policy(3), TokenSink::Disabled);

    assert_eq!(manager.get_token(false).await.unwrap(), first);
    assert_eq!(manager.get_token(true).await.unwrap(), second);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    h.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn authentication_failures_are_never_retried() {
    for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
        let (h, addr, hits) =
            spawn_sequenced(TOKEN_PATH, vec![(status, json!({"error": "denied"}))], Duration::ZERO).await;
        let (manager, metrics) = build_manager(credential("A", addr), fast_policy(3), TokenSink::Disabled);

        let err = manager.get_token(false).await.unwrap_err();

        assert!(matches!(err, TokenError::Authentication { status: s, .. } if s == status.as_u16()), "{err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(metrics
            .render()
            .unwrap()
            .contains("ledgermigrate_token_refresh_failures_total{credential=\"A\",reason=\"authentication\"} 1"));

        h.abort();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rate_limited_refresh_stops_after_retry_budget() {
    let (h, addr, hits) =
        spawn_sequenced(TOKEN_PATH, vec![(StatusCode::TOO_MANY_REQUESTS, json!({}))], Duration::ZERO).await;
    let (manager, _) = build_manager(credential("A", addr), fast_policy(2), TokenSink::Disabled);

    let err = manager.refresh_token().await.unwrap_err();

    assert!(matches!(err, TokenError::RateLimited { .. }), "{err:?}");
    assert_eq!(hits.load(Ordering::SeqCst), 3, "one attempt plus two retries");

    h.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transient_failures_recover_within_budget() {
    let jwt = jwt_expiring_in(3600, "after-502");
    let (h, addr, hits) = spawn_sequenced(
        TOKEN_PATH,
        vec![
            (StatusCode::BAD_GATEWAY, json!({})),
            (StatusCode::SERVICE_UNAVAILABLE, json!({})),
            token_response(&jwt),
        ],
        Duration::ZERO,
    )
    .await;
    let (manager, metrics) = build_manager(credential("A", addr), fast_policy(3), TokenSink::Disabled);

    assert_eq!(manager.get_token(false).await.unwrap(), jwt);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(metrics
        .render()
        .unwrap()
        .contains("ledgermigrate_token_refresh_requests_total{credential=\"A\",outcome=\"retryable\"} 2"));

    h.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unusable_refresh_responses_are_malformed() {
    let cases = vec![
        (StatusCode::OK, json!({"token": "wrong-field"})),
        (StatusCode::OK, json!({"accessToken": 42})),
        token_response("opaque-token"),
        token_response(&jwt_expiring_in(-5, "expired")),
    ];
    for case in cases {
        let (h, addr, hits) = spawn_sequenced(TOKEN_PATH, vec![case.clone()], Duration::ZERO).await;
        let (manager, _) = build_manager(credential("A", addr), fast_policy(3), TokenSink::Disabled);

        let err = manager.get_token(false).await.unwrap_err();

        assert!(matches!(err, TokenError::MalformedToken { .. }), "{case:?}: {err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1, "{case:?} must not be retried");
        h.abort();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unexpected_status_is_terminal() {
    let (h, addr, hits) = spawn_sequenced(TOKEN_PATH, vec![(StatusCode::NOT_FOUND, json!({}))], Duration::ZERO).await;
    let (manager, _) = build_manager(credential("A", addr), fast_policy(3), TokenSink::Disabled);

    let err = manager.refresh_token().await.unwrap_err();

    assert!(matches!(err, TokenError::UnexpectedStatus { status: 404, .. }), "{err:?}");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    h.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_configuration_fails_without_a_request() {
    let (h, addr, hits) = spawn_sequenced(TOKEN_PATH, vec![token_response("unused")], Duration::ZERO).await;
    let mut unconfigured = credential("A", addr);
    unconfigured.api_key = None;
    let (manager, _) = build_manager(unconfigured, fast_policy(3), TokenSink::Disabled);

    let err = manager.get_token(false).await.unwrap_err();

    assert!(matches!(err, TokenError::Configuration { .. }), "{err:?}");
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    h.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refresh_token_leaves_the_cache_alone() {
    let jwt = jwt_expiring_in(3600, "direct");
    let (h, addr, _) = spawn_sequenced(TOKEN_PATH, vec![token_response(&jwt)], Duration::ZERO).await;
    let (manager, _) = build_manager(credential("A", addr), fast_policy(3), TokenSink::Disabled);

    let token = manager.refresh_token().await.unwrap();

    assert_eq!(token.value, jwt);
    assert!(token.expires_at.is_some());
    assert_eq!(manager.status().await, TokenStatus::Empty);

    h.abort();
}
