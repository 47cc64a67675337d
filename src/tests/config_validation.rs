use serial_test::serial;
use std::path::Path;

use crate::config::credentials::{RequestBody, ValueSource};
use crate::config::proc_loader::{file_to_config, parse_config};
use crate::config::settings::{LogFormat, TokenSinkConfig};
use crate::migration::payload::PayloadKind;
use crate::resilience::retry::RetrySettings;
use crate::sources::token_manager::TokenPolicy;

#[test]
#[serial]
fn example_config_is_valid() {
    let path = Path::new("ledger-migrate.example.yaml");
    let service_config = file_to_config(path).expect("ledger-migrate.example.yaml must exist in repo root for tests");

    assert_eq!(service_config.credentials.len(), 2);
    assert_eq!(service_config.targets.len(), 3);
    assert_eq!(
        service_config.settings.token_sink,
        Some(TokenSinkConfig::Dotenv { path: ".env".to_owned() })
    );

    let int_token = &service_config.credentials["INT_TOKEN"];
    assert_eq!(int_token.response_field, "token");
    assert_eq!(int_token.api_key_header, "x-api-key");
    assert!(matches!(int_token.request_body, Some(RequestBody::Inline(_))));
    assert!(matches!(
        service_config.credentials["AUTH_HEADER"].request_body,
        Some(RequestBody::FromEnv { .. })
    ));

    let ar_invoice = &service_config.targets["ar_invoice"];
    assert_eq!(ar_invoice.kind, PayloadKind::ArInvoice);
    assert_eq!(ar_invoice.auth.header, "x-integration-token");
    assert_eq!(ar_invoice.auth.prefix, "");
    assert_eq!(ar_invoice.method, http::Method::POST);
    assert_eq!(ar_invoice.pacing_ms, 3000);
}

#[test]
fn defaults_apply_to_a_minimal_config() {
    let yaml = r#"
credentials:
  A:
    endpoint: { value: "https://idp.example.com/token" }
    request_body: { clientId: svc }
    api_key: { value: key }
"#;
    let service_config = parse_config(yaml.to_owned()).unwrap();
    let policy = TokenPolicy::from(&service_config.settings);

    assert_eq!(policy.safety_margin_seconds, 60);
    assert_eq!(policy.refresh_cooldown.as_secs(), 5);
    assert_eq!(service_config.settings.max_401_retries(), 2);
    assert_eq!(policy.retry.max_retries, RetrySettings::default().max_retries);
    assert_eq!(policy.retry.jitter_ms, 1000);
    assert_eq!(service_config.settings.logging.as_ref().unwrap().format, LogFormat::Compact);

    let credential = service_config.credentials["A"].resolve("A");
    assert_eq!(credential.endpoint.as_deref(), Some("https://idp.example.com/token"));
    assert_eq!(credential.api_key_header, "x-api-key");
    assert_eq!(credential.response_field, "accessToken");
}

#[test]
fn invalid_config_reports_all_errors() {
    let yaml = r#"
settings:
  max_401_retries: 0
  retry:
    base_delay_ms: 500
    max_delay_ms: 100
  logging:
    level: verbose
    format: json
  token_sink:
    type: directory
    path: " "
credentials:
  A:
    api_key: { value: key }
    api_key_header: "bad header"
targets:
  parties:
    kind: masters_party
    credential: MISSING
    url: { value: "https://erp.example.com/parties" }
    input: ""
    flush_interval_seconds: 0
"#;
    let err = parse_config(yaml.to_owned()).unwrap_err().to_string();

    for expected in [
        "settings.max_401_retries must be >= 1",
        "settings.retry.max_delay_ms (100) must be >= base_delay_ms (500)",
        "settings.logging.level 'verbose' is invalid",
        "settings.token_sink.path must not be empty",
        "credentials['A'].endpoint is required",
        "credentials['A'].request_body is required",
        "credentials['A'].api_key_header 'bad header' is not a valid header name",
        "targets['parties'].credential references unknown credential 'MISSING'",
        "targets['parties'].input must not be empty",
        "targets['parties'].flush_interval_seconds must be > 0",
    ] {
        assert!(err.contains(expected), "missing '{}' in:\n{}", expected, err);
    }
}

#[test]
#[serial]
fn value_sources_resolve_from_env_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let key_file = dir.path().join("api_key");
    std::fs::write(&key_file, "file-key\n").unwrap();
    std::env::set_var("LEDGER_MIGRATE_TEST_BODY", r#"{"clientId":"from-env"}"#);

    let from_file = ValueSource::FromFile { path: key_file.to_string_lossy().into_owned() };
    let body = RequestBody::FromEnv { from_env: "LEDGER_MIGRATE_TEST_BODY".to_owned() };
    let missing = ValueSource::FromEnv { from_env: "LEDGER_MIGRATE_TEST_UNSET".to_owned() };

    assert_eq!(from_file.resolve().unwrap(), "file-key");
    assert_eq!(body.resolve().unwrap(), serde_json::json!({"clientId": "from-env"}));
    assert!(missing.resolve().is_err());

    std::env::remove_var("LEDGER_MIGRATE_TEST_BODY");
}
