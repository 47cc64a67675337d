//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - settings: retry bounds, logging level, token sink path
//! - credentials: refresh endpoint / body / api key presence, header names
//! - targets: credential references, auth header, pacing

use http::HeaderName;
use std::collections::HashMap;
use tracing::{error, info};

use crate::config::credentials::{CredentialConfig, ServiceConfig};
use crate::config::settings::{RetryConfig, SettingsConfig, TokenSinkConfig};
use crate::config::targets::TargetConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);

    if cfg.credentials.is_empty() {
        errors.push("config: 'credentials' is empty; at least one credential required".to_string());
    }
    for (name, credential) in &cfg.credentials {
        validate_credential(name, credential, &mut errors);
    }

    validate_targets(&cfg.targets, &cfg.credentials, &mut errors);

    if errors.is_empty() {
        info!("config validated: {} credentials, {} targets", cfg.credentials.len(), cfg.targets.len());
        Ok(())
    } else {
        for e in &errors {
            error!("config: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }

    if settings.max_401_retries == Some(0) {
        errors.push("settings.max_401_retries must be >= 1".to_string());
    }

    if settings.http_timeout_ms == Some(0) {
        errors.push("settings.http_timeout_ms must be > 0".to_string());
    }

    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' is invalid; allowed: {}",
                logging.level,
                LOG_LEVELS.join(", ")
            ));
        }
    }

    match &settings.token_sink {
        Some(TokenSinkConfig::Dotenv { path }) | Some(TokenSinkConfig::Directory { path })
            if path.trim().is_empty() =>
        {
            errors.push("settings.token_sink.path must not be empty".to_string());
        }
        _ => {}
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.base_delay_ms == Some(0) {
        errors.push("settings.retry.base_delay_ms must be > 0".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})",
                max, base
            ));
        }
    }
}

fn validate_credential(name: &str, credential: &CredentialConfig, errors: &mut Vec<String>) {
    if credential.endpoint.is_none() {
        errors.push(format!("credentials['{}'].endpoint is required", name));
    }
    if credential.request_body.is_none() {
        errors.push(format!("credentials['{}'].request_body is required", name));
    }
    if credential.api_key.is_none() {
        errors.push(format!("credentials['{}'].api_key is required", name));
    }
    if credential.response_field.trim().is_empty() {
        errors.push(format!("credentials['{}'].response_field must not be empty", name));
    }
    if HeaderName::from_bytes(credential.api_key_header.as_bytes()).is_err() {
        errors.push(format!(
            "credentials['{}'].api_key_header '{}' is not a valid header name",
            name, credential.api_key_header
        ));
    }
}

fn validate_targets(
    targets: &HashMap<String, TargetConfig>,
    credentials: &HashMap<String, CredentialConfig>,
    errors: &mut Vec<String>,
) {
    for (name, target) in targets {
        if !credentials.contains_key(&target.credential) {
            errors.push(format!(
                "targets['{}'].credential references unknown credential '{}'",
                name, target.credential
            ));
        }
        if target.input.trim().is_empty() {
            errors.push(format!("targets['{}'].input must not be empty", name));
        }
        if HeaderName::from_bytes(target.auth.header.as_bytes()).is_err() {
            errors.push(format!(
                "targets['{}'].auth.header '{}' is not a valid header name",
                name, target.auth.header
            ));
        }
        if let Some(headers) = &target.headers {
            for key in headers.keys() {
                if HeaderName::from_bytes(key.as_bytes()).is_err() {
                    errors.push(format!("targets['{}'].headers '{}' is not a valid header name", name, key));
                }
            }
        }
        if target.flush_interval_seconds == 0 {
            errors.push(format!("targets['{}'].flush_interval_seconds must be > 0", name));
        }
    }
}
