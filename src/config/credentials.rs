use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::{env, fs};
use tracing::warn;

use crate::config::settings::SettingsConfig;
use crate::config::targets::TargetConfig;

pub const API_KEY_HEADER_DEFAULT: &str = "x-api-key";
pub const RESPONSE_FIELD_DEFAULT: &str = "accessToken";

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub credentials: HashMap<String, CredentialConfig>,
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// ================================
/// Credentials
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct CredentialConfig {
    /// identity endpoint the refresh request is POSTed to
    pub endpoint: Option<ValueSource>,
    pub request_body: Option<RequestBody>,
    pub api_key: Option<ValueSource>,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// field of the refresh response holding the new token
    #[serde(default = "default_response_field")]
    pub response_field: String,
}

/// Where a configured string comes from
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ValueSource {
    Literal { value: String },
    FromEnv { from_env: String },
    FromFile { path: String },
}

/// Refresh request body: inline JSON, or JSON text held by an env variable
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RequestBody {
    FromEnv { from_env: String },
    Inline(Value),
}

/// Credential with every value source resolved once, at start up.
/// Absent values stay `None`; the token manager refuses to refresh without them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCredential {
    pub name: String,
    pub endpoint: Option<String>,
    pub request_body: Option<Value>,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub response_field: String,
}

impl ValueSource {
    pub fn resolve(&self) -> anyhow::Result<String> {
        match self {
            ValueSource::Literal { value } => Ok(value.to_owned()),
            ValueSource::FromEnv { from_env } => env::var(from_env)
                .map_err(|err| anyhow::anyhow!("env variable '{}': {}", from_env, err)),
            ValueSource::FromFile { path } => fs::read_to_string(path)
                .map(|res| res.trim().to_string())
                .map_err(|err| anyhow::anyhow!("file '{}': {}", path, err)),
        }
    }
}

impl RequestBody {
    pub fn resolve(&self) -> anyhow::Result<Value> {
        match self {
            RequestBody::Inline(value) => Ok(value.to_owned()),
            RequestBody::FromEnv { from_env } => {
                let raw = env::var(from_env)
                    .map_err(|err| anyhow::anyhow!("env variable '{}': {}", from_env, err))?;
                serde_json::from_str(&raw)
                    .map_err(|err| anyhow::anyhow!("env variable '{}' is not JSON: {}", from_env, err))
            }
        }
    }
}

impl CredentialConfig {
    pub fn resolve(&self, name: &str) -> ResolvedCredential {
        ResolvedCredential {
            name: name.to_owned(),
            endpoint: resolve_optional(name, "endpoint", self.endpoint.as_ref().map(ValueSource::resolve)),
            request_body: resolve_optional(
                name,
                "request_body",
                self.request_body.as_ref().map(RequestBody::resolve),
            ),
            api_key: resolve_optional(name, "api_key", self.api_key.as_ref().map(ValueSource::resolve)),
            api_key_header: self.api_key_header.to_owned(),
            response_field: self.response_field.to_owned(),
        }
    }
}

fn resolve_optional<T>(credential: &str, field: &str, value: Option<anyhow::Result<T>>) -> Option<T> {
    match value? {
        Ok(v) => Some(v),
        Err(err) => {
            warn!(credential, field, "value unresolved: {}", err);
            None
        }
    }
}

fn default_api_key_header() -> String {
    API_KEY_HEADER_DEFAULT.to_owned()
}

fn default_response_field() -> String {
    RESPONSE_FIELD_DEFAULT.to_owned()
}
