use http::Method;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::credentials::ValueSource;
use crate::migration::payload::PayloadKind;

pub const PACING_MS_DEFAULT: u64 = 3000;
pub const FLUSH_INTERVAL_SECONDS_DEFAULT: u64 = 5;
pub const LOG_DIR_DEFAULT: &str = "data/logs";

/// ================================
/// Migration targets
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    pub kind: PayloadKind,
    /// credential whose token authorizes the calls
    pub credential: String,
    pub url: ValueSource,
    #[serde(with = "http_serde::method", default = "default_method")]
    pub method: Method,
    pub headers: Option<HashMap<String, ValueSource>>,
    #[serde(default)]
    pub auth: AuthHeaderConfig,
    /// follow-up approval call made after a 200 response
    pub approval_url: Option<ValueSource>,
    /// JSON array of payloads produced by `transform`
    pub input: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_flush_interval_seconds")]
    pub flush_interval_seconds: u64,
}

/// How the token is attached to outbound calls
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthHeaderConfig {
    #[serde(default = "default_auth_header")]
    pub header: String,
    #[serde(default = "default_auth_prefix")]
    pub prefix: String,
}

impl Default for AuthHeaderConfig {
    fn default() -> Self {
        Self { header: default_auth_header(), prefix: default_auth_prefix() }
    }
}

fn default_method() -> Method {
    Method::POST
}

fn default_auth_header() -> String {
    http::header::AUTHORIZATION.as_str().to_owned()
}

fn default_auth_prefix() -> String {
    "Bearer ".to_owned()
}

fn default_log_dir() -> String {
    LOG_DIR_DEFAULT.to_owned()
}

fn default_pacing_ms() -> u64 {
    PACING_MS_DEFAULT
}

fn default_flush_interval_seconds() -> u64 {
    FLUSH_INTERVAL_SECONDS_DEFAULT
}
