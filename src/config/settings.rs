use serde::Deserialize;

pub const SAFETY_MARGIN_SECONDS_DEFAULT: u64 = 60;
pub const REFRESH_COOLDOWN_SECONDS_DEFAULT: u64 = 5;
pub const MAX_401_RETRIES_DEFAULT: u32 = 2;
pub const HTTP_TIMEOUT_MS_DEFAULT: u64 = 30_000;

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettingsConfig {
    /// a cached token is reused only while `now < exp - safety_margin_seconds`
    pub safety_margin_seconds: Option<u64>,
    /// minimum interval between two refresh attempts of one credential
    pub refresh_cooldown_seconds: Option<u64>,
    /// total attempts of an authenticated call when the target answers 401
    pub max_401_retries: Option<u32>,
    pub http_timeout_ms: Option<u64>,
    pub retry: Option<RetryConfig>,
    pub logging: Option<LoggingConfig>,
    pub token_sink: Option<TokenSinkConfig>,
    /// prometheus text dump written at the end of a run
    pub metrics_path: Option<String>,
}

impl SettingsConfig {
    pub fn safety_margin_seconds(&self) -> u64 {
        self.safety_margin_seconds.unwrap_or(SAFETY_MARGIN_SECONDS_DEFAULT)
    }

    pub fn refresh_cooldown_seconds(&self) -> u64 {
        self.refresh_cooldown_seconds.unwrap_or(REFRESH_COOLDOWN_SECONDS_DEFAULT)
    }

    pub fn max_401_retries(&self) -> u32 {
        self.max_401_retries.unwrap_or(MAX_401_RETRIES_DEFAULT)
    }

    pub fn http_timeout_ms(&self) -> u64 {
        self.http_timeout_ms.unwrap_or(HTTP_TIMEOUT_MS_DEFAULT)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RetryConfig {
    /// additional attempts after the first refresh request
    pub max_retries: Option<u32>,
    /// multiplied by 2^attempt (3^attempt when rate limited)
    pub base_delay_ms: Option<u64>,
    /// upper bound of the random jitter added to every delay
    pub jitter_ms: Option<u64>,
    /// optional cap, invariant: >= base_delay_ms
    pub max_delay_ms: Option<u64>,
}

/// ================================
/// Token persistence
/// ================================
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenSinkConfig {
    /// rewrite `NAME='token'` lines of an env file
    Dotenv { path: String },
    /// one `<name>.token` file per credential
    Directory { path: String },
    None,
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
    /// when set, a `log_<timestamp>.log` file is written there as well
    pub dir: Option<String>,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat, dir: Option<String>) -> Self {
        Self { level, format, dir }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), format: LogFormat::Compact, dir: None }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}
