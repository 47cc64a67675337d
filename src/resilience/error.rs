use thiserror::Error;

/// Failure kinds of the token lifecycle.
///
/// Retryable kinds are absorbed inside a refresh up to the retry budget,
/// everything else surfaces on the first occurrence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("credential '{credential}' is misconfigured: {message}")]
    Configuration { credential: String, message: String },

    #[error("identity endpoint rejected credential '{credential}' with status {status}: {body}")]
    Authentication { credential: String, status: u16, body: String },

    #[error("identity endpoint rate limited credential '{credential}' (status 429)")]
    RateLimited { credential: String },

    #[error("transient failure refreshing credential '{credential}': {message}")]
    TransientNetwork { credential: String, message: String },

    #[error("token for credential '{credential}' is malformed: {message}")]
    MalformedToken { credential: String, message: String },

    #[error("identity endpoint answered credential '{credential}' with unexpected status {status}: {body}")]
    UnexpectedStatus { credential: String, status: u16, body: String },

    #[error("refresh of credential '{credential}' gave up after {attempts} attempts")]
    RetriesExhausted { credential: String, attempts: u32 },

    #[error("no token available for credential '{credential}'")]
    TokenUnavailable { credential: String },

    #[error("credential '{0}' is not configured")]
    UnknownCredential(String),
}

impl TokenError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::TransientNetwork { .. })
    }

    /// Exponential base used for the backoff delay of a retryable failure.
    pub fn backoff_multiplier(&self) -> Option<u32> {
        match self {
            Self::RateLimited { .. } => Some(3),
            Self::TransientNetwork { .. } => Some(2),
            _ => None,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Authentication { .. } => "authentication",
            Self::RateLimited { .. } => "rate_limited",
            Self::TransientNetwork { .. } => "transient",
            Self::MalformedToken { .. } => "malformed_token",
            Self::UnexpectedStatus { .. } => "unexpected_status",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::TokenUnavailable { .. } => "unavailable",
            Self::UnknownCredential(_) => "unknown_credential",
        }
    }

    /// Classify a non-success response from the identity endpoint.
    pub fn from_status(credential: &str, status: u16, body: String) -> Self {
        let credential = credential.to_owned();
        match status {
            401 | 403 => Self::Authentication { credential, status, body },
            429 => Self::RateLimited { credential },
            500..=599 => Self::TransientNetwork {
                credential,
                message: format!("server error {}: {}", status, body),
            },
            _ => Self::UnexpectedStatus { credential, status, body },
        }
    }

    /// Classify a transport level failure. Timeouts and connection problems
    /// are retryable, a body that cannot be read or decoded is not.
    pub fn from_transport(credential: &str, err: &reqwest::Error) -> Self {
        let credential = credential.to_owned();
        if err.is_decode() || err.is_body() {
            Self::MalformedToken { credential, message: err.to_string() }
        } else if err.is_builder() {
            Self::Configuration { credential, message: err.to_string() }
        } else {
            Self::TransientNetwork { credential, message: err.to_string() }
        }
    }
}
