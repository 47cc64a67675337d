use thiserror::Error;

use crate::resilience::error::TokenError;

/// Failure of an authenticated call. HTTP level rejections are not errors:
/// the caller gets the response and decides.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("header '{name}' cannot be built: {message}")]
    InvalidHeader { name: String, message: String },
}

impl RequestError {
    pub fn reason(&self) -> &'static str {
        match self {
            RequestError::Token(e) => e.reason(),
            RequestError::Transport { .. } => "transport",
            RequestError::InvalidHeader { .. } => "invalid_header",
        }
    }
}
