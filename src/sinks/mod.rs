//! Durable storage of refreshed tokens, keyed by credential name, so a
//! restarted process can reuse a token that is still valid.

use anyhow::Result;

use crate::config::settings::TokenSinkConfig;

pub mod directory;
pub mod dotenv;

use directory::DirectorySink;
use dotenv::DotenvSink;

#[derive(Debug, Clone)]
pub enum TokenSink {
    Dotenv(DotenvSink),
    Directory(DirectorySink),
    Disabled,
}

impl TokenSink {
    pub fn from_config(cfg: Option<&TokenSinkConfig>) -> Self {
        match cfg {
            Some(TokenSinkConfig::Dotenv { path }) => TokenSink::Dotenv(DotenvSink::new(path)),
            Some(TokenSinkConfig::Directory { path }) => TokenSink::Directory(DirectorySink::new(path)),
            Some(TokenSinkConfig::None) | None => TokenSink::Disabled,
        }
    }

    pub async fn load(&self, credential: &str) -> Result<Option<String>> {
        match self {
            TokenSink::Dotenv(s) => s.load(credential).await,
            TokenSink::Directory(s) => s.load(credential).await,
            TokenSink::Disabled => Ok(None),
        }
    }

    pub async fn store(&self, credential: &str, token: &str) -> Result<()> {
        match self {
            TokenSink::Dotenv(s) => s.store(credential, token).await,
            TokenSink::Directory(s) => s.store(credential, token).await,
            TokenSink::Disabled => Ok(()),
        }
    }
}
