use anyhow::Result;
use reqwest::Client;
use std::time::Duration;

use crate::config::settings::SettingsConfig;

/// Shared client of a run: identity endpoints and migration targets alike
pub fn build_client(settings: &SettingsConfig) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_millis(settings.http_timeout_ms()))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
