use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::debug;

use crate::config::credentials::ServiceConfig;
use crate::config::proc_loader::file_to_config;

/// Load `.env` (when present) into the environment, then the YAML config
pub fn run(config_path: &str) -> Result<ServiceConfig> {
    match dotenvy::dotenv() {
        Ok(path) => debug!("environment loaded from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(anyhow!("cannot load .env: {}", e)),
    }

    let path = Path::new(config_path);
    file_to_config(path).map_err(|e| anyhow!("Invalid config format: {}", e))
}
