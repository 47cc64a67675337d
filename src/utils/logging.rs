use anyhow::{anyhow, Result};
use clap::ValueEnum;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::credentials::ServiceConfig;
use crate::config::settings::{LogFormat, LoggingConfig};
use crate::helpers::time::file_timestamp;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match *self {
            LogLevel::TRACE => "trace",
            LogLevel::DEBUG => "debug",
            LogLevel::INFO => "info",
            LogLevel::WARN => "warn",
            LogLevel::ERROR => "error",
        }
    }
}

/// Logging of the configured service; a level given on the command line wins
pub fn run(service_config: &ServiceConfig, arg_log_level: Option<LogLevel>) -> Result<()> {
    let mut logging_config = service_config.settings.logging.to_owned().unwrap_or_default();
    if let Some(level) = arg_log_level {
        logging_config.level = level.as_str().to_owned();
    }
    init_logging(&logging_config)
}

/// Initialize tracing with the desired config.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // plain text copy of everything, for the run's archive
    let file_layer = match &cfg.dir {
        Some(dir) => {
            let file = open_log_file(Path::new(dir))?;
            Some(
                fmt::layer()
                    .with_timer(UtcTime::rfc_3339())
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    // Base layer: filter + optional file writer
    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);

    // Choose format layer
    match cfg.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .flatten_event(true)
                .with_ansi(false);

            let _ = registry.with(layer).try_init();
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_timer(UtcTime::rfc_3339())
                .with_ansi(true);

            let _ = registry.with(layer).try_init();
        }
    };

    if let Some(dir) = &cfg.dir {
        info!("logging to {}", dir);
    }
    Ok(())
}

fn open_log_file(dir: &Path) -> Result<File> {
    std::fs::create_dir_all(dir).map_err(|e| anyhow!("cannot create log dir '{}': {}", dir.display(), e))?;
    let path = dir.join(format!("log_{}.log", file_timestamp()));
    File::create(&path).map_err(|e| anyhow!("cannot create log file '{}': {}", path.display(), e))
}
