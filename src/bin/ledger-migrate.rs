use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use ledger_migrate::client::AuthenticatedClient;
use ledger_migrate::config::credentials::ServiceConfig;
use ledger_migrate::config::settings::LoggingConfig;
use ledger_migrate::migration::batch::BatchRunner;
use ledger_migrate::migration::payload::{self, PayloadKind};
use ledger_migrate::observability::metrics::Metrics;
use ledger_migrate::sources::TokenManagers;
use ledger_migrate::utils::logging::LogLevel;
use ledger_migrate::utils::{config_loader, http_client, logging};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "ledger-migrate.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a valid token of a credential, refreshing it when needed
    Token {
        credential: String,
        /// refresh even when the cached token is still valid
        #[arg(long)]
        force: bool,
    },
    /// Map exported sheet rows (JSON array of objects) to API payloads
    Transform {
        /// detected from the input file name when omitted
        #[arg(long, value_enum)]
        kind: Option<PayloadKind>,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Submit the payload file of a configured target
    Send { target: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Transform { kind, input, output } => {
            let mut logging_config = LoggingConfig::default();
            if let Some(level) = args.log_level {
                logging_config.level = level.as_str().to_owned();
            }
            logging::init_logging(&logging_config)?;
            transform(kind, &input, &output).await
        }
        Command::Token { credential, force } => {
            let service_config = load(&args.config, args.log_level)?;
            let metrics = Metrics::new()?;
            let client = http_client::build_client(&service_config.settings)?;
            let managers = TokenManagers::build(&service_config, &client, metrics.clone()).await;

            let token = managers.get_token(&credential, force).await?;
            println!("{}", token);
            write_metrics(&service_config, &metrics).await
        }
        Command::Send { target } => {
            let service_config = load(&args.config, args.log_level)?;
            let target_config = service_config
                .targets
                .get(&target)
                .ok_or_else(|| anyhow!("target '{}' is not configured", target))?;

            let metrics = Metrics::new()?;
            let client = http_client::build_client(&service_config.settings)?;
            let managers = TokenManagers::build(&service_config, &client, metrics.clone()).await;
            let authenticated = AuthenticatedClient::new(client, managers, metrics.clone())
                .with_max_401_retries(service_config.settings.max_401_retries());

            let summary = BatchRunner::new(authenticated, metrics.clone())
                .run(&target, target_config)
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            write_metrics(&service_config, &metrics).await
        }
    }
}

fn load(config_path: &str, log_level: Option<LogLevel>) -> Result<ServiceConfig> {
    let service_config = config_loader::run(config_path)?;
    logging::run(&service_config, log_level)?;
    info!("configuration loaded from {}", config_path);
    Ok(service_config)
}

async fn transform(kind: Option<PayloadKind>, input: &Path, output: &Path) -> Result<()> {
    let kind = match kind {
        Some(kind) => kind,
        None => input
            .file_stem()
            .and_then(|stem| PayloadKind::detect(&stem.to_string_lossy()))
            .ok_or_else(|| anyhow!("cannot detect payload kind of '{}', pass --kind", input.display()))?,
    };

    let content = tokio::fs::read_to_string(input).await?;
    let raw: Vec<Value> = serde_json::from_str(&content)
        .map_err(|e| anyhow!("'{}' is not a JSON array of rows: {}", input.display(), e))?;
    let rows = payload::prepare_rows(raw)?;
    let payloads = payload::generate(kind, &rows)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, serde_json::to_string_pretty(&payloads)?).await?;
    info!(kind = kind.as_str(), payloads = payloads.len(), "payloads saved to {}", output.display());
    Ok(())
}

async fn write_metrics(service_config: &ServiceConfig, metrics: &Arc<Metrics>) -> Result<()> {
    match &service_config.settings.metrics_path {
        Some(path) => metrics.write_to(Path::new(path)).await,
        None => Ok(()),
    }
}
