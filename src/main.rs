mod cli;
mod commands;
mod observability;

use bwo_bitwarden::bitwarden::{BitwardenConfig, BitwardenError, BitwardenService, MemoryTokenStore};
use clap::Parser;
use cli::Cli;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    observability::init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::error!(kind = ?e.kind, status = ?e.status, "{}", e.message);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BitwardenError> {
    let config = match &cli.config {
        Some(path) => BitwardenConfig::from_json_file(path)?,
        None => BitwardenConfig::from_env()?,
    };
    tracing::debug!(token_db = %config.token_database_url, "loaded configuration");

    let service = if commands::uses_token_store(&cli.command) {
        BitwardenService::connect(config).await?
    } else {
        BitwardenService::new(config, Arc::new(MemoryTokenStore::new()))?
    };
    let value = commands::run(&service, cli.command).await?;

    let out = serde_json::to_string_pretty(&value)
        .map_err(|e| BitwardenError::parse(format!("Output serialization error: {}", e)))?;
    println!("{}", out);
    Ok(())
}
