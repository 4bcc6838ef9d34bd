mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use lambda_cron_aws::AwsProviderFactory;
use lambda_cron_core::config::load_dotenv;
use lambda_cron_core::{
    parse_schedule, AppConfig, CredentialSet, DeploymentInputs, FileStateStore, StateStore,
};
use lambda_cron_deploy::LambdaCron;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let config = config::resolve(&args);

    match args.command {
        Command::Validate { schedule } => {
            let parsed = parse_schedule(&schedule)?;
            print_json(&json!({ "schedule": parsed.to_string(), "valid": true }))
        }
        Command::State => {
            let store = FileStateStore::new(&config.deploy.state_path);
            let state = store
                .load()
                .await
                .with_context(|| format!("failed to read state at {}", store.location()))?;
            print_json(&state)
        }
        Command::Deploy { inputs } => {
            let inputs = DeploymentInputs::from_path(&inputs)
                .with_context(|| format!("failed to load inputs from {}", inputs.display()))?;
            config.log_summary();
            let report = lambda_cron(&config).deploy(&inputs).await?;
            if report.tolerated_conflict() {
                info!("Invoke permission was already in place");
            }
            print_json(&report)
        }
        Command::Remove => {
            config.log_summary();
            let report = lambda_cron(&config).remove().await?;
            print_json(&report)
        }
        Command::Metrics {
            range_start,
            range_end,
        } => {
            let range = config::metrics_range(range_start, range_end, Utc::now())?;
            let series = lambda_cron(&config).metrics(range).await?;
            print_json(&series)
        }
    }
}

fn lambda_cron(config: &AppConfig) -> LambdaCron {
    let store = Arc::new(FileStateStore::new(&config.deploy.state_path));
    let factory = Arc::new(AwsProviderFactory::new(
        config.aws.clone(),
        config.deploy.lambda_update_timeout(),
    ));
    LambdaCron::new(
        config.deploy.clone(),
        CredentialSet::from_config(&config.aws),
        store,
        factory,
    )
    .with_default_region(config.aws.region.clone())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    println!("{out}");
    Ok(())
}
