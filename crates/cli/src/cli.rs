use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// Deploy and manage a scheduled Lambda function.
///
/// Credentials and defaults come from the environment (a `.env` file in the
/// working directory is loaded first). Results are printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "lambda-cron", version, about)]
pub struct CliArgs {
    /// Config profile; `{PROFILE}_{KEY}` env vars take precedence over `{KEY}`.
    #[arg(long, global = true, env = "LAMBDA_CRON_PROFILE")]
    pub profile: Option<String>,

    /// Path of the reconciliation state file.
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or update the role, function, schedule and meta-role.
    Deploy {
        /// Deployment inputs (YAML, or JSON when the extension is .json).
        #[arg(long, short)]
        inputs: PathBuf,
    },

    /// Delete every resource recorded in state.
    Remove,

    /// Fetch usage metrics through the meta-role.
    Metrics {
        /// Range start (RFC 3339). Defaults to 24 hours before the end.
        #[arg(long, value_parser = parse_timestamp)]
        range_start: Option<DateTime<Utc>>,

        /// Range end (RFC 3339). Defaults to now.
        #[arg(long, value_parser = parse_timestamp)]
        range_end: Option<DateTime<Utc>>,
    },

    /// Print the recorded state.
    State,

    /// Check a schedule expression without deploying.
    Validate {
        /// e.g. "rate(5 minutes)" or "cron(0 20 * * ? *)"
        schedule: String,
    },
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}
