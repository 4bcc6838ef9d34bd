use chrono::{DateTime, Duration, Utc};

use lambda_cron_core::metrics::TimeRange;
use lambda_cron_core::{AppConfig, CoreError};

use crate::cli::CliArgs;

/// Metrics window used when no range start is given.
pub const DEFAULT_METRICS_WINDOW_HOURS: i64 = 24;

/// Environment config with command-line overrides applied.
pub fn resolve(args: &CliArgs) -> AppConfig {
    let config = match args.profile.as_deref() {
        Some(profile) => AppConfig::for_profile(profile),
        None => AppConfig::from_env(),
    };
    apply_overrides(config, args)
}

fn apply_overrides(mut config: AppConfig, args: &CliArgs) -> AppConfig {
    if let Some(path) = &args.state {
        config.deploy.state_path = path.clone();
    }
    config
}

/// Fill in whichever ends of the metrics range were not given.
pub fn metrics_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<TimeRange, CoreError> {
    let end = end.unwrap_or(now);
    let start = start.unwrap_or(end - Duration::hours(DEFAULT_METRICS_WINDOW_HOURS));
    TimeRange::new(start, end)
}
