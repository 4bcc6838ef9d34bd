use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Region used when neither the inputs nor the environment name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Component name used when the inputs do not carry one.
pub const DEFAULT_COMPONENT_NAME: &str = "lambda-cron";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    pub aws: AwsConfig,
    pub deploy: DeployConfig,
}

impl AppConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LAMBDA_CRON_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LAMBDA_CRON_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            aws: AwsConfig::from_env_profiled(p),
            deploy: DeployConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  aws:         region={}, credentials={}",
            self.aws.region,
            if self.aws.has_static_credentials() { "set" } else { "(none)" }
        );
        tracing::info!(
            "  deploy:      name={}, state={}",
            self.deploy.component_name,
            self.deploy.state_path.display()
        );
        tracing::info!(
            "  monitoring:  account={}",
            self.deploy.monitoring_account_id.as_deref().unwrap_or("(none)")
        );
    }
}

// ── AWS ───────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            region: profiled_env_or(p, "AWS_REGION", DEFAULT_REGION),
            access_key_id: profiled_env_opt(p, "AWS_ACCESS_KEY_ID"),
            secret_access_key: profiled_env_opt(p, "AWS_SECRET_ACCESS_KEY"),
            session_token: profiled_env_opt(p, "AWS_SESSION_TOKEN"),
            endpoint_url: profiled_env_opt(p, "AWS_ENDPOINT_URL"),
        }
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    /// Same settings pointed at another region.
    pub fn with_region(&self, region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "***"))
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

// ── Deploy ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Fallback deployment name when the inputs do not set one.
    pub component_name: String,
    /// Where the reconciliation state is persisted between invocations.
    pub state_path: PathBuf,
    /// Account allowed to assume the meta-role.
    pub monitoring_account_id: Option<String>,
    pub role_propagation_delay_secs: u64,
    pub lambda_update_timeout_secs: u64,
}

impl DeployConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            component_name: profiled_env_or(p, "LAMBDA_CRON_NAME", DEFAULT_COMPONENT_NAME),
            state_path: PathBuf::from(profiled_env_or(
                p,
                "LAMBDA_CRON_STATE_PATH",
                ".lambda-cron/state.json",
            )),
            monitoring_account_id: profiled_env_opt(p, "MONITORING_ACCOUNT_ID"),
            role_propagation_delay_secs: profiled_env_u64(p, "ROLE_PROPAGATION_DELAY_SECS", 10),
            lambda_update_timeout_secs: profiled_env_u64(p, "LAMBDA_UPDATE_TIMEOUT_SECS", 120),
        }
    }

    pub fn role_propagation_delay(&self) -> Duration {
        Duration::from_secs(self.role_propagation_delay_secs)
    }

    pub fn lambda_update_timeout(&self) -> Duration {
        Duration::from_secs(self.lambda_update_timeout_secs)
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            component_name: DEFAULT_COMPONENT_NAME.to_string(),
            state_path: PathBuf::from(".lambda-cron/state.json"),
            monitoring_account_id: None,
            role_propagation_delay_secs: 10,
            lambda_update_timeout_secs: 120,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
