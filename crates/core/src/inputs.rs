//! Caller-supplied deployment inputs and the resource names derived from them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const DEFAULT_MEMORY_MB: u32 = 512;
pub const DEFAULT_TIMEOUT_SECS: u32 = 60;
pub const DEFAULT_HANDLER: &str = "handler.handler";
pub const DEFAULT_RUNTIME: &str = "nodejs18.x";

fn default_memory() -> u32 {
    DEFAULT_MEMORY_MB
}

fn default_timeout() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

fn default_handler() -> String {
    DEFAULT_HANDLER.to_string()
}

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

/// Network placement for the function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcConfig {
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
}

/// Everything the operator asks for in one deploy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentInputs {
    /// Logical deployment name; resource names are derived from it.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// `cron(...)` or `rate(...)` expression.
    #[serde(default)]
    pub schedule: String,
    /// Path to the zipped function artifact.
    pub src: PathBuf,
    #[serde(default = "default_memory")]
    pub memory: u32,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub layers: Vec<String>,
    /// Absent means enabled; only an explicit `false` turns the meta-role off.
    #[serde(default)]
    pub monitoring: Option<bool>,
    #[serde(default)]
    pub vpc: Option<VpcConfig>,
    #[serde(default = "default_handler")]
    pub handler: String,
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl DeploymentInputs {
    /// Minimal inputs with every optional field at its default.
    pub fn new(schedule: impl Into<String>, src: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            region: None,
            schedule: schedule.into(),
            src: src.into(),
            memory: DEFAULT_MEMORY_MB,
            timeout: DEFAULT_TIMEOUT_SECS,
            env: BTreeMap::new(),
            layers: Vec::new(),
            monitoring: None,
            vpc: None,
            handler: default_handler(),
            runtime: default_runtime(),
            description: None,
        }
    }

    /// Load inputs from a `.json` file, or YAML for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Configuration(format!("cannot read inputs file {}: {}", path.display(), e))
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let inputs = if is_json {
            serde_json::from_str(&raw)?
        } else {
            serde_yaml::from_str(&raw)?
        };
        Ok(inputs)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.unwrap_or(true)
    }

    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(fallback)
    }

    pub fn region_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.region
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(fallback)
    }
}

/// Resource names owned by one deployment. All of them are derived from the
/// logical name so a deployment never shares resources with another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub name: String,
    pub role: String,
    pub lambda: String,
    pub rule: String,
    pub permission_statement: String,
    pub target_id: String,
    pub meta_role: String,
}

impl ResourceNames {
    pub fn for_deployment(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: format!("{name}-role"),
            lambda: format!("{name}-lambda"),
            rule: format!("{name}-rule"),
            permission_statement: format!("{name}-lambda-permission"),
            target_id: format!("{name}-target"),
            meta_role: format!("{name}-meta-role"),
        }
    }

    pub fn rule_description(&self) -> String {
        format!("Lambda-Cron schedule rule for {}", self.name)
    }

    pub fn meta_role_description(&self) -> String {
        format!("Monitoring meta role for lambda-cron deployment {}", self.name)
    }
}
