//! Deploy, remove and metrics error taxonomy.

use std::fmt;

use serde::Serialize;

use lambda_cron_core::CoreError;

use crate::provider::ProviderError;

/// A pipeline stage, named in errors and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ExecutionRole,
    Function,
    Rule,
    Permission,
    Target,
    MetaRole,
    AssumeRole,
    MetricsQuery,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::ExecutionRole => "execution role",
            Step::Function => "function",
            Step::Rule => "schedule rule",
            Step::Permission => "invoke permission",
            Step::Target => "rule target",
            Step::MetaRole => "meta role",
            Step::AssumeRole => "assume role",
            Step::MetricsQuery => "metrics query",
        };
        f.write_str(s)
    }
}

/// One deletion that did not succeed during remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalFailure {
    pub step: Step,
    pub resource: String,
    pub message: String,
}

impl fmt::Display for RemovalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.step, self.resource, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Bad or missing input, credentials or config. Nothing was touched.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A create-or-update call failed. Earlier steps stay recorded in state.
    #[error("Provisioning {step} '{resource}' failed: {source}")]
    Provisioning {
        step: Step,
        resource: String,
        #[source]
        source: ProviderError,
    },

    /// At least one deletion failed; its state fields were kept.
    #[error("Remove incomplete, {} deletion(s) failed: {}", .failures.len(), join_failures(.failures))]
    Removal { failures: Vec<RemovalFailure> },

    /// Assume-role or metrics query failure. State is never modified.
    #[error("Metrics {stage} failed: {message}")]
    Metrics { stage: Step, message: String },

    /// Loading or saving the reconciliation state failed.
    #[error("State error: {0}")]
    State(#[source] CoreError),
}

fn join_failures(failures: &[RemovalFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl DeployError {
    pub fn provisioning(step: Step, resource: &str, source: ProviderError) -> Self {
        DeployError::Provisioning {
            step,
            resource: resource.to_string(),
            source,
        }
    }

    pub fn metrics(stage: Step, message: impl Into<String>) -> Self {
        DeployError::Metrics {
            stage,
            message: message.into(),
        }
    }
}

impl From<CoreError> for DeployError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Configuration(_) | CoreError::InvalidSchedule { .. } => {
                DeployError::Configuration(e.to_string())
            }
            other => DeployError::State(other),
        }
    }
}
