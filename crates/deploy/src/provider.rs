//! Cloud capability traits consumed by the pipeline.
//!
//! Each trait covers one resource family. Implementations do the SDK work;
//! the pipeline only sees these request/response shapes and
//! [`ProviderError`], which distinguishes "not found" and "conflict" from
//! everything else so callers can apply their narrow tolerances.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use lambda_cron_core::metrics::{DelegatedCredential, MetricSeries, MetricsQuery};
use lambda_cron_core::VpcConfig;

/// Errors reported by a cloud capability implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource (or statement) already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    /// The request was not allowed.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// An AWS SDK error (stringified).
    #[error("AWS SDK error: {0}")]
    Sdk(String),

    /// A request value the service cannot represent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The service answered without a field we rely on.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A bounded wait gave up.
    #[error("timed out: {0}")]
    Timeout(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ProviderError::Conflict(_))
    }
}

// ── Requests and results ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RoleSpec {
    pub name: String,
    pub description: Option<String>,
    pub trust_policy: Value,
    /// Installed as the role's single inline policy.
    pub permission_policy: Value,
}

impl RoleSpec {
    /// Name of the inline policy carrying `permission_policy`.
    pub fn inline_policy_name(&self) -> String {
        format!("{}-policy", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleOutput {
    pub arn: String,
    /// False when an existing role was updated in place.
    pub created: bool,
}

#[derive(Clone, PartialEq)]
pub struct FunctionSpec {
    pub name: String,
    pub role_arn: String,
    pub code: Vec<u8>,
    /// Base64 SHA-256 of `code`, in the encoding the function service reports.
    pub code_sha256: String,
    pub handler: String,
    pub runtime: String,
    pub memory_mb: u32,
    pub timeout_secs: u32,
    pub env: BTreeMap<String, String>,
    pub layers: Vec<String>,
    pub vpc: Option<VpcConfig>,
    pub description: Option<String>,
}

impl std::fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("name", &self.name)
            .field("role_arn", &self.role_arn)
            .field("code_len", &self.code.len())
            .field("code_sha256", &self.code_sha256)
            .field("handler", &self.handler)
            .field("runtime", &self.runtime)
            .field("memory_mb", &self.memory_mb)
            .field("timeout_secs", &self.timeout_secs)
            .field("env_keys", &self.env.keys().collect::<Vec<_>>())
            .field("layers", &self.layers)
            .field("vpc", &self.vpc)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionOutput {
    pub arn: String,
    pub code_size: i64,
    pub code_sha256: String,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub name: String,
    pub schedule_expression: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutput {
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSpec {
    pub function_name: String,
    pub statement_id: String,
    pub action: String,
    pub principal: String,
    pub source_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub id: String,
    pub arn: String,
}

// ── Capabilities ───────────────────────────────────────────────

#[async_trait]
pub trait RoleApi: Send + Sync {
    /// Create the role, or bring an existing one's trust and inline
    /// permission policy in line with `spec`.
    async fn ensure_role(&self, spec: &RoleSpec) -> Result<RoleOutput, ProviderError>;

    /// Delete the role together with its inline and attached policies.
    async fn delete_role(&self, name: &str) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait FunctionApi: Send + Sync {
    /// Create the function, or update its code and configuration in place.
    async fn ensure_function(&self, spec: &FunctionSpec) -> Result<FunctionOutput, ProviderError>;

    async fn delete_function(&self, name: &str) -> Result<(), ProviderError>;

    /// Add a resource-policy statement. Fails with
    /// [`ProviderError::Conflict`] when the statement id is already present.
    async fn add_permission(&self, spec: &PermissionSpec) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait RuleApi: Send + Sync {
    /// Create or replace the rule definition.
    async fn put_rule(&self, spec: &RuleSpec) -> Result<RuleOutput, ProviderError>;

    async fn put_targets(&self, rule: &str, targets: &[TargetSpec]) -> Result<(), ProviderError>;

    /// Detach every target, then delete the rule.
    async fn delete_rule(&self, name: &str) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait StsApi: Send + Sync {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_secs: i32,
    ) -> Result<DelegatedCredential, ProviderError>;
}

#[async_trait]
pub trait MetricsApi: Send + Sync {
    /// Fetch metrics authenticating with `credential` only.
    async fn get_metrics(
        &self,
        credential: &DelegatedCredential,
        region: &str,
        query: &MetricsQuery,
    ) -> Result<MetricSeries, ProviderError>;
}

/// The capability set for one region.
#[derive(Clone)]
pub struct Provider {
    pub region: String,
    pub roles: Arc<dyn RoleApi>,
    pub functions: Arc<dyn FunctionApi>,
    pub rules: Arc<dyn RuleApi>,
    pub sts: Arc<dyn StsApi>,
    pub metrics: Arc<dyn MetricsApi>,
}

/// Builds a [`Provider`] bound to a region using the operator's credentials.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn connect(&self, region: &str) -> Result<Provider, ProviderError>;
}
