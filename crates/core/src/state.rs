//! Reconciliation state: the record of what this tool has created.
//!
//! A populated field means the matching cloud resource was successfully
//! created at some point. Removal must tolerate any subset being populated,
//! since a deploy can fail halfway.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_role_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReconciliationState {
    /// True when no resource is recorded. `name`, `region` and the timestamp
    /// are bookkeeping and do not count.
    pub fn is_empty(&self) -> bool {
        self.role_name.is_none()
            && self.lambda_name.is_none()
            && self.rule_name.is_none()
            && self.target_id.is_none()
            && self.meta_role_name.is_none()
    }

    /// Stamp the modification time. Every persisted change goes through here.
    pub fn touch(mut self) -> Self {
        self.updated_at = Some(Utc::now());
        self
    }

    pub fn with_deployment(mut self, name: &str, region: &str) -> Self {
        self.name = Some(name.to_string());
        self.region = Some(region.to_string());
        self
    }

    pub fn with_role(mut self, name: &str, arn: &str) -> Self {
        self.role_name = Some(name.to_string());
        self.role_arn = Some(arn.to_string());
        self
    }

    pub fn with_lambda(mut self, name: &str, arn: &str) -> Self {
        self.lambda_name = Some(name.to_string());
        self.lambda_arn = Some(arn.to_string());
        self
    }

    pub fn with_rule(mut self, name: &str, arn: &str) -> Self {
        self.rule_name = Some(name.to_string());
        self.rule_arn = Some(arn.to_string());
        self
    }

    pub fn with_target(mut self, target_id: &str) -> Self {
        self.target_id = Some(target_id.to_string());
        self
    }

    pub fn with_meta_role(mut self, name: &str, arn: &str) -> Self {
        self.meta_role_name = Some(name.to_string());
        self.meta_role_arn = Some(arn.to_string());
        self
    }

    pub fn without_role(mut self) -> Self {
        self.role_name = None;
        self.role_arn = None;
        self
    }

    pub fn without_lambda(mut self) -> Self {
        self.lambda_name = None;
        self.lambda_arn = None;
        self
    }

    /// The target binding lives on the rule, so both go together.
    pub fn without_rule(mut self) -> Self {
        self.rule_name = None;
        self.rule_arn = None;
        self.target_id = None;
        self
    }

    pub fn without_meta_role(mut self) -> Self {
        self.meta_role_name = None;
        self.meta_role_arn = None;
        self
    }
}

/// Persistence for [`ReconciliationState`], owned by the operator.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last saved state; an absent record is an empty state.
    async fn load(&self) -> Result<ReconciliationState, CoreError>;

    async fn save(&self, state: &ReconciliationState) -> Result<(), CoreError>;

    /// Where the state lives, for log lines.
    fn location(&self) -> String;
}

/// JSON file on local disk. Writes go to a sibling temp file first and are
/// renamed into place, so a crash never leaves a truncated state file.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<ReconciliationState, CoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    return Ok(ReconciliationState::default());
                }
                serde_json::from_slice(&bytes).map_err(|e| {
                    CoreError::State(format!("corrupt state file {}: {}", self.path.display(), e))
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file yet, starting empty");
                Ok(ReconciliationState::default())
            }
            Err(e) => Err(CoreError::Io(e)),
        }
    }

    async fn save(&self, state: &ReconciliationState) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = json.len(), "State saved");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store, used by tests and by callers that persist state
/// themselves.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<ReconciliationState>,
    saves: Mutex<Vec<ReconciliationState>>,
}

impl MemoryStateStore {
    pub fn new(initial: ReconciliationState) -> Self {
        Self {
            inner: Mutex::new(initial),
            saves: Mutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> ReconciliationState {
        self.inner.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Every state passed to `save`, oldest first.
    pub fn history(&self) -> Vec<ReconciliationState> {
        self.saves.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<ReconciliationState, CoreError> {
        self.inner
            .lock()
            .map(|s| s.clone())
            .map_err(|e| CoreError::State(format!("state lock poisoned: {e}")))
    }

    async fn save(&self, state: &ReconciliationState) -> Result<(), CoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| CoreError::State(format!("state lock poisoned: {e}")))?;
        *inner = state.clone();
        if let Ok(mut saves) = self.saves.lock() {
            saves.push(state.clone());
        }
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
