//! Pipeline tests for lambda-cron-deploy against an in-memory cloud.
//!
//! No AWS credentials or network access are needed.

mod deploy;
mod metrics;
mod remove;

use std::path::PathBuf;
use std::sync::Arc;

use lambda_cron_core::{CredentialSet, DeployConfig, DeploymentInputs, MemoryStateStore, ReconciliationState};
use lambda_cron_deploy::LambdaCron;

use fake::{FakeCloud, FakeFactory};

pub const MONITORING_ACCOUNT: &str = "999999999999";

pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub store: Arc<MemoryStateStore>,
    pub lambda_cron: LambdaCron,
    pub artifact: PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_state(ReconciliationState::default())
    }

    pub fn with_state(state: ReconciliationState) -> Self {
        Self::build(state, operator_credentials(), Some(MONITORING_ACCOUNT))
    }

    pub fn build(
        state: ReconciliationState,
        credentials: CredentialSet,
        monitoring_account: Option<&str>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("function.zip");
        std::fs::write(&artifact, b"PK\x03\x04exports.handler = async () => {}").unwrap();

        let cloud = FakeCloud::new();
        let store = Arc::new(MemoryStateStore::new(state));
        let config = DeployConfig {
            component_name: "lambda-cron".into(),
            monitoring_account_id: monitoring_account.map(String::from),
            role_propagation_delay_secs: 0,
            ..DeployConfig::default()
        };
        let lambda_cron = LambdaCron::new(
            config,
            credentials,
            store.clone(),
            Arc::new(FakeFactory { cloud: cloud.clone() }),
        );

        Self {
            cloud,
            store,
            lambda_cron,
            artifact,
            _dir: dir,
        }
    }

    pub fn inputs(&self) -> DeploymentInputs {
        let mut inputs = DeploymentInputs::new("rate(5 minutes)", self.artifact.clone());
        inputs.name = Some("reports".into());
        inputs
    }
}

pub fn operator_credentials() -> CredentialSet {
    CredentialSet {
        access_key_id: Some("AKIAOPERATOR".into()),
        secret_access_key: Some("operator-secret".into()),
        session_token: None,
    }
}

/// State comparison without the modification timestamp.
pub fn without_timestamp(state: &ReconciliationState) -> ReconciliationState {
    ReconciliationState {
        updated_at: None,
        ..state.clone()
    }
}
