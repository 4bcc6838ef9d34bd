use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lambda_cron_core::{
    CoreError, CredentialSet, DeployConfig, MemoryStateStore, ReconciliationState, StateStore,
};
use lambda_cron_deploy::{DeployError, LambdaCron, ProviderError, Step};

use crate::fake::{FakeFactory, ACCOUNT};
use crate::{operator_credentials, Harness};

/// Memory store whose first `failing_saves` saves are rejected.
struct FlakyStore {
    inner: MemoryStateStore,
    failing_saves: AtomicUsize,
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn load(&self) -> Result<ReconciliationState, CoreError> {
        self.inner.load().await
    }

    async fn save(&self, state: &ReconciliationState) -> Result<(), CoreError> {
        let remaining = self.failing_saves.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_saves.store(remaining - 1, Ordering::SeqCst);
            return Err(CoreError::State("disk full".into()));
        }
        self.inner.save(state).await
    }

    fn location(&self) -> String {
        "flaky".to_string()
    }
}

fn recorded(with_meta_role: bool) -> ReconciliationState {
    let state = ReconciliationState::default()
        .with_deployment("reports", "us-east-1")
        .with_role("reports-role", &format!("arn:aws:iam::{ACCOUNT}:role/reports-role"))
        .with_lambda(
            "reports-lambda",
            &format!("arn:aws:lambda:us-east-1:{ACCOUNT}:function:reports-lambda"),
        )
        .with_rule("reports-rule", &format!("arn:aws:events:us-east-1:{ACCOUNT}:rule/reports-rule"))
        .with_target("reports-target");
    if with_meta_role {
        state.with_meta_role(
            "reports-meta-role",
            &format!("arn:aws:iam::{ACCOUNT}:role/reports-meta-role"),
        )
    } else {
        state
    }
}

#[tokio::test]
async fn remove_after_deploy_leaves_nothing() {
    let h = Harness::new();
    h.lambda_cron.deploy(&h.inputs()).await.unwrap();

    let report = h.lambda_cron.remove().await.unwrap();

    assert_eq!(report.removed.len(), 4);
    assert!(report.skipped.is_empty());
    assert!(report.removed.iter().all(|r| !r.already_absent));
    assert_eq!(h.store.current(), ReconciliationState::default());

    let inner = h.cloud.lock();
    assert!(inner.roles.is_empty());
    assert!(inner.functions.is_empty());
    assert!(inner.rules.is_empty());
    assert!(inner.targets.is_empty());
    assert!(inner.permissions.is_empty());
}

#[tokio::test]
async fn remove_uses_region_from_state() {
    let h = Harness::new();
    let mut inputs = h.inputs();
    inputs.region = Some("ap-southeast-2".into());
    h.lambda_cron.deploy(&inputs).await.unwrap();

    h.lambda_cron.remove().await.unwrap();

    assert_eq!(h.cloud.lock().connects, vec!["ap-southeast-2", "ap-southeast-2"]);
}

#[tokio::test]
async fn partial_state_skips_only_missing_resources() {
    let h = Harness::new();
    let mut inputs = h.inputs();
    inputs.monitoring = Some(false);
    h.lambda_cron.deploy(&inputs).await.unwrap();

    let report = h.lambda_cron.remove().await.unwrap();

    assert_eq!(report.skipped, vec![Step::MetaRole]);
    assert_eq!(report.removed.len(), 3);
    assert!(!h.cloud.called("delete_role reports-meta-role"));
    assert!(h.store.current().is_empty());
}

#[tokio::test]
async fn state_after_function_failure_removes_just_the_role() {
    let h = Harness::new();
    h.cloud.fail("ensure_function", ProviderError::Sdk("boom".into()));
    assert!(h.lambda_cron.deploy(&h.inputs()).await.is_err());
    h.cloud.clear_faults();

    let report = h.lambda_cron.remove().await.unwrap();

    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].step, Step::ExecutionRole);
    assert_eq!(report.skipped, vec![Step::Rule, Step::Function, Step::MetaRole]);
    assert!(!h.cloud.called("delete_function"));
    assert!(!h.cloud.called("delete_rule"));
    assert!(h.cloud.lock().roles.is_empty());
}

#[tokio::test]
async fn failed_deletion_is_kept_and_others_still_run() {
    let h = Harness::new();
    h.lambda_cron.deploy(&h.inputs()).await.unwrap();
    h.cloud.fail("delete_function", ProviderError::AccessDenied("lambda:DeleteFunction".into()));

    let err = h.lambda_cron.remove().await.unwrap_err();

    match &err {
        DeployError::Removal { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].step, Step::Function);
            assert_eq!(failures[0].resource, "reports-lambda");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.cloud.called("delete_role reports-role"));
    assert!(h.cloud.called("delete_role reports-meta-role"));

    let state = h.store.current();
    assert_eq!(state.lambda_name.as_deref(), Some("reports-lambda"));
    assert!(state.rule_name.is_none());
    assert!(state.role_name.is_none());
    assert!(state.meta_role_name.is_none());

    // A second remove retries only the function.
    h.cloud.clear_faults();
    let report = h.lambda_cron.remove().await.unwrap();
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].name, "reports-lambda");
    assert_eq!(h.store.current(), ReconciliationState::default());
}

#[tokio::test]
async fn already_deleted_resources_count_as_removed() {
    // Nothing exists in the cloud, yet state records everything.
    let h = Harness::with_state(recorded(true));

    let report = h.lambda_cron.remove().await.unwrap();

    assert_eq!(report.removed.len(), 4);
    assert!(report.removed.iter().all(|r| r.already_absent));
    assert_eq!(h.store.current(), ReconciliationState::default());
}

#[tokio::test]
async fn recorded_state_without_meta_role() {
    let h = Harness::with_state(recorded(false));

    let report = h.lambda_cron.remove().await.unwrap();

    assert_eq!(report.skipped, vec![Step::MetaRole]);
    assert!(h.store.current().is_empty());
}

#[tokio::test]
async fn empty_state_needs_no_connection() {
    let h = Harness::new();

    let report = h.lambda_cron.remove().await.unwrap();

    assert!(report.removed.is_empty());
    assert_eq!(report.skipped.len(), 4);
    assert!(h.cloud.lock().connects.is_empty());
}

#[tokio::test]
async fn remove_requires_credentials() {
    let h = Harness::build(recorded(true), CredentialSet::default(), Some("1"));

    let err = h.lambda_cron.remove().await.unwrap_err();

    assert!(matches!(err, DeployError::Configuration(_)));
    assert!(h.cloud.calls().is_empty());
    assert!(!h.store.current().is_empty());
}

#[tokio::test]
async fn failed_state_save_does_not_stop_remaining_deletions() {
    let h = Harness::new();
    h.lambda_cron.deploy(&h.inputs()).await.unwrap();

    let store = Arc::new(FlakyStore {
        inner: MemoryStateStore::new(h.store.current()),
        failing_saves: AtomicUsize::new(1),
    });
    let lambda_cron = LambdaCron::new(
        DeployConfig::default(),
        operator_credentials(),
        store.clone(),
        Arc::new(FakeFactory { cloud: h.cloud.clone() }),
    );

    let err = lambda_cron.remove().await.unwrap_err();

    match &err {
        DeployError::Removal { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].step, Step::Rule);
            assert_eq!(failures[0].resource, "flaky");
            assert!(failures[0].message.contains("disk full"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.cloud.called("delete_function reports-lambda"));
    assert!(h.cloud.called("delete_role reports-role"));
    assert!(h.cloud.called("delete_role reports-meta-role"));
    assert!(h.cloud.lock().functions.is_empty());
    assert!(h.cloud.lock().roles.is_empty());

    // Later checkpoints saved, so the store ends up recording nothing.
    assert!(store.inner.current().is_empty());
}
