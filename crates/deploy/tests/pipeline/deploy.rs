use lambda_cron_core::{CredentialSet, ReconciliationState};
use lambda_cron_deploy::{DeployError, PermissionGrant, ProviderError, Step};

use crate::{operator_credentials, without_timestamp, Harness};

#[tokio::test]
async fn deploy_provisions_every_resource_in_order() {
    let h = Harness::new();

    let report = h.lambda_cron.deploy(&h.inputs()).await.unwrap();

    assert_eq!(report.name, "reports");
    assert_eq!(report.region, "us-east-1");
    assert_eq!(report.schedule, "rate(5 minutes)");
    assert_eq!(report.permission, PermissionGrant::Granted);
    assert_eq!(report.target_id, "reports-target");
    assert!(report.function.created);

    let order = [
        "ensure_role reports-role",
        "ensure_function reports-lambda",
        "put_rule reports-rule",
        "add_permission reports-lambda",
        "put_targets reports-rule",
        "ensure_role reports-meta-role",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|c| h.cloud.call_index(c).unwrap_or_else(|| panic!("missing call {c}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "calls out of order: {:?}", h.cloud.calls());

    let state = h.store.current();
    assert_eq!(state.name.as_deref(), Some("reports"));
    assert_eq!(state.region.as_deref(), Some("us-east-1"));
    assert_eq!(state.role_name.as_deref(), Some("reports-role"));
    assert_eq!(state.lambda_name.as_deref(), Some("reports-lambda"));
    assert_eq!(state.rule_name.as_deref(), Some("reports-rule"));
    assert_eq!(state.target_id.as_deref(), Some("reports-target"));
    assert_eq!(state.meta_role_name.as_deref(), Some("reports-meta-role"));
    assert_eq!(
        state.meta_role_arn.as_deref(),
        Some("arn:aws:iam::123456789012:role/reports-meta-role")
    );
    assert_eq!(without_timestamp(&state), without_timestamp(&report.state));
}

#[tokio::test]
async fn each_step_is_persisted_before_the_next() {
    let h = Harness::new();
    h.lambda_cron.deploy(&h.inputs()).await.unwrap();

    let history = h.store.history();
    assert_eq!(history.len(), 6);
    assert!(history[0].is_empty() && history[0].name.is_some());
    assert!(history[1].role_arn.is_some() && history[1].lambda_name.is_none());
    assert!(history[2].lambda_arn.is_some() && history[2].rule_name.is_none());
    assert!(history[3].rule_arn.is_some() && history[3].target_id.is_none());
    assert!(history[4].target_id.is_some() && history[4].meta_role_name.is_none());
    assert!(history[5].meta_role_arn.is_some());
    assert!(history.iter().all(|s| s.updated_at.is_some()));
}

#[tokio::test]
async fn redeploy_converges_without_duplicates() {
    let h = Harness::new();
    let first = h.lambda_cron.deploy(&h.inputs()).await.unwrap();
    let second = h.lambda_cron.deploy(&h.inputs()).await.unwrap();

    assert_eq!(without_timestamp(&first.state), without_timestamp(&second.state));
    assert!(!second.function.created);
    assert!(second.tolerated_conflict());

    let inner = h.cloud.lock();
    assert_eq!(inner.roles.len(), 2);
    assert_eq!(inner.functions.len(), 1);
    assert_eq!(inner.rules.len(), 1);
    assert_eq!(inner.targets["reports-rule"].len(), 1);
    assert_eq!(inner.permissions.len(), 1);
}

#[tokio::test]
async fn duplicate_permission_still_binds_target() {
    let h = Harness::new();
    h.cloud.fail(
        "add_permission",
        ProviderError::Conflict("The statement id provided already exists".into()),
    );

    let report = h.lambda_cron.deploy(&h.inputs()).await.unwrap();

    assert!(matches!(report.permission, PermissionGrant::AlreadyGranted { .. }));
    assert!(h.cloud.called("put_targets reports-rule"));
    assert_eq!(h.store.current().target_id.as_deref(), Some("reports-target"));
}

#[tokio::test]
async fn other_permission_failures_abort_before_target() {
    let h = Harness::new();
    h.cloud.fail("add_permission", ProviderError::AccessDenied("lambda:AddPermission".into()));

    let err = h.lambda_cron.deploy(&h.inputs()).await.unwrap_err();

    assert!(matches!(err, DeployError::Provisioning { step: Step::Permission, .. }));
    assert!(!h.cloud.called("put_targets"));
    let state = h.store.current();
    assert!(state.rule_name.is_some());
    assert!(state.target_id.is_none());
}

#[tokio::test]
async fn function_failure_keeps_role_and_skips_binding() {
    let h = Harness::new();
    h.cloud.fail("ensure_function", ProviderError::Sdk("CodeStorageExceededException".into()));

    let err = h.lambda_cron.deploy(&h.inputs()).await.unwrap_err();

    match err {
        DeployError::Provisioning { step, resource, .. } => {
            assert_eq!(step, Step::Function);
            assert_eq!(resource, "reports-lambda");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let state = h.store.current();
    assert_eq!(state.role_name.as_deref(), Some("reports-role"));
    assert!(state.role_arn.is_some());
    assert!(state.lambda_name.is_none());
    assert!(!h.cloud.called("put_rule"));
    assert!(!h.cloud.called("add_permission"));
    assert!(!h.cloud.called("put_targets"));
}

#[tokio::test]
async fn retry_after_failure_resumes_and_completes() {
    let h = Harness::new();
    h.cloud.fail("put_targets", ProviderError::Sdk("throttled".into()));
    assert!(h.lambda_cron.deploy(&h.inputs()).await.is_err());
    assert!(h.store.current().target_id.is_none());

    h.cloud.clear_faults();
    let report = h.lambda_cron.deploy(&h.inputs()).await.unwrap();

    assert!(report.tolerated_conflict());
    assert_eq!(h.store.current().target_id.as_deref(), Some("reports-target"));
    assert_eq!(h.cloud.lock().functions.len(), 1);
}

#[tokio::test]
async fn role_failure_is_fatal_and_touches_nothing_else() {
    let h = Harness::new();
    h.cloud.fail("ensure_role:reports-role", ProviderError::AccessDenied("iam:CreateRole".into()));

    let err = h.lambda_cron.deploy(&h.inputs()).await.unwrap_err();

    assert!(matches!(err, DeployError::Provisioning { step: Step::ExecutionRole, .. }));
    assert!(!h.cloud.called("ensure_function"));
    let state = h.store.current();
    assert!(state.is_empty());
    assert_eq!(state.name.as_deref(), Some("reports"));
}

#[tokio::test]
async fn invalid_schedule_is_rejected_before_any_call() {
    let h = Harness::new();
    let mut inputs = h.inputs();
    inputs.schedule = "every day".into();

    let err = h.lambda_cron.deploy(&inputs).await.unwrap_err();

    assert!(matches!(err, DeployError::Configuration(_)));
    assert!(err.to_string().contains("every day"));
    assert!(h.cloud.calls().is_empty());
    assert!(h.cloud.lock().connects.is_empty());
    assert!(h.store.history().is_empty());
}

#[tokio::test]
async fn five_field_cron_is_rejected_before_any_call() {
    let h = Harness::new();
    let mut inputs = h.inputs();
    inputs.schedule = "cron(*/5 * * * *)".into();

    let err = h.lambda_cron.deploy(&inputs).await.unwrap_err();

    assert!(matches!(err, DeployError::Configuration(_)));
    assert!(err.to_string().contains("6-7 fields"));
    assert!(h.cloud.calls().is_empty());
    assert!(h.cloud.lock().connects.is_empty());
    assert!(h.store.history().is_empty());
}

#[tokio::test]
async fn missing_credentials_are_rejected_before_any_call() {
    let h = Harness::build(ReconciliationState::default(), CredentialSet::default(), Some("1"));

    let err = h.lambda_cron.deploy(&h.inputs()).await.unwrap_err();

    assert!(matches!(err, DeployError::Configuration(_)));
    assert!(err.to_string().contains("credentials"));
    assert!(h.cloud.lock().connects.is_empty());
}

#[tokio::test]
async fn missing_artifact_is_rejected_before_any_call() {
    let h = Harness::new();
    let mut inputs = h.inputs();
    inputs.src = "/nonexistent/function.zip".into();

    let err = h.lambda_cron.deploy(&inputs).await.unwrap_err();

    assert!(matches!(err, DeployError::Configuration(_)));
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn monitoring_disabled_skips_meta_role() {
    let h = Harness::new();
    let mut inputs = h.inputs();
    inputs.monitoring = Some(false);

    let report = h.lambda_cron.deploy(&inputs).await.unwrap();

    assert!(report.meta_role_arn.is_none());
    assert!(!h.cloud.called("ensure_role reports-meta-role"));
    assert!(h.store.current().meta_role_name.is_none());
}

#[tokio::test]
async fn monitoring_without_account_is_a_configuration_error() {
    let h = Harness::build(ReconciliationState::default(), operator_credentials(), None);

    let err = h.lambda_cron.deploy(&h.inputs()).await.unwrap_err();

    assert!(matches!(err, DeployError::Configuration(_)));
    assert!(err.to_string().contains("MONITORING_ACCOUNT_ID"));
    assert!(h.cloud.calls().is_empty());

    // Opting out of monitoring needs no account.
    let mut inputs = h.inputs();
    inputs.monitoring = Some(false);
    assert!(h.lambda_cron.deploy(&inputs).await.is_ok());
}

#[tokio::test]
async fn meta_role_trusts_configured_account_read_only() {
    let h = Harness::new();
    h.lambda_cron.deploy(&h.inputs()).await.unwrap();

    let inner = h.cloud.lock();
    let meta = &inner.roles["reports-meta-role"];
    assert_eq!(
        meta.trust_policy["Statement"][0]["Principal"]["AWS"],
        "arn:aws:iam::999999999999:root"
    );
    let exec = &inner.roles["reports-role"];
    assert_eq!(
        exec.trust_policy["Statement"][0]["Principal"]["Service"],
        "lambda.amazonaws.com"
    );
}

#[tokio::test]
async fn function_receives_requested_configuration() {
    let h = Harness::new();
    let mut inputs = h.inputs();
    inputs.memory = 1024;
    inputs.timeout = 300;
    inputs.layers = vec!["arn:aws:lambda:us-east-1:123456789012:layer:deps:4".into()];
    inputs.env.insert("STAGE".into(), "prod".into());

    h.lambda_cron.deploy(&inputs).await.unwrap();

    let inner = h.cloud.lock();
    let function = &inner.functions["reports-lambda"];
    assert_eq!(function.memory_mb, 1024);
    assert_eq!(function.timeout_secs, 300);
    assert_eq!(function.layers.len(), 1);
    assert_eq!(function.env["STAGE"], "prod");
    assert_eq!(function.role_arn, "arn:aws:iam::123456789012:role/reports-role");
    assert!(!function.code.is_empty());
}

#[tokio::test]
async fn cron_schedule_reaches_rule_in_canonical_form() {
    let h = Harness::new();
    let mut inputs = h.inputs();
    inputs.schedule = " cron(0 20 * * ? *) ".into();

    h.lambda_cron.deploy(&inputs).await.unwrap();

    let inner = h.cloud.lock();
    let rule = &inner.rules["reports-rule"];
    assert_eq!(rule.schedule_expression, "cron(0 20 * * ? *)");
    assert_eq!(rule.description, "Lambda-Cron schedule rule for reports");
}

#[tokio::test]
async fn name_and_region_fall_back_to_defaults() {
    let h = Harness::new();
    let mut inputs = h.inputs();
    inputs.name = None;

    let report = h.lambda_cron.deploy(&inputs).await.unwrap();

    assert_eq!(report.name, "lambda-cron");
    assert_eq!(report.region, "us-east-1");
    assert_eq!(h.cloud.lock().connects, vec!["us-east-1"]);
    assert!(h.cloud.called("ensure_function lambda-cron-lambda"));
}

#[tokio::test]
async fn state_of_another_deployment_blocks_deploy() {
    let existing = ReconciliationState::default()
        .with_deployment("other", "us-east-1")
        .with_role("other-role", "arn:aws:iam::123456789012:role/other-role");
    let h = Harness::with_state(existing);

    let err = h.lambda_cron.deploy(&h.inputs()).await.unwrap_err();

    assert!(matches!(err, DeployError::Configuration(_)));
    assert!(err.to_string().contains("'other'"));
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn region_change_requires_remove_first() {
    let h = Harness::new();
    h.lambda_cron.deploy(&h.inputs()).await.unwrap();

    let mut inputs = h.inputs();
    inputs.region = Some("eu-west-1".into());
    let err = h.lambda_cron.deploy(&inputs).await.unwrap_err();

    assert!(matches!(err, DeployError::Configuration(_)));
    assert!(err.to_string().contains("eu-west-1"));
}
