use chrono::{Duration, TimeZone, Utc};

use lambda_cron_core::metrics::{MetricResource, TimeRange};
use lambda_cron_deploy::{DeployError, ProviderError, Step};

use crate::fake::DELEGATED_KEY;
use crate::{without_timestamp, Harness};

fn range() -> TimeRange {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    TimeRange::new(start, start + Duration::hours(6)).unwrap()
}

#[tokio::test]
async fn metrics_use_only_the_delegated_credential() {
    let h = Harness::new();
    h.lambda_cron.deploy(&h.inputs()).await.unwrap();

    let series = h.lambda_cron.metrics(range()).await.unwrap();

    assert_eq!(series.function_name, "reports-lambda");
    assert_eq!(series.period_secs, 300);
    assert!(series.metric("Invocations").is_some());
    assert!(series.metric("Duration").is_some());

    let inner = h.cloud.lock();
    assert_eq!(inner.assume_calls.len(), 1);
    let assume = &inner.assume_calls[0];
    assert_eq!(assume.role_arn, "arn:aws:iam::123456789012:role/reports-meta-role");
    assert_eq!(assume.duration_secs, 900);
    assert!(assume.session_name.starts_with("session"));

    assert_eq!(inner.metrics_calls.len(), 1);
    let call = &inner.metrics_calls[0];
    assert_eq!(call.access_key_id, DELEGATED_KEY);
    assert_ne!(call.access_key_id, "AKIAOPERATOR");
    assert_eq!(call.session_token, "delegated-token");
    assert_eq!(call.region, "us-east-1");
    assert_eq!(
        call.query.resources,
        vec![MetricResource::Lambda { function_name: "reports-lambda".into() }]
    );
}

#[tokio::test]
async fn metrics_without_meta_role_fail_before_assume() {
    let h = Harness::new();
    let mut inputs = h.inputs();
    inputs.monitoring = Some(false);
    h.lambda_cron.deploy(&inputs).await.unwrap();

    let err = h.lambda_cron.metrics(range()).await.unwrap_err();

    assert!(matches!(err, DeployError::Metrics { stage: Step::AssumeRole, .. }));
    assert!(h.cloud.lock().assume_calls.is_empty());
}

#[tokio::test]
async fn rejected_assume_role_is_a_metrics_error() {
    let h = Harness::new();
    h.lambda_cron.deploy(&h.inputs()).await.unwrap();
    h.cloud.fail("assume_role", ProviderError::AccessDenied("trust policy mismatch".into()));

    let err = h.lambda_cron.metrics(range()).await.unwrap_err();

    match err {
        DeployError::Metrics { stage, message } => {
            assert_eq!(stage, Step::AssumeRole);
            assert!(message.contains("trust policy mismatch"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.cloud.lock().metrics_calls.is_empty());
}

#[tokio::test]
async fn metrics_never_touch_state() {
    let h = Harness::new();
    h.lambda_cron.deploy(&h.inputs()).await.unwrap();
    let before = h.store.current();
    let saves = h.store.history().len();

    h.lambda_cron.metrics(range()).await.unwrap();
    h.cloud.fail("get_metrics", ProviderError::Sdk("throttled".into()));
    let err = h.lambda_cron.metrics(range()).await.unwrap_err();

    assert!(matches!(err, DeployError::Metrics { stage: Step::MetricsQuery, .. }));
    assert_eq!(h.store.history().len(), saves);
    assert_eq!(without_timestamp(&h.store.current()), without_timestamp(&before));
}

#[tokio::test]
async fn empty_state_has_nothing_to_measure() {
    let h = Harness::new();

    let err = h.lambda_cron.metrics(range()).await.unwrap_err();

    assert!(matches!(err, DeployError::Metrics { .. }));
    assert!(h.cloud.calls().is_empty());
}
