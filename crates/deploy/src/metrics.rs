//! Metrics retrieval through the meta-role.
//!
//! The query runs with a credential obtained by assuming the meta-role, never
//! with the operator's own credentials. The credential lives only for the
//! duration of one call.

use chrono::Utc;
use tracing::info;

use lambda_cron_core::metrics::{MetricSeries, MetricsQuery, TimeRange, DELEGATED_CREDENTIAL_SECS};
use lambda_cron_core::ReconciliationState;

use crate::error::{DeployError, Step};
use crate::provider::{MetricsApi, StsApi};

pub fn session_name() -> String {
    format!("session{}", Utc::now().timestamp_millis())
}

pub struct MetricsRetriever<'a> {
    sts: &'a dyn StsApi,
    metrics: &'a dyn MetricsApi,
    region: &'a str,
}

impl<'a> MetricsRetriever<'a> {
    pub fn new(sts: &'a dyn StsApi, metrics: &'a dyn MetricsApi, region: &'a str) -> Self {
        Self { sts, metrics, region }
    }

    /// Fetch usage metrics for the function recorded in `state`.
    pub async fn fetch(
        &self,
        state: &ReconciliationState,
        range: TimeRange,
    ) -> Result<MetricSeries, DeployError> {
        let meta_role_arn = state.meta_role_arn.as_deref().ok_or_else(|| {
            DeployError::metrics(
                Step::AssumeRole,
                "no meta role recorded: deploy has not run or monitoring is disabled",
            )
        })?;
        let function_name = state.lambda_name.as_deref().ok_or_else(|| {
            DeployError::metrics(Step::MetricsQuery, "no function recorded in state")
        })?;

        let session = session_name();
        info!(role = %meta_role_arn, session = %session, "Assuming meta role for metrics");

        let credential = self
            .sts
            .assume_role(meta_role_arn, &session, DELEGATED_CREDENTIAL_SECS)
            .await
            .map_err(|e| DeployError::metrics(Step::AssumeRole, format!("{meta_role_arn}: {e}")))?;

        let query = MetricsQuery::for_function(function_name, range);
        let series = self
            .metrics
            .get_metrics(&credential, self.region, &query)
            .await
            .map_err(|e| DeployError::metrics(Step::MetricsQuery, format!("{function_name}: {e}")))?;

        info!(
            function = %function_name,
            metrics = series.metrics.len(),
            period_secs = series.period_secs,
            "Metrics fetched"
        );
        Ok(series)
    }
}
