//! CloudWatch-backed [`MetricsApi`].
//!
//! Each request builds a client from the delegated credential alone. The
//! operator's credentials are never in scope here.

use std::collections::BTreeMap;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{
    Dimension, Metric, MetricDataQuery, MetricStat, ScanBy, StandardUnit,
};
use aws_sdk_cloudwatch::Client;
use aws_types::region::Region;
use aws_types::SdkConfig;
use chrono::{TimeZone, Utc};
use tracing::debug;

use lambda_cron_core::metrics::{
    DelegatedCredential, MetricData, MetricPoint, MetricResource, MetricSeries, MetricsQuery,
    LAMBDA_NAMESPACE,
};
use lambda_cron_deploy::{MetricsApi, ProviderError};

use crate::client::endpoint_url;
use crate::error::map_sdk_error;

pub struct CloudWatchMetrics {
    endpoint_url: Option<String>,
}

impl CloudWatchMetrics {
    pub fn new(endpoint_url: Option<String>) -> Self {
        Self { endpoint_url }
    }

    fn client(&self, credential: &DelegatedCredential, region: &str) -> Client {
        let creds = Credentials::new(
            &credential.access_key_id,
            &credential.secret_access_key,
            Some(credential.session_token.clone()),
            credential.expiration.map(SystemTime::from),
            "lambda-cron-delegated",
        );
        let mut builder = SdkConfig::builder()
            .region(Region::new(region.to_string()))
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(SharedCredentialsProvider::new(creds));
        if let Some(url) = endpoint_url(self.endpoint_url.as_deref()) {
            builder = builder.endpoint_url(url);
        }
        Client::new(&builder.build())
    }
}

#[async_trait]
impl MetricsApi for CloudWatchMetrics {
    async fn get_metrics(
        &self,
        credential: &DelegatedCredential,
        region: &str,
        query: &MetricsQuery,
    ) -> Result<MetricSeries, ProviderError> {
        let function_name = match query.resources.first() {
            Some(MetricResource::Lambda { function_name }) => function_name.clone(),
            None => {
                return Err(ProviderError::InvalidResponse(
                    "metrics query names no resource".to_string(),
                ))
            }
        };
        let client = self.client(credential, region);
        let queries = data_queries(&function_name, query)?;

        let mut points: BTreeMap<String, Vec<MetricPoint>> = BTreeMap::new();
        let mut next_token: Option<String> = None;
        loop {
            let out = client
                .get_metric_data()
                .set_metric_data_queries(Some(queries.clone()))
                .start_time(AwsDateTime::from_secs(query.range.start.timestamp()))
                .end_time(AwsDateTime::from_secs(query.range.end.timestamp()))
                .scan_by(ScanBy::TimestampAscending)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, &function_name))?;

            for result in out.metric_data_results() {
                let Some(id) = result.id() else { continue };
                let entry = points.entry(id.to_string()).or_default();
                for (ts, value) in result.timestamps().iter().zip(result.values()) {
                    if let Some(timestamp) = Utc.timestamp_opt(ts.secs(), 0).single() {
                        entry.push(MetricPoint {
                            timestamp,
                            value: *value,
                        });
                    }
                }
            }

            match out.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(function = %function_name, series = points.len(), "Metric data received");
        Ok(MetricSeries {
            function_name,
            range: query.range,
            period_secs: query.period_secs,
            metrics: collect_series(query, points),
        })
    }
}

fn data_queries(
    function_name: &str,
    query: &MetricsQuery,
) -> Result<Vec<MetricDataQuery>, ProviderError> {
    let dimension = Dimension::builder()
        .name("FunctionName")
        .value(function_name)
        .build();

    query
        .stats
        .iter()
        .map(|stat| {
            let metric = Metric::builder()
                .namespace(LAMBDA_NAMESPACE)
                .metric_name(&stat.metric_name)
                .dimensions(dimension.clone())
                .build();
            let metric_stat = MetricStat::builder()
                .metric(metric)
                .period(query.period_secs)
                .stat(&stat.stat)
                .unit(StandardUnit::from(stat.unit.as_str()))
                .build();
            Ok(MetricDataQuery::builder()
                .id(&stat.id)
                .label(&stat.metric_name)
                .metric_stat(metric_stat)
                .return_data(true)
                .build())
        })
        .collect()
}

/// One [`MetricData`] per requested stat, in request order, points oldest
/// first. Stats with no datapoints come back empty rather than missing.
fn collect_series(
    query: &MetricsQuery,
    mut points: BTreeMap<String, Vec<MetricPoint>>,
) -> Vec<MetricData> {
    query
        .stats
        .iter()
        .map(|stat| {
            let mut series = points.remove(&stat.id).unwrap_or_default();
            series.sort_by_key(|p| p.timestamp);
            MetricData {
                name: stat.metric_name.clone(),
                stat: stat.stat.clone(),
                unit: stat.unit.clone(),
                points: series,
            }
        })
        .collect()
}
