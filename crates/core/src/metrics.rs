//! Metric query and result types, plus the delegated credential used to
//! fetch them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifetime requested for the delegated metrics credential.
pub const DELEGATED_CREDENTIAL_SECS: i32 = 900;

/// Namespace the function metrics are published under.
pub const LAMBDA_NAMESPACE: &str = "AWS/Lambda";

/// Short-lived credential obtained by assuming the meta-role.
///
/// Only ever held for the duration of one metrics query.
#[derive(Clone)]
pub struct DelegatedCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for DelegatedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &"***")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Half-open query window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CoreError> {
        if start >= end {
            return Err(CoreError::Configuration(format!(
                "metrics range start ({start}) must be before end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// The trailing window ending now.
    pub fn last(window: Duration) -> Self {
        let end = Utc::now();
        Self {
            start: end - window,
            end,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Datapoint period, coarser for longer windows so the point count stays
    /// well under the per-request datapoint cap.
    pub fn period_secs(&self) -> i32 {
        let d = self.duration();
        if d <= Duration::hours(1) {
            60
        } else if d <= Duration::hours(24) {
            300
        } else if d <= Duration::days(7) {
            3600
        } else {
            86_400
        }
    }
}

/// A resource metrics are requested for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricResource {
    #[serde(rename = "aws_lambda")]
    Lambda {
        #[serde(rename = "functionName")]
        function_name: String,
    },
}

/// One metric statistic to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricStatSpec {
    /// Query id; lower-case, unique within a request.
    pub id: String,
    pub metric_name: String,
    pub stat: String,
    pub unit: String,
}

impl MetricStatSpec {
    fn new(id: &str, metric_name: &str, stat: &str, unit: &str) -> Self {
        Self {
            id: id.to_string(),
            metric_name: metric_name.to_string(),
            stat: stat.to_string(),
            unit: unit.to_string(),
        }
    }

    /// The standard function usage set.
    pub fn lambda_defaults() -> Vec<Self> {
        vec![
            Self::new("invocations", "Invocations", "Sum", "Count"),
            Self::new("errors", "Errors", "Sum", "Count"),
            Self::new("throttles", "Throttles", "Sum", "Count"),
            Self::new("duration", "Duration", "Average", "Milliseconds"),
        ]
    }
}

/// Everything a metrics backend needs for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsQuery {
    pub resources: Vec<MetricResource>,
    pub range: TimeRange,
    pub period_secs: i32,
    pub stats: Vec<MetricStatSpec>,
}

impl MetricsQuery {
    pub fn for_function(function_name: &str, range: TimeRange) -> Self {
        Self {
            resources: vec![MetricResource::Lambda {
                function_name: function_name.to_string(),
            }],
            period_secs: range.period_secs(),
            range,
            stats: MetricStatSpec::lambda_defaults(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricData {
    pub name: String,
    pub stat: String,
    pub unit: String,
    /// Oldest first.
    pub points: Vec<MetricPoint>,
}

impl MetricData {
    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeries {
    pub function_name: String,
    pub range: TimeRange,
    pub period_secs: i32,
    pub metrics: Vec<MetricData>,
}

impl MetricSeries {
    pub fn metric(&self, name: &str) -> Option<&MetricData> {
        self.metrics.iter().find(|m| m.name == name)
    }
}
