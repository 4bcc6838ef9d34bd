pub mod config;
pub mod credentials;
pub mod error;
pub mod inputs;
pub mod metrics;
pub mod policy;
pub mod schedule;
pub mod state;

pub use config::{AppConfig, AwsConfig, DeployConfig};
pub use credentials::{ensure_credentials, CredentialSet};
pub use error::*;
pub use inputs::{DeploymentInputs, ResourceNames, VpcConfig};
pub use metrics::{DelegatedCredential, MetricSeries, MetricsQuery, TimeRange};
pub use schedule::{parse_schedule, validate_schedule, Schedule};
pub use state::{FileStateStore, MemoryStateStore, ReconciliationState, StateStore};
