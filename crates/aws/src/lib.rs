//! AWS SDK implementations of the lambda-cron capability traits.
//!
//! [`AwsProviderFactory`] builds, per region, clients for IAM, Lambda,
//! CloudWatch Events and STS from the operator's credentials, plus a
//! CloudWatch backend that only ever authenticates with a delegated
//! credential.

pub mod client;
pub mod cloudwatch;
mod error;
pub mod events;
pub mod iam;
pub mod lambda;
pub mod sts;

pub use client::AwsProviderFactory;
