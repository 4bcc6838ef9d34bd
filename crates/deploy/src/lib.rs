//! Reconciliation pipeline for a scheduled function.
//!
//! This crate provides:
//! - capability traits for the cloud primitives the pipeline needs
//! - the role, function, schedule-binding and meta-role steps
//! - best-effort removal and delegated-credential metrics retrieval
//! - [`LambdaCron`], which ties them together over a [`StateStore`]
//!
//! [`StateStore`]: lambda_cron_core::StateStore

pub mod binder;
pub mod error;
pub mod function;
pub mod metrics;
pub mod orchestrator;
pub mod provider;
pub mod remove;
pub mod role;

pub use binder::{PermissionGrant, ScheduleBinder};
pub use error::{DeployError, RemovalFailure, Step};
pub use orchestrator::{DeployReport, LambdaCron};
pub use provider::{
    FunctionApi, FunctionOutput, FunctionSpec, MetricsApi, PermissionSpec, Provider,
    ProviderError, ProviderFactory, RoleApi, RoleOutput, RoleSpec, RuleApi, RuleOutput, RuleSpec,
    StsApi, TargetSpec,
};
pub use remove::{RemoveReport, RemovedResource};
