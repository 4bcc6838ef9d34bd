//! The deploy / remove / metrics entry points.
//!
//! Deploy runs a fixed pipeline:
//!
//! 1. credential gate, schedule validation, monitoring config, artifact read
//! 2. execution role
//! 3. function
//! 4. schedule rule, invoke permission, rule target (in that order)
//! 5. meta-role, when monitoring is enabled
//!
//! Step 1 touches nothing. Every later step saves its identifiers to the
//! [`StateStore`] before the next one starts, so a failed deploy leaves a
//! state that names exactly what exists and a retry converges from there.
//!
//! Only one invocation per deployment name is expected at a time; the state
//! store is not locked.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use lambda_cron_core::config::DEFAULT_REGION;
use lambda_cron_core::metrics::{MetricSeries, TimeRange};
use lambda_cron_core::{
    ensure_credentials, parse_schedule, CredentialSet, DeployConfig, DeploymentInputs,
    ReconciliationState, ResourceNames, StateStore,
};

use crate::binder::{PermissionGrant, ScheduleBinder};
use crate::error::{DeployError, Step};
use crate::function::{ensure_function, function_spec, load_artifact};
use crate::metrics::MetricsRetriever;
use crate::provider::{FunctionOutput, Provider, ProviderFactory};
use crate::remove::{RemoveReport, Remover};
use crate::role::{ensure_role, execution_role_spec, meta_role_spec};

/// What a successful deploy produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub name: String,
    pub region: String,
    pub schedule: String,
    pub role_arn: String,
    pub function: FunctionOutput,
    pub rule_arn: String,
    pub permission: PermissionGrant,
    pub target_id: String,
    pub meta_role_arn: Option<String>,
    pub state: ReconciliationState,
}

impl DeployReport {
    /// True when the invoke-permission grant hit an existing statement.
    pub fn tolerated_conflict(&self) -> bool {
        self.permission.was_tolerated()
    }
}

pub struct LambdaCron {
    config: DeployConfig,
    credentials: CredentialSet,
    default_region: String,
    store: Arc<dyn StateStore>,
    factory: Arc<dyn ProviderFactory>,
}

impl LambdaCron {
    pub fn new(
        config: DeployConfig,
        credentials: CredentialSet,
        store: Arc<dyn StateStore>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            config,
            credentials,
            default_region: DEFAULT_REGION.to_string(),
            store,
            factory,
        }
    }

    /// Region used when neither the inputs nor the state carry one.
    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }

    pub async fn state(&self) -> Result<ReconciliationState, DeployError> {
        self.store.load().await.map_err(DeployError::State)
    }

    /// Create or update every resource the inputs describe.
    pub async fn deploy(&self, inputs: &DeploymentInputs) -> Result<DeployReport, DeployError> {
        // Nothing below may reach the network until these pass.
        ensure_credentials(&self.credentials)?;
        let schedule = parse_schedule(&inputs.schedule)?.to_string();
        let monitoring_account = if inputs.monitoring_enabled() {
            let account = self.config.monitoring_account_id.clone().ok_or_else(|| {
                DeployError::Configuration(
                    "monitoring is enabled but MONITORING_ACCOUNT_ID is not set (set it, or pass monitoring: false)"
                        .to_string(),
                )
            })?;
            Some(account)
        } else {
            None
        };

        let name = inputs.name_or(&self.config.component_name).to_string();
        let region = inputs.region_or(&self.default_region).to_string();
        let names = ResourceNames::for_deployment(&name);
        let artifact = load_artifact(&inputs.src).await?;

        let state = self.store.load().await.map_err(DeployError::State)?;
        if let Some(existing) = state.name.as_deref().filter(|n| *n != name) {
            if !state.is_empty() {
                return Err(DeployError::Configuration(format!(
                    "state at {} belongs to deployment '{}'; remove it before deploying '{}'",
                    self.store.location(),
                    existing,
                    name
                )));
            }
        }
        if let Some(existing) = state.region.as_deref().filter(|r| *r != region) {
            if !state.is_empty() {
                return Err(DeployError::Configuration(format!(
                    "deployment '{}' lives in {}; remove it before moving it to {}",
                    name, existing, region
                )));
            }
        }

        let provider = self.connect(&region).await?;
        info!(deployment = %name, region = %region, schedule = %schedule, "Deploying");

        let state = self.checkpoint(state.with_deployment(&name, &region)).await?;

        // Execution role.
        let role = ensure_role(
            provider.roles.as_ref(),
            &execution_role_spec(&names, inputs.vpc.is_some()),
            Step::ExecutionRole,
        )
        .await?;
        let state = self.checkpoint(state.with_role(&names.role, &role.arn)).await?;
        if role.created && !self.config.role_propagation_delay().is_zero() {
            info!(
                delay_secs = self.config.role_propagation_delay_secs,
                "Waiting for new role to propagate"
            );
            tokio::time::sleep(self.config.role_propagation_delay()).await;
        }

        // Function.
        let function = ensure_function(
            provider.functions.as_ref(),
            &function_spec(&names, &role.arn, &artifact, inputs),
        )
        .await?;
        let state = self
            .checkpoint(state.with_lambda(&names.lambda, &function.arn))
            .await?;

        // Rule, permission, target.
        let binder = ScheduleBinder::new(provider.rules.as_ref(), provider.functions.as_ref(), &names);
        let rule = binder.put_rule(&schedule).await?;
        let state = self.checkpoint(state.with_rule(&names.rule, &rule.arn)).await?;
        let permission = binder.grant_invoke_permission(&rule.arn).await?;
        let target = binder.bind_target(&function.arn).await?;
        let state = self.checkpoint(state.with_target(&target.id)).await?;

        // Meta-role.
        let (state, meta_role_arn) = match monitoring_account {
            Some(account) => {
                info!("Creating or updating the meta IAM role");
                let meta = ensure_role(
                    provider.roles.as_ref(),
                    &meta_role_spec(&names, &account),
                    Step::MetaRole,
                )
                .await?;
                let state = self
                    .checkpoint(state.with_meta_role(&names.meta_role, &meta.arn))
                    .await?;
                (state, Some(meta.arn))
            }
            None => {
                if state.meta_role_name.is_some() {
                    warn!(
                        role = ?state.meta_role_name,
                        "Monitoring disabled but a meta role is recorded; it is kept until remove"
                    );
                }
                (state, None)
            }
        };

        info!(deployment = %name, function = %function.arn, "Deploy complete");
        Ok(DeployReport {
            name,
            region,
            schedule,
            role_arn: role.arn,
            function,
            rule_arn: rule.arn,
            permission,
            target_id: target.id,
            meta_role_arn,
            state,
        })
    }

    /// Delete everything recorded in state.
    pub async fn remove(&self) -> Result<RemoveReport, DeployError> {
        ensure_credentials(&self.credentials)?;

        let state = self.store.load().await.map_err(DeployError::State)?;
        if state.is_empty() {
            info!(state = %self.store.location(), "Nothing recorded, nothing to remove");
            self.store
                .save(&ReconciliationState::default())
                .await
                .map_err(DeployError::State)?;
            return Ok(RemoveReport {
                removed: Vec::new(),
                skipped: vec![Step::Rule, Step::Function, Step::ExecutionRole, Step::MetaRole],
            });
        }

        let region = state
            .region
            .clone()
            .unwrap_or_else(|| self.default_region.clone());
        let provider = self.connect(&region).await?;
        info!(deployment = ?state.name, region = %region, "Removing");

        Remover::new(&provider, self.store.as_ref()).remove(state).await
    }

    /// Fetch function metrics over `range` through the meta-role.
    pub async fn metrics(&self, range: TimeRange) -> Result<MetricSeries, DeployError> {
        ensure_credentials(&self.credentials)?;

        let state = self.store.load().await.map_err(DeployError::State)?;
        let region = state
            .region
            .clone()
            .unwrap_or_else(|| self.default_region.clone());
        let provider = self
            .factory
            .connect(&region)
            .await
            .map_err(|e| DeployError::metrics(Step::AssumeRole, e.to_string()))?;

        MetricsRetriever::new(provider.sts.as_ref(), provider.metrics.as_ref(), &region)
            .fetch(&state, range)
            .await
    }

    async fn connect(&self, region: &str) -> Result<Provider, DeployError> {
        self.factory
            .connect(region)
            .await
            .map_err(|e| DeployError::Configuration(format!("cannot connect to {region}: {e}")))
    }

    async fn checkpoint(&self, state: ReconciliationState) -> Result<ReconciliationState, DeployError> {
        let state = state.touch();
        self.store.save(&state).await.map_err(DeployError::State)?;
        Ok(state)
    }
}
