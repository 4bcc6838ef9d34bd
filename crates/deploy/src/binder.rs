//! Schedule binding: rule, invoke permission, target.
//!
//! The three calls must run in this order. The permission's source condition
//! is the rule ARN, so the rule has to exist first; and a rule whose target
//! lacks invoke permission fails silently at trigger time, so the permission
//! goes in before the target. The platform does not enforce either ordering.

use serde::Serialize;
use tracing::{info, warn};

use lambda_cron_core::policy::EVENTS_SERVICE_PRINCIPAL;
use lambda_cron_core::ResourceNames;

use crate::error::{DeployError, Step};
use crate::provider::{FunctionApi, PermissionSpec, RuleApi, RuleOutput, RuleSpec, TargetSpec};

pub const INVOKE_ACTION: &str = "lambda:InvokeFunction";

/// Outcome of the invoke-permission grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PermissionGrant {
    Granted,
    /// The statement was already present. Treated as success.
    AlreadyGranted { statement_id: String, detail: String },
}

impl PermissionGrant {
    pub fn was_tolerated(&self) -> bool {
        matches!(self, PermissionGrant::AlreadyGranted { .. })
    }
}

pub struct ScheduleBinder<'a> {
    rules: &'a dyn RuleApi,
    functions: &'a dyn FunctionApi,
    names: &'a ResourceNames,
}

impl<'a> ScheduleBinder<'a> {
    pub fn new(rules: &'a dyn RuleApi, functions: &'a dyn FunctionApi, names: &'a ResourceNames) -> Self {
        Self {
            rules,
            functions,
            names,
        }
    }

    /// Step 1: create or replace the rule definition.
    pub async fn put_rule(&self, schedule_expression: &str) -> Result<RuleOutput, DeployError> {
        let spec = RuleSpec {
            name: self.names.rule.clone(),
            schedule_expression: schedule_expression.to_string(),
            description: self.names.rule_description(),
        };
        info!(rule = %spec.name, schedule = %spec.schedule_expression, "Putting schedule rule");

        let output = self
            .rules
            .put_rule(&spec)
            .await
            .map_err(|e| DeployError::provisioning(Step::Rule, &spec.name, e))?;

        info!(rule = %spec.name, arn = %output.arn, "Schedule rule ready");
        Ok(output)
    }

    /// Step 2: let the events service invoke the function, scoped to the rule.
    ///
    /// An existing statement comes back as [`PermissionGrant::AlreadyGranted`];
    /// any other failure is fatal.
    pub async fn grant_invoke_permission(
        &self,
        rule_arn: &str,
    ) -> Result<PermissionGrant, DeployError> {
        let spec = PermissionSpec {
            function_name: self.names.lambda.clone(),
            statement_id: self.names.permission_statement.clone(),
            action: INVOKE_ACTION.to_string(),
            principal: EVENTS_SERVICE_PRINCIPAL.to_string(),
            source_arn: rule_arn.to_string(),
        };

        match self.functions.add_permission(&spec).await {
            Ok(()) => {
                info!(
                    function = %spec.function_name,
                    statement = %spec.statement_id,
                    "Invoke permission granted to schedule rule"
                );
                Ok(PermissionGrant::Granted)
            }
            Err(e) if e.is_conflict() => {
                warn!(
                    function = %spec.function_name,
                    statement = %spec.statement_id,
                    "Invoke permission already present, continuing"
                );
                Ok(PermissionGrant::AlreadyGranted {
                    statement_id: spec.statement_id,
                    detail: e.to_string(),
                })
            }
            Err(e) => Err(DeployError::provisioning(
                Step::Permission,
                &spec.function_name,
                e,
            )),
        }
    }

    /// Step 3: point the rule at the function.
    pub async fn bind_target(&self, function_arn: &str) -> Result<TargetSpec, DeployError> {
        let target = TargetSpec {
            id: self.names.target_id.clone(),
            arn: function_arn.to_string(),
        };

        self.rules
            .put_targets(&self.names.rule, std::slice::from_ref(&target))
            .await
            .map_err(|e| DeployError::provisioning(Step::Target, &self.names.rule, e))?;

        info!(rule = %self.names.rule, target = %target.id, "Rule bound to function");
        Ok(target)
    }
}
