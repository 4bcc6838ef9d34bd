//! Execution role and monitoring meta-role provisioning.

use tracing::info;

use lambda_cron_core::policy::{
    account_trust_policy, execution_role_policy, meta_role_policy, service_trust_policy,
    LAMBDA_SERVICE_PRINCIPAL,
};
use lambda_cron_core::ResourceNames;

use crate::error::{DeployError, Step};
use crate::provider::{RoleApi, RoleOutput, RoleSpec};

/// Role the function runs as: assumable by the function service, allowed to
/// write its own logs and, when attached to a VPC, manage its interfaces.
pub fn execution_role_spec(names: &ResourceNames, vpc_attached: bool) -> RoleSpec {
    RoleSpec {
        name: names.role.clone(),
        description: Some(format!("Execution role for lambda-cron deployment {}", names.name)),
        trust_policy: service_trust_policy(LAMBDA_SERVICE_PRINCIPAL),
        permission_policy: execution_role_policy(vpc_attached),
    }
}

/// Read-only role the monitoring account assumes to fetch metrics and logs.
pub fn meta_role_spec(names: &ResourceNames, monitoring_account_id: &str) -> RoleSpec {
    RoleSpec {
        name: names.meta_role.clone(),
        description: Some(names.meta_role_description()),
        trust_policy: account_trust_policy(monitoring_account_id),
        permission_policy: meta_role_policy(),
    }
}

/// Create or update a role. Any failure is fatal to the deploy.
pub async fn ensure_role(
    roles: &dyn RoleApi,
    spec: &RoleSpec,
    step: Step,
) -> Result<RoleOutput, DeployError> {
    info!(role = %spec.name, step = %step, "Creating or updating IAM role");

    let output = roles
        .ensure_role(spec)
        .await
        .map_err(|e| DeployError::provisioning(step, &spec.name, e))?;

    info!(
        role = %spec.name,
        arn = %output.arn,
        created = output.created,
        "IAM role ready"
    );
    Ok(output)
}
