//! IAM-backed [`RoleApi`].

use async_trait::async_trait;
use aws_sdk_iam::Client;
use aws_types::SdkConfig;
use tracing::{debug, info};

use lambda_cron_deploy::{ProviderError, RoleApi, RoleOutput, RoleSpec};

use crate::error::map_sdk_error;

pub struct IamRoles {
    client: Client,
}

impl IamRoles {
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk),
        }
    }

    /// ARN of an existing role, `None` when it does not exist.
    async fn find_role(&self, name: &str) -> Result<Option<String>, ProviderError> {
        match self.client.get_role().role_name(name).send().await {
            Ok(out) => Ok(out.role().map(|r| r.arn().to_string())),
            Err(e) => match map_sdk_error(e, name) {
                err if err.is_not_found() => Ok(None),
                err => Err(err),
            },
        }
    }

    async fn create_role(&self, spec: &RoleSpec) -> Result<String, ProviderError> {
        let out = self
            .client
            .create_role()
            .role_name(&spec.name)
            .assume_role_policy_document(spec.trust_policy.to_string())
            .set_description(spec.description.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &spec.name))?;

        out.role()
            .map(|r| r.arn().to_string())
            .ok_or_else(|| ProviderError::InvalidResponse(format!("{}: no role in CreateRole response", spec.name)))
    }

    async fn put_inline_policy(&self, spec: &RoleSpec) -> Result<(), ProviderError> {
        self.client
            .put_role_policy()
            .role_name(&spec.name)
            .policy_name(spec.inline_policy_name())
            .policy_document(spec.permission_policy.to_string())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &spec.name))?;
        Ok(())
    }
}

#[async_trait]
impl RoleApi for IamRoles {
    async fn ensure_role(&self, spec: &RoleSpec) -> Result<RoleOutput, ProviderError> {
        let (arn, created) = match self.find_role(&spec.name).await? {
            Some(arn) => {
                debug!(role = %spec.name, "Role exists, updating trust policy");
                self.client
                    .update_assume_role_policy()
                    .role_name(&spec.name)
                    .policy_document(spec.trust_policy.to_string())
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, &spec.name))?;
                (arn, false)
            }
            None => {
                info!(role = %spec.name, "Creating role");
                (self.create_role(spec).await?, true)
            }
        };

        self.put_inline_policy(spec).await?;
        Ok(RoleOutput { arn, created })
    }

    async fn delete_role(&self, name: &str) -> Result<(), ProviderError> {
        // A role with policies attached cannot be deleted.
        let inline = self
            .client
            .list_role_policies()
            .role_name(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, name))?;
        for policy in inline.policy_names() {
            debug!(role = %name, policy = %policy, "Deleting inline policy");
            self.client
                .delete_role_policy()
                .role_name(name)
                .policy_name(policy)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, name))?;
        }

        let attached = self
            .client
            .list_attached_role_policies()
            .role_name(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, name))?;
        for policy_arn in attached.attached_policies().iter().filter_map(|p| p.policy_arn()) {
            debug!(role = %name, policy = %policy_arn, "Detaching managed policy");
            self.client
                .detach_role_policy()
                .role_name(name)
                .policy_arn(policy_arn)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, name))?;
        }

        self.client
            .delete_role()
            .role_name(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, name))?;
        Ok(())
    }
}
