//! CloudWatch Events-backed [`RuleApi`].

use async_trait::async_trait;
use aws_sdk_cloudwatchevents::types::{RuleState, Target};
use aws_sdk_cloudwatchevents::Client;
use aws_types::SdkConfig;
use tracing::{debug, info};

use lambda_cron_deploy::{ProviderError, RuleApi, RuleOutput, RuleSpec, TargetSpec};

use crate::error::map_sdk_error;

pub struct EventsRules {
    client: Client,
}

impl EventsRules {
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk),
        }
    }
}

#[async_trait]
impl RuleApi for EventsRules {
    async fn put_rule(&self, spec: &RuleSpec) -> Result<RuleOutput, ProviderError> {
        let out = self
            .client
            .put_rule()
            .name(&spec.name)
            .schedule_expression(&spec.schedule_expression)
            .description(&spec.description)
            .state(RuleState::Enabled)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &spec.name))?;

        let arn = out.rule_arn().ok_or_else(|| {
            ProviderError::InvalidResponse(format!("{}: no RuleArn in response", spec.name))
        })?;
        Ok(RuleOutput {
            arn: arn.to_string(),
        })
    }

    async fn put_targets(&self, rule: &str, targets: &[TargetSpec]) -> Result<(), ProviderError> {
        let targets = targets
            .iter()
            .map(|t| {
                Target::builder()
                    .id(&t.id)
                    .arn(&t.arn)
                    .build()
                    .map_err(|e| ProviderError::Sdk(format!("{rule}: target {}: {e}", t.id)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let out = self
            .client
            .put_targets()
            .rule(rule)
            .set_targets(Some(targets))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, rule))?;

        // Per-target failures come back in a successful response.
        if let Some(failed) = out.failed_entries().first() {
            return Err(ProviderError::Sdk(format!(
                "{rule}: target {} rejected: {} {}",
                failed.target_id().unwrap_or("?"),
                failed.error_code().unwrap_or("unknown"),
                failed.error_message().unwrap_or("")
            )));
        }
        Ok(())
    }

    async fn delete_rule(&self, name: &str) -> Result<(), ProviderError> {
        // A rule with targets cannot be deleted.
        let listed = self
            .client
            .list_targets_by_rule()
            .rule(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, name))?;
        let ids: Vec<String> = listed.targets().iter().map(|t| t.id().to_string()).collect();

        if !ids.is_empty() {
            debug!(rule = %name, targets = ids.len(), "Removing rule targets");
            self.client
                .remove_targets()
                .rule(name)
                .set_ids(Some(ids))
                .send()
                .await
                .map_err(|e| map_sdk_error(e, name))?;
        }

        info!(rule = %name, "Deleting rule");
        self.client
            .delete_rule()
            .name(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, name))?;
        Ok(())
    }
}
