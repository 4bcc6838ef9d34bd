//! Region-bound provider construction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_types::region::Region;
use aws_types::SdkConfig;
use tracing::info;

use lambda_cron_core::AwsConfig;
use lambda_cron_deploy::{Provider, ProviderError, ProviderFactory};

use crate::cloudwatch::CloudWatchMetrics;
use crate::events::EventsRules;
use crate::iam::IamRoles;
use crate::lambda::LambdaFunctions;
use crate::sts::StsRoles;

/// Builds the AWS-backed [`Provider`] for a region.
pub struct AwsProviderFactory {
    aws: AwsConfig,
    lambda_update_timeout: Duration,
}

impl AwsProviderFactory {
    pub fn new(aws: AwsConfig, lambda_update_timeout: Duration) -> Self {
        Self {
            aws,
            lambda_update_timeout,
        }
    }
}

#[async_trait]
impl ProviderFactory for AwsProviderFactory {
    async fn connect(&self, region: &str) -> Result<Provider, ProviderError> {
        let aws = self.aws.with_region(region);
        let sdk = sdk_config(&aws)?;

        info!(
            region = %region,
            endpoint = aws.endpoint_url.as_deref().unwrap_or("(default)"),
            "AWS provider initialised"
        );

        Ok(Provider {
            region: region.to_string(),
            roles: Arc::new(IamRoles::new(&sdk)),
            functions: Arc::new(LambdaFunctions::new(&sdk, self.lambda_update_timeout)),
            rules: Arc::new(EventsRules::new(&sdk)),
            sts: Arc::new(StsRoles::new(&sdk)),
            metrics: Arc::new(CloudWatchMetrics::new(aws.endpoint_url.clone())),
        })
    }
}

/// Shared SDK config for the operator's static credentials.
///
/// Operations are gated on a configured key pair, so the ambient provider
/// chain (profiles, instance roles) is never consulted.
pub(crate) fn sdk_config(aws: &AwsConfig) -> Result<SdkConfig, ProviderError> {
    let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) else {
        return Err(ProviderError::AccessDenied(format!(
            "{}: no static AWS credentials configured",
            aws.region
        )));
    };
    let creds = Credentials::new(
        key_id,
        secret,
        aws.session_token.clone(),
        None,
        "lambda-cron-static",
    );

    let mut builder = SdkConfig::builder()
        .region(Region::new(aws.region.clone()))
        .behavior_version(BehaviorVersion::latest())
        .credentials_provider(SharedCredentialsProvider::new(creds));
    if let Some(url) = endpoint_url(aws.endpoint_url.as_deref()) {
        builder = builder.endpoint_url(url);
    }
    Ok(builder.build())
}

/// Normalise an endpoint override; blank means none.
pub(crate) fn endpoint_url(endpoint: Option<&str>) -> Option<String> {
    let endpoint = endpoint?.trim();
    if endpoint.is_empty() {
        return None;
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Some(endpoint.to_string())
    } else {
        Some(format!("https://{endpoint}"))
    }
}
