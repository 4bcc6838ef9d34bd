//! STS-backed [`StsApi`].

use async_trait::async_trait;
use aws_sdk_sts::Client;
use aws_types::SdkConfig;
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use lambda_cron_core::metrics::DelegatedCredential;
use lambda_cron_deploy::{ProviderError, StsApi};

use crate::error::map_sdk_error;

pub struct StsRoles {
    client: Client,
}

impl StsRoles {
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk),
        }
    }
}

#[async_trait]
impl StsApi for StsRoles {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_secs: i32,
    ) -> Result<DelegatedCredential, ProviderError> {
        let out = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .duration_seconds(duration_secs)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, role_arn))?;

        let creds = out.credentials().ok_or_else(|| {
            ProviderError::InvalidResponse(format!("{role_arn}: no Credentials in response"))
        })?;
        let expiration = to_chrono(creds.expiration().secs());
        debug!(role = %role_arn, expiration = ?expiration, "Role assumed");

        Ok(DelegatedCredential {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiration,
        })
    }
}

pub(crate) fn to_chrono(epoch_secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(epoch_secs, 0).single()
}
