//! Top-level credential gate.
//!
//! Mutating operations refuse to start unless a complete static credential
//! set is available, so a half-configured environment fails here instead of
//! deep inside the first SDK call.

use crate::config::AwsConfig;
use crate::error::CoreError;

/// The operator's long-lived credentials, as read from config.
#[derive(Clone, Default)]
pub struct CredentialSet {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl CredentialSet {
    pub fn from_config(aws: &AwsConfig) -> Self {
        Self {
            access_key_id: aws.access_key_id.clone(),
            secret_access_key: aws.secret_access_key.clone(),
            session_token: aws.session_token.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !has_value(&self.access_key_id) && !has_value(&self.secret_access_key)
    }
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "***"))
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

fn has_value(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Fail fast unless both the access key id and the secret are present.
pub fn ensure_credentials(creds: &CredentialSet) -> Result<(), CoreError> {
    if creds.is_empty() {
        return Err(CoreError::Configuration(
            "credentials not found: set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY (a .env file in the working directory works)".to_string(),
        ));
    }
    if !has_value(&creds.access_key_id) {
        return Err(CoreError::Configuration(
            "credentials incomplete: AWS_ACCESS_KEY_ID is missing".to_string(),
        ));
    }
    if !has_value(&creds.secret_access_key) {
        return Err(CoreError::Configuration(
            "credentials incomplete: AWS_SECRET_ACCESS_KEY is missing".to_string(),
        ));
    }
    Ok(())
}
