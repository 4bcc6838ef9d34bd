//! Function artifact loading and deployment.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use lambda_cron_core::{DeploymentInputs, ResourceNames};

use crate::error::{DeployError, Step};
use crate::provider::{FunctionApi, FunctionOutput, FunctionSpec};

/// The zipped function code, read fully into memory.
#[derive(Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// Base64 SHA-256, matching the hash the function service reports.
    pub sha256: String,
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .field("sha256", &self.sha256)
            .finish()
    }
}

pub fn code_sha256(bytes: &[u8]) -> String {
    BASE64.encode(Sha256::digest(bytes))
}

/// Read the artifact at `path`. A missing or empty file is a configuration
/// error, raised before anything is provisioned.
pub async fn load_artifact(path: &Path) -> Result<Artifact, DeployError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        DeployError::Configuration(format!(
            "cannot read function source {}: {}",
            path.display(),
            e
        ))
    })?;
    if bytes.is_empty() {
        return Err(DeployError::Configuration(format!(
            "function source {} is empty",
            path.display()
        )));
    }
    let sha256 = code_sha256(&bytes);
    debug!(path = %path.display(), size = bytes.len(), sha256 = %sha256, "Loaded function artifact");
    Ok(Artifact {
        path: path.to_path_buf(),
        bytes,
        sha256,
    })
}

pub fn function_spec(
    names: &ResourceNames,
    role_arn: &str,
    artifact: &Artifact,
    inputs: &DeploymentInputs,
) -> FunctionSpec {
    FunctionSpec {
        name: names.lambda.clone(),
        role_arn: role_arn.to_string(),
        code: artifact.bytes.clone(),
        code_sha256: artifact.sha256.clone(),
        handler: inputs.handler.clone(),
        runtime: inputs.runtime.clone(),
        memory_mb: inputs.memory,
        timeout_secs: inputs.timeout,
        env: inputs.env.clone(),
        layers: inputs.layers.clone(),
        vpc: inputs.vpc.clone(),
        description: inputs.description.clone(),
    }
}

/// Create or update the function. Any failure is fatal to the deploy.
pub async fn ensure_function(
    functions: &dyn FunctionApi,
    spec: &FunctionSpec,
) -> Result<FunctionOutput, DeployError> {
    info!(
        function = %spec.name,
        memory_mb = spec.memory_mb,
        timeout_secs = spec.timeout_secs,
        layers = spec.layers.len(),
        "Deploying function"
    );

    let output = functions
        .ensure_function(spec)
        .await
        .map_err(|e| DeployError::provisioning(Step::Function, &spec.name, e))?;

    info!(
        function = %spec.name,
        arn = %output.arn,
        size = output.code_size,
        sha256 = %output.code_sha256,
        created = output.created,
        "Function deployed"
    );
    Ok(output)
}
