//! Lambda-backed [`FunctionApi`].
//!
//! Updating an existing function takes two calls (code, then configuration)
//! and the service rejects the second while the first is still being applied.
//! [`LambdaFunctions::wait_until_updated`] polls the function's last update
//! status with exponential backoff between them.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode, LastUpdateStatus, Runtime, VpcConfig};
use aws_sdk_lambda::Client;
use aws_types::SdkConfig;
use tracing::{debug, info, warn};

use lambda_cron_deploy::{FunctionApi, FunctionOutput, FunctionSpec, PermissionSpec, ProviderError};

use crate::error::map_sdk_error;

pub struct LambdaFunctions {
    client: Client,
    update_timeout: Duration,
}

impl LambdaFunctions {
    pub fn new(sdk: &SdkConfig, update_timeout: Duration) -> Self {
        Self {
            client: Client::new(sdk),
            update_timeout,
        }
    }

    /// `None` when the function does not exist, otherwise its reported code
    /// hash (if any).
    async fn find_function(&self, name: &str) -> Result<Option<Option<String>>, ProviderError> {
        match self.client.get_function().function_name(name).send().await {
            Ok(out) => Ok(Some(
                out.configuration()
                    .and_then(|c| c.code_sha256())
                    .map(str::to_string),
            )),
            Err(e) => match map_sdk_error(e, name) {
                err if err.is_not_found() => Ok(None),
                err => Err(err),
            },
        }
    }

    async fn create(&self, spec: &FunctionSpec) -> Result<FunctionOutput, ProviderError> {
        info!(function = %spec.name, runtime = %spec.runtime, "Creating function");
        let out = self
            .client
            .create_function()
            .function_name(&spec.name)
            .role(&spec.role_arn)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .handler(&spec.handler)
            .code(FunctionCode::builder().zip_file(Blob::new(spec.code.clone())).build())
            .memory_size(sdk_int(&spec.name, "memory", spec.memory_mb)?)
            .timeout(sdk_int(&spec.name, "timeout", spec.timeout_secs)?)
            .environment(environment(spec))
            .set_layers(Some(spec.layers.clone()))
            .set_vpc_config(vpc_config(spec))
            .set_description(spec.description.clone())
            .publish(false)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &spec.name))?;

        Ok(FunctionOutput {
            arn: out
                .function_arn()
                .ok_or_else(|| missing(&spec.name, "FunctionArn"))?
                .to_string(),
            code_size: out.code_size(),
            code_sha256: out.code_sha256().unwrap_or(&spec.code_sha256).to_string(),
            created: true,
        })
    }

    async fn update(
        &self,
        spec: &FunctionSpec,
        remote_sha256: Option<String>,
    ) -> Result<FunctionOutput, ProviderError> {
        if remote_sha256.as_deref() == Some(spec.code_sha256.as_str()) {
            debug!(function = %spec.name, "Code unchanged, skipping code upload");
        } else {
            info!(function = %spec.name, "Updating function code");
            self.client
                .update_function_code()
                .function_name(&spec.name)
                .zip_file(Blob::new(spec.code.clone()))
                .publish(false)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, &spec.name))?;
            self.wait_until_updated(&spec.name).await?;
        }

        info!(function = %spec.name, "Updating function configuration");
        let out = self
            .client
            .update_function_configuration()
            .function_name(&spec.name)
            .role(&spec.role_arn)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .handler(&spec.handler)
            .memory_size(sdk_int(&spec.name, "memory", spec.memory_mb)?)
            .timeout(sdk_int(&spec.name, "timeout", spec.timeout_secs)?)
            .environment(environment(spec))
            .set_layers(Some(spec.layers.clone()))
            .set_vpc_config(Some(vpc_config(spec).unwrap_or_else(detached_vpc)))
            .set_description(Some(spec.description.clone().unwrap_or_default()))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &spec.name))?;
        self.wait_until_updated(&spec.name).await?;

        Ok(FunctionOutput {
            arn: out
                .function_arn()
                .ok_or_else(|| missing(&spec.name, "FunctionArn"))?
                .to_string(),
            code_size: out.code_size(),
            code_sha256: out.code_sha256().unwrap_or(&spec.code_sha256).to_string(),
            created: false,
        })
    }

    /// Poll until the last update has been applied, failed, or the configured
    /// timeout passes.
    async fn wait_until_updated(&self, name: &str) -> Result<(), ProviderError> {
        let start = Instant::now();
        let mut backoff = Backoff::new();

        loop {
            let conf = self
                .client
                .get_function_configuration()
                .function_name(name)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, name))?;

            let status = conf
                .last_update_status()
                .cloned()
                .unwrap_or(LastUpdateStatus::Successful);

            debug!(
                function = %name,
                status = ?status,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Polling function update status"
            );

            match status {
                LastUpdateStatus::Successful => return Ok(()),
                LastUpdateStatus::Failed => {
                    let reason = conf.last_update_status_reason().unwrap_or("unknown");
                    return Err(ProviderError::Sdk(format!("{name}: update failed: {reason}")));
                }
                // InProgress | unknown future variant
                _ => {}
            }

            if start.elapsed() > self.update_timeout {
                warn!(
                    function = %name,
                    timeout_secs = self.update_timeout.as_secs(),
                    "Function update did not settle"
                );
                return Err(ProviderError::Timeout(format!(
                    "{name}: update still in progress after {}s",
                    self.update_timeout.as_secs()
                )));
            }

            tokio::time::sleep(backoff.next_delay()).await;
        }
    }
}

#[async_trait]
impl FunctionApi for LambdaFunctions {
    async fn ensure_function(&self, spec: &FunctionSpec) -> Result<FunctionOutput, ProviderError> {
        match self.find_function(&spec.name).await? {
            Some(remote_sha256) => self.update(spec, remote_sha256).await,
            None => self.create(spec).await,
        }
    }

    async fn delete_function(&self, name: &str) -> Result<(), ProviderError> {
        info!(function = %name, "Deleting function");
        self.client
            .delete_function()
            .function_name(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, name))?;
        Ok(())
    }

    async fn add_permission(&self, spec: &PermissionSpec) -> Result<(), ProviderError> {
        self.client
            .add_permission()
            .function_name(&spec.function_name)
            .statement_id(&spec.statement_id)
            .action(&spec.action)
            .principal(&spec.principal)
            .source_arn(&spec.source_arn)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &spec.function_name))?;
        Ok(())
    }
}

fn environment(spec: &FunctionSpec) -> Environment {
    let variables: HashMap<String, String> = spec
        .env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Environment::builder().set_variables(Some(variables)).build()
}

fn vpc_config(spec: &FunctionSpec) -> Option<VpcConfig> {
    spec.vpc.as_ref().map(|vpc| {
        VpcConfig::builder()
            .set_subnet_ids(Some(vpc.subnet_ids.clone()))
            .set_security_group_ids(Some(vpc.security_group_ids.clone()))
            .build()
    })
}

/// Empty VPC settings, which detach a function from any VPC.
fn detached_vpc() -> VpcConfig {
    VpcConfig::builder()
        .set_subnet_ids(Some(Vec::new()))
        .set_security_group_ids(Some(Vec::new()))
        .build()
}

/// The SDK models sizes as `i32`.
fn sdk_int(name: &str, field: &str, value: u32) -> Result<i32, ProviderError> {
    i32::try_from(value).map_err(|_| {
        ProviderError::InvalidRequest(format!("{name}: {field} {value} is out of range"))
    })
}

fn missing(name: &str, field: &str) -> ProviderError {
    ProviderError::InvalidResponse(format!("{name}: no {field} in response"))
}

/// Exponential backoff with a little jitter, capped.
struct Backoff {
    delay_ms: u64,
}

impl Backoff {
    const INITIAL_MS: u64 = 250;
    const MAX_MS: u64 = 2_000;
    const FACTOR: f64 = 1.5;

    fn new() -> Self {
        Self {
            delay_ms: Self::INITIAL_MS,
        }
    }

    fn next_delay(&mut self) -> Duration {
        // Jitter without rand: nanosecond fraction of the current time.
        let jitter_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos()
            % 100;
        let sleep = Duration::from_millis(self.delay_ms + jitter_ms as u64);
        self.delay_ms = ((self.delay_ms as f64 * Self::FACTOR) as u64).min(Self::MAX_MS);
        sleep
    }
}
