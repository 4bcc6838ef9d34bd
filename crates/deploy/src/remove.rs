//! Best-effort teardown of everything recorded in state.
//!
//! Every recorded resource gets a deletion attempt regardless of how the
//! others went. A successful deletion (or one that finds the resource already
//! gone) clears its fields and is persisted right away; a failed one leaves
//! its fields in place so the next remove retries just that piece. A failed
//! save is reported with the other failures and does not stop the run.

use serde::Serialize;
use tracing::{info, warn};

use lambda_cron_core::{ReconciliationState, StateStore};

use crate::error::{DeployError, RemovalFailure, Step};
use crate::provider::{ProviderError, Provider};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedResource {
    pub step: Step,
    pub name: String,
    /// True when the resource was already gone.
    pub already_absent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoveReport {
    pub removed: Vec<RemovedResource>,
    /// Kinds with nothing recorded in state.
    pub skipped: Vec<Step>,
}

pub struct Remover<'a> {
    provider: &'a Provider,
    store: &'a dyn StateStore,
}

impl<'a> Remover<'a> {
    pub fn new(provider: &'a Provider, store: &'a dyn StateStore) -> Self {
        Self { provider, store }
    }

    /// Delete rule, function, execution role and meta-role, in that order.
    ///
    /// On full success the state is reset to empty. Otherwise the failures
    /// are returned together and the state keeps exactly the resources that
    /// still exist.
    pub async fn remove(&self, state: ReconciliationState) -> Result<RemoveReport, DeployError> {
        let mut state = state;
        let mut report = RemoveReport::default();
        let mut failures = Vec::new();

        // Rule first: once it is gone nothing invokes the function.
        match state.rule_name.clone() {
            Some(rule) => {
                let result = self.provider.rules.delete_rule(&rule).await;
                if self.settle(Step::Rule, &rule, result, &mut report, &mut failures) {
                    state = self.persist(Step::Rule, state.without_rule(), &mut failures).await;
                }
            }
            None => report.skipped.push(Step::Rule),
        }

        match state.lambda_name.clone() {
            Some(function) => {
                let result = self.provider.functions.delete_function(&function).await;
                if self.settle(Step::Function, &function, result, &mut report, &mut failures) {
                    state = self
                        .persist(Step::Function, state.without_lambda(), &mut failures)
                        .await;
                }
            }
            None => report.skipped.push(Step::Function),
        }

        match state.role_name.clone() {
            Some(role) => {
                info!(role = %role, "Removing execution role");
                let result = self.provider.roles.delete_role(&role).await;
                if self.settle(Step::ExecutionRole, &role, result, &mut report, &mut failures) {
                    state = self
                        .persist(Step::ExecutionRole, state.without_role(), &mut failures)
                        .await;
                }
            }
            None => report.skipped.push(Step::ExecutionRole),
        }

        match state.meta_role_name.clone() {
            Some(role) => {
                info!(role = %role, "Removing meta role");
                let result = self.provider.roles.delete_role(&role).await;
                if self.settle(Step::MetaRole, &role, result, &mut report, &mut failures) {
                    state = self
                        .persist(Step::MetaRole, state.without_meta_role(), &mut failures)
                        .await;
                }
            }
            None => report.skipped.push(Step::MetaRole),
        }

        if !failures.is_empty() {
            warn!(
                failed = failures.len(),
                removed = report.removed.len(),
                "Remove incomplete, failed resources kept in state"
            );
            return Err(DeployError::Removal { failures });
        }

        self.store
            .save(&ReconciliationState::default())
            .await
            .map_err(DeployError::State)?;
        info!(removed = report.removed.len(), "All resources removed, state cleared");
        Ok(report)
    }

    /// Record the outcome of one deletion. Returns true when the resource is
    /// gone and its state fields can be cleared.
    fn settle(
        &self,
        step: Step,
        name: &str,
        result: Result<(), ProviderError>,
        report: &mut RemoveReport,
        failures: &mut Vec<RemovalFailure>,
    ) -> bool {
        match result {
            Ok(()) => {
                info!(step = %step, resource = %name, "Removed");
                report.removed.push(RemovedResource {
                    step,
                    name: name.to_string(),
                    already_absent: false,
                });
                true
            }
            Err(e) if e.is_not_found() => {
                info!(step = %step, resource = %name, "Already absent");
                report.removed.push(RemovedResource {
                    step,
                    name: name.to_string(),
                    already_absent: true,
                });
                true
            }
            Err(e) => {
                warn!(step = %step, resource = %name, error = %e, "Removal failed");
                failures.push(RemovalFailure {
                    step,
                    resource: name.to_string(),
                    message: e.to_string(),
                });
                false
            }
        }
    }

    async fn persist(
        &self,
        step: Step,
        state: ReconciliationState,
        failures: &mut Vec<RemovalFailure>,
    ) -> ReconciliationState {
        let state = state.touch();
        if let Err(e) = self.store.save(&state).await {
            warn!(step = %step, store = %self.store.location(), error = %e, "State save failed");
            failures.push(RemovalFailure {
                step,
                resource: self.store.location(),
                message: format!("deleted, but state was not saved: {e}"),
            });
        }
        state
    }
}
