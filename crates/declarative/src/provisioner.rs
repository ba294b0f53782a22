//! Preview, apply and destroy entry points
//!
//! A [`Provisioner`] owns the injected collaborators. Everything that varies
//! per invocation travels in the [`RunConfig`] passed to each call.

use crate::backend::ProvisioningBackend;
use crate::context::{NoProgress, ProgressObserver};
use crate::error::{GraphError, ProvisionError};
use crate::executor::Executor;
use crate::lock::LockProvider;
use crate::planner::{PlanSummary, build_plan};
use crate::report::{EntryStatus, ProvisioningReport};
use crate::retry::with_retry;
use crate::store::{PlanRecord, PlanStore, RecordedResource};
use crate::teardown::{Teardown, TeardownPlan};
use crate::types::{Graph, RunConfig, Scope};
use crate::validate::{ValidationReport, validate};
use serde::Serialize;
use std::collections::HashSet;

/// Side-effect free look at what apply would do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub validation: ValidationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PlanSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_error: Option<GraphError>,
}

impl Preview {
    /// Whether apply would get past validation
    pub fn is_valid(&self) -> bool {
        self.validation.is_valid() && self.plan_error.is_none()
    }
}

pub struct Provisioner<B, S, L> {
    backend: B,
    store: S,
    locks: L,
}

impl<B, S, L> Provisioner<B, S, L>
where
    B: ProvisioningBackend,
    S: PlanStore,
    L: LockProvider,
{
    pub fn new(backend: B, store: S, locks: L) -> Self {
        Self { backend, store, locks }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate and plan without touching the backend or taking a lock
    pub fn preview(&self, graph: &Graph, config: &RunConfig) -> Preview {
        let validation = validate(graph, &config.default_location);
        let (summary, plan_error) = match build_plan(graph, &config.default_location) {
            Ok(plan) => (
                Some(Executor::new(&self.backend, config, &NoProgress).preview(&plan)),
                None,
            ),
            Err(err) => {
                log::debug!("No plan for {}: {err}", graph.scope());
                (None, Some(err))
            }
        };
        Preview {
            validation,
            summary,
            plan_error,
        }
    }

    /// Provision a graph and record what was created
    pub fn apply(
        &self,
        graph: &Graph,
        config: &RunConfig,
        progress: &dyn ProgressObserver,
    ) -> Result<ProvisioningReport, ProvisionError> {
        let validation = validate(graph, &config.default_location);
        if !validation.is_valid() {
            return Err(ProvisionError::Invalid(Box::new(validation)));
        }
        let plan = build_plan(graph, &config.default_location)?;
        let scope = plan.scope.clone();

        let _guard = self
            .locks
            .acquire(&scope)
            .map_err(|e| ProvisionError::lock(&scope, &e))?;
        let previous = self
            .store
            .load(&scope)
            .map_err(|e| ProvisionError::store(&scope, &e))?;

        let report = Executor::new(&self.backend, config, progress)
            .apply(&plan)?
            .with_warnings(validation.warnings);

        let record = PlanRecord::new(scope.clone(), report.ledger().to_vec()).merged_with(previous);
        if record.is_empty() {
            return Ok(report);
        }
        log::debug!("Recording {} resource(s) for {scope}", record.resources.len());
        Ok(match self.store.save(&record) {
            Ok(()) => report,
            Err(e) => {
                log::error!("Provisioned {scope} but could not record it: {e:#}");
                report.with_record_error(format!("{e:#}"))
            }
        })
    }

    /// Tear down everything apply created in a scope
    pub fn destroy(
        &self,
        scope: &Scope,
        config: &RunConfig,
        progress: &dyn ProgressObserver,
    ) -> Result<ProvisioningReport, ProvisionError> {
        scope.check()?;
        let _guard = self
            .locks
            .acquire(scope)
            .map_err(|e| ProvisionError::lock(scope, &e))?;
        let record = self
            .store
            .load(scope)
            .map_err(|e| ProvisionError::store(scope, &e))?;

        let plan = match record.as_ref().filter(|r| !r.is_empty()) {
            Some(record) => TeardownPlan::from_record(record),
            None => {
                log::info!("No plan record for {scope}, listing tagged resources");
                let listed = with_retry(
                    &config.retry,
                    |attempt, failure, _| log::warn!("Listing {scope} failed on attempt {attempt}: {failure}"),
                    || self.backend.list_tagged(scope),
                );
                let resources = listed
                    .result
                    .map_err(|failure| ProvisionError::Inventory {
                        scope: scope.clone(),
                        failure,
                    })?;
                TeardownPlan::from_inventory(scope.clone(), resources)
            }
        };

        let report = Teardown::new(&self.backend, config, progress).run(&plan)?;
        Ok(match self.settle_record(scope, record, &report) {
            Ok(()) => report,
            Err(e) => {
                log::error!("Tore down {scope} but could not update its record: {e:#}");
                report.with_record_error(format!("{e:#}"))
            }
        })
    }

    /// Drop the record, or keep only what is still on the backend
    fn settle_record(
        &self,
        scope: &Scope,
        record: Option<PlanRecord>,
        report: &ProvisioningReport,
    ) -> anyhow::Result<()> {
        let deleted: HashSet<&str> = report
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Deleted)
            .map(|e| e.id.as_str())
            .collect();
        let remaining: Vec<RecordedResource> = record
            .map(|r| {
                r.resources
                    .into_iter()
                    .filter(|res| !deleted.contains(res.resource_ref.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if remaining.is_empty() {
            self.store.remove(scope)
        } else {
            log::info!("{} resource(s) remain in {scope}", remaining.len());
            self.store.save(&PlanRecord::new(scope.clone(), remaining))
        }
    }
}
