//! Execution engine - runs a plan stage by stage against the backend
//!
//! Tasks within a stage run on a bounded rayon pool; each node's chain runs
//! sequentially. A failing node never aborts the plan: it is reported as
//! failed and bindings that read it are skipped.

use crate::backend::{CreateRequest, ProvisioningBackend};
use crate::binding::Endpoint;
use crate::context::ProgressObserver;
use crate::error::{ErrorClass, Failure, ProvisionError};
use crate::planner::{BindingStep, ChainStep, NodeTask, PlanSummary, ProvisioningPlan, Stage};
use crate::report::{
    BindingReport, BindingStatus, EntryStatus, Fragment, Operation, ProvisioningReport, ReportEntry, SkipReason,
};
use crate::retry::{Attempted, with_retry};
use crate::store::RecordedResource;
use crate::types::{Outputs, Properties, ResourceRef, RunConfig};
use rayon::prelude::*;

/// Result of one node's chain
struct TaskOutcome {
    entry: ReportEntry,
    ledger: Vec<RecordedResource>,
}

/// Result of one binding step
struct BindingOutcome {
    report: BindingReport,
    ledger: Option<RecordedResource>,
}

/// Applies plans using an injected backend and progress observer
pub struct Executor<'a> {
    backend: &'a dyn ProvisioningBackend,
    config: &'a RunConfig,
    progress: &'a dyn ProgressObserver,
}

impl<'a> Executor<'a> {
    pub fn new(backend: &'a dyn ProvisioningBackend, config: &'a RunConfig, progress: &'a dyn ProgressObserver) -> Self {
        Self {
            backend,
            config,
            progress,
        }
    }

    /// What [`Executor::apply`] would do, without touching the backend
    pub fn preview(&self, plan: &ProvisioningPlan) -> PlanSummary {
        plan.summary()
    }

    /// Run every stage in order and return the merged report
    pub fn apply(&self, plan: &ProvisioningPlan) -> Result<ProvisioningReport, ProvisionError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs.max(1))
            .build()?;

        self.progress
            .on_start(Operation::Apply, plan.tasks().count());
        let mut report = ProvisioningReport::new(Operation::Apply, plan.scope.clone());

        for stage in &plan.stages {
            if self.config.cancel.is_cancelled() {
                log::info!("Cancelled before stage {}", stage.index);
                report = report.merge(self.cancelled_stage(stage));
                continue;
            }

            log::info!(
                "Stage {}: {} node(s), {} binding(s)",
                stage.index,
                stage.tasks.len(),
                stage.bindings.len()
            );
            self.progress.on_stage_start(stage.index, stage.tasks.len());

            let outcomes: Vec<TaskOutcome> = pool.install(|| {
                stage
                    .tasks
                    .par_iter()
                    .map(|task| self.run_chain(plan, task))
                    .collect()
            });
            report = report.merge(task_fragment(outcomes));

            let bindings: Vec<BindingOutcome> = pool.install(|| {
                stage
                    .bindings
                    .par_iter()
                    .map(|step| self.apply_binding(plan, step, &report))
                    .collect()
            });
            report = report.merge(binding_fragment(bindings));
        }

        self.progress.on_finish();
        Ok(report)
    }

    fn cancelled_stage(&self, stage: &Stage) -> Fragment {
        let entries: Vec<ReportEntry> = stage
            .tasks
            .iter()
            .map(|task| ReportEntry::skipped(&task.node_id, task.kind, SkipReason::Cancelled))
            .collect();
        let bindings: Vec<BindingReport> = stage
            .bindings
            .iter()
            .map(|step| skipped_binding(step, SkipReason::Cancelled))
            .collect();
        for entry in &entries {
            self.progress.on_entry_complete(entry);
        }
        for binding in &bindings {
            self.progress.on_binding_complete(binding);
        }
        Fragment {
            entries,
            bindings,
            ledger: Vec::new(),
        }
    }

    /// Create a node's sub-resources in order, stopping at the first failure
    fn run_chain(&self, plan: &ProvisioningPlan, task: &NodeTask) -> TaskOutcome {
        let mut outputs = Outputs::new();
        let mut created: Vec<&ChainStep> = Vec::new();
        let mut attempts = 0;
        let mut halted: Option<(EntryStatus, Option<SkipReason>, Option<Failure>, Option<&ChainStep>)> = None;

        for step in &task.chain {
            if self.config.cancel.is_cancelled() {
                log::info!("{}: cancelled before {}", task.node_id, step.sub_resource);
                halted = Some((EntryStatus::Skipped, Some(SkipReason::Cancelled), None, None));
                break;
            }

            log::debug!("Creating {}", step.resource_ref);
            let request = CreateRequest {
                scope: &plan.scope,
                resource_ref: &step.resource_ref,
                node_id: &task.node_id,
                kind: task.kind,
                sub_resource: step.sub_resource,
                name: &task.name,
                location: &plan.location,
                properties: &task.properties,
                inputs: &outputs,
            };
            let outcome = self.create_with_retry(&step.resource_ref, &request);
            attempts += outcome.attempts;

            match outcome.result {
                Ok(step_outputs) => {
                    self.progress
                        .on_step_complete(&task.node_id, step.sub_resource, true);
                    outputs.extend(step_outputs);
                    created.push(step);
                }
                Err(failure) => {
                    log::warn!(
                        "{}: {} failed after {} attempt(s): {failure}",
                        task.node_id,
                        step.sub_resource,
                        outcome.attempts
                    );
                    self.progress
                        .on_step_complete(&task.node_id, step.sub_resource, false);
                    halted = Some((EntryStatus::Failed, None, Some(failure), Some(step)));
                    break;
                }
            }
        }

        let (status, reason, error, failed_step) = halted.unwrap_or((EntryStatus::Created, None, None, None));
        if status == EntryStatus::Created {
            log::info!("{}: created {} resource(s)", task.node_id, created.len());
        }

        let entry = ReportEntry {
            reason,
            error,
            failed_step: failed_step.map(|s| s.sub_resource),
            attempts,
            outputs,
            resources: created.iter().map(|s| s.resource_ref.clone()).collect(),
            ..ReportEntry::new(&task.node_id, task.kind, status)
        };
        self.progress.on_entry_complete(&entry);

        let ledger = created
            .into_iter()
            .map(|step| RecordedResource {
                resource_ref: step.resource_ref.clone(),
                node_id: task.node_id.clone(),
                kind: task.kind,
                sub_resource: step.sub_resource,
                name: task.name.clone(),
            })
            .collect();
        TaskOutcome { entry, ledger }
    }

    /// Export attributes once both endpoints are terminal
    fn apply_binding(&self, plan: &ProvisioningPlan, step: &BindingStep, report: &ProvisioningReport) -> BindingOutcome {
        let source = report.entry(&step.source);
        let sink = report.entry(&step.sink);

        let blocked = [source, sink].into_iter().find_map(|entry| match entry {
            Some(e) if e.status == EntryStatus::Created => None,
            Some(e) if e.reason == Some(SkipReason::Cancelled) => Some(SkipReason::Cancelled),
            _ => Some(SkipReason::UpstreamFailure),
        });
        let blocked = blocked.or_else(|| {
            self.config
                .cancel
                .is_cancelled()
                .then_some(SkipReason::Cancelled)
        });
        let (Some(source), Some(sink), None) = (source, sink, blocked) else {
            let reason = blocked.unwrap_or(SkipReason::UpstreamFailure);
            log::warn!(
                "Binding {} -> {} skipped: {reason}",
                step.source,
                step.sink
            );
            return self.finish_binding(skipped_binding(step, reason), None);
        };

        let mut link_outputs = Outputs::new();
        let mut ledger = None;
        if let Some(link) = &step.link {
            match self.create_link(plan, step, link, source, sink) {
                Ok(outputs) => {
                    link_outputs = outputs;
                    ledger = Some(RecordedResource {
                        resource_ref: link.resource_ref.clone(),
                        node_id: step.source.clone(),
                        kind: source.kind,
                        sub_resource: link.sub_resource,
                        name: link_name(step),
                    });
                }
                Err(failure) => {
                    log::warn!("Binding {} -> {} failed: {failure}", step.source, step.sink);
                    return self.finish_binding(failed_binding(step, failure), None);
                }
            }
        }

        let mut values = Outputs::new();
        for export in &step.exports {
            let (endpoint, outputs) = match export.from {
                Endpoint::Source => (step.source.as_str(), &source.outputs),
                Endpoint::Sink => (step.sink.as_str(), &sink.outputs),
                Endpoint::Link => ("link", &link_outputs),
            };
            let Some(value) = outputs.get(export.output) else {
                let failure = Failure {
                    class: ErrorClass::Unknown,
                    code: "MissingOutput".to_string(),
                    message: format!("{endpoint} did not return '{}'", export.output),
                };
                log::warn!("Binding {} -> {} failed: {failure}", step.source, step.sink);
                let report = BindingReport {
                    link: ledger.as_ref().map(|r: &RecordedResource| r.resource_ref.clone()),
                    ..failed_binding(step, failure)
                };
                return self.finish_binding(report, ledger);
            };
            values.insert(crate::binding::binding_key(&step.sink, export.attribute), value.clone());
        }

        log::info!(
            "Bound {} -> {} ({} value(s))",
            step.source,
            step.sink,
            values.len()
        );
        let report = BindingReport {
            values,
            link: step.link.as_ref().map(|l| l.resource_ref.clone()),
            ..binding_report(step, BindingStatus::Applied)
        };
        self.finish_binding(report, ledger)
    }

    fn create_link(
        &self,
        plan: &ProvisioningPlan,
        step: &BindingStep,
        link: &ChainStep,
        source: &ReportEntry,
        sink: &ReportEntry,
    ) -> Result<Outputs, Failure> {
        let inputs: Outputs = source
            .outputs
            .iter()
            .map(|(k, v)| (format!("source.{k}"), v.clone()))
            .chain(sink.outputs.iter().map(|(k, v)| (format!("sink.{k}"), v.clone())))
            .collect();
        let mut properties = Properties::new();
        properties.insert("source".into(), step.source.clone().into());
        properties.insert("sink".into(), step.sink.clone().into());
        properties.insert("sinkKind".into(), sink.kind.as_str().into());

        let name = link_name(step);
        let request = CreateRequest {
            scope: &plan.scope,
            resource_ref: &link.resource_ref,
            node_id: &step.source,
            kind: source.kind,
            sub_resource: link.sub_resource,
            name: &name,
            location: &plan.location,
            properties: &properties,
            inputs: &inputs,
        };
        self.create_with_retry(&link.resource_ref, &request).result
    }

    fn create_with_retry(&self, resource_ref: &ResourceRef, request: &CreateRequest<'_>) -> Attempted<Outputs> {
        let max_attempts = self.config.retry.max_attempts.max(1);
        with_retry(
            &self.config.retry,
            |attempt, failure, delay| {
                log::warn!(
                    "{resource_ref}: attempt {attempt}/{max_attempts} failed ({}), retrying in {:.1}s",
                    failure.class,
                    delay.as_secs_f64()
                );
                self.progress
                    .on_retry(resource_ref, attempt, max_attempts, failure, delay);
            },
            || self.backend.create(request),
        )
    }

    fn finish_binding(&self, report: BindingReport, ledger: Option<RecordedResource>) -> BindingOutcome {
        self.progress.on_binding_complete(&report);
        BindingOutcome { report, ledger }
    }
}

/// Name of the resource a binding creates between two nodes
fn link_name(step: &BindingStep) -> String {
    format!("egsub-{}-to-{}", step.source, step.sink)
}

fn binding_report(step: &BindingStep, status: BindingStatus) -> BindingReport {
    BindingReport {
        edge: step.edge,
        source: step.source.clone(),
        sink: step.sink.clone(),
        intent: step.intent,
        status,
        reason: None,
        error: None,
        values: Outputs::new(),
        link: None,
    }
}

fn skipped_binding(step: &BindingStep, reason: SkipReason) -> BindingReport {
    BindingReport {
        reason: Some(reason),
        ..binding_report(step, BindingStatus::Skipped)
    }
}

fn failed_binding(step: &BindingStep, failure: Failure) -> BindingReport {
    BindingReport {
        error: Some(failure),
        ..binding_report(step, BindingStatus::Failed)
    }
}

fn task_fragment(outcomes: Vec<TaskOutcome>) -> Fragment {
    let mut fragment = Fragment::default();
    for outcome in outcomes {
        fragment.entries.push(outcome.entry);
        fragment.ledger.extend(outcome.ledger);
    }
    fragment
}

fn binding_fragment(outcomes: Vec<BindingOutcome>) -> Fragment {
    let mut fragment = Fragment::default();
    for outcome in outcomes {
        fragment.bindings.push(outcome.report);
        fragment.ledger.extend(outcome.ledger);
    }
    fragment
}
