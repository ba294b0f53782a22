//! Teardown - destroy what apply created
//!
//! With a plan record, resources are deleted in exact reverse creation order
//! and a failed deletion holds back the rest of its node. Without one, the
//! backend is asked for everything tagged with the scope, and leaf tiers are
//! deleted before the resources that contain them.

use crate::backend::{DeleteRequest, ProvisioningBackend, TaggedResource};
use crate::context::ProgressObserver;
use crate::error::ProvisionError;
use crate::kind::{ResourceKind, SubResource, TeardownTier};
use crate::report::{EntryStatus, Fragment, Operation, ProvisioningReport, ReportEntry, SkipReason};
use crate::retry::with_retry;
use crate::store::PlanRecord;
use crate::types::{ResourceRef, RunConfig, Scope};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;

/// Where the teardown order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownSource {
    /// Reverse of a recorded apply
    Record,
    /// Tag listing from the backend, ordered by tier
    Inventory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownItem {
    pub resource_ref: ResourceRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub kind: ResourceKind,
    pub sub_resource: SubResource,
}

impl TeardownItem {
    pub fn tier(&self) -> TeardownTier {
        self.sub_resource.teardown_tier()
    }
}

/// Ordered deletions for one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownPlan {
    pub scope: Scope,
    pub source: TeardownSource,
    pub items: Vec<TeardownItem>,
}

impl TeardownPlan {
    /// Exact reverse of the recorded creation order
    pub fn from_record(record: &PlanRecord) -> Self {
        Self {
            scope: record.scope.clone(),
            source: TeardownSource::Record,
            items: record
                .resources
                .iter()
                .rev()
                .map(|r| TeardownItem {
                    resource_ref: r.resource_ref.clone(),
                    node_id: Some(r.node_id.clone()),
                    kind: r.kind,
                    sub_resource: r.sub_resource,
                })
                .collect(),
        }
    }

    /// Leaf tiers first, stable by resource ref within a tier
    pub fn from_inventory(scope: Scope, resources: Vec<TaggedResource>) -> Self {
        let mut seen = HashSet::new();
        let mut items: Vec<TeardownItem> = resources
            .into_iter()
            .filter(|r| seen.insert(r.resource_ref.clone()))
            .map(|r| TeardownItem {
                resource_ref: r.resource_ref,
                node_id: None,
                kind: r.kind,
                sub_resource: r.sub_resource,
            })
            .collect();
        items.sort_by(|a, b| {
            a.tier()
                .cmp(&b.tier())
                .then_with(|| a.resource_ref.cmp(&b.resource_ref))
        });
        Self {
            scope,
            source: TeardownSource::Inventory,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Runs teardown plans against the backend
pub struct Teardown<'a> {
    backend: &'a dyn ProvisioningBackend,
    config: &'a RunConfig,
    progress: &'a dyn ProgressObserver,
}

impl<'a> Teardown<'a> {
    pub fn new(backend: &'a dyn ProvisioningBackend, config: &'a RunConfig, progress: &'a dyn ProgressObserver) -> Self {
        Self {
            backend,
            config,
            progress,
        }
    }

    pub fn run(&self, plan: &TeardownPlan) -> Result<ProvisioningReport, ProvisionError> {
        self.progress.on_start(Operation::Destroy, plan.items.len());
        log::info!(
            "Destroying {} resource(s) in {} from {:?}",
            plan.items.len(),
            plan.scope,
            plan.source
        );

        let report = ProvisioningReport::new(Operation::Destroy, plan.scope.clone());
        let report = match plan.source {
            TeardownSource::Record => report.merge(self.run_recorded(plan)),
            TeardownSource::Inventory => self.run_tiers(plan, report)?,
        };

        self.progress.on_finish();
        Ok(report)
    }

    fn run_recorded(&self, plan: &TeardownPlan) -> Fragment {
        let mut blocked: HashSet<&str> = HashSet::new();
        let mut entries = Vec::with_capacity(plan.items.len());

        for item in &plan.items {
            let node = item.node_id.as_deref();
            let entry = if self.config.cancel.is_cancelled() {
                skipped(item, SkipReason::Cancelled)
            } else if node.is_some_and(|n| blocked.contains(n)) {
                log::warn!("{}: kept because a dependent resource was not deleted", item.resource_ref);
                skipped(item, SkipReason::DependentNotDeleted)
            } else {
                let entry = self.delete(plan, item);
                if entry.status == EntryStatus::Failed
                    && let Some(node) = node
                {
                    blocked.insert(node);
                }
                entry
            };
            self.progress.on_entry_complete(&entry);
            entries.push(entry);
        }

        Fragment {
            entries,
            ..Default::default()
        }
    }

    fn run_tiers(&self, plan: &TeardownPlan, mut report: ProvisioningReport) -> Result<ProvisioningReport, ProvisionError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs.max(1))
            .build()?;

        for (index, tier) in plan
            .items
            .chunk_by(|a, b| a.tier() == b.tier())
            .enumerate()
        {
            let entries: Vec<ReportEntry> = if self.config.cancel.is_cancelled() {
                tier.iter()
                    .map(|item| skipped(item, SkipReason::Cancelled))
                    .collect()
            } else {
                self.progress.on_stage_start(index, tier.len());
                pool.install(|| tier.par_iter().map(|item| self.delete(plan, item)).collect())
            };
            for entry in &entries {
                if entry.status == EntryStatus::Skipped {
                    self.progress.on_entry_complete(entry);
                }
            }
            report = report.merge(Fragment {
                entries,
                ..Default::default()
            });
        }
        Ok(report)
    }

    fn delete(&self, plan: &TeardownPlan, item: &TeardownItem) -> ReportEntry {
        let request = DeleteRequest {
            scope: &plan.scope,
            resource_ref: &item.resource_ref,
            kind: item.kind,
            sub_resource: item.sub_resource,
        };
        let max_attempts = self.config.retry.max_attempts.max(1);
        let outcome = with_retry(
            &self.config.retry,
            |attempt, failure, delay| {
                log::warn!(
                    "{}: delete attempt {attempt}/{max_attempts} failed ({}), retrying",
                    item.resource_ref,
                    failure.class
                );
                self.progress
                    .on_retry(&item.resource_ref, attempt, max_attempts, failure, delay);
            },
            || self.backend.delete(&request),
        );

        let base = ReportEntry {
            sub_resource: Some(item.sub_resource),
            attempts: outcome.attempts,
            ..ReportEntry::new(item.resource_ref.as_str(), item.kind, EntryStatus::Deleted)
        };
        let entry = match outcome.result {
            Ok(()) => {
                log::info!("Deleted {}", item.resource_ref);
                base
            }
            Err(failure) if failure.is_absent() => {
                log::debug!("{} was already gone", item.resource_ref);
                base
            }
            Err(failure) => {
                log::warn!("Failed to delete {}: {failure}", item.resource_ref);
                ReportEntry {
                    status: EntryStatus::Failed,
                    error: Some(failure),
                    ..base
                }
            }
        };
        if plan.source == TeardownSource::Inventory {
            self.progress.on_entry_complete(&entry);
        }
        entry
    }
}

fn skipped(item: &TeardownItem, reason: SkipReason) -> ReportEntry {
    ReportEntry {
        sub_resource: Some(item.sub_resource),
        ..ReportEntry::skipped(item.resource_ref.as_str(), item.kind, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::error::{BackendFailure, ErrorClass};
    use crate::retry::RetryPolicy;
    use crate::store::RecordedResource;
    use crate::testing::ScriptedBackend;

    fn scope() -> Scope {
        Scope::new("canvas", "dev")
    }

    fn recorded(node: &str, kind: ResourceKind, sub: SubResource) -> RecordedResource {
        RecordedResource {
            resource_ref: ResourceRef::for_step(&scope(), node, sub),
            node_id: node.into(),
            kind,
            sub_resource: sub,
            name: node.into(),
        }
    }

    fn record() -> PlanRecord {
        PlanRecord::new(
            scope(),
            vec![
                recorded("q1", ResourceKind::ServiceBus, SubResource::ServiceBusNamespace),
                recorded("q1", ResourceKind::ServiceBus, SubResource::ServiceBusQueue),
                recorded("q1", ResourceKind::ServiceBus, SubResource::ServiceBusAuthRule),
                recorded("kv", ResourceKind::KeyVault, SubResource::KeyVault),
            ],
        )
    }

    fn config() -> RunConfig {
        RunConfig::default().with_retry(RetryPolicy::immediate(2))
    }

    #[test]
    fn test_recorded_teardown_is_exact_reverse() {
        let backend = ScriptedBackend::new();
        let plan = TeardownPlan::from_record(&record());
        let report = Teardown::new(&backend, &config(), &NoProgress)
            .run(&plan)
            .unwrap();

        let expected: Vec<ResourceRef> = record()
            .resources
            .iter()
            .rev()
            .map(|r| r.resource_ref.clone())
            .collect();
        assert_eq!(backend.deleted(), expected);
        assert_eq!(report.summary.deleted, 4);
        assert_eq!(report.operation, Operation::Destroy);
    }

    #[test]
    fn test_failed_delete_holds_back_parents_of_same_node() {
        let backend = ScriptedBackend::new().fail_delete(
            "canvas-dev/q1/serviceBusQueue",
            BackendFailure::new("Conflict", "queue has active receivers"),
        );
        let plan = TeardownPlan::from_record(&record());
        let report = Teardown::new(&backend, &config(), &NoProgress)
            .run(&plan)
            .unwrap();

        let queue = report.entry("canvas-dev/q1/serviceBusQueue").unwrap();
        assert_eq!(queue.status, EntryStatus::Failed);
        assert_eq!(queue.attempts, 2);
        assert_eq!(queue.error.as_ref().unwrap().class, ErrorClass::Conflict);

        let namespace = report.entry("canvas-dev/q1/serviceBusNamespace").unwrap();
        assert_eq!(namespace.status, EntryStatus::Skipped);
        assert_eq!(namespace.reason, Some(SkipReason::DependentNotDeleted));

        // Other nodes and earlier deletions are unaffected
        assert_eq!(report.entry("canvas-dev/kv/keyVault").unwrap().status, EntryStatus::Deleted);
        assert_eq!(
            report.entry("canvas-dev/q1/serviceBusAuthRule").unwrap().status,
            EntryStatus::Deleted
        );
        assert_eq!(report.summary.total(), 4);
    }

    #[test]
    fn test_missing_resource_counts_as_deleted() {
        let backend = ScriptedBackend::new().fail_delete(
            "canvas-dev/kv/keyVault",
            BackendFailure::new("ResourceNotFound", "gone"),
        );
        let plan = TeardownPlan::from_record(&record());
        let report = Teardown::new(&backend, &config(), &NoProgress)
            .run(&plan)
            .unwrap();
        assert_eq!(report.entry("canvas-dev/kv/keyVault").unwrap().status, EntryStatus::Deleted);
    }

    #[test]
    fn test_inventory_orders_leaves_before_containers() {
        let tagged = |node: &str, kind, sub| TaggedResource {
            resource_ref: ResourceRef::for_step(&scope(), node, sub),
            kind,
            sub_resource: sub,
        };
        let resources = vec![
            tagged("vm", ResourceKind::VirtualMachine, SubResource::VirtualNetwork),
            tagged("st", ResourceKind::Storage, SubResource::StorageAccount),
            tagged("vm", ResourceKind::VirtualMachine, SubResource::VirtualMachine),
            tagged("st", ResourceKind::Storage, SubResource::BlobContainer),
            tagged("vm", ResourceKind::VirtualMachine, SubResource::NetworkInterface),
            tagged("st", ResourceKind::Storage, SubResource::BlobContainer),
        ];
        let plan = TeardownPlan::from_inventory(scope(), resources);
        let order: Vec<_> = plan.items.iter().map(|i| i.resource_ref.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "canvas-dev/st/blobContainer",
                "canvas-dev/vm/virtualMachine",
                "canvas-dev/vm/networkInterface",
                "canvas-dev/st/storageAccount",
                "canvas-dev/vm/virtualNetwork",
            ]
        );
    }

    #[test]
    fn test_inventory_teardown_isolates_failures() {
        let tagged = |node: &str, sub| TaggedResource {
            resource_ref: ResourceRef::for_step(&scope(), node, sub),
            kind: ResourceKind::Storage,
            sub_resource: sub,
        };
        let backend = ScriptedBackend::new().fail_delete(
            "canvas-dev/a/blobContainer",
            BackendFailure::new("AuthorizationFailed", "denied"),
        );
        let plan = TeardownPlan::from_inventory(
            scope(),
            vec![
                tagged("a", SubResource::StorageAccount),
                tagged("a", SubResource::BlobContainer),
                tagged("b", SubResource::BlobContainer),
            ],
        );
        let report = Teardown::new(&backend, &config(), &NoProgress)
            .run(&plan)
            .unwrap();

        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.deleted, 2);
        assert_eq!(report.entry("canvas-dev/a/blobContainer").unwrap().attempts, 1);
        // Tier order is kept even though an item failed
        let deleted = backend.deleted();
        assert_eq!(deleted.last().unwrap().as_str(), "canvas-dev/a/storageAccount");
    }

    #[test]
    fn test_cancelled_teardown_skips_remaining() {
        let backend = ScriptedBackend::new();
        let config = config();
        config.cancel.cancel();
        let report = Teardown::new(&backend, &config, &NoProgress)
            .run(&TeardownPlan::from_record(&record()))
            .unwrap();
        assert!(backend.deleted().is_empty());
        assert_eq!(report.summary.skipped, 4);
    }
}
