//! Provisioning reports
//!
//! A report is built by merging immutable fragments, one per stage (apply)
//! or per tier (destroy). Counts in [`ReportSummary`] always add up to the
//! number of entries.

use crate::error::Failure;
use crate::kind::{ResourceKind, SubResource};
use crate::store::RecordedResource;
use crate::types::{Intent, Outputs, ResourceRef, Scope};
use crate::validate::Warning;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Apply,
    Destroy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => f.write_str("apply"),
            Self::Destroy => f.write_str("destroy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Created,
    Deleted,
    Failed,
    Skipped,
}

/// Why an entry or binding was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    #[serde(rename = "upstream failure")]
    UpstreamFailure,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "dependent resource not deleted")]
    DependentNotDeleted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpstreamFailure => f.write_str("upstream failure"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::DependentNotDeleted => f.write_str("dependent resource not deleted"),
        }
    }
}

/// Outcome for one node (apply) or one backend resource (destroy)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    /// Node id on apply, resource ref on destroy
    pub id: String,
    pub kind: ResourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<SubResource>,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
    /// Chain step that failed, on apply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<SubResource>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Outputs::is_empty")]
    pub outputs: Outputs,
    /// Backend resources created for this node
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceRef>,
}

impl ReportEntry {
    pub fn new(id: impl Into<String>, kind: ResourceKind, status: EntryStatus) -> Self {
        Self {
            id: id.into(),
            kind,
            sub_resource: None,
            status,
            reason: None,
            error: None,
            failed_step: None,
            attempts: 0,
            outputs: Outputs::new(),
            resources: Vec::new(),
        }
    }

    pub fn skipped(id: impl Into<String>, kind: ResourceKind, reason: SkipReason) -> Self {
        Self {
            reason: Some(reason),
            ..Self::new(id, kind, EntryStatus::Skipped)
        }
    }

    pub fn failed(id: impl Into<String>, kind: ResourceKind, failure: Failure) -> Self {
        Self {
            error: Some(failure),
            ..Self::new(id, kind, EntryStatus::Failed)
        }
    }

    /// Created or deleted, depending on the operation
    pub fn succeeded(&self) -> bool {
        matches!(self.status, EntryStatus::Created | EntryStatus::Deleted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStatus {
    Applied,
    Failed,
    Skipped,
}

/// Outcome of one binding step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingReport {
    pub edge: usize,
    pub source: String,
    pub sink: String,
    pub intent: Intent,
    pub status: BindingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
    /// Exported `bind-*` keys and their values
    #[serde(skip_serializing_if = "Outputs::is_empty")]
    pub values: Outputs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<ResourceRef>,
}

/// Counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub created: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub bindings_applied: usize,
    pub bindings_failed: usize,
    pub bindings_skipped: usize,
}

impl ReportSummary {
    pub fn add_entry(&mut self, entry: &ReportEntry) {
        match entry.status {
            EntryStatus::Created => self.created += 1,
            EntryStatus::Deleted => self.deleted += 1,
            EntryStatus::Failed => self.failed += 1,
            EntryStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn add_binding(&mut self, binding: &BindingReport) {
        match binding.status {
            BindingStatus::Applied => self.bindings_applied += 1,
            BindingStatus::Failed => self.bindings_failed += 1,
            BindingStatus::Skipped => self.bindings_skipped += 1,
        }
    }

    /// Total entries counted
    pub fn total(&self) -> usize {
        self.created + self.deleted + self.failed + self.skipped
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.bindings_failed == 0
    }
}

/// Results of one stage or tier, merged into the report as a unit
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub entries: Vec<ReportEntry>,
    pub bindings: Vec<BindingReport>,
    /// Resources that now exist on the backend, in creation order
    pub ledger: Vec<RecordedResource>,
}

/// Everything an apply or destroy did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisioningReport {
    pub operation: Operation,
    pub scope: Scope,
    pub entries: Vec<ReportEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<BindingReport>,
    /// Every `bind-*` key written, later bindings overwriting earlier ones
    #[serde(skip_serializing_if = "Outputs::is_empty")]
    pub outputs: Outputs,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    pub summary: ReportSummary,
    /// Set when the backend work finished but the plan record could not be written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_error: Option<String>,
    #[serde(skip)]
    ledger: Vec<RecordedResource>,
}

impl ProvisioningReport {
    pub fn new(operation: Operation, scope: Scope) -> Self {
        Self {
            operation,
            scope,
            entries: Vec::new(),
            bindings: Vec::new(),
            outputs: Outputs::new(),
            warnings: Vec::new(),
            summary: ReportSummary::default(),
            record_error: None,
            ledger: Vec::new(),
        }
    }

    /// Fold a fragment into the report
    #[must_use]
    pub fn merge(mut self, fragment: Fragment) -> Self {
        for entry in &fragment.entries {
            self.summary.add_entry(entry);
        }
        for binding in &fragment.bindings {
            self.summary.add_binding(binding);
            self.outputs
                .extend(binding.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self.entries.extend(fragment.entries);
        self.bindings.extend(fragment.bindings);
        self.ledger.extend(fragment.ledger);
        self
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<Warning>) -> Self {
        self.warnings = warnings;
        self
    }

    #[must_use]
    pub fn with_record_error(mut self, message: impl Into<String>) -> Self {
        self.record_error = Some(message.into());
        self
    }

    pub fn entry(&self, id: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn binding(&self, source: &str, sink: &str) -> Option<&BindingReport> {
        self.bindings
            .iter()
            .find(|b| b.source == source && b.sink == sink)
    }

    /// Backend resources created by this apply, in plan order
    pub fn ledger(&self) -> &[RecordedResource] {
        &self.ledger
    }

    /// No failed entries or bindings, and the plan record is up to date
    pub fn is_success(&self) -> bool {
        self.summary.is_success() && self.record_error.is_none()
    }
}
