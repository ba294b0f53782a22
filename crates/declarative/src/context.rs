//! Progress reporting
//!
//! The executor and teardown call these hooks from worker threads, so
//! implementations must be `Sync`. Every method has a no-op default.

use crate::error::Failure;
use crate::kind::SubResource;
use crate::report::{BindingReport, Operation, ReportEntry};
use crate::types::ResourceRef;
use std::time::Duration;

/// Receives progress updates during apply and destroy
pub trait ProgressObserver: Send + Sync {
    /// Called once before any work, with the number of entries to expect
    fn on_start(&self, _operation: Operation, _total: usize) {}

    /// Called when a stage (apply) or tier (destroy) begins
    fn on_stage_start(&self, _stage: usize, _entries: usize) {}

    /// Called after each chain step on apply
    fn on_step_complete(&self, _node_id: &str, _step: SubResource, _ok: bool) {}

    /// Called when an entry reaches a terminal state
    fn on_entry_complete(&self, _entry: &ReportEntry) {}

    fn on_binding_complete(&self, _binding: &BindingReport) {}

    /// Called before sleeping between attempts
    fn on_retry(&self, _resource: &ResourceRef, _attempt: u32, _max_attempts: u32, _failure: &Failure, _delay: Duration) {}

    /// Called once all work is done
    fn on_finish(&self) {}
}

/// Observer that ignores everything
pub struct NoProgress;

impl ProgressObserver for NoProgress {}
