//! Terminal progress for apply and destroy

use colored::Colorize;
use declarative::{
    BindingReport, BindingStatus, EntryStatus, Failure, Operation, ProgressObserver, ReportEntry, ResourceRef,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::ui;

/// Progress bar fed by the executor's observer hooks
pub struct BarProgress {
    pb: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            pb: ProgressBar::new(0),
        }
    }
}

impl ProgressObserver for BarProgress {
    fn on_start(&self, operation: Operation, total: usize) {
        self.pb.set_length(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} {prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            self.pb.set_style(style.progress_chars("=>-"));
        }
        self.pb.set_prefix(operation.to_string());
        self.pb.enable_steady_tick(Duration::from_millis(100));
    }

    fn on_stage_start(&self, stage: usize, entries: usize) {
        self.pb
            .set_message(format!("stage {stage}: {}", ui::plural(entries, "item")));
    }

    fn on_entry_complete(&self, entry: &ReportEntry) {
        self.pb.inc(1);
        if matches!(entry.status, EntryStatus::Failed) {
            let cause = entry
                .error
                .as_ref()
                .map(|f| f.class.to_string())
                .unwrap_or_default();
            self.pb.suspend(|| {
                println!("  {} {} ({cause})", "✗".red(), entry.id);
            });
        }
    }

    fn on_binding_complete(&self, binding: &BindingReport) {
        if binding.status == BindingStatus::Failed {
            self.pb.suspend(|| {
                println!("  {} {} → {}", "✗".red(), binding.source, binding.sink);
            });
        }
    }

    fn on_retry(&self, resource: &ResourceRef, attempt: u32, max_attempts: u32, failure: &Failure, delay: Duration) {
        self.pb.set_message(format!(
            "{resource}: {} (retry {attempt}/{max_attempts} in {:.1}s)",
            failure.class,
            delay.as_secs_f64()
        ));
    }

    fn on_finish(&self) {
        self.pb.finish_and_clear();
    }
}
