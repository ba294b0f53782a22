//! `apply` and `destroy`

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use declarative::{NoProgress, ProgressObserver, ProvisionError, ProvisioningReport, Scope};
use dialoguer::Confirm;

use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs};
use crate::commands::{self, graph::print_summary, graph::print_validation, print_json};
use crate::config::{self, Settings};
use crate::progress::BarProgress;
use crate::ui;

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let settings = Settings::load()?;
    let graph = config::load_graph(&args.graph)?;
    let config = settings.run_config(args.jobs);
    let provisioner = commands::provisioner()?;

    let preview = provisioner.preview(&graph, &config);
    if ctx.interactive() {
        ui::header(&format!("Apply {}", graph.scope()));
        print_validation(&preview.validation);
        if let Some(summary) = &preview.summary {
            print_summary(ctx, &graph, summary);
        }
        println!();
    }
    if !preview.is_valid() {
        if ctx.json {
            print_json(&preview)?;
        }
        bail!("{} cannot be applied", args.graph.display());
    }

    if !args.yes && ctx.interactive() && !confirm(&format!("Provision {}?", graph.scope()))? {
        ui::info("Cancelled");
        return Ok(());
    }

    let report = run_with_progress(ctx, |progress| provisioner.apply(&graph, &config, progress))?;
    finish(ctx, &report)
}

pub fn destroy(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    let settings = Settings::load()?;
    let config = settings.run_config(args.jobs);
    let scope = Scope::new(&args.project, &args.env);
    let provisioner = commands::provisioner()?;

    if ctx.interactive() {
        ui::header(&format!("Destroy {scope}"));
        match provisioner.store().scopes() {
            Ok(scopes) if !scopes.contains(&scope.to_string()) => {
                ui::warn("No plan record; tagged resources will be discovered on the backend");
            }
            Ok(_) => {}
            Err(e) => log::warn!("Could not list plan records: {e:#}"),
        }
        println!();
    }

    if !args.yes && ctx.interactive() && !confirm(&format!("Delete every resource in {scope}?"))? {
        ui::info("Cancelled");
        return Ok(());
    }

    let report = run_with_progress(ctx, |progress| provisioner.destroy(&scope, &config, progress))?;
    finish(ctx, &report)
}

fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

fn run_with_progress<F>(ctx: &Context, run: F) -> Result<ProvisioningReport>
where
    F: FnOnce(&dyn ProgressObserver) -> Result<ProvisioningReport, ProvisionError>,
{
    let result = if ctx.interactive() {
        run(&BarProgress::new())
    } else {
        run(&NoProgress)
    };

    match result {
        Ok(report) => Ok(report),
        Err(ProvisionError::Invalid(report)) => {
            if ctx.json {
                print_json(&report)?;
            } else {
                print_validation(&report);
            }
            bail!("graph has {}", ui::plural(report.errors.len(), "validation error"))
        }
        Err(e) => Err(e.into()),
    }
}

fn finish(ctx: &Context, report: &ProvisioningReport) -> Result<()> {
    if ctx.json {
        print_json(report)?;
    } else if !ctx.quiet {
        print_report(report);
    }

    if let Some(err) = &report.record_error {
        bail!("{} {} finished but its plan record was not updated: {err}", report.operation, report.scope);
    }
    if !report.is_success() {
        bail!(
            "{} {} with {} and {}",
            report.operation,
            report.scope,
            ui::plural(report.summary.failed, "failed resource"),
            ui::plural(report.summary.bindings_failed, "failed binding")
        );
    }
    Ok(())
}

fn print_report(report: &ProvisioningReport) {
    ui::section("Resources");
    for entry in &report.entries {
        let detail = match (&entry.error, entry.reason) {
            (Some(failure), _) => format!(
                "{} {}",
                failure.class.to_string().red(),
                format!("[{}] {}", failure.code, failure.message).dimmed()
            ),
            (None, Some(reason)) => reason.to_string().yellow().to_string(),
            (None, None) => entry
                .sub_resource
                .map(|s| s.to_string())
                .unwrap_or_else(|| entry.kind.to_string())
                .dimmed()
                .to_string(),
        };
        println!("  {} {} {detail}", ui::entry_glyph(entry.status), entry.id);
        if let Some(step) = entry.failed_step {
            ui::dim(&format!("  failed at {step} after {}", ui::plural(entry.attempts as usize, "attempt")));
        }
        if let Some(failure) = &entry.error {
            ui::dim(&format!("  {}", failure.class.advice()));
        }
    }

    if !report.bindings.is_empty() {
        ui::section("Bindings");
        for binding in &report.bindings {
            let detail = match (&binding.error, binding.reason) {
                (Some(failure), _) => failure.to_string().red().to_string(),
                (None, Some(reason)) => reason.to_string().yellow().to_string(),
                (None, None) => ui::plural(binding.values.len(), "value").dimmed().to_string(),
            };
            println!(
                "  {} {} → {} {}",
                ui::binding_glyph(binding.status),
                binding.source,
                binding.sink,
                detail
            );
        }
    }

    if !report.outputs.is_empty() {
        ui::section("Outputs");
        for (key, value) in &report.outputs {
            ui::kv(key, value);
        }
    }

    if !report.warnings.is_empty() {
        ui::section("Warnings");
        for warning in &report.warnings {
            ui::warn(&warning.to_string());
        }
    }

    if let Some(err) = &report.record_error {
        ui::section("Plan record");
        ui::error(&format!("Not updated: {err}"));
        ui::dim("The entries above reflect what exists on the backend");
    }

    let s = &report.summary;
    println!();
    let line = format!(
        "{} created, {} deleted, {} failed, {} skipped",
        s.created, s.deleted, s.failed, s.skipped
    );
    if report.is_success() {
        ui::success(&line);
    } else {
        ui::error(&line);
    }
}
