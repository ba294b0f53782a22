//! `validate` and `preview`

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{Graph, PlanSummary, ValidationReport, validate as validate_graph};
use std::path::Path;

use crate::Context;
use crate::commands::{self, print_json};
use crate::config::{self, Settings};
use crate::ui;

pub fn validate(ctx: &Context, path: &Path) -> Result<()> {
    let settings = Settings::load()?;
    let graph = config::load_graph(path)?;
    let config = settings.run_config(None);
    let report = validate_graph(&graph, &config.default_location);

    if ctx.json {
        print_json(&report)?;
    } else if !ctx.quiet {
        ui::header(&format!("Validating {}", graph.scope()));
        print_validation(&report);
        if report.is_valid() {
            println!();
            ui::success(&format!(
                "{} and {} are valid",
                ui::plural(graph.nodes.len(), "node"),
                ui::plural(graph.edges.len(), "edge")
            ));
        }
    }

    if !report.is_valid() {
        bail!(
            "{} has {}",
            path.display(),
            ui::plural(report.errors.len(), "validation error")
        );
    }
    Ok(())
}

pub fn preview(ctx: &Context, path: &Path) -> Result<()> {
    let settings = Settings::load()?;
    let graph = config::load_graph(path)?;
    let config = settings.run_config(None);
    let preview = commands::provisioner()?.preview(&graph, &config);

    if ctx.json {
        print_json(&preview)?;
    } else if !ctx.quiet {
        ui::header(&format!("Preview of {}", graph.scope()));
        print_validation(&preview.validation);
        if let Some(summary) = &preview.summary {
            print_summary(ctx, &graph, summary);
        }
        if let Some(err) = &preview.plan_error {
            ui::error(&format!("No plan: {err}"));
        }
    }

    if !preview.is_valid() {
        bail!("{} cannot be applied", path.display());
    }
    Ok(())
}

/// Errors, warnings and suggestions, each under its own heading
pub fn print_validation(report: &ValidationReport) {
    if !report.errors.is_empty() {
        ui::section("Errors");
        for err in &report.errors {
            ui::error(&err.to_string());
        }
    }
    if !report.warnings.is_empty() {
        ui::section("Warnings");
        for warning in &report.warnings {
            ui::warn(&warning.to_string());
        }
    }
    if !report.suggestions.is_empty() {
        ui::section("Suggestions");
        for suggestion in &report.suggestions {
            ui::dim(suggestion);
        }
    }
}

pub fn print_summary(ctx: &Context, graph: &Graph, summary: &PlanSummary) {
    ui::section("Plan");
    ui::kv("scope", &summary.scope);
    ui::kv("location", &summary.location);
    ui::kv(
        "creates",
        &format!(
            "{} across {} ({})",
            ui::plural(summary.sub_resources, "resource"),
            ui::plural(summary.nodes, "node"),
            ui::plural(summary.bindings, "binding")
        ),
    );

    for stage in &summary.stages {
        println!();
        println!(
            "  {} {}",
            format!("Stage {}", stage.index).blue().bold(),
            format!("({})", ui::plural(stage.bindings, "binding")).dimmed()
        );
        for node_id in &stage.nodes {
            let kind = graph
                .node(node_id)
                .map(|n| n.kind.to_string())
                .unwrap_or_default();
            println!("    {} {node_id} {}", "+".green(), kind.dimmed());
            if ctx.verbose > 0
                && let Some(node) = graph.node(node_id)
            {
                let steps = node
                    .kind
                    .descriptor()
                    .steps(&node.kind.descriptor().merge_defaults(&node.properties));
                for step in steps {
                    ui::dim(&format!("    {step}"));
                }
            }
        }
    }
}
