use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::Context;
use crate::commands::print_json;
use crate::config::Settings;
use crate::paths;
use crate::state::FileStateStore;
use crate::ui;

#[derive(Debug, Serialize)]
struct Issue {
    category: &'static str,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fix: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct Health {
    location: Option<String>,
    state_dir: Option<String>,
    scopes: Vec<String>,
    stale_locks: Vec<String>,
    issues: Vec<Issue>,
}

pub fn run(ctx: &Context) -> Result<()> {
    let health = collect();

    if ctx.json {
        return print_json(&health);
    }

    ui::header("Health Check");

    ui::section("Configuration");
    match &health.location {
        Some(location) => println!("  {} default location {}", "✓".green(), location.bold()),
        None => println!("  {} settings could not be loaded", "✗".red()),
    }

    ui::section("State");
    if let Some(dir) = &health.state_dir {
        ui::kv("dir", dir);
    }
    if health.scopes.is_empty() {
        ui::dim("No plan records");
    } else {
        for scope in &health.scopes {
            println!("  {} {scope}", "•".cyan());
        }
    }
    for lock in &health.stale_locks {
        println!("  {} {lock} {}", "⚠".yellow(), "(lock held)".dimmed());
    }

    println!();
    if health.issues.is_empty() {
        ui::success("All checks passed");
    } else {
        print_issues(&health.issues);
    }
    Ok(())
}

fn print_issues(issues: &[Issue]) {
    ui::header(&format!("{} Found", ui::plural(issues.len(), "Issue")));
    for (i, issue) in issues.iter().enumerate() {
        println!(
            "  {}  {} {}",
            format!("{}.", i + 1).bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        println!();
    }
}

fn collect() -> Health {
    let mut health = Health::default();
    check_settings(&mut health);

    match paths::state_dir() {
        Ok(dir) => {
            health.state_dir = Some(dir.display().to_string());
            check_state_dir(&dir, &mut health);
        }
        Err(e) => health.issues.push(Issue {
            category: "State",
            summary: format!("Could not determine state directory: {e}"),
            fix: Some(format!("Set {}", paths::ENV_STATE_DIR)),
        }),
    }
    health
}

fn check_settings(health: &mut Health) {
    match Settings::load() {
        Ok(settings) => {
            health.location = Some(settings.run_config(None).default_location);
        }
        Err(e) => health.issues.push(Issue {
            category: "Configuration",
            summary: format!("{e:#}"),
            fix: paths::config_file()
                .ok()
                .map(|p| format!("Fix or remove {}", p.display())),
        }),
    }
}

fn check_state_dir(dir: &Path, health: &mut Health) {
    if let Err(e) = check_writable(dir) {
        health.issues.push(Issue {
            category: "State",
            summary: format!("{} is not writable: {e}", dir.display()),
            fix: Some(format!("Point {} at a writable directory", paths::ENV_STATE_DIR)),
        });
        return;
    }

    match FileStateStore::new(dir).scopes() {
        Ok(scopes) => health.scopes = scopes,
        Err(e) => health.issues.push(Issue {
            category: "State",
            summary: format!("{e:#}"),
            fix: None,
        }),
    }

    health.stale_locks = held_locks(&dir.join("locks"));
    for lock in &health.stale_locks {
        health.issues.push(Issue {
            category: "Locks",
            summary: format!("Scope {lock} is locked"),
            fix: Some(format!(
                "If no apply or destroy is running, remove {}",
                dir.join("locks").join(format!("{lock}.lock")).display()
            )),
        });
    }
}

fn check_writable(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let marker = dir.join(".health-check");
    fs::write(&marker, b"ok")?;
    fs::remove_file(&marker)
}

/// Scopes whose lock file is present
fn held_locks(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut locks: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "lock"))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    locks.sort();
    locks
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_state_dir_is_healthy() {
        let temp = TempDir::new().unwrap();
        let mut health = Health::default();
        check_state_dir(temp.path(), &mut health);
        assert!(health.issues.is_empty());
        assert!(health.scopes.is_empty());
    }

    #[test]
    fn test_leftover_lock_is_reported() {
        let temp = TempDir::new().unwrap();
        let locks = temp.path().join("locks");
        fs::create_dir_all(&locks).unwrap();
        fs::write(locks.join("canvas-dev.lock"), "123").unwrap();
        fs::write(locks.join("notes.txt"), "").unwrap();

        let mut health = Health::default();
        check_state_dir(temp.path(), &mut health);
        assert_eq!(health.stale_locks, vec!["canvas-dev"]);
        assert_eq!(health.issues.len(), 1);
        assert_eq!(health.issues[0].category, "Locks");
    }

    #[test]
    fn test_recorded_scopes_are_listed() {
        let temp = TempDir::new().unwrap();
        let plans = temp.path().join("plans");
        fs::create_dir_all(&plans).unwrap();
        fs::write(plans.join("shop-prod.toml"), "").unwrap();
        fs::write(plans.join("canvas-dev.toml"), "").unwrap();

        let mut health = Health::default();
        check_state_dir(temp.path(), &mut health);
        assert_eq!(health.scopes, vec!["canvas-dev", "shop-prod"]);
    }
}
