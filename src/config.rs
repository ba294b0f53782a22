//! Settings file and graph documents
//!
//! Settings live in `config.toml` under the config directory. Every field is
//! optional; `IRFORGE_LOCATION` and command-line flags take precedence.

use anyhow::{Context, Result, bail};
use declarative::{DEFAULT_LOCATION, Graph, RetryPolicy, RunConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::paths;

/// Environment variable overriding the default location
pub const ENV_LOCATION: &str = "IRFORGE_LOCATION";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Location used when a graph does not set one
    pub location: Option<String>,
    /// Worker threads per stage
    pub jobs: Option<usize>,
    pub retry: RetrySettings,
}

/// Backoff for conflict and transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            backoff_factor: policy.backoff_factor,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl Settings {
    /// Load settings from the config directory, applying env overrides
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        let settings = Self::load_from(&path)?;
        Ok(settings.with_location_override(std::env::var(ENV_LOCATION).ok()))
    }

    /// Load settings from a file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Settings file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn with_location_override(mut self, location: Option<String>) -> Self {
        if let Some(location) = location.filter(|l| !l.trim().is_empty()) {
            log::debug!("Default location overridden by {ENV_LOCATION}: {location}");
            self.location = Some(location);
        }
        self
    }

    /// Per-invocation config, flags winning over settings
    pub fn run_config(&self, jobs: Option<usize>) -> RunConfig {
        let jobs = jobs.or(self.jobs).unwrap_or(RunConfig::default().jobs);
        RunConfig {
            default_location: self
                .location
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            ..RunConfig::default()
        }
        .with_jobs(jobs)
        .with_retry(self.retry.policy())
    }
}

/// Graph document formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Json,
    Toml,
}

impl GraphFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            Some(other) => bail!("Unsupported graph format '.{other}' (expected .json or .toml)"),
            None => bail!("Graph file {} has no extension (expected .json or .toml)", path.display()),
        }
    }
}

/// Read and parse a graph document
pub fn load_graph(path: &Path) -> Result<Graph> {
    let format = GraphFormat::from_path(path)?;
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read graph: {}", path.display()))?;
    let graph: Graph = match format {
        GraphFormat::Json => serde_json::from_str(&content)
            .with_context(|| format!("Invalid graph document: {}", path.display()))?,
        GraphFormat::Toml => {
            toml::from_str(&content).with_context(|| format!("Invalid graph document: {}", path.display()))?
        }
    };
    log::debug!(
        "Loaded graph {} with {} node(s) and {} edge(s)",
        graph.scope(),
        graph.nodes.len(),
        graph.edges.len()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Intent, ResourceKind};
    use tempfile::TempDir;

    const GRAPH_JSON: &str = r#"{
        "project": "canvas",
        "environment": "dev",
        "region": "eastus",
        "nodes": [
            {"id": "q1", "kind": "azure.servicebus", "name": "canvas-orders"},
            {"id": "fn1", "kind": "azure.functionapp", "props": {"runtime": "python"}}
        ],
        "edges": [{"from_": "q1", "to": "fn1"}]
    }"#;

    const GRAPH_TOML: &str = r#"
project = "canvas"
env = "dev"

[[nodes]]
id = "st"
kind = "azure.storage"
name = "uploads"

[[nodes]]
id = "bus"
kind = "azure.servicebus"

[[edges]]
from = "st"
to = "bus"
intent = "notify"
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_json_graph_with_aliases() {
        let dir = TempDir::new().unwrap();
        let graph = load_graph(&write(&dir, "graph.json", GRAPH_JSON)).unwrap();

        assert_eq!(graph.env, "dev");
        assert_eq!(graph.location.as_deref(), Some("eastus"));
        assert_eq!(graph.nodes[1].kind, ResourceKind::FunctionApp);
        assert_eq!(graph.nodes[1].property_str("runtime"), Some("python"));
        assert_eq!(graph.edges[0].intent, Intent::Notify);
    }

    #[test]
    fn test_load_toml_graph() {
        let dir = TempDir::new().unwrap();
        let graph = load_graph(&write(&dir, "graph.toml", GRAPH_TOML)).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges[0].from, "st");
        assert!(graph.location.is_none());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "bad.json",
            r#"{"project": "p", "env": "e", "nodes": [{"id": "x", "kind": "azure.mainframe"}], "edges": []}"#,
        );
        let err = format!("{:#}", load_graph(&path).unwrap_err());
        assert!(err.contains("azure.mainframe"), "{err}");
        assert!(err.contains("azure.storage"), "{err}");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "graph.yaml", "project: p");
        assert!(load_graph(&path).is_err());
    }

    #[test]
    fn test_missing_settings_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());

        let config = settings.run_config(None);
        assert_eq!(config.default_location, DEFAULT_LOCATION);
        assert_eq!(config.jobs, 4);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_settings_and_overrides() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.toml",
            r#"
location = "northeurope"
jobs = 2

[retry]
max_attempts = 6
base_delay_ms = 500
"#,
        );
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.retry.max_attempts, 6);
        assert_eq!(settings.retry.backoff_factor, 2.0);

        let config = settings.run_config(None);
        assert_eq!(config.jobs, 2);
        assert_eq!(config.default_location, "northeurope");
        assert_eq!(config.retry.base_delay, Duration::from_millis(500));

        let config = settings
            .with_location_override(Some("eastus".into()))
            .run_config(Some(8));
        assert_eq!(config.jobs, 8);
        assert_eq!(config.default_location, "eastus");
    }

    #[test]
    fn test_blank_location_override_is_ignored() {
        let settings = Settings::default().with_location_override(Some("  ".into()));
        assert!(settings.location.is_none());
    }
}
