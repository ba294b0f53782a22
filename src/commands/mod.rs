//! Command implementations

pub mod graph;
pub mod health;
pub mod kinds;
pub mod provision;

use anyhow::Result;
use declarative::Provisioner;
use serde::Serialize;

use crate::backend::LocalBackend;
use crate::paths;
use crate::state::{FileLocks, FileStateStore};

/// Provisioner wired to the local backend and on-disk state
pub type LocalProvisioner = Provisioner<LocalBackend, FileStateStore, FileLocks>;

pub fn provisioner() -> Result<LocalProvisioner> {
    let state_dir = paths::state_dir()?;
    log::debug!("Using state dir {}", state_dir.display());
    Ok(Provisioner::new(
        LocalBackend::new(&state_dir),
        FileStateStore::new(&state_dir),
        FileLocks::new(&state_dir),
    ))
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Graph, Node, NoProgress, ProvisionError, ResourceKind, RunConfig, Scope};
    use tempfile::TempDir;

    fn local(dir: &TempDir) -> LocalProvisioner {
        Provisioner::new(
            LocalBackend::new(dir.path()),
            FileStateStore::new(dir.path()),
            FileLocks::new(dir.path()),
        )
    }

    fn bus_graph(project: &str, env: &str) -> Graph {
        let mut graph = Graph::new(project, env).with_node(Node::new("q1", ResourceKind::ServiceBus).with_name("orders"));
        graph.location = Some("eastus".into());
        graph
    }

    #[test]
    fn test_destroy_leaves_other_scopes_alone() {
        let dir = TempDir::new().unwrap();
        let p = local(&dir);
        let config = RunConfig::default();
        let first = bus_graph("ab", "c");
        let second = bus_graph("a", "bc");

        assert_eq!(p.apply(&first, &config, &NoProgress).unwrap().summary.created, 1);
        assert_eq!(p.apply(&second, &config, &NoProgress).unwrap().summary.created, 1);

        let report = p.destroy(&second.scope(), &config, &NoProgress).unwrap();
        assert_eq!(report.summary.deleted, 3);
        assert_eq!(p.backend().resource_count(&second.scope()).unwrap(), 0);
        assert_eq!(p.backend().resource_count(&first.scope()).unwrap(), 3);
        assert_eq!(p.store().scopes().unwrap(), vec!["ab-c".to_string()]);
    }

    #[test]
    fn test_separator_in_scope_is_rejected() {
        let dir = TempDir::new().unwrap();
        let p = local(&dir);
        let config = RunConfig::default();

        let err = p.apply(&bus_graph("a-b", "c"), &config, &NoProgress).unwrap_err();
        assert!(matches!(err, ProvisionError::Invalid(_)));
        let err = p
            .destroy(&Scope::new("../../escape", "x"), &config, &NoProgress)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Graph(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
