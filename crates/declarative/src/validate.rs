//! Graph validation
//!
//! Errors block apply; warnings and suggestions never do. Nothing here
//! mutates the graph or talks to the backend.

use crate::binding::{self, Unresolved};
use crate::error::{EdgeSide, GraphError};
use crate::kind::ResourceKind;
use crate::naming;
use crate::planner;
use crate::types::{Graph, Intent};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Names short enough to collide with high probability on globally unique kinds
pub const SHORT_NAME_THRESHOLD: usize = 8;

/// Names that are almost certainly taken already
pub const COMMON_NAMES: &[&str] = &[
    "test",
    "storage",
    "mystorage",
    "teststorage",
    "stor",
    "data",
    "files",
    "blob",
    "container",
    "backup",
    "archive",
];

/// Locations where subscription policies often block deployments
pub const RESTRICTED_LOCATIONS: &[&str] = &["westeurope"];

/// Function app names above this length are shortened by the backend
pub const FUNCTION_APP_NAME_LIMIT: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionRisk {
    Short,
    Common,
}

impl fmt::Display for CollisionRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => f.write_str("very short"),
            Self::Common => f.write_str("very common"),
        }
    }
}

/// Advisory findings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    #[error("{kind} name '{name}' (node {node}) is {risk} and likely taken globally")]
    NameCollisionRisk {
        node: String,
        kind: ResourceKind,
        name: String,
        risk: CollisionRisk,
    },

    #[error("node {node} will be named '{sanitized}' instead of '{original}'")]
    NameRewritten {
        node: String,
        original: String,
        sanitized: String,
    },

    #[error("{kind} (node {node}) needs a managed environment; subscriptions usually allow one per location and '{location}' may already have it")]
    SingleInstance {
        node: String,
        kind: ResourceKind,
        location: String,
    },

    #[error("edge #{edge} {from} -> {to} ({intent}) produces no binding: {reason}")]
    NoBinding {
        edge: usize,
        from: String,
        to: String,
        intent: Intent,
        reason: Unresolved,
    },

    #[error("function app name for node {node} is {length} characters; names over {limit} are truncated")]
    LongName { node: String, length: usize, limit: usize },

    #[error("location '{location}' may be blocked by subscription policy")]
    RestrictedLocation { location: String },

    #[error("edges #{first} and #{second} both write '{key}'; the later edge wins")]
    BindingKeyCollision { key: String, first: usize, second: usize },
}

/// Outcome of validating a graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<GraphError>,
    pub warnings: Vec<Warning>,
    pub suggestions: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a graph against structural rules and known backend constraints
pub fn validate(graph: &Graph, default_location: &str) -> ValidationReport {
    let mut report = ValidationReport {
        errors: structural_errors(graph),
        ..Default::default()
    };

    // Cycle detection needs every edge endpoint to exist
    if report.errors.is_empty()
        && let Some(nodes) = planner::find_cycle(graph)
    {
        report.errors.push(GraphError::DependencyCycle { nodes });
    }

    let location = graph.location_or(default_location);
    check_names(graph, &mut report);
    check_single_instance(graph, location, &mut report);
    check_bindings(graph, &mut report);

    if RESTRICTED_LOCATIONS.contains(&location.to_ascii_lowercase().as_str()) {
        report.warnings.push(Warning::RestrictedLocation {
            location: location.to_string(),
        });
        report
            .suggestions
            .push("Consider 'eastus', 'westus2', 'southeastasia' or 'centralus' if deployments are rejected".to_string());
    }

    log::debug!(
        "Validated {}: {} error(s), {} warning(s)",
        graph.scope(),
        report.errors.len(),
        report.warnings.len()
    );
    report
}

/// Unsafe scope parts, duplicate ids and dangling edge endpoints
pub(crate) fn structural_errors(graph: &Graph) -> Vec<GraphError> {
    let mut errors: Vec<GraphError> = graph.scope().check().err().into_iter().collect();
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) && reported.insert(node.id.as_str()) {
            errors.push(GraphError::DuplicateNodeId { id: node.id.clone() });
        }
    }

    for (edge_index, edge) in graph.edges.iter().enumerate() {
        for (side, id) in [(EdgeSide::Source, &edge.from), (EdgeSide::Sink, &edge.to)] {
            if !seen.contains(id.as_str()) {
                errors.push(GraphError::UnknownEndpoint {
                    edge: edge_index,
                    side,
                    id: id.clone(),
                });
            }
        }
    }
    errors
}

fn check_names(graph: &Graph, report: &mut ValidationReport) {
    for node in &graph.nodes {
        let requested = naming::requested_name(node);
        let sanitized = naming::physical_name(node);

        if node.kind.is_globally_unique() {
            let risks = [
                (sanitized.len() < SHORT_NAME_THRESHOLD).then_some(CollisionRisk::Short),
                COMMON_NAMES.contains(&sanitized.as_str()).then_some(CollisionRisk::Common),
            ];
            for risk in risks.into_iter().flatten() {
                report.warnings.push(Warning::NameCollisionRisk {
                    node: node.id.clone(),
                    kind: node.kind,
                    name: sanitized.clone(),
                    risk,
                });
                let better = naming::sanitize(
                    &format!("{sanitized}-{}-{}", graph.project, graph.env),
                    &node.kind.descriptor().naming,
                );
                report
                    .suggestions
                    .push(format!("Use a more specific name for {}, e.g. '{better}'", node.id));
            }
        }

        if node.kind == ResourceKind::FunctionApp && requested.chars().count() > FUNCTION_APP_NAME_LIMIT {
            report.warnings.push(Warning::LongName {
                node: node.id.clone(),
                length: requested.chars().count(),
                limit: FUNCTION_APP_NAME_LIMIT,
            });
        }

        if sanitized != requested {
            report.warnings.push(Warning::NameRewritten {
                node: node.id.clone(),
                original: requested.to_string(),
                sanitized,
            });
        }
    }
}

fn check_single_instance(graph: &Graph, location: &str, report: &mut ValidationReport) {
    for node in graph.nodes.iter().filter(|n| n.kind.is_single_instance()) {
        report.warnings.push(Warning::SingleInstance {
            node: node.id.clone(),
            kind: node.kind,
            location: location.to_string(),
        });
        report.suggestions.push(format!(
            "If {} fails: remove it from the graph, use another location, or delete the existing managed environment in '{location}'",
            node.id
        ));
    }
}

fn check_bindings(graph: &Graph, report: &mut ValidationReport) {
    let mut written: HashMap<String, usize> = HashMap::new();
    for (edge_index, edge) in graph.edges.iter().enumerate() {
        let (Some(source), Some(sink)) = (graph.node(&edge.from), graph.node(&edge.to)) else {
            continue;
        };
        match binding::resolve(source.kind, sink.kind, edge.intent) {
            binding::Resolution::Resolved(rule) => {
                for export in rule.exports {
                    let key = binding::binding_key(&edge.to, export.attribute);
                    if let Some(&first) = written.get(&key)
                        && !same_edge(graph, first, edge_index)
                    {
                        report.warnings.push(Warning::BindingKeyCollision {
                            key: key.clone(),
                            first,
                            second: edge_index,
                        });
                    }
                    written.insert(key, edge_index);
                }
            }
            binding::Resolution::Unresolved(reason) => {
                report.warnings.push(Warning::NoBinding {
                    edge: edge_index,
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    intent: edge.intent,
                    reason,
                });
            }
        }
    }
}

/// Repeated identical edges are planned once and never collide
fn same_edge(graph: &Graph, a: usize, b: usize) -> bool {
    graph.edges[a] == graph.edges[b]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DEFAULT_LOCATION, Edge, Node};

    fn graph() -> Graph {
        let mut g = Graph::new("canvas", "dev");
        g.location = Some("eastus".into());
        g
    }

    #[test]
    fn test_clean_graph_has_no_findings() {
        let g = graph()
            .with_node(Node::new("orders", ResourceKind::ServiceBus).with_name("orders-bus"))
            .with_node(Node::new("worker", ResourceKind::FunctionApp).with_name("orders-worker-fn"))
            .with_edge(Edge::new("orders", "worker", Intent::Notify));
        let report = validate(&g, DEFAULT_LOCATION);
        assert!(report.is_valid());
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn test_duplicate_ids_reported_once() {
        let g = graph()
            .with_node(Node::new("a", ResourceKind::KeyVault))
            .with_node(Node::new("a", ResourceKind::KeyVault))
            .with_node(Node::new("a", ResourceKind::KeyVault));
        let report = validate(&g, DEFAULT_LOCATION);
        assert_eq!(report.errors, vec![GraphError::DuplicateNodeId { id: "a".into() }]);
    }

    #[test]
    fn test_unknown_endpoints() {
        let g = graph()
            .with_node(Node::new("a", ResourceKind::KeyVault).with_name("vault-canvas-dev"))
            .with_edge(Edge::new("ghost", "a", Intent::Notify))
            .with_edge(Edge::new("a", "phantom", Intent::Notify));
        let report = validate(&g, DEFAULT_LOCATION);
        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(
            &report.errors[0],
            GraphError::UnknownEndpoint { edge: 0, side: EdgeSide::Source, id } if id == "ghost"
        ));
        assert!(matches!(
            &report.errors[1],
            GraphError::UnknownEndpoint { edge: 1, side: EdgeSide::Sink, .. }
        ));
    }

    #[test]
    fn test_common_storage_name_warns_but_stays_valid() {
        let g = graph().with_node(Node::new("st1", ResourceKind::Storage).with_name("storage"));
        let report = validate(&g, DEFAULT_LOCATION);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| matches!(
            w,
            Warning::NameCollisionRisk { risk: CollisionRisk::Common, .. }
        )));
        assert!(report.warnings.iter().any(|w| matches!(
            w,
            Warning::NameCollisionRisk { risk: CollisionRisk::Short, .. }
        )));
        assert!(!report.suggestions.is_empty());
    }

    #[test]
    fn test_rewritten_name_warns() {
        let g = graph().with_node(Node::new("st1", ResourceKind::Storage).with_name("Uploads_Archive_01"));
        let report = validate(&g, DEFAULT_LOCATION);
        assert!(report.warnings.contains(&Warning::NameRewritten {
            node: "st1".into(),
            original: "Uploads_Archive_01".into(),
            sanitized: "uploadsarchive01".into(),
        }));
    }

    #[test]
    fn test_container_app_warns_per_node() {
        let g = graph()
            .with_node(Node::new("web", ResourceKind::ContainerApp))
            .with_node(Node::new("api", ResourceKind::ContainerApp));
        let report = validate(&g, DEFAULT_LOCATION);
        let count = report
            .warnings
            .iter()
            .filter(|w| matches!(w, Warning::SingleInstance { .. }))
            .count();
        assert_eq!(count, 2);
        assert!(report.is_valid());
    }

    #[test]
    fn test_unresolved_edge_warns_exactly_once() {
        let g = graph()
            .with_node(Node::new("k1", ResourceKind::KeyVault).with_name("vault-one-canvas"))
            .with_node(Node::new("k2", ResourceKind::KeyVault).with_name("vault-two-canvas"))
            .with_edge(Edge::new("k1", "k2", Intent::Notify));
        let report = validate(&g, DEFAULT_LOCATION);
        let no_binding: Vec<_> = report
            .warnings
            .iter()
            .filter(|w| matches!(w, Warning::NoBinding { .. }))
            .collect();
        assert_eq!(no_binding.len(), 1);
        assert!(report.is_valid());
    }

    #[test]
    fn test_unimplemented_intent_warns() {
        let g = graph()
            .with_node(Node::new("st", ResourceKind::Storage).with_name("canvasuploads"))
            .with_node(Node::new("fn", ResourceKind::FunctionApp).with_name("canvas-fn"))
            .with_edge(Edge::new("st", "fn", Intent::Read));
        let report = validate(&g, DEFAULT_LOCATION);
        assert!(report.warnings.iter().any(|w| matches!(
            w,
            Warning::NoBinding {
                reason: Unresolved::UnimplementedIntent { intent: Intent::Read },
                ..
            }
        )));
    }

    #[test]
    fn test_ambiguous_scope_is_an_error() {
        let mut g = Graph::new("a-b", "c").with_node(Node::new("kv", ResourceKind::KeyVault).with_name("vault-canvas"));
        g.location = Some("eastus".into());
        let report = validate(&g, DEFAULT_LOCATION);
        assert_eq!(
            report.errors,
            vec![GraphError::InvalidScope {
                field: "project",
                value: "a-b".into()
            }]
        );

        g.project = "escape".into();
        g.env = "../x".into();
        let report = validate(&g, DEFAULT_LOCATION);
        assert!(matches!(
            report.errors.as_slice(),
            [GraphError::InvalidScope { field: "env", .. }]
        ));
    }

    #[test]
    fn test_cycle_is_an_error() {
        let g = graph()
            .with_node(Node::new("bus", ResourceKind::ServiceBus).with_name("canvas-bus"))
            .with_node(Node::new("db", ResourceKind::Sql).with_name("canvas-sql-db"))
            .with_edge(Edge::new("bus", "db", Intent::Notify))
            .with_edge(Edge::new("db", "bus", Intent::Notify));
        let report = validate(&g, DEFAULT_LOCATION);
        assert!(matches!(report.errors.as_slice(), [GraphError::DependencyCycle { .. }]));
    }

    #[test]
    fn test_restricted_location_uses_default() {
        let g = Graph::new("canvas", "dev");
        let report = validate(&g, DEFAULT_LOCATION);
        assert!(report.warnings.contains(&Warning::RestrictedLocation {
            location: "westeurope".into()
        }));
    }

    #[test]
    fn test_long_function_app_name() {
        let long = "f".repeat(70);
        let g = graph().with_node(Node::new("fn", ResourceKind::FunctionApp).with_name(long));
        let report = validate(&g, DEFAULT_LOCATION);
        assert!(report.warnings.iter().any(|w| matches!(w, Warning::LongName { length: 70, .. })));
    }

    #[test]
    fn test_binding_key_collision() {
        // Two queues notifying the same function both write bind-fn-queue
        let g = graph()
            .with_node(Node::new("q1", ResourceKind::ServiceBus).with_name("canvas-orders"))
            .with_node(Node::new("q2", ResourceKind::ServiceBus).with_name("canvas-payments"))
            .with_node(Node::new("fn", ResourceKind::FunctionApp).with_name("canvas-worker"))
            .with_edge(Edge::new("q1", "fn", Intent::Notify))
            .with_edge(Edge::new("q2", "fn", Intent::Notify));
        let report = validate(&g, DEFAULT_LOCATION);
        let collisions = report
            .warnings
            .iter()
            .filter(|w| matches!(w, Warning::BindingKeyCollision { first: 0, second: 1, .. }))
            .count();
        assert_eq!(collisions, 2);
    }
}
