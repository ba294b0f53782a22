//! Core types for declarative infrastructure graphs

use crate::error::GraphError;
use crate::kind::{ResourceKind, SubResource};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Location used when neither the graph nor the caller provides one
pub const DEFAULT_LOCATION: &str = "westeurope";

/// Property bag of a node, ordered by key
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Attribute map returned by the backend for a created resource
pub type Outputs = BTreeMap<String, String>;

/// Semantic purpose of an edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Source notifies or feeds the sink (the only intent with bindings)
    #[default]
    Notify,
    /// Sink reads data owned by the source
    Read,
    /// Sink writes data owned by the source
    Write,
    /// Source invokes the sink
    Invoke,
}

impl Intent {
    /// Every recognized intent
    pub const ALL: [Self; 4] = [Self::Notify, Self::Read, Self::Write, Self::Invoke];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notify => "notify",
            Self::Read => "read",
            Self::Write => "write",
            Self::Invoke => "invoke",
        }
    }

    /// Whether the binding table has entries for this intent
    pub const fn is_implemented(self) -> bool {
        matches!(self, Self::Notify)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared logical resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: ResourceKind,
    /// Logical name; the id is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "props")]
    pub properties: Properties,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            properties: Properties::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The name the user asked for, before sanitizing
    pub fn logical_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.id)
    }

    /// Get a property as a string, if it is one
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(serde_json::Value::as_str)
    }
}

/// An intent-tagged relationship between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(alias = "from_")]
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub intent: Intent,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, intent: Intent) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            intent,
        }
    }
}

/// The unit of submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub project: String,
    #[serde(alias = "environment")]
    pub env: String,
    #[serde(default, alias = "region", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(project: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            env: env.into(),
            location: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn scope(&self) -> Scope {
        Scope::new(&self.project, &self.env)
    }

    /// First node with the given id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Resolve the deployment location, falling back to `default`
    pub fn location_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.location
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(default)
    }
}

/// A (project, environment) pair: lock key, store key and backend tag
///
/// Both parts are lowercase letters and digits, so the rendered
/// `{project}-{env}` names exactly one scope and is safe as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub project: String,
    pub env: String,
}

impl Scope {
    pub fn new(project: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            env: env.into(),
        }
    }

    pub const MAX_PART_LEN: usize = 32;

    /// Reject parts that would make the rendered scope ambiguous or escape a directory
    pub fn check(&self) -> Result<(), GraphError> {
        for (field, value) in [("project", &self.project), ("env", &self.env)] {
            let valid = (1..=Self::MAX_PART_LEN).contains(&value.len())
                && value.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
            if !valid {
                return Err(GraphError::InvalidScope {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Tag value attached to every backend resource of this scope
    pub fn tag(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project, self.env)
    }
}

/// Stable identity of one backend resource
///
/// Derived only from the scope, node id and sub-resource, so re-applying the
/// same graph addresses the same resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRef(String);

impl ResourceRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Reference for a step of a node's chain
    pub fn for_step(scope: &Scope, node_id: &str, sub_resource: SubResource) -> Self {
        Self(format!("{scope}/{node_id}/{sub_resource}"))
    }

    /// Reference for a resource created by a binding between two nodes
    pub fn for_link(scope: &Scope, source: &str, sink: &str, sub_resource: SubResource) -> Self {
        Self(format!("{scope}/{source}~{sink}/{sub_resource}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cooperative cancellation shared between the caller and the executor
///
/// Cancelling never interrupts a backend call already in flight; it only
/// prevents new steps and stages from starting.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-invocation configuration for preview, apply and destroy
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Concurrency ceiling for node tasks within a stage
    pub jobs: usize,
    /// Retry policy for retryable backend failures
    pub retry: RetryPolicy,
    /// Location used when the graph does not set one
    pub default_location: String,
    pub cancel: CancelToken,
}

impl RunConfig {
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jobs: 4,
            retry: RetryPolicy::default(),
            default_location: DEFAULT_LOCATION.to_string(),
            cancel: CancelToken::new(),
        }
    }
}
