//! Plan builder - expands nodes into chains and layers them into stages

use crate::binding::{self, Export};
use crate::error::GraphError;
use crate::kind::{ResourceKind, SubResource};
use crate::naming;
use crate::types::{Graph, Intent, Node, Properties, ResourceRef, Scope};
use crate::validate::structural_errors;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

/// One backend resource to create, in chain order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStep {
    pub sub_resource: SubResource,
    pub resource_ref: ResourceRef,
}

/// A node expanded into its ordered sub-resource chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTask {
    pub node_id: String,
    pub kind: ResourceKind,
    /// Sanitized backend name
    pub name: String,
    /// User properties layered over the kind's defaults
    pub properties: Properties,
    pub chain: Vec<ChainStep>,
}

/// Exports applied once both endpoints are terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingStep {
    /// Index of the edge in the submitted graph
    pub edge: usize,
    pub source: String,
    pub sink: String,
    pub intent: Intent,
    pub exports: Vec<Export>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<ChainStep>,
}

impl BindingStep {
    /// Output keys this step writes
    pub fn keys(&self) -> Vec<String> {
        self.exports
            .iter()
            .map(|e| binding::binding_key(&self.sink, e.attribute))
            .collect()
    }
}

/// Independent tasks plus the bindings that become ready after them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    pub index: usize,
    pub tasks: Vec<NodeTask>,
    pub bindings: Vec<BindingStep>,
}

/// An executable plan for one scope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisioningPlan {
    pub scope: Scope,
    pub location: String,
    pub stages: Vec<Stage>,
}

impl ProvisioningPlan {
    pub fn tasks(&self) -> impl Iterator<Item = &NodeTask> {
        self.stages.iter().flat_map(|s| s.tasks.iter())
    }

    pub fn bindings(&self) -> impl Iterator<Item = &BindingStep> {
        self.stages.iter().flat_map(|s| s.bindings.iter())
    }

    pub fn task(&self, node_id: &str) -> Option<&NodeTask> {
        self.tasks().find(|t| t.node_id == node_id)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            scope: self.scope.to_string(),
            location: self.location.clone(),
            stages: self
                .stages
                .iter()
                .map(|s| StageSummary {
                    index: s.index,
                    nodes: s.tasks.iter().map(|t| t.node_id.clone()).collect(),
                    bindings: s.bindings.len(),
                })
                .collect(),
            nodes: self.tasks().count(),
            sub_resources: self.tasks().map(|t| t.chain.len()).sum::<usize>()
                + self.bindings().filter(|b| b.link.is_some()).count(),
            bindings: self.bindings().count(),
        }
    }
}

/// What apply would do, without doing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub scope: String,
    pub location: String,
    pub stages: Vec<StageSummary>,
    pub nodes: usize,
    pub sub_resources: usize,
    pub bindings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub index: usize,
    pub nodes: Vec<String>,
    pub bindings: usize,
}

/// Pass a backend name through only if it satisfies the node's naming rule
fn conforming(node: &Node, name: String) -> Result<String, GraphError> {
    let rule = node.kind.descriptor().naming;
    if naming::conforms(&name, &rule) {
        Ok(name)
    } else {
        Err(GraphError::NonConformingName {
            node: node.id.clone(),
            kind: node.kind,
            name,
            pattern: rule.pattern(),
        })
    }
}

/// Build the staged plan for a graph.
///
/// Returns the first structural error; use [`crate::validate()`] to collect all of them.
pub fn build_plan(graph: &Graph, default_location: &str) -> Result<ProvisioningPlan, GraphError> {
    if let Some(err) = structural_errors(graph).into_iter().next() {
        return Err(err);
    }

    let scope = graph.scope();
    let deps = soft_dependencies(graph);
    let stage_of = layer(&deps).map_err(|cycle| GraphError::DependencyCycle {
        nodes: cycle.into_iter().map(|i| graph.nodes[i].id.clone()).collect(),
    })?;

    let stage_count = stage_of.iter().max().map_or(0, |max| max + 1);
    let mut stages: Vec<Stage> = (0..stage_count)
        .map(|index| Stage {
            index,
            tasks: Vec::new(),
            bindings: Vec::new(),
        })
        .collect();

    for (i, node) in graph.nodes.iter().enumerate() {
        let descriptor = node.kind.descriptor();
        let name = conforming(node, naming::physical_name(node))?;

        let properties = descriptor.merge_defaults(&node.properties);
        let chain = descriptor
            .steps(&properties)
            .into_iter()
            .map(|sub_resource| ChainStep {
                sub_resource,
                resource_ref: ResourceRef::for_step(&scope, &node.id, sub_resource),
            })
            .collect();

        stages[stage_of[i]].tasks.push(NodeTask {
            node_id: node.id.clone(),
            kind: node.kind,
            name,
            properties,
            chain,
        });
    }

    let index = node_index(graph);
    let mut seen = HashSet::new();
    for (edge_index, edge) in graph.edges.iter().enumerate() {
        let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str())) else {
            continue;
        };
        let Some(rule) = binding::resolve(graph.nodes[from].kind, graph.nodes[to].kind, edge.intent).rule() else {
            continue;
        };
        if !seen.insert((from, to, edge.intent)) {
            log::debug!("Ignoring duplicate edge #{edge_index} {} -> {}", edge.from, edge.to);
            continue;
        }

        let link = rule.link.map(|sub_resource| ChainStep {
            sub_resource,
            resource_ref: ResourceRef::for_link(&scope, &edge.from, &edge.to, sub_resource),
        });
        let stage = stage_of[from].max(stage_of[to]);
        stages[stage].bindings.push(BindingStep {
            edge: edge_index,
            source: edge.from.clone(),
            sink: edge.to.clone(),
            intent: edge.intent,
            exports: rule.exports.to_vec(),
            link,
        });
    }

    log::debug!(
        "Planned {} node(s) in {} stage(s) for {scope}",
        graph.nodes.len(),
        stages.len()
    );

    Ok(ProvisioningPlan {
        scope,
        location: graph.location_or(default_location).to_string(),
        stages,
    })
}

/// Node ids forming a cycle of soft dependencies, in edge direction
pub fn find_cycle(graph: &Graph) -> Option<Vec<String>> {
    layer(&soft_dependencies(graph))
        .err()
        .map(|cycle| cycle.into_iter().map(|i| graph.nodes[i].id.clone()).collect())
}

/// First index of every node id
fn node_index(graph: &Graph) -> HashMap<&str, usize> {
    let mut index = HashMap::new();
    for (i, node) in graph.nodes.iter().enumerate() {
        index.entry(node.id.as_str()).or_insert(i);
    }
    index
}

/// For every node, the nodes it must wait for: each resolved binding makes
/// the sink depend on the source
fn soft_dependencies(graph: &Graph) -> Vec<BTreeSet<usize>> {
    let index = node_index(graph);
    let mut deps = vec![BTreeSet::new(); graph.nodes.len()];
    for edge in &graph.edges {
        let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str())) else {
            continue;
        };
        if binding::resolve(graph.nodes[from].kind, graph.nodes[to].kind, edge.intent)
            .rule()
            .is_some()
        {
            deps[to].insert(from);
        }
    }
    deps
}

/// Kahn layering: stage of every node, or the nodes of one cycle
fn layer(deps: &[BTreeSet<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let mut pending: Vec<usize> = deps.iter().map(BTreeSet::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); deps.len()];
    for (node, node_deps) in deps.iter().enumerate() {
        for &dep in node_deps {
            dependents[dep].push(node);
        }
    }

    let mut stage_of: Vec<Option<usize>> = vec![None; deps.len()];
    let mut frontier: Vec<usize> = (0..deps.len()).filter(|&i| pending[i] == 0).collect();
    let mut stage = 0;
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for &node in &frontier {
            stage_of[node] = Some(stage);
            for &dependent in &dependents[node] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        frontier = next;
        stage += 1;
    }

    if stage_of.iter().all(Option::is_some) {
        return Ok(stage_of.into_iter().flatten().collect());
    }
    Err(trace_cycle(deps, &stage_of))
}

/// Walk unplaced dependencies until a node repeats.
///
/// Every unplaced node waits on at least one other unplaced node, so the walk
/// always closes a loop.
fn trace_cycle(deps: &[BTreeSet<usize>], stage_of: &[Option<usize>]) -> Vec<usize> {
    let Some(start) = stage_of.iter().position(Option::is_none) else {
        return Vec::new();
    };

    let mut path = Vec::new();
    let mut position = HashMap::new();
    let mut current = start;
    loop {
        if let Some(&at) = position.get(&current) {
            let mut cycle: Vec<usize> = path[at..].to_vec();
            cycle.push(current);
            cycle.reverse();
            return cycle;
        }
        position.insert(current, path.len());
        path.push(current);
        match deps[current].iter().find(|&&d| stage_of[d].is_none()) {
            Some(&next) => current = next,
            None => return path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, Node, DEFAULT_LOCATION};

    fn graph() -> Graph {
        Graph::new("canvas", "dev")
    }

    #[test]
    fn test_independent_nodes_share_stage_zero() {
        let g = graph()
            .with_node(Node::new("a", ResourceKind::KeyVault))
            .with_node(Node::new("b", ResourceKind::AppInsights));
        let plan = build_plan(&g, DEFAULT_LOCATION).unwrap();
        assert_eq!(plan.stages.len(), 1);
        assert_eq!(plan.summary().stages[0].nodes, vec!["a", "b"]);
    }

    #[test]
    fn test_binding_orders_sink_after_source() {
        let g = graph()
            .with_node(Node::new("fn1", ResourceKind::FunctionApp))
            .with_node(Node::new("q1", ResourceKind::ServiceBus))
            .with_edge(Edge::new("q1", "fn1", Intent::Notify));
        let plan = build_plan(&g, DEFAULT_LOCATION).unwrap();

        assert_eq!(plan.stages.len(), 2);
        assert_eq!(plan.stages[0].tasks[0].node_id, "q1");
        assert_eq!(plan.stages[1].tasks[0].node_id, "fn1");
        assert!(plan.stages[0].bindings.is_empty());
        assert_eq!(plan.stages[1].bindings[0].keys(), vec!["bind-fn1-queue", "bind-fn1-conn"]);
    }

    #[test]
    fn test_chain_order_and_refs() {
        let g = graph().with_node(Node::new("db", ResourceKind::CosmosDb));
        let plan = build_plan(&g, "eastus").unwrap();
        let task = plan.task("db").unwrap();
        let subs: Vec<_> = task.chain.iter().map(|s| s.sub_resource).collect();
        assert_eq!(
            subs,
            vec![
                SubResource::CosmosAccount,
                SubResource::CosmosDatabase,
                SubResource::CosmosContainer
            ]
        );
        assert_eq!(task.chain[1].resource_ref.as_str(), "canvas-dev/db/cosmosDatabase");
        assert_eq!(plan.location, "eastus");
    }

    #[test]
    fn test_unresolved_edge_adds_no_dependency() {
        let g = graph()
            .with_node(Node::new("k1", ResourceKind::KeyVault))
            .with_node(Node::new("k2", ResourceKind::KeyVault))
            .with_edge(Edge::new("k1", "k2", Intent::Notify));
        let plan = build_plan(&g, DEFAULT_LOCATION).unwrap();
        assert_eq!(plan.stages.len(), 1);
        assert_eq!(plan.bindings().count(), 0);
    }

    #[test]
    fn test_cycle_is_reported_in_edge_direction() {
        let g = graph()
            .with_node(Node::new("bus", ResourceKind::ServiceBus))
            .with_node(Node::new("db", ResourceKind::Sql))
            .with_edge(Edge::new("bus", "db", Intent::Notify))
            .with_edge(Edge::new("db", "bus", Intent::Notify));
        let err = build_plan(&g, DEFAULT_LOCATION).unwrap_err();
        match err {
            GraphError::DependencyCycle { nodes } => {
                assert_eq!(nodes.first(), nodes.last());
                assert!(nodes.contains(&"bus".to_string()));
                assert!(nodes.contains(&"db".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolved_self_edge_is_a_cycle() {
        let g = graph()
            .with_node(Node::new("vm1", ResourceKind::VirtualMachine))
            .with_edge(Edge::new("vm1", "vm1", Intent::Notify));
        assert_eq!(find_cycle(&g), None, "vm -> vm has no binding");

        let g = graph()
            .with_node(Node::new("a", ResourceKind::FunctionApp))
            .with_node(Node::new("b", ResourceKind::ContainerApp))
            .with_edge(Edge::new("a", "b", Intent::Notify))
            .with_edge(Edge::new("b", "a", Intent::Notify));
        assert!(find_cycle(&g).is_some());
    }

    #[test]
    fn test_stage_is_longest_path() {
        // kv -> st -> q, and kv -> q directly
        let g = graph()
            .with_node(Node::new("q", ResourceKind::ServiceBus))
            .with_node(Node::new("st", ResourceKind::Storage))
            .with_node(Node::new("kv", ResourceKind::KeyVault))
            .with_edge(Edge::new("kv", "q", Intent::Notify))
            .with_edge(Edge::new("st", "q", Intent::Notify))
            .with_edge(Edge::new("kv", "st", Intent::Notify));
        let summary = build_plan(&g, DEFAULT_LOCATION).unwrap().summary();
        assert_eq!(summary.stages[0].nodes, vec!["kv"]);
        assert_eq!(summary.stages[1].nodes, vec!["st"]);
        assert_eq!(summary.stages[2].nodes, vec!["q"]);
        assert_eq!(summary.bindings, 3);
        // 1 + 1 + 3 chain steps plus the event subscription link
        assert_eq!(summary.sub_resources, 6);
    }

    #[test]
    fn test_duplicate_edges_bind_once() {
        let g = graph()
            .with_node(Node::new("q", ResourceKind::ServiceBus))
            .with_node(Node::new("f", ResourceKind::FunctionApp))
            .with_edge(Edge::new("q", "f", Intent::Notify))
            .with_edge(Edge::new("q", "f", Intent::Notify));
        let plan = build_plan(&g, DEFAULT_LOCATION).unwrap();
        assert_eq!(plan.bindings().count(), 1);
        assert_eq!(plan.bindings().next().unwrap().edge, 0);
    }

    #[test]
    fn test_structural_error_blocks_plan() {
        let g = graph()
            .with_node(Node::new("a", ResourceKind::KeyVault))
            .with_edge(Edge::new("a", "ghost", Intent::Notify));
        assert!(matches!(
            build_plan(&g, DEFAULT_LOCATION),
            Err(GraphError::UnknownEndpoint { .. })
        ));
    }

    #[test]
    fn test_non_conforming_name_is_rejected() {
        let node = Node::new("st", ResourceKind::Storage);
        let err = conforming(&node, "Not_Valid".to_string()).unwrap_err();
        assert!(matches!(
            err,
            GraphError::NonConformingName { ref node, ref name, .. } if node == "st" && name == "Not_Valid"
        ));
        assert_eq!(conforming(&node, "canvasuploads".to_string()).unwrap(), "canvasuploads");
    }

    #[test]
    fn test_planned_names_always_conform() {
        let mut g = graph();
        for (i, kind) in ResourceKind::ALL.into_iter().enumerate() {
            g = g.with_node(Node::new(format!("n{i}"), kind).with_name(format!("--9 Odd_Name {i}!--")));
        }
        let plan = build_plan(&g, DEFAULT_LOCATION).unwrap();
        for task in plan.tasks() {
            assert!(naming::conforms(&task.name, &task.kind.descriptor().naming), "{}", task.name);
        }
    }

    #[test]
    fn test_invalid_scope_blocks_plan() {
        let g = Graph::new("a", "b-c").with_node(Node::new("kv", ResourceKind::KeyVault));
        assert!(matches!(
            build_plan(&g, DEFAULT_LOCATION),
            Err(GraphError::InvalidScope { field: "env", .. })
        ));
    }

    #[test]
    fn test_empty_graph_has_no_stages() {
        let plan = build_plan(&graph(), DEFAULT_LOCATION).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.summary().nodes, 0);
    }
}
