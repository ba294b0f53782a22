//! # Declarative
//!
//! Compiles declarative infrastructure graphs into staged provisioning plans
//! and runs them against a pluggable backend.
//!
//! ## Core Concepts
//!
//! - **Graph**: nodes (logical resources of a [`ResourceKind`]) joined by
//!   intent-tagged edges
//! - **Descriptor**: static data per kind (sub-resource chain, naming rule,
//!   capabilities, outputs)
//! - **Plan**: stages of independent node tasks, each a sequential chain,
//!   followed by the bindings that become ready
//! - **Report**: per-node and per-binding outcomes, merged stage by stage
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     Edge, Graph, InProcessLocks, Intent, MemoryPlanStore, NoProgress, Node,
//!     Provisioner, ResourceKind, RunConfig,
//! };
//!
//! let graph = Graph::new("canvas", "dev")
//!     .with_node(Node::new("orders", ResourceKind::ServiceBus))
//!     .with_node(Node::new("worker", ResourceKind::FunctionApp))
//!     .with_edge(Edge::new("orders", "worker", Intent::Notify));
//!
//! let provisioner = Provisioner::new(my_backend, MemoryPlanStore::new(), InProcessLocks::new());
//! let config = RunConfig::default().with_jobs(4);
//!
//! let preview = provisioner.preview(&graph, &config);
//! let report = provisioner.apply(&graph, &config, &NoProgress)?;
//! println!("{} created, {} failed", report.summary.created, report.summary.failed);
//! ```

pub mod backend;
pub mod binding;
pub mod context;
pub mod error;
pub mod executor;
pub mod kind;
pub mod lock;
pub mod naming;
pub mod planner;
pub mod provisioner;
pub mod report;
pub mod retry;
pub mod store;
pub mod teardown;
pub mod types;
pub mod validate;

#[cfg(test)]
mod testing;

pub use backend::{CreateRequest, DeleteRequest, ProvisioningBackend, TaggedResource};
pub use binding::{Resolution, Unresolved, binding_key, resolve};
pub use context::{NoProgress, ProgressObserver};
pub use error::{BackendFailure, EdgeSide, ErrorClass, Failure, GraphError, ProvisionError};
pub use executor::Executor;
pub use kind::{ResourceDescriptor, ResourceKind, SubResource, TeardownTier};
pub use lock::{InProcessLocks, LockProvider, ScopeGuard};
pub use naming::{NamingRule, conforms, physical_name, sanitize};
pub use planner::{PlanSummary, ProvisioningPlan, build_plan};
pub use provisioner::{Preview, Provisioner};
pub use report::{
    BindingReport, BindingStatus, EntryStatus, Operation, ProvisioningReport, ReportEntry, ReportSummary, SkipReason,
};
pub use retry::RetryPolicy;
pub use store::{MemoryPlanStore, PlanRecord, PlanStore, RecordedResource};
pub use teardown::{Teardown, TeardownPlan, TeardownSource};
pub use types::{CancelToken, DEFAULT_LOCATION, Edge, Graph, Intent, Node, Outputs, Properties, ResourceRef, RunConfig, Scope};
pub use validate::{ValidationReport, Warning, validate};
