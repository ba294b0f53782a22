//! Provisioning backend seam
//!
//! The backend performs the actual resource calls. It is opaque to the
//! planner: it receives stable references and returns outputs or a
//! structured failure, which the executor classifies.

use crate::error::BackendFailure;
use crate::kind::{ResourceKind, SubResource};
use crate::types::{Outputs, Properties, ResourceRef, Scope};
use serde::{Deserialize, Serialize};

/// Everything the backend needs to create one resource
#[derive(Debug, Clone, Copy)]
pub struct CreateRequest<'a> {
    pub scope: &'a Scope,
    pub resource_ref: &'a ResourceRef,
    pub node_id: &'a str,
    pub kind: ResourceKind,
    pub sub_resource: SubResource,
    /// Sanitized backend name of the node
    pub name: &'a str,
    pub location: &'a str,
    pub properties: &'a Properties,
    /// Outputs of earlier steps of the same node (or of both endpoints for links)
    pub inputs: &'a Outputs,
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteRequest<'a> {
    pub scope: &'a Scope,
    pub resource_ref: &'a ResourceRef,
    pub kind: ResourceKind,
    pub sub_resource: SubResource,
}

/// A resource found on the backend by its scope tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedResource {
    pub resource_ref: ResourceRef,
    pub kind: ResourceKind,
    pub sub_resource: SubResource,
}

/// External executor for resource calls.
///
/// Calls block until the backend answers. Implementations must be idempotent
/// on `resource_ref`: creating an existing resource returns its outputs.
pub trait ProvisioningBackend: Send + Sync {
    /// Short name shown by health checks
    fn name(&self) -> &str;

    fn create(&self, request: &CreateRequest<'_>) -> Result<Outputs, BackendFailure>;

    fn delete(&self, request: &DeleteRequest<'_>) -> Result<(), BackendFailure>;

    /// Every resource carrying the scope's tag
    fn list_tagged(&self, scope: &Scope) -> Result<Vec<TaggedResource>, BackendFailure>;
}
