//! Local simulated backend
//!
//! Keeps one JSON document per scope under `backend/` in the state
//! directory. Creates are idempotent on the resource ref, storage account
//! names are unique across every scope, and keys are derived from the
//! resource ref with blake3 so repeated runs return the same outputs.

use anyhow::{Context, Result};
use declarative::{
    BackendFailure, CreateRequest, DeleteRequest, Outputs, ProvisioningBackend, ResourceKind, ResourceRef, Scope,
    SubResource, TaggedResource,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Property that makes the local backend reject a create, for dry runs of failure handling
pub const FAIL_PROPERTY: &str = "simulateFailure";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LocalResource {
    kind: ResourceKind,
    sub_resource: SubResource,
    name: String,
    location: String,
    tag: String,
    outputs: Outputs,
}

/// Resources of one scope, keyed by resource ref
type ScopeDocument = BTreeMap<String, LocalResource>;

pub struct LocalBackend {
    dir: PathBuf,
    /// Serializes read-modify-write of scope documents
    guard: Mutex<()>,
}

impl LocalBackend {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("backend"),
            guard: Mutex::new(()),
        }
    }

    fn document_path(&self, scope: &Scope) -> PathBuf {
        self.dir.join(format!("{scope}.json"))
    }

    fn read(&self, path: &Path) -> Result<ScopeDocument> {
        if !path.exists() {
            return Ok(ScopeDocument::new());
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn write(&self, path: &Path, document: &ScopeDocument) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create backend directory: {}", self.dir.display()))?;
        if document.is_empty() {
            if path.exists() {
                fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
            }
            return Ok(());
        }
        let content = serde_json::to_string_pretty(document)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Every scope document except `skip`
    fn other_documents(&self, skip: &Path) -> Result<Vec<ScopeDocument>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut documents = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path != skip && path.extension().is_some_and(|e| e == "json") {
                documents.push(self.read(&path)?);
            }
        }
        Ok(documents)
    }

    /// Number of resources held for a scope
    pub fn resource_count(&self, scope: &Scope) -> Result<usize> {
        scope.check()?;
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read(&self.document_path(scope))?.len())
    }

    fn try_create(&self, request: &CreateRequest<'_>) -> Result<Result<Outputs, BackendFailure>> {
        if let Some(code) = request
            .properties
            .get(FAIL_PROPERTY)
            .and_then(serde_json::Value::as_str)
        {
            return Ok(Err(BackendFailure::new(code, format!("simulated failure for {}", request.resource_ref))));
        }

        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.document_path(request.scope);
        let mut document = self.read(&path)?;

        if let Some(existing) = document.get(request.resource_ref.as_str()) {
            log::debug!("{} already exists, returning recorded outputs", request.resource_ref);
            return Ok(Ok(existing.outputs.clone()));
        }

        if request.sub_resource == SubResource::StorageAccount {
            let taken = self.other_documents(&path)?.iter().any(|doc| {
                doc.values()
                    .any(|r| r.sub_resource == SubResource::StorageAccount && r.name == request.name)
            });
            if taken {
                return Ok(Err(BackendFailure::new(
                    "StorageAccountAlreadyTaken",
                    format!("The storage account named {} is already taken.", request.name),
                )));
            }
        }

        let outputs = simulated_outputs(request);
        document.insert(
            request.resource_ref.to_string(),
            LocalResource {
                kind: request.kind,
                sub_resource: request.sub_resource,
                name: request.name.to_string(),
                location: request.location.to_string(),
                tag: request.scope.tag(),
                outputs: outputs.clone(),
            },
        );
        self.write(&path, &document)?;
        Ok(Ok(outputs))
    }

    fn try_delete(&self, request: &DeleteRequest<'_>) -> Result<Result<(), BackendFailure>> {
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.document_path(request.scope);
        let mut document = self.read(&path)?;
        if document.remove(request.resource_ref.as_str()).is_none() {
            return Ok(Err(BackendFailure::new(
                "ResourceNotFound",
                format!("{} does not exist", request.resource_ref),
            )));
        }
        self.write(&path, &document)?;
        Ok(Ok(()))
    }
}

/// Scopes whose document name could collide with another scope or leave the backend directory
fn checked(scope: &Scope) -> Result<(), BackendFailure> {
    scope
        .check()
        .map_err(|e| BackendFailure::new("InvalidScope", e.to_string()))
}

/// Local I/O errors surface as retryable backend failures
fn io_failure(err: &anyhow::Error) -> BackendFailure {
    BackendFailure::new("ServiceUnavailable", format!("{err:#}"))
}

impl ProvisioningBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn create(&self, request: &CreateRequest<'_>) -> Result<Outputs, BackendFailure> {
        checked(request.scope)?;
        self.try_create(request).unwrap_or_else(|e| Err(io_failure(&e)))
    }

    fn delete(&self, request: &DeleteRequest<'_>) -> Result<(), BackendFailure> {
        checked(request.scope)?;
        self.try_delete(request).unwrap_or_else(|e| Err(io_failure(&e)))
    }

    fn list_tagged(&self, scope: &Scope) -> Result<Vec<TaggedResource>, BackendFailure> {
        checked(scope)?;
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let document = self
            .read(&self.document_path(scope))
            .map_err(|e| io_failure(&e))?;
        let tag = scope.tag();
        Ok(document
            .into_iter()
            .filter(|(_, r)| r.tag == tag)
            .map(|(resource_ref, r)| TaggedResource {
                resource_ref: ResourceRef::new(resource_ref),
                kind: r.kind,
                sub_resource: r.sub_resource,
            })
            .collect())
    }
}

/// Hex digest of a seed, shortened to `len` characters
fn derived_key(seed: &str, len: usize) -> String {
    let hash = blake3::hash(seed.as_bytes()).to_hex();
    hash.as_str()[..len.min(hash.len())].to_string()
}

fn simulated_outputs(request: &CreateRequest<'_>) -> Outputs {
    let name = request.name;
    let seed = request.resource_ref.as_str();
    let fqdn = format!("{name}.{}.irforge.local", request.location);

    request
        .sub_resource
        .outputs()
        .iter()
        .map(|attr| {
            let value = match *attr {
                "accountName" | "namespaceName" | "queueName" | "appName" | "vnetName" | "vmName"
                | "databaseName" | "ruleName" | "vaultName" | "subscriptionName" => name.to_string(),
                "containerName" => request
                    .properties
                    .get("containerName")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or(name)
                    .to_string(),
                "connectionString" | "storageConnection" => format!(
                    "Endpoint=sb://{name}.irforge.local/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey={}",
                    derived_key(seed, 44)
                ),
                "fqdn" => fqdn.clone(),
                "url" | "gatewayUrl" => format!("https://{fqdn}"),
                "portalUrl" => format!("https://{name}.portal.irforge.local"),
                "serverFqdn" => format!("{name}.database.irforge.local"),
                "endpoint" => format!("https://{name}.documents.irforge.local:443/"),
                "vaultUri" => format!("https://{name}.vault.irforge.local/"),
                "addressSpace" => request
                    .properties
                    .get("addressSpace")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("10.0.0.0/16")
                    .to_string(),
                "publicIp" => {
                    let key = blake3::hash(seed.as_bytes());
                    let bytes = key.as_bytes();
                    format!("20.{}.{}.{}", bytes[0], bytes[1], bytes[2].max(1))
                }
                "adminUsername" => request
                    .properties
                    .get("adminUsername")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("azureuser")
                    .to_string(),
                "primaryKey" | "instrumentationKey" | "appId" => derived_key(&format!("{seed}#{attr}"), 32),
                _ => format!("/irforge/{}/{}/{name}", request.scope, request.sub_resource),
            };
            ((*attr).to_string(), value)
        })
        .collect()
}
