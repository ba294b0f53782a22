//! Plan records - what apply created, in creation order, per scope

use crate::kind::{ResourceKind, SubResource};
use crate::types::{ResourceRef, Scope};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

/// A backend resource created by apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedResource {
    pub resource_ref: ResourceRef,
    pub node_id: String,
    pub kind: ResourceKind,
    pub sub_resource: SubResource,
    pub name: String,
}

/// Creation order for one scope, consumed by destroy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub recorded_at: DateTime<Utc>,
    pub scope: Scope,
    #[serde(default)]
    pub resources: Vec<RecordedResource>,
}

impl PlanRecord {
    pub fn new(scope: Scope, resources: Vec<RecordedResource>) -> Self {
        Self {
            recorded_at: Utc::now(),
            scope,
            resources,
        }
    }

    /// Keep resources from an earlier apply that this one did not touch.
    ///
    /// They were created first, so they come first in the merged order.
    #[must_use]
    pub fn merged_with(self, previous: Option<Self>) -> Self {
        let Some(previous) = previous else {
            return self;
        };
        let current: HashSet<&ResourceRef> = self.resources.iter().map(|r| &r.resource_ref).collect();
        let mut resources: Vec<RecordedResource> = previous
            .resources
            .into_iter()
            .filter(|r| !current.contains(&r.resource_ref))
            .collect();
        resources.extend(self.resources);
        Self {
            recorded_at: self.recorded_at,
            scope: self.scope,
            resources,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Persistence for plan records
pub trait PlanStore: Send + Sync {
    fn load(&self, scope: &Scope) -> Result<Option<PlanRecord>>;

    fn save(&self, record: &PlanRecord) -> Result<()>;

    /// Remove the record; removing a missing record is not an error
    fn remove(&self, scope: &Scope) -> Result<()>;
}

/// In-process store, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    records: Mutex<HashMap<Scope, PlanRecord>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlanStore for MemoryPlanStore {
    fn load(&self, scope: &Scope) -> Result<Option<PlanRecord>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(scope).cloned())
    }

    fn save(&self, record: &PlanRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.scope.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, scope: &Scope) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.remove(scope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(node: &str, sub: SubResource) -> RecordedResource {
        let scope = Scope::new("p", "e");
        RecordedResource {
            resource_ref: ResourceRef::for_step(&scope, node, sub),
            node_id: node.into(),
            kind: ResourceKind::Storage,
            sub_resource: sub,
            name: node.into(),
        }
    }

    #[test]
    fn test_merge_keeps_untouched_previous_first() {
        let scope = Scope::new("p", "e");
        let previous = PlanRecord::new(
            scope.clone(),
            vec![
                resource("old", SubResource::StorageAccount),
                resource("st", SubResource::StorageAccount),
            ],
        );
        let current = PlanRecord::new(
            scope,
            vec![
                resource("st", SubResource::StorageAccount),
                resource("st", SubResource::BlobContainer),
            ],
        );

        let merged = current.merged_with(Some(previous));
        let nodes: Vec<_> = merged
            .resources
            .iter()
            .map(|r| r.resource_ref.as_str())
            .collect();
        assert_eq!(
            nodes,
            vec!["p-e/old/storageAccount", "p-e/st/storageAccount", "p-e/st/blobContainer"]
        );
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryPlanStore::new();
        let scope = Scope::new("p", "e");
        assert!(store.load(&scope).unwrap().is_none());

        let record = PlanRecord::new(scope.clone(), vec![resource("st", SubResource::StorageAccount)]);
        store.save(&record).unwrap();
        assert_eq!(store.load(&scope).unwrap(), Some(record));

        store.remove(&scope).unwrap();
        store.remove(&scope).unwrap();
        assert!(store.load(&scope).unwrap().is_none());
    }
}
