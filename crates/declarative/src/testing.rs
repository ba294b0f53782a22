//! Scripted backend and observers for unit tests

use crate::backend::{CreateRequest, DeleteRequest, ProvisioningBackend, TaggedResource};
use crate::context::ProgressObserver;
use crate::error::{BackendFailure, Failure};
use crate::report::ReportEntry;
use crate::types::{CancelToken, Outputs, ResourceRef, Scope};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

struct Script {
    /// `None` fails forever
    remaining: Option<u32>,
    failure: BackendFailure,
}

/// Backend that records calls and fails where told to
#[derive(Default)]
pub struct ScriptedBackend {
    create_scripts: Mutex<HashMap<String, Script>>,
    delete_scripts: Mutex<HashMap<String, Script>>,
    created: Mutex<Vec<ResourceRef>>,
    deleted: Mutex<Vec<ResourceRef>>,
    inventory: Mutex<Vec<TaggedResource>>,
    cancel_after: Option<(String, CancelToken)>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    list_failure: Option<BackendFailure>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_always(self, resource_ref: &str, failure: BackendFailure) -> Self {
        self.script_create(resource_ref, None, failure)
    }

    pub fn fail_times(self, resource_ref: &str, times: u32, failure: BackendFailure) -> Self {
        self.script_create(resource_ref, Some(times), failure)
    }

    pub fn fail_delete(self, resource_ref: &str, failure: BackendFailure) -> Self {
        self.delete_scripts.lock().unwrap().insert(
            resource_ref.to_string(),
            Script {
                remaining: None,
                failure,
            },
        );
        self
    }

    pub fn fail_listing(mut self, failure: BackendFailure) -> Self {
        self.list_failure = Some(failure);
        self
    }

    /// Cancel `token` right after `resource_ref` is created
    pub fn cancel_after(mut self, resource_ref: &str, token: CancelToken) -> Self {
        self.cancel_after = Some((resource_ref.to_string(), token));
        self
    }

    /// Sleep inside every create call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_inventory(self, resources: Vec<TaggedResource>) -> Self {
        self.inventory.lock().unwrap().extend(resources);
        self
    }

    pub fn created(&self) -> Vec<ResourceRef> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<ResourceRef> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn script_create(self, resource_ref: &str, remaining: Option<u32>, failure: BackendFailure) -> Self {
        self.create_scripts
            .lock()
            .unwrap()
            .insert(resource_ref.to_string(), Script { remaining, failure });
        self
    }

    fn scripted_failure(scripts: &Mutex<HashMap<String, Script>>, resource_ref: &ResourceRef) -> Option<BackendFailure> {
        let mut scripts = scripts.lock().unwrap();
        let script = scripts.get_mut(resource_ref.as_str())?;
        match &mut script.remaining {
            None => Some(script.failure.clone()),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(script.failure.clone())
            }
        }
    }
}

impl ProvisioningBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create(&self, request: &CreateRequest<'_>) -> Result<Outputs, BackendFailure> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(failure) = Self::scripted_failure(&self.create_scripts, request.resource_ref) {
            return Err(failure);
        }

        self.created
            .lock()
            .unwrap()
            .push(request.resource_ref.clone());
        let mut inventory = self.inventory.lock().unwrap();
        if !inventory.iter().any(|r| &r.resource_ref == request.resource_ref) {
            inventory.push(TaggedResource {
                resource_ref: request.resource_ref.clone(),
                kind: request.kind,
                sub_resource: request.sub_resource,
            });
        }
        drop(inventory);

        if let Some((target, token)) = &self.cancel_after
            && target == request.resource_ref.as_str()
        {
            token.cancel();
        }

        Ok(request
            .sub_resource
            .outputs()
            .iter()
            .map(|attr| ((*attr).to_string(), format!("{}:{attr}", request.name)))
            .collect())
    }

    fn delete(&self, request: &DeleteRequest<'_>) -> Result<(), BackendFailure> {
        if let Some(failure) = Self::scripted_failure(&self.delete_scripts, request.resource_ref) {
            return Err(failure);
        }
        self.deleted
            .lock()
            .unwrap()
            .push(request.resource_ref.clone());
        self.inventory
            .lock()
            .unwrap()
            .retain(|r| &r.resource_ref != request.resource_ref);
        Ok(())
    }

    fn list_tagged(&self, scope: &Scope) -> Result<Vec<TaggedResource>, BackendFailure> {
        if let Some(failure) = &self.list_failure {
            return Err(failure.clone());
        }
        let prefix = format!("{scope}/");
        Ok(self
            .inventory
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.resource_ref.as_str().starts_with(&prefix))
            .cloned()
            .collect())
    }
}

/// Counts progress callbacks
#[derive(Default)]
pub struct RecordingProgress {
    retries: AtomicUsize,
    entries: AtomicUsize,
}

impl RecordingProgress {
    pub fn retries(&self) -> usize {
        self.retries.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }
}

impl ProgressObserver for RecordingProgress {
    fn on_entry_complete(&self, _entry: &ReportEntry) {
        self.entries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retry(&self, _resource: &ResourceRef, _attempt: u32, _max: u32, _failure: &Failure, _delay: Duration) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }
}
