//! Advisory scope locks
//!
//! Apply and destroy on the same (project, environment) hold a lock for
//! their whole run; preview never takes one.

use crate::types::Scope;
use anyhow::Result;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Releases the lock when dropped
pub struct ScopeGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ScopeGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A guard with nothing to release
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Hands out exclusive access to a scope
pub trait LockProvider: Send + Sync {
    /// Block until the scope is free, then hold it until the guard drops
    fn acquire(&self, scope: &Scope) -> Result<ScopeGuard>;
}

#[derive(Default)]
struct LockTable {
    held: Mutex<HashSet<Scope>>,
    released: Condvar,
}

/// Locks shared by every caller in this process
#[derive(Clone, Default)]
pub struct InProcessLocks {
    table: Arc<LockTable>,
}

impl InProcessLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock only if nobody holds it
    pub fn try_acquire(&self, scope: &Scope) -> Option<ScopeGuard> {
        let mut held = self.table.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(scope.clone()) {
            return None;
        }
        drop(held);
        Some(self.guard(scope))
    }

    pub fn is_held(&self, scope: &Scope) -> bool {
        self.table
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(scope)
    }

    fn guard(&self, scope: &Scope) -> ScopeGuard {
        let table = Arc::clone(&self.table);
        let scope = scope.clone();
        ScopeGuard::new(move || {
            let mut held = table.held.lock().unwrap_or_else(PoisonError::into_inner);
            held.remove(&scope);
            drop(held);
            table.released.notify_all();
        })
    }
}

impl LockProvider for InProcessLocks {
    fn acquire(&self, scope: &Scope) -> Result<ScopeGuard> {
        let mut held = self.table.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(scope) {
            log::debug!("Waiting for lock on {scope}");
            held = self
                .table
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(scope.clone());
        drop(held);
        log::debug!("Locked {scope}");
        Ok(self.guard(scope))
    }
}
