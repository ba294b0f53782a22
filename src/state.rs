//! On-disk plan records and scope locks
//!
//! Layout under the state directory:
//!
//! ```text
//! plans/{project}-{env}.toml   recorded creation order
//! locks/{project}-{env}.lock   held while apply or destroy runs
//! ```

use anyhow::{Context, Result, bail};
use declarative::{LockProvider, PlanRecord, PlanStore, Scope, ScopeGuard};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// File for a scope under `dir`, refusing scopes that could collide or leave `dir`
fn scope_file(dir: &Path, scope: &Scope, extension: &str) -> Result<PathBuf> {
    scope
        .check()
        .with_context(|| format!("Refusing to store state for scope {}/{}", scope.project, scope.env))?;
    Ok(dir.join(format!("{scope}.{extension}")))
}

/// Plan records stored as one TOML file per scope
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("plans"),
        }
    }

    fn record_file(&self, scope: &Scope) -> Result<PathBuf> {
        scope_file(&self.dir, scope, "toml")
    }

    /// Scopes with a recorded plan, sorted
    pub fn scopes(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut scopes = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read plan directory: {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "toml")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                scopes.push(stem.to_string());
            }
        }
        scopes.sort();
        Ok(scopes)
    }
}

impl PlanStore for FileStateStore {
    fn load(&self, scope: &Scope) -> Result<Option<PlanRecord>> {
        let path = self.record_file(scope)?;
        if !path.exists() {
            log::debug!("No plan record at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read plan record: {}", path.display()))?;
        let record: PlanRecord = toml::from_str(&content)
            .with_context(|| format!("Failed to parse plan record: {}", path.display()))?;

        log::debug!("Loaded plan record from {}", path.display());
        Ok(Some(record))
    }

    fn save(&self, record: &PlanRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create plan directory: {}", self.dir.display()))?;

        let path = self.record_file(&record.scope)?;
        let content = toml::to_string_pretty(record).context("Failed to serialize plan record to TOML")?;

        // Write then rename: readers never see a partial record
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, &content).with_context(|| format!("Failed to write plan record: {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace plan record: {}", path.display()))?;

        log::debug!("Saved plan record to {}", path.display());
        Ok(())
    }

    fn remove(&self, scope: &Scope) -> Result<()> {
        let path = self.record_file(scope)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Removed plan record {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove plan record: {}", path.display())),
        }
    }
}

/// Lock files shared by every irforge process using the same state directory
#[derive(Debug, Clone)]
pub struct FileLocks {
    dir: PathBuf,
    timeout: Duration,
    poll: Duration,
}

impl FileLocks {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("locks"),
            timeout: Duration::from_secs(30),
            poll: Duration::from_millis(200),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn lock_file(&self, scope: &Scope) -> Result<PathBuf> {
        scope_file(&self.dir, scope, "lock")
    }
}

impl LockProvider for FileLocks {
    fn acquire(&self, scope: &Scope) -> Result<ScopeGuard> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create lock directory: {}", self.dir.display()))?;
        let path = self.lock_file(scope)?;
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())
                        .with_context(|| format!("Failed to write lock file: {}", path.display()))?;
                    log::debug!("Locked {scope} via {}", path.display());
                    let held = path.clone();
                    return Ok(ScopeGuard::new(move || {
                        if let Err(e) = fs::remove_file(&held) {
                            log::warn!("Failed to release lock {}: {e}", held.display());
                        }
                    }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if started.elapsed() >= self.timeout {
                        let owner = fs::read_to_string(&path).unwrap_or_default();
                        bail!(
                            "{scope} is locked by process {} (remove {} if it is stale)",
                            owner.trim(),
                            path.display()
                        );
                    }
                    log::debug!("Waiting for lock on {scope}");
                    thread::sleep(self.poll);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create lock file: {}", path.display()));
                }
            }
        }
    }
}
