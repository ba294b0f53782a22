//! Where irforge keeps its settings and state
//!
//! Each directory resolves from its `IRFORGE_*` override, then the XDG base
//! directory, then a default under the home directory:
//!
//! | directory | override             | XDG               | default                  |
//! |-----------|----------------------|-------------------|--------------------------|
//! | config    | `IRFORGE_CONFIG_DIR` | `XDG_CONFIG_HOME` | `~/.config/irforge`      |
//! | state     | `IRFORGE_STATE_DIR`  | `XDG_STATE_HOME`  | `~/.local/state/irforge` |
//!
//! The state directory holds plan records, scope locks and local backend data.

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const ENV_CONFIG_DIR: &str = "IRFORGE_CONFIG_DIR";

pub const ENV_STATE_DIR: &str = "IRFORGE_STATE_DIR";

const APP_DIR: &str = "irforge";

struct BaseDir {
    name: &'static str,
    env: &'static str,
    xdg: &'static str,
    under_home: &'static [&'static str],
}

const CONFIG: BaseDir = BaseDir {
    name: "config",
    env: ENV_CONFIG_DIR,
    xdg: "XDG_CONFIG_HOME",
    under_home: &[".config"],
};

const STATE: BaseDir = BaseDir {
    name: "state",
    env: ENV_STATE_DIR,
    xdg: "XDG_STATE_HOME",
    under_home: &[".local", "state"],
};

impl BaseDir {
    fn resolve(&self) -> Result<PathBuf> {
        if let Some(dir) = non_empty_var(self.env) {
            let path = expand(&dir);
            log::debug!("Using {} dir from {}: {}", self.name, self.env, path.display());
            return Ok(path);
        }

        if let Some(base) = non_empty_var(self.xdg) {
            let path = PathBuf::from(base).join(APP_DIR);
            log::debug!("Using {} dir from {}: {}", self.name, self.xdg, path.display());
            return Ok(path);
        }

        let mut path = dirs::home_dir().context("Could not determine home directory")?;
        path.extend(self.under_home);
        path.push(APP_DIR);
        log::debug!("Using default {} dir: {}", self.name, path.display());
        Ok(path)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Plan records, locks and local backend documents live here
pub fn state_dir() -> Result<PathBuf> {
    STATE.resolve()
}

/// Path of the settings file
pub fn config_file() -> Result<PathBuf> {
    Ok(CONFIG.resolve()?.join("config.toml"))
}

/// Expand `~` and environment variables
fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
