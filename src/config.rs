//! Ghost configuration and the in-memory property store used by the
//! harness and tests. Persistent settings live outside the core; the
//! kernel only sees the injected accessor.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use serde::Deserialize;
use thiserror::Error;

use crate::script::PropertyAccessor;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Per-ghost settings. Everything has a default so a bare `{}` (or no file
/// at all) produces a working two-scope ghost.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GhostConfig {
    pub name: String,
    /// Actor slots this ghost owns (primary, partner, ...).
    pub scopes: usize,
    /// Per-character typing delay in milliseconds.
    pub typing_interval_ms: u64,
    pub username: Option<String>,
    pub selfname: Option<String>,
    pub selfname2: Option<String>,
    pub keroname: Option<String>,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Word-class lexicon for `%ms`-style random substitution.
    pub lexicon: HashMap<String, Vec<String>>,
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self {
            name: "ghost".to_string(),
            scopes: 2,
            typing_interval_ms: 100,
            username: None,
            selfname: None,
            selfname2: None,
            keroname: None,
            screen_width: 0,
            screen_height: 0,
            lexicon: HashMap::new(),
        }
    }
}

impl GhostConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<GhostConfig, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// In-memory dotted-key property store.
#[derive(Default)]
pub struct MemoryProperties {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryProperties {
    pub fn new() -> Self {
        let props = Self::default();
        props.set("baseware.name", env!("CARGO_PKG_NAME"));
        props.set("baseware.version", env!("CARGO_PKG_VERSION"));
        props
    }
}

impl PropertyAccessor for MemoryProperties {
    fn get(&self, key: &str) -> Option<String> {
        let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value.to_string());
    }
}
