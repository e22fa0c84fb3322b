use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Composition settings, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Name of the logging span and of the exported metadata.
    pub name: String,
    /// Hard bound on connect rounds. Deadlock detection terminates the loop without it.
    pub max_connect_rounds: Option<usize>,
    /// Warn about time components that were never updated.
    pub warn_unupdated: bool,
    /// Update lagging upstream time components before their consumers.
    pub resolve_dependencies: bool,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self { name: "coupling".to_string(), max_connect_rounds: None, warn_unupdated: true, resolve_dependencies: true }
    }
}

impl CompositionConfig {
    pub fn new() -> Self { Self::default() }

    pub fn from_json_str(s: &str) -> Result<Self> { Ok(serde_json::from_str(s)?) }
}
