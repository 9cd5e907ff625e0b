//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use hireboard_types::{HireboardError, Result};

/// Tunables for a [`PipelineBoard`](crate::PipelineBoard).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Revert an item's optimistic status when its remote update fails.
    /// Off by default: local state stays optimistic until the next reload.
    pub rollback_on_failure: bool,
    /// Maximum number of batches kept on the undo stack. `None` is unbounded.
    pub history_limit: Option<usize>,
    /// Capacity of the notification broadcast channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rollback_on_failure: false,
            history_limit: None,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(HireboardError::Config(
                "event_capacity must be greater than zero".into(),
            ));
        }
        if self.history_limit == Some(0) {
            return Err(HireboardError::Config(
                "history_limit of 0 would disable undo; omit it instead".into(),
            ));
        }
        Ok(())
    }
}
