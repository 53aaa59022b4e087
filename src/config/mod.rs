//! # Opflow Configuration System
//!
//! Layered configuration for queues and logging.
//!
//! ## Architecture
//!
//! - **Defaults first**: every field has a built-in default, so an empty
//!   configuration is valid
//! - **Environment awareness**: `opflow.toml` is overlaid with
//!   `opflow.<environment>.toml` when present
//! - **Environment variables last**: `OPFLOW__QUEUE__MAX_CONCURRENT_OPERATIONS=4`
//! - **Explicit validation**: invalid values are rejected at load time
//!
//! ## Usage
//!
//! ```rust,no_run
//! use opflow::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let queue_config = manager.config().queue.clone();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};

use crate::error::{OpflowError, Result};

pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/opflow.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OpflowConfig {
    /// Operation queue settings
    pub queue: QueueConfig,

    /// Structured logging settings
    pub logging: LoggingConfig,
}

/// Settings for a single operation queue
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name used in logs
    pub name: String,

    /// Upper bound on operations executing at once; `None` is unbounded
    pub max_concurrent_operations: Option<usize>,

    /// Start with scheduling paused until `set_suspended(false)`
    pub start_suspended: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "opflow.queue".to_string(),
            max_concurrent_operations: None,
            start_suspended: false,
        }
    }
}

impl QueueConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(OpflowError::Validation(
                "queue.name must not be empty".to_string(),
            ));
        }
        if self.max_concurrent_operations == Some(0) {
            return Err(OpflowError::Validation(
                "queue.max_concurrent_operations must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `opflow=debug`. Falls back to the
    /// environment default when absent; `RUST_LOG` always wins.
    pub level: Option<String>,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl OpflowConfig {
    pub fn validate(&self) -> Result<()> {
        self.queue.validate()
    }
}
