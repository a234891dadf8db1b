//! Engine configuration
//!
//! Loaded from JSON the same way actor env-opts are. Missing keys take
//! their defaults; unknown keys are an error.

use serde::Deserialize;

use crate::error::{MemNodeError, Result};
use crate::io::Precision;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Canonical precision of carried state
    pub reference_precision: Precision,
    /// Whether the MemoryInput role exists in this deployment
    pub memory_input_supported: bool,
    /// Let a MemoryOutput without a reader pass validation and do nothing
    pub allow_orphan_writers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_precision: Precision::F32,
            memory_input_supported: cfg!(feature = "memory-input"),
            allow_orphan_writers: false,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the JSON is malformed, has unknown keys,
    /// or enables the reader role in a build that does not contain it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| MemNodeError::InvalidConfig {
            message: format!("failed to parse engine config: {e}"),
        })?;
        config.check()?;
        Ok(config)
    }

    /// Parse a configuration from any reader producing JSON.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_json_str`].
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self> {
        let config: Self =
            serde_json::from_reader(reader).map_err(|e| MemNodeError::InvalidConfig {
                message: format!("failed to parse engine config: {e}"),
            })?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.memory_input_supported && !cfg!(feature = "memory-input") {
            return Err(MemNodeError::InvalidConfig {
                message: "memory_input_supported requires the `memory-input` feature".into(),
            });
        }
        Ok(())
    }
}
