//! Engine configuration

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a run does when another run holds the same instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockPolicy {
    /// Wait for the other run to finish
    #[default]
    Block,
    /// Fail with `ConcurrentInstanceAccess` immediately
    FailFast,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Behaviour on contended instances
    pub lock_policy: LockPolicy,

    /// Upper bound on a blocking wait, in milliseconds
    pub lock_timeout_ms: Option<u64>,

    /// Append fired transitions to the instance history
    pub record_history: bool,

    /// Hard ceiling on passes per run. Hitting it leaves the instance waiting.
    pub max_passes: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_policy: LockPolicy::Block,
            lock_timeout_ms: None,
            record_history: true,
            max_passes: None,
        }
    }
}

impl EngineConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Load configuration from file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
            Self::from_toml_str(&contents)
        } else {
            Ok(Self::default())
        }
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    pub fn with_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.lock_timeout_ms = Some(ms);
        self
    }

    pub fn with_max_passes(mut self, max: u32) -> Self {
        self.max_passes = Some(max);
        self
    }

    pub fn without_history(mut self) -> Self {
        self.record_history = false;
        self
    }
}
