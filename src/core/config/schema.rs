//! core::config::schema
//!
//! Configuration file schema. The same shape is accepted at global and
//! repository scope; repository values override global ones key by key.
//!
//! ```toml
//! # Branches that are never rebased, even if they track a local branch.
//! trunk = ["main", "release"]
//!
//! # Check the starting branch out again when a session ends.
//! restore_head = true
//!
//! # Behave as if -v were always passed.
//! verbose = false
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// One configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Branches always treated as roots.
    pub trunk: Option<Vec<String>>,

    /// Return to the original branch after completion or abort.
    pub restore_head: Option<bool>,

    /// Default to verbose diagnostics.
    pub verbose: Option<bool>,
}

impl ConfigFile {
    /// Validate values that the TOML types cannot express.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` if a trunk entry is not a valid branch name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in self.trunk.iter().flatten() {
            BranchName::new(name.as_str())
                .map_err(|e| ConfigError::InvalidValue(format!("trunk: {e}")))?;
        }
        Ok(())
    }
}
