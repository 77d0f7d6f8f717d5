//! core::config::schema
//!
//! Configuration schema types.
//!
//! The same schema is used for the global file and the workspace file; the
//! `workspace` key is only honoured in the global one.
//!
//! # Validation
//!
//! Config values are validated after parsing: branch names must be valid
//! git branch names, the remote must be non-empty and pin-file variables
//! must be plain identifiers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::layers::PinArtifact;
use crate::core::types::BranchName;

/// One configuration file.
///
/// # Example
///
/// ```toml
/// workspace = "/work/tt"
/// remote = "origin"
/// output_branch = "uplift/flattened"
/// include_previous_pin = false
///
/// [frontends.tt-xla]
/// path = "tt-xla"
/// branch = "main"
///
/// [core]
/// path = "tt-mlir"
/// branch = "main"
///
/// [base]
/// path = "tt-metal"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Directory holding the layer checkouts (global config only)
    pub workspace: Option<PathBuf>,

    /// Remote used for fetch-on-miss (default: "origin")
    pub remote: Option<String>,

    /// Name of the branch created in both rewritten repositories
    pub output_branch: Option<String>,

    /// Replay the commit the old pin pointed at as well
    pub include_previous_pin: Option<bool>,

    /// Frontend layers, keyed by name; entries override built-in presets
    pub frontends: BTreeMap<String, LayerConfig>,

    /// The core layer
    pub core: Option<LayerConfig>,

    /// The base layer (its pin settings are ignored)
    pub base: Option<LayerConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            if remote.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote cannot be empty".to_string(),
                ));
            }
        }

        if let Some(branch) = &self.output_branch {
            validate_branch("output_branch", branch)?;
        }

        for (name, layer) in &self.frontends {
            layer.validate(&format!("frontends.{name}"))?;
        }
        if let Some(core) = &self.core {
            core.validate("core")?;
        }
        if let Some(base) = &self.base {
            base.validate("base")?;
        }

        Ok(())
    }
}

/// Per-layer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LayerConfig {
    /// Checkout path, relative to the workspace unless absolute
    pub path: Option<PathBuf>,

    /// Branch the rewritten branch is created from, and the default range end
    pub branch: Option<String>,

    /// How this layer pins the layer beneath it
    pub pin: Option<PinArtifact>,

    /// Commit message marker identifying uplift commits
    pub marker: Option<String>,
}

impl LayerConfig {
    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if let Some(branch) = &self.branch {
            validate_branch(&format!("{key}.branch"), branch)?;
        }

        match &self.pin {
            Some(PinArtifact::PinFile { file, variable }) => {
                if file.trim().is_empty() {
                    return Err(ConfigError::InvalidValue(format!(
                        "{key}.pin.file cannot be empty"
                    )));
                }
                if !is_identifier(variable) {
                    return Err(ConfigError::InvalidValue(format!(
                        "{key}.pin.variable '{variable}' is not an identifier"
                    )));
                }
            }
            Some(PinArtifact::Submodule { path }) if path.trim().is_empty() => {
                return Err(ConfigError::InvalidValue(format!(
                    "{key}.pin.path cannot be empty"
                )));
            }
            _ => {}
        }

        if let Some(marker) = &self.marker {
            if marker.is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "{key}.marker cannot be empty"
                )));
            }
        }

        Ok(())
    }
}

fn validate_branch(key: &str, branch: &str) -> Result<(), ConfigError> {
    BranchName::new(branch)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue(format!("invalid {key}: {e}")))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
