//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! unroll has two configuration scopes:
//! - **Global**: User-level settings, including the workspace location
//! - **Workspace**: Overrides stored next to the layer checkouts
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults and frontend presets
//! 2. Global config file
//! 3. Workspace config file (`<workspace>/unroll.toml`)
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. An explicit path (`--config`)
//! 2. `$UNROLL_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/unroll/config.toml`
//! 4. `~/.unroll/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use uplift_unroll::core::config::Config;
//!
//! let result = Config::load(None, None).unwrap();
//! let config = result.config;
//!
//! let fe = config.frontend("tt-xla").unwrap();
//! println!("{} lives at {}", fe.repo.name, fe.repo.path.display());
//! println!("Remote: {}", config.remote());
//! ```

pub mod schema;

pub use schema::{ConfigFile, LayerConfig};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::layers::{
    core_preset, frontend_preset, PinSpec, BASE_REPO, CORE_REPO, FRONTEND_PRESETS,
};

/// File name of the workspace config.
pub const WORKSPACE_CONFIG: &str = "unroll.toml";

/// Default name of the rewritten branches.
pub const DEFAULT_OUTPUT_BRANCH: &str = "uplift/flattened";

/// Default branch of every layer.
pub const DEFAULT_BRANCH: &str = "main";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,

    #[error("unknown frontend '{name}' (known: {known})")]
    UnknownFrontend { name: String, known: String },
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Where a layer's checkout lives and which branch it works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSettings {
    pub name: String,
    pub path: PathBuf,
    pub branch: String,
}

/// A layer that pins the layer beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSettings {
    pub repo: RepoSettings,
    pub pin: PinSpec,
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence rules automatically: workspace config
/// overrides global config, which overrides built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: ConfigFile,
    /// Workspace configuration (if present)
    pub workspace: Option<ConfigFile>,
    workspace_dir: PathBuf,
    global_path: Option<PathBuf>,
    workspace_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration.
    ///
    /// `explicit` replaces the global config search. `workspace` overrides the
    /// workspace directory named in the global config; when neither is set
    /// the current directory is used.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed, or if an
    /// explicitly named file does not exist. Missing default locations are
    /// not an error.
    pub fn load(
        explicit: Option<&Path>,
        workspace: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let (global, global_path) = match explicit {
            Some(path) => (Self::read_config(path)?, Some(path.to_path_buf())),
            None => Self::load_global()?,
        };
        global.validate()?;

        let workspace_dir = match (workspace, &global.workspace) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => dir.clone(),
            (None, None) => std::env::current_dir().map_err(|e| ConfigError::ReadError {
                path: PathBuf::from("."),
                source: e,
            })?,
        };

        let candidate = workspace_dir.join(WORKSPACE_CONFIG);
        let (workspace, workspace_path) = if candidate.exists() {
            let config = Self::read_config(&candidate)?;
            config.validate()?;
            if config.workspace.is_some() {
                warnings.push(ConfigWarning {
                    message: "'workspace' is only read from the global config; ignoring it"
                        .to_string(),
                    path: candidate.clone(),
                });
            }
            (Some(config), Some(candidate))
        } else {
            (None, None)
        };

        Ok(ConfigLoadResult {
            config: Config {
                global,
                workspace,
                workspace_dir,
                global_path,
                workspace_path,
            },
            warnings,
        })
    }

    /// Load global configuration from standard locations.
    fn load_global() -> Result<(ConfigFile, Option<PathBuf>), ConfigError> {
        if let Ok(path) = std::env::var("UNROLL_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("unroll/config.toml");
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".unroll/config.toml");
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((ConfigFile::default(), None))
    }

    fn read_config(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.unroll/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".unroll/config.toml"))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Scopes in increasing precedence.
    fn scopes(&self) -> impl Iterator<Item = &ConfigFile> {
        std::iter::once(&self.global).chain(self.workspace.as_ref())
    }

    /// Last value set across scopes.
    fn pick<T: Clone>(&self, get: impl Fn(&ConfigFile) -> Option<T>) -> Option<T> {
        self.scopes().filter_map(get).last()
    }

    /// Directory holding the layer checkouts.
    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Get the remote name.
    ///
    /// Defaults to "origin" if not configured.
    pub fn remote(&self) -> String {
        self.pick(|c| c.remote.clone())
            .unwrap_or_else(|| "origin".to_string())
    }

    /// Name of the rewritten branches.
    pub fn output_branch(&self) -> String {
        self.pick(|c| c.output_branch.clone())
            .unwrap_or_else(|| DEFAULT_OUTPUT_BRANCH.to_string())
    }

    /// Whether subsumed ranges also replay the commit the old pin named.
    ///
    /// Defaults to `false`.
    pub fn include_previous_pin(&self) -> bool {
        self.pick(|c| c.include_previous_pin).unwrap_or(false)
    }

    /// Every known frontend: built-in presets plus configured ones.
    pub fn frontend_names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> =
            FRONTEND_PRESETS.iter().map(|s| s.to_string()).collect();
        for scope in self.scopes() {
            names.extend(scope.frontends.keys().cloned());
        }
        names.into_iter().collect()
    }

    /// Resolved settings of frontend `name`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownFrontend`] if `name` is neither a preset nor
    /// configured with a pin.
    pub fn frontend(&self, name: &str) -> Result<LayerSettings, ConfigError> {
        let layer = |c: &ConfigFile| c.frontends.get(name).cloned();
        let artifact = self
            .pick(|c| layer(c).and_then(|l| l.pin))
            .or_else(|| frontend_preset(name).map(|p| p.artifact));
        let Some(artifact) = artifact else {
            return Err(ConfigError::UnknownFrontend {
                name: name.to_string(),
                known: self.frontend_names().join(", "),
            });
        };
        let marker = self
            .pick(|c| layer(c).and_then(|l| l.marker))
            .or_else(|| frontend_preset(name).and_then(|p| p.marker));

        Ok(LayerSettings {
            repo: self.repo_settings(name, |c| layer(c)),
            pin: PinSpec { artifact, marker },
        })
    }

    /// Resolved settings of the core layer.
    pub fn core(&self) -> LayerSettings {
        let preset = core_preset();
        let artifact = self
            .pick(|c| c.core.as_ref().and_then(|l| l.pin.clone()))
            .unwrap_or(preset.artifact);
        let marker = self
            .pick(|c| c.core.as_ref().and_then(|l| l.marker.clone()))
            .or(preset.marker);

        LayerSettings {
            repo: self.repo_settings(CORE_REPO, |c| c.core.clone()),
            pin: PinSpec { artifact, marker },
        }
    }

    /// Resolved settings of the base layer.
    pub fn base(&self) -> RepoSettings {
        self.repo_settings(BASE_REPO, |c| c.base.clone())
    }

    fn repo_settings(
        &self,
        name: &str,
        layer: impl Fn(&ConfigFile) -> Option<LayerConfig>,
    ) -> RepoSettings {
        let path = self
            .pick(|c| layer(c).and_then(|l| l.path))
            .unwrap_or_else(|| PathBuf::from(name));
        let branch = self
            .pick(|c| layer(c).and_then(|l| l.branch))
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

        RepoSettings {
            name: name.to_string(),
            path: self.workspace_dir.join(path),
            branch,
        }
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded workspace config file.
    pub fn workspace_config_loaded_from(&self) -> Option<&Path> {
        self.workspace_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layers::{PinArtifact, CORE_UPLIFT_MARKER};
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::write(path, contents).unwrap();
    }

    fn load_in(dir: &Path, global: &str) -> ConfigLoadResult {
        let global_path = dir.join("global.toml");
        write(&global_path, global);
        Config::load(Some(&global_path), Some(dir)).unwrap()
    }

    #[test]
    fn defaults_without_files() {
        let temp = TempDir::new().unwrap();
        let result = load_in(temp.path(), "");
        let config = result.config;

        assert_eq!(config.remote(), "origin");
        assert_eq!(config.output_branch(), DEFAULT_OUTPUT_BRANCH);
        assert!(!config.include_previous_pin());
        assert!(config.workspace_config_loaded_from().is_none());
        assert_eq!(
            config.global_config_loaded_from(),
            Some(temp.path().join("global.toml").as_path())
        );

        let core = config.core();
        assert_eq!(core.repo.name, "tt-mlir");
        assert_eq!(core.repo.path, temp.path().join("tt-mlir"));
        assert_eq!(core.repo.branch, "main");
        assert!(core.pin.marker.is_none());
        assert_eq!(config.base().path, temp.path().join("tt-metal"));
    }

    #[test]
    fn presets_resolve() {
        let temp = TempDir::new().unwrap();
        let config = load_in(temp.path(), "").config;

        let xla = config.frontend("tt-xla").unwrap();
        assert_eq!(xla.repo.path, temp.path().join("tt-xla"));
        assert_eq!(xla.pin.marker.as_deref(), Some(CORE_UPLIFT_MARKER));

        let err = config.frontend("tt-nope").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFrontend { .. }));
        assert!(err.to_string().contains("tt-torch"));
    }

    #[test]
    fn workspace_overrides_global() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join(WORKSPACE_CONFIG),
            r#"
            remote = "upstream"
            [frontends.tt-xla]
            branch = "release"
            "#,
        );
        let result = load_in(
            temp.path(),
            r#"
            remote = "origin"
            output_branch = "bisect/flat"
            [frontends.tt-xla]
            path = "src/xla"
            branch = "dev"
            "#,
        );
        let config = result.config;

        assert_eq!(config.remote(), "upstream");
        assert_eq!(config.output_branch(), "bisect/flat");
        let xla = config.frontend("tt-xla").unwrap();
        assert_eq!(xla.repo.path, temp.path().join("src/xla"));
        assert_eq!(xla.repo.branch, "release");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn custom_frontend_needs_pin() {
        let temp = TempDir::new().unwrap();
        let config = load_in(
            temp.path(),
            r#"
            [frontends.my-fe]
            pin = { kind = "submodule", path = "vendor/core" }
            "#,
        )
        .config;

        let fe = config.frontend("my-fe").unwrap();
        assert_eq!(
            fe.pin.artifact,
            PinArtifact::Submodule {
                path: "vendor/core".into()
            }
        );
        assert!(fe.pin.marker.is_none());
        assert!(config.frontend_names().contains(&"my-fe".to_string()));
    }

    #[test]
    fn workspace_key_in_workspace_file_warns() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join(WORKSPACE_CONFIG),
            "workspace = \"/elsewhere\"\n",
        );
        let result = load_in(temp.path(), "");

        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.config.workspace_dir(), temp.path());
    }

    #[test]
    fn global_workspace_used_when_not_overridden() {
        let temp = TempDir::new().unwrap();
        let global_path = temp.path().join("global.toml");
        write(
            &global_path,
            &format!("workspace = {:?}\n", temp.path().join("ws").display().to_string()),
        );

        let config = Config::load(Some(&global_path), None).unwrap().config;
        assert_eq!(config.workspace_dir(), temp.path().join("ws"));
    }

    #[test]
    fn parse_error_names_file() {
        let temp = TempDir::new().unwrap();
        let global_path = temp.path().join("global.toml");
        write(&global_path, "remote = [");

        let err = Config::load(Some(&global_path), Some(temp.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("global.toml"));
    }

    #[test]
    fn invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        let global_path = temp.path().join("global.toml");
        write(&global_path, "output_branch = \"bad..name\"");

        let result = Config::load(Some(&global_path), Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(Some(&temp.path().join("absent.toml")), Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
