//! core::layers
//!
//! The three-layer dependency chain and how each layer pins the one below.
//!
//! A frontend pins an exact core revision, and the core pins an exact base
//! revision. The pin is either a `set(<VAR> "<hash>")` line in a build file
//! or a gitlink (embedded subrepository).

use serde::{Deserialize, Serialize};

/// Which repository of the chain a commit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Frontend,
    Core,
    Base,
}

impl Layer {
    /// Label used in provenance headers (`orig_<label>=`) and body tags.
    pub fn label(self) -> &'static str {
        match self {
            Layer::Frontend => "fe",
            Layer::Core => "mlir",
            Layer::Base => "metal",
        }
    }

    /// Upper-case tag used on the per-commit summary lines (`[MLIR:abcd1234]`).
    pub fn tag(self) -> &'static str {
        match self {
            Layer::Frontend => "FE",
            Layer::Core => "MLIR",
            Layer::Base => "METAL",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Layer::Frontend => "frontend",
            Layer::Core => "core",
            Layer::Base => "base",
        };
        f.write_str(name)
    }
}

/// Where a layer records its pin to the next layer down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PinArtifact {
    /// A `set(<variable> "<hash>")` line inside `file`.
    PinFile { file: String, variable: String },
    /// A gitlink entry at `path`.
    Submodule { path: String },
}

impl PinArtifact {
    /// Repository-relative path the artifact lives at.
    pub fn path(&self) -> &str {
        match self {
            PinArtifact::PinFile { file, .. } => file,
            PinArtifact::Submodule { path } => path,
        }
    }

    /// Pin file `third_party/CMakeLists.txt` with the given variable.
    pub fn cmake(variable: &str) -> Self {
        PinArtifact::PinFile {
            file: CMAKE_PIN_FILE.to_string(),
            variable: variable.to_string(),
        }
    }
}

/// How a layer pins the layer beneath it, and how its uplift commits are recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinSpec {
    pub artifact: PinArtifact,
    /// Commit message marker; `None` classifies purely by diff.
    pub marker: Option<String>,
}

pub const CMAKE_PIN_FILE: &str = "third_party/CMakeLists.txt";
pub const CORE_VERSION_VAR: &str = "TT_MLIR_VERSION";
pub const BASE_VERSION_VAR: &str = "TT_METAL_VERSION";
pub const XLA_VERSION_VAR: &str = "TT_XLA_VERSION";
pub const CORE_UPLIFT_MARKER: &str = "Uplift third_party/tt-mlir";

/// Built-in frontends and their pin into the core layer.
pub const FRONTEND_PRESETS: &[&str] = &["tt-torch", "tt-xla", "tt-forge-fe"];

/// Default repository name of the core layer.
pub const CORE_REPO: &str = "tt-mlir";
/// Default repository name of the base layer.
pub const BASE_REPO: &str = "tt-metal";

/// Pin spec of a built-in frontend, if `name` is one.
pub fn frontend_preset(name: &str) -> Option<PinSpec> {
    let artifact = match name {
        "tt-torch" | "tt-xla" => PinArtifact::cmake(CORE_VERSION_VAR),
        "tt-forge-fe" => PinArtifact::Submodule {
            path: "third_party/tt-mlir".to_string(),
        },
        _ => return None,
    };
    Some(PinSpec {
        artifact,
        marker: Some(CORE_UPLIFT_MARKER.to_string()),
    })
}

/// Frontend whose core pin a built-in frontend builds against, and the pin
/// naming that frontend's revision.
///
/// tt-torch consumes tt-mlir through the tt-xla revision it pins.
pub fn core_via(name: &str) -> Option<(&'static str, PinArtifact)> {
    match name {
        "tt-torch" => Some(("tt-xla", PinArtifact::cmake(XLA_VERSION_VAR))),
        _ => None,
    }
}

/// Pin spec of the core layer into base.
pub fn core_preset() -> PinSpec {
    PinSpec {
        artifact: PinArtifact::cmake(BASE_VERSION_VAR),
        marker: None,
    }
}
