//! engine::provenance
//!
//! Commit messages of rewritten commits.
//!
//! Every rewritten commit starts with a header naming the original commits
//! it stands for, followed by the subject of each of them:
//!
//! ```text
//! orig_fe=1a2b3c4d | orig_mlir=5e6f7a8b | orig_metal=None
//!
//! [FE:1a2b3c4d] Uplift third_party/tt-mlir to 5e6f7a8b
//! [MLIR:5e6f7a8b] Fix conv2d lowering
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::core::layers::Layer;
use crate::git::CommitInfo;

/// Length of abbreviated hashes in messages.
pub const SHORT_LEN: usize = 8;

const NONE: &str = "None";

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"orig_fe=(?P<fe>[0-9a-f]+|None) \| orig_mlir=(?P<mlir>[0-9a-f]+|None) \| orig_metal=(?P<metal>[0-9a-f]+|None)",
    )
    .expect("provenance header regex must compile")
});

/// Abbreviated original hashes a rewritten commit stands for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub frontend: Option<String>,
    pub core: Option<String>,
    pub base: Option<String>,
}

impl Provenance {
    pub fn new(
        frontend: Option<&CommitInfo>,
        core: Option<&CommitInfo>,
        base: Option<&CommitInfo>,
    ) -> Self {
        let short = |c: &CommitInfo| c.oid.short(SHORT_LEN).to_string();
        Self {
            frontend: frontend.map(short),
            core: core.map(short),
            base: base.map(short),
        }
    }

    fn slots(&self) -> [(Layer, Option<&str>); 3] {
        [
            (Layer::Frontend, self.frontend.as_deref()),
            (Layer::Core, self.core.as_deref()),
            (Layer::Base, self.base.as_deref()),
        ]
    }

    /// The `orig_fe=… | orig_mlir=… | orig_metal=…` line.
    pub fn header(&self) -> String {
        self.slots()
            .iter()
            .map(|(layer, hash)| format!("orig_{}={}", layer.label(), hash.unwrap_or(NONE)))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Find and parse the header in a commit message.
    pub fn parse(message: &str) -> Option<Self> {
        let caps = HEADER_RE.captures(message)?;
        let slot = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str())
                .filter(|s| *s != NONE)
                .map(String::from)
        };
        Some(Self {
            frontend: slot("fe"),
            core: slot("mlir"),
            base: slot("metal"),
        })
    }
}

/// Full message for a rewritten commit standing for the given originals.
pub fn compose_message(
    frontend: Option<&CommitInfo>,
    core: Option<&CommitInfo>,
    base: Option<&CommitInfo>,
) -> String {
    let mut message = Provenance::new(frontend, core, base).header();
    message.push('\n');
    for (layer, commit) in [
        (Layer::Frontend, frontend),
        (Layer::Core, core),
        (Layer::Base, base),
    ] {
        if let Some(commit) = commit {
            message.push_str(&format!(
                "\n[{}:{}] {}",
                layer.tag(),
                commit.oid.short(SHORT_LEN),
                commit.subject()
            ));
        }
    }
    message
}

/// The most specific `[TAG:hash] subject` line of a rewritten message.
///
/// Base lines win over core lines, which win over frontend lines.
pub fn summary_line(message: &str) -> Option<&str> {
    [Layer::Base, Layer::Core, Layer::Frontend]
        .into_iter()
        .find_map(|layer| {
            let prefix = format!("[{}:", layer.tag());
            message.lines().find(|l| l.starts_with(&prefix))
        })
}
