//! engine::pins
//!
//! Reading, classifying and rewriting pins.
//!
//! A pin-file pin is a `set(<VAR> "<hash>")` line, possibly indented. A
//! submodule pin is the gitlink at a fixed path, which diffs show as a
//! `Subproject commit <hash>` line pair.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::layers::{PinArtifact, PinSpec};
use crate::core::types::Oid;
use crate::git::{CommitInfo, FileDiff, GitError, Vcs};

static SET_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<indent>\s*)set\(\s*(?P<var>[A-Za-z_][A-Za-z0-9_]*)\s+"(?P<value>[^"]*)"\s*\)(?P<rest>.*)$"#)
        .expect("pin line regex must compile")
});

const SUBPROJECT_PREFIX: &str = "Subproject commit ";

/// Old and new value of a pin, as written in the diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinChange {
    pub before: String,
    pub after: String,
}

/// What a commit is, as far as its layer's pin goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Leaves the pin alone.
    Plain,
    /// Moves the pin.
    Uplift(PinChange),
    /// Carries the uplift marker but no parseable pin change.
    Unresolvable,
}

/// Whether the message carries the layer's uplift marker.
///
/// Layers without a marker classify purely by diff, so every commit is a
/// candidate.
pub fn is_uplift(commit: &CommitInfo, spec: &PinSpec) -> bool {
    match &spec.marker {
        Some(marker) => commit.message.contains(marker.as_str()),
        None => true,
    }
}

/// Value of a `set(<variable> "...")` line, if `line` is one.
pub fn parse_set_line<'a>(line: &'a str, variable: &str) -> Option<&'a str> {
    let caps = SET_LINE_RE.captures(line)?;
    if caps.name("var")?.as_str() != variable {
        return None;
    }
    Some(caps.name("value")?.as_str())
}

/// Extract the pin change a diff makes to `artifact`.
///
/// Both sides must be present. When the artifact is touched by several
/// lines, the last one on each side wins.
pub fn extract_pin_change(diffs: &[FileDiff], artifact: &PinArtifact) -> Option<PinChange> {
    let mut before = None;
    let mut after = None;

    for diff in diffs.iter().filter(|d| d.path == artifact.path()) {
        match artifact {
            PinArtifact::PinFile { variable, .. } => {
                if let Some(value) = diff.removed.iter().rev().find_map(|l| parse_set_line(l, variable)) {
                    before = Some(value.to_string());
                }
                if let Some(value) = diff.added.iter().rev().find_map(|l| parse_set_line(l, variable)) {
                    after = Some(value.to_string());
                }
            }
            PinArtifact::Submodule { .. } => {
                if !diff.is_modified() {
                    continue;
                }
                if let Some(value) = diff.removed.iter().rev().find_map(|l| subproject(l)) {
                    before = Some(value.to_string());
                }
                if let Some(value) = diff.added.iter().rev().find_map(|l| subproject(l)) {
                    after = Some(value.to_string());
                }
            }
        }
    }

    match (before, after) {
        (Some(before), Some(after)) if !before.is_empty() && !after.is_empty() => {
            Some(PinChange { before, after })
        }
        _ => None,
    }
}

fn subproject(line: &str) -> Option<&str> {
    line.strip_prefix(SUBPROJECT_PREFIX)
        .and_then(|rest| rest.split_whitespace().next())
}

/// Classify a commit from its message and diff.
pub fn classify(commit: &CommitInfo, diffs: &[FileDiff], spec: &PinSpec) -> Classification {
    if !is_uplift(commit, spec) {
        return Classification::Plain;
    }
    match extract_pin_change(diffs, &spec.artifact) {
        Some(change) => Classification::Uplift(change),
        None if spec.marker.is_some() => Classification::Unresolvable,
        None => Classification::Plain,
    }
}

/// Rewrite every `set(<variable> "...")` line in `contents` to `value`.
///
/// Indentation and anything after the closing parenthesis are kept. Returns
/// `None` when no line names `variable`.
pub fn rewrite_pin_line(contents: &str, variable: &str, value: &str) -> Option<String> {
    let mut found = false;
    let mut out = String::with_capacity(contents.len());

    for line in contents.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        let (body, cr) = match body.strip_suffix('\r') {
            Some(body) => (body, "\r"),
            None => (body, ""),
        };

        match SET_LINE_RE.captures(body) {
            Some(caps) if &caps["var"] == variable => {
                found = true;
                out.push_str(&caps["indent"]);
                out.push_str(&format!("set({variable} \"{value}\")"));
                out.push_str(&caps["rest"]);
            }
            _ => out.push_str(body),
        }
        out.push_str(cr);
        out.push_str(newline);
    }

    found.then_some(out)
}

/// The pin `artifact` holds at commit `oid`.
pub fn read_pin(vcs: &dyn Vcs, oid: &Oid, artifact: &PinArtifact) -> Result<Option<String>, GitError> {
    match artifact {
        PinArtifact::PinFile { file, variable } => Ok(vcs.file_at(oid, file)?.and_then(|contents| {
            contents
                .lines()
                .find_map(|l| parse_set_line(l, variable))
                .map(String::from)
        })),
        PinArtifact::Submodule { path } => Ok(vcs.gitlink_at(oid, path)?.map(String::from)),
    }
}

/// Point `artifact` at `target` in the working tree and index of `vcs`.
///
/// Returns `false` when a pin file exists but has no line for the variable;
/// the tree is left untouched in that case.
pub fn write_pin(vcs: &dyn Vcs, artifact: &PinArtifact, target: &Oid) -> Result<bool, GitError> {
    match artifact {
        PinArtifact::PinFile { file, variable } => {
            let Some(contents) = vcs.read_worktree_file(file)? else {
                return Ok(false);
            };
            match rewrite_pin_line(&contents, variable, target.as_str()) {
                Some(updated) => {
                    if updated != contents {
                        vcs.write_worktree_file(file, &updated)?;
                    }
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        PinArtifact::Submodule { path } => {
            vcs.stage_gitlink(path, target)?;
            Ok(true)
        }
    }
}
