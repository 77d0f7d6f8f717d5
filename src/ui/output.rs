//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, output is machine-readable JSON on stdout and
//! nothing else is printed there.

use std::fmt::Display;

use serde::Serialize;

use crate::engine::provenance::SHORT_LEN;
use crate::engine::LinearEntry;
use crate::git::CommitInfo;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Default `tracing` filter for this verbosity.
    pub fn log_filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Debug => "debug",
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cell(commit: Option<&CommitInfo>) -> String {
    match commit {
        Some(c) => c.oid.short(SHORT_LEN).to_string(),
        None => "-".repeat(SHORT_LEN),
    }
}

/// Render the flattened history as a table, one row per entry.
///
/// ```text
///    #  FE        MLIR      METAL     SUBJECT
///    1  1a2b3c4d  5e6f7a8b  --------  Fix conv2d lowering
/// ```
pub fn format_history(history: &[LinearEntry]) -> String {
    let width = history.len().to_string().len().max(1);
    let mut lines = vec![format!(
        "{:>width$}  {:<8}  {:<8}  {:<8}  SUBJECT",
        "#", "FE", "MLIR", "METAL"
    )];

    for (index, entry) in history.iter().enumerate() {
        let subject = entry
            .base
            .as_ref()
            .or(entry.core.as_ref())
            .or(entry.frontend.as_ref())
            .map(|c| c.subject())
            .unwrap_or_default();
        lines.push(format!(
            "{:>width$}  {}  {}  {}  {}",
            index + 1,
            cell(entry.frontend.as_ref()),
            cell(entry.core.as_ref()),
            cell(entry.base.as_ref()),
            subject
        ));
    }

    lines.join("\n")
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}
