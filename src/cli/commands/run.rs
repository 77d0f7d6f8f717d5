//! run command - Flatten a frontend range and write the rewritten branches

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use super::{load_config, open_repo};
use crate::cli::Context;
use crate::core::types::{BranchName, CommitPrefix};
use crate::engine::provenance::summary_line;
use crate::engine::{unroll, BranchPlan, Layers, PatchMapping, UnrollRequest};
use crate::git::Vcs;
use crate::ui::output;

/// Arguments of `unroll run`.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub frontend: String,
    pub start: String,
    pub end: String,
    pub fe_only: bool,
    pub fe_branch: Option<String>,
    pub core_branch: Option<String>,
    pub branch: Option<String>,
    /// Flat `HASH FILE` pairs as given on the command line
    pub patches: Vec<String>,
    pub include_previous_pin: bool,
    pub dry_run: bool,
    pub json: bool,
}

/// Flatten `args.start..args.end` of a frontend and materialize it.
pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let config = load_config(ctx)?;
    let frontend = config.frontend(&args.frontend)?;
    let core = config.core();
    let patches = parse_patches(&args.patches)?;

    let fe_repo = open_repo(&frontend.repo)?;
    let core_repo = open_repo(&core.repo)?;
    let base_repo = if args.fe_only {
        None
    } else {
        Some(open_repo(&config.base())?)
    };

    let target = BranchName::new(args.branch.unwrap_or_else(|| config.output_branch()))?;
    let request = UnrollRequest {
        start: args.start,
        end: args.end,
        fe_only: args.fe_only,
        include_previous_pin: args.include_previous_pin || config.include_previous_pin(),
        remote: config.remote(),
        frontend_pin: frontend.pin,
        core_pin: core.pin,
        frontend_branch: BranchPlan {
            base: BranchName::new(args.fe_branch.unwrap_or(frontend.repo.branch))?,
            target: target.clone(),
        },
        core_branch: BranchPlan {
            base: BranchName::new(args.core_branch.unwrap_or(core.repo.branch))?,
            target,
        },
        patches,
        dry_run: args.dry_run,
    };

    let layers = Layers {
        frontend: &fe_repo,
        core: &core_repo,
        base: base_repo.as_ref().map(|b| b as &dyn Vcs),
    };
    let outcome = unroll(layers, &request)?;

    if args.json {
        output::json(&outcome)?;
        return Ok(());
    }

    output::print(output::format_history(&outcome.history), ctx.verbosity);
    if !outcome.diagnostics.is_empty() {
        output::warn(
            format!(
                "{} problem(s) during the run:\n{}",
                outcome.diagnostics.len(),
                output::format_list(&outcome.diagnostics, "  - ")
            ),
            ctx.verbosity,
        );
    }

    for (repo, branch) in [
        (&core_repo as &dyn Vcs, &outcome.core_branch),
        (&fe_repo as &dyn Vcs, &outcome.frontend_branch),
    ] {
        let Some(branch) = branch else { continue };
        let tip = repo.resolve_ref(branch.as_str())?;
        let message = repo.find_commit(&tip)?.message;
        output::print(
            format!(
                "{}: {} at {} {}",
                repo.name(),
                branch,
                tip.short(8),
                summary_line(&message).unwrap_or("")
            ),
            ctx.verbosity,
        );
    }

    if args.dry_run {
        output::print("dry run: no branches written", ctx.verbosity);
    }
    Ok(())
}

/// Turn flat `HASH FILE` pairs into a [`PatchMapping`] with absolute paths.
pub(crate) fn parse_patches(raw: &[String]) -> Result<PatchMapping> {
    let mut patches = PatchMapping::new();
    for pair in raw.chunks(2) {
        let [hash, file] = pair else {
            bail!("--patch takes a commit hash and a patch file");
        };
        let prefix = CommitPrefix::new(hash.as_str())
            .with_context(|| format!("invalid commit hash '{hash}' for --patch"))?;
        let path = Path::new(file);
        if !path.is_file() {
            bail!("patch file '{}' does not exist", path.display());
        }
        let path = path
            .canonicalize()
            .with_context(|| format!("cannot resolve patch file '{}'", path.display()))?;
        patches.insert(prefix, path);
    }
    Ok(patches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn patches_become_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fix.patch");
        fs::write(&file, "diff\n").unwrap();

        let mapping = parse_patches(&["abcd1234".into(), file.display().to_string()]).unwrap();
        let (prefix, path) = mapping.iter().next().unwrap();
        assert_eq!(prefix.as_str(), "abcd1234");
        assert!(path.is_absolute());
        assert_eq!(path, file.canonicalize().unwrap());
    }

    #[test]
    fn missing_patch_file_is_rejected() {
        let err = parse_patches(&["abcd1234".into(), "/no/such/file.patch".into()]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn bad_hash_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fix.patch");
        fs::write(&file, "diff\n").unwrap();

        assert!(parse_patches(&["not-a-hash".into(), file.display().to_string()]).is_err());
    }
}
