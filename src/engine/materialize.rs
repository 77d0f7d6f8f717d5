//! engine::materialize
//!
//! Replaying a flattened history onto fresh branches.
//!
//! # Architecture
//!
//! Materialization runs in two passes. The core pass writes one commit per
//! entry that carries a core commit and records which new commit stands for
//! each original (core, base) pair. The frontend pass then writes one commit
//! per entry, pointing the frontend pin at those new core commits instead of
//! the original ones.
//!
//! Each step overlays the full tree of the historical commit onto the
//! working branch, so the result at every step is exactly the historical
//! content plus the rewritten pin.
//!
//! # Invariants
//!
//! - The output branch is always recreated from the base branch tip
//! - Author and committer identities and times are copied from the original
//! - Patch and remap misses degrade the step but never abort the pass

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::{debug, info, warn};

use super::diagnostics::{Diagnostic, Diagnostics};
use super::error::UnrollError;
use super::flatten::{LinearEntry, RemapKey};
use super::pins::write_pin;
use super::provenance::compose_message;
use crate::core::layers::PinArtifact;
use crate::core::types::{BranchName, CommitPrefix, Oid};
use crate::git::{CommitInfo, GitError, Vcs};

/// Rewritten core commit for every original (core, base) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remap {
    entries: BTreeMap<RemapKey, Oid>,
}

impl Remap {
    pub fn insert(&mut self, key: RemapKey, new: Oid) {
        self.entries.insert(key, new);
    }

    pub fn get(&self, key: &RemapKey) -> Option<&Oid> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RemapKey, &Oid)> {
        self.entries.iter()
    }
}

/// Serialized as a list of `{core, base, new}` records.
impl Serialize for Remap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Record<'a>(&'a RemapKey, &'a Oid);

        impl Serialize for Record<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut record = serializer.serialize_struct("RemapRecord", 3)?;
                record.serialize_field("core", &self.0.core)?;
                record.serialize_field("base", &self.0.base)?;
                record.serialize_field("new", self.1)?;
                record.end()
            }
        }

        serializer.collect_seq(self.entries.iter().map(|(k, v)| Record(k, v)))
    }
}

/// Patches to apply at specific core commits, in the order they were given.
#[derive(Debug, Clone, Default)]
pub struct PatchMapping {
    patches: Vec<(CommitPrefix, PathBuf)>,
}

impl PatchMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `patch` for every core commit `key` designates.
    pub fn insert(&mut self, key: CommitPrefix, patch: impl Into<PathBuf>) {
        self.patches.push((key, patch.into()));
    }

    /// Patches registered for `core`, in registration order.
    ///
    /// A key matches when either it or the commit hash is a prefix of the other.
    pub fn matching<'a>(&'a self, core: &'a Oid) -> impl Iterator<Item = &'a Path> + 'a {
        self.patches
            .iter()
            .filter(move |(key, _)| key.matches(core))
            .map(|(_, path)| path.as_path())
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CommitPrefix, &Path)> {
        self.patches.iter().map(|(k, p)| (k, p.as_path()))
    }
}

/// Branch to create and the branch it starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPlan {
    pub base: BranchName,
    pub target: BranchName,
}

/// A freshly written branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedBranch {
    pub name: BranchName,
    /// Tip of the base branch the branch was created at
    pub base_tip: Oid,
    /// New commits, oldest first
    pub commits: Vec<Oid>,
}

/// Recreate `plan.target` at the tip of `plan.base` and switch to it.
///
/// An existing target branch is deleted and reported as
/// [`Diagnostic::BranchCollision`].
pub fn reset_branch(
    vcs: &dyn Vcs,
    plan: &BranchPlan,
    diags: &mut Diagnostics,
) -> Result<Oid, UnrollError> {
    let git = |e: GitError| UnrollError::git(vcs.name(), e);

    vcs.switch_branch(&plan.base).map_err(git)?;
    let base_tip = vcs.resolve_ref(plan.base.as_str()).map_err(git)?;

    if vcs.branch_exists(&plan.target).map_err(git)? {
        diags.push(Diagnostic::BranchCollision {
            repo: vcs.name().to_string(),
            branch: plan.target.to_string(),
        });
        vcs.delete_branch(&plan.target).map_err(git)?;
    }

    vcs.create_branch(&plan.target, &base_tip).map_err(git)?;
    vcs.switch_branch(&plan.target).map_err(git)?;
    debug!(repo = vcs.name(), branch = %plan.target, base = base_tip.short(8), "branch reset");
    Ok(base_tip)
}

/// Core pass: one commit per entry with a core slot.
///
/// When the entry has a base slot, the core's pin to base is rewritten to
/// that original base commit.
pub fn materialize_core(
    entries: &[LinearEntry],
    vcs: &dyn Vcs,
    pin: &PinArtifact,
    plan: &BranchPlan,
    diags: &mut Diagnostics,
) -> Result<(Remap, MaterializedBranch), UnrollError> {
    let git = |e: GitError| UnrollError::git(vcs.name(), e);
    let base_tip = reset_branch(vcs, plan, diags)?;
    let mut remap = Remap::default();
    let mut commits = Vec::new();

    for entry in entries {
        let (Some(core), Some(key)) = (&entry.core, entry.remap_key()) else {
            continue;
        };

        vcs.checkout_tree(&core.oid).map_err(git)?;
        if let Some(base) = &entry.base {
            if !write_pin(vcs, pin, &base.oid).map_err(git)? {
                warn!(
                    repo = vcs.name(),
                    core = core.oid.short(8),
                    file = pin.path(),
                    "no pin to rewrite"
                );
            }
        }

        let message = compose_message(None, Some(core), entry.base.as_ref());
        let new = vcs
            .commit_index(&message, &core.author, &core.committer)
            .map_err(git)?;
        debug!(core = core.oid.short(8), new = new.short(8), "core step");
        remap.insert(key, new.clone());
        commits.push(new);
    }

    info!(repo = vcs.name(), branch = %plan.target, commits = commits.len(), "core branch written");
    Ok((
        remap,
        MaterializedBranch {
            name: plan.target.clone(),
            base_tip,
            commits,
        },
    ))
}

/// Frontend pass: one commit per entry.
///
/// The frontend pin is pointed at the rewritten core commit from `remap`.
/// A missing remap entry leaves the pin as it was in the original commit.
pub fn materialize_frontend(
    entries: &[LinearEntry],
    vcs: &dyn Vcs,
    pin: &PinArtifact,
    remap: &Remap,
    plan: &BranchPlan,
    patches: &PatchMapping,
    diags: &mut Diagnostics,
) -> Result<MaterializedBranch, UnrollError> {
    let git = |e: GitError| UnrollError::git(vcs.name(), e);
    let base_tip = reset_branch(vcs, plan, diags)?;
    let mut commits = Vec::new();

    for entry in entries {
        let Some(source) = provenance_source(entry) else {
            continue;
        };

        if let Some(frontend) = &entry.frontend {
            vcs.checkout_tree(&frontend.oid).map_err(git)?;
        }

        if let (Some(core), Some(key)) = (&entry.core, entry.remap_key()) {
            match remap.get(&key) {
                Some(new_core) => {
                    if !write_pin(vcs, pin, new_core).map_err(git)? {
                        warn!(repo = vcs.name(), file = pin.path(), "no pin to rewrite");
                    }
                }
                None => diags.push(Diagnostic::MissingRemapEntry {
                    core: key.core.clone(),
                    base: key.base.clone(),
                }),
            }

            for patch in patches.matching(&core.oid) {
                match vcs.apply_patch(patch) {
                    Ok(()) => info!(patch = %patch.display(), core = core.oid.short(8), "patch applied"),
                    Err(err) => diags.push(Diagnostic::PatchApplyFailure {
                        patch: patch.to_path_buf(),
                        core: core.oid.clone(),
                        reason: err.to_string(),
                    }),
                }
            }
        }

        let message = compose_message(
            entry.frontend.as_ref(),
            entry.core.as_ref(),
            entry.base.as_ref(),
        );
        let new = vcs
            .commit_index(&message, &source.author, &source.committer)
            .map_err(git)?;
        commits.push(new);
    }

    info!(repo = vcs.name(), branch = %plan.target, commits = commits.len(), "frontend branch written");
    Ok(MaterializedBranch {
        name: plan.target.clone(),
        base_tip,
        commits,
    })
}

/// Commit whose identities a frontend step copies: the frontend commit, or
/// the deepest original present when the frontend slot is empty.
fn provenance_source(entry: &LinearEntry) -> Option<&CommitInfo> {
    entry
        .frontend
        .as_ref()
        .or(entry.core.as_ref())
        .or(entry.base.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layers::CMAKE_PIN_FILE;
    use crate::git::mock::{MockOperation, MockVcs, PatchEffect};

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    fn plan() -> BranchPlan {
        BranchPlan {
            base: branch("main"),
            target: branch("uplift/flattened"),
        }
    }

    fn info(repo: &MockVcs, oid: &Oid) -> CommitInfo {
        repo.find_commit(oid).unwrap()
    }

    fn pin(var: &str, oid: &Oid) -> String {
        format!("project(x)\nset({var} \"{oid}\")\n")
    }

    mod patches {
        use super::*;

        #[test]
        fn prefix_matching_in_both_directions() {
            let full = Oid::new("abcdef0123456789abcdef0123456789abcdef01").unwrap();
            let other = Oid::new("abcdef0000000000000000000000000000000000").unwrap();

            let mut patches = PatchMapping::new();
            patches.insert(CommitPrefix::new("abcdef01").unwrap(), "/p/short.patch");
            patches.insert(CommitPrefix::new(full.as_str()).unwrap(), "/p/full.patch");

            let hits: Vec<_> = patches.matching(&full).collect();
            assert_eq!(hits, vec![Path::new("/p/short.patch"), Path::new("/p/full.patch")]);
            assert_eq!(patches.matching(&other).count(), 0);
        }
    }

    mod reset {
        use super::*;

        #[test]
        fn existing_branch_is_replaced_and_reported() {
            let repo = MockVcs::new("core");
            let tip = repo.commit("tip", &[]);
            repo.checkout_branch_at("uplift/flattened", &tip);
            repo.commit("stale", &[]);
            repo.checkout_branch_at("main", &tip);

            let mut diags = Diagnostics::new();
            let base_tip = reset_branch(&repo, &plan(), &mut diags).unwrap();

            assert_eq!(base_tip, tip);
            assert_eq!(repo.branch_tip("uplift/flattened"), Some(tip));
            assert_eq!(repo.head_branch(), "uplift/flattened");
            assert!(matches!(
                diags.iter().next(),
                Some(Diagnostic::BranchCollision { .. })
            ));
            assert!(repo.operations().contains(&MockOperation::DeleteBranch {
                name: "uplift/flattened".into()
            }));
        }

        #[test]
        fn fresh_branch_is_silent() {
            let repo = MockVcs::new("core");
            let mut diags = Diagnostics::new();
            reset_branch(&repo, &plan(), &mut diags).unwrap();
            assert!(diags.is_empty());
        }
    }

    mod core_pass {
        use super::*;

        #[test]
        fn rewrites_base_pin_and_copies_identity() {
            let base = MockVcs::new("base");
            let m1 = base.commit("M1", &[]);
            let m2 = base.commit("M2", &[]);

            let core = MockVcs::new("core");
            let main_tip = core.commit("setup", &[]);
            let c1 = core.commit("C1 update metal", &[(CMAKE_PIN_FILE, pin("TT_METAL_VERSION", &m2).as_str())]);
            core.checkout_branch_at("main", &main_tip);

            let entries: Vec<_> = [&m1, &m2]
                .into_iter()
                .map(|m| LinearEntry {
                    frontend: None,
                    core: Some(info(&core, &c1)),
                    base: Some(info(&base, m)),
                })
                .collect();

            let mut diags = Diagnostics::new();
            let (remap, branch) = materialize_core(
                &entries,
                &core,
                &PinArtifact::cmake("TT_METAL_VERSION"),
                &plan(),
                &mut diags,
            )
            .unwrap();

            assert_eq!(branch.commits.len(), 2);
            assert_eq!(branch.base_tip, main_tip);
            assert_eq!(remap.len(), 2);

            let first = info(&core, &branch.commits[0]);
            assert_eq!(
                core.file_at(&first.oid, CMAKE_PIN_FILE).unwrap(),
                Some(pin("TT_METAL_VERSION", &m1))
            );
            assert_eq!(first.author, info(&core, &c1).author);
            assert!(first.message.starts_with(&format!(
                "orig_fe=None | orig_mlir={} | orig_metal={}",
                c1.short(8),
                m1.short(8)
            )));

            let key = RemapKey {
                core: c1.clone(),
                base: Some(m2.clone()),
            };
            assert_eq!(remap.get(&key), Some(&branch.commits[1]));
            assert!(diags.is_empty());
        }

        #[test]
        fn plain_frontend_entries_are_skipped() {
            let fe = MockVcs::new("fe");
            let f1 = fe.commit("F1", &[]);
            let core = MockVcs::new("core");

            let entries = vec![LinearEntry {
                frontend: Some(info(&fe, &f1)),
                core: None,
                base: None,
            }];
            let (remap, branch) = materialize_core(
                &entries,
                &core,
                &PinArtifact::cmake("TT_METAL_VERSION"),
                &plan(),
                &mut Diagnostics::new(),
            )
            .unwrap();

            assert!(remap.is_empty());
            assert!(branch.commits.is_empty());
        }
    }

    mod frontend_pass {
        use super::*;

        struct Setup {
            fe: MockVcs,
            core: MockVcs,
            f1: Oid,
            c1: Oid,
            entries: Vec<LinearEntry>,
        }

        fn setup() -> Setup {
            let core = MockVcs::new("core");
            let c0 = core.commit("C0", &[]);
            let c1 = core.commit("C1", &[]);

            let fe = MockVcs::new("fe");
            let main_tip = fe.commit("setup", &[(CMAKE_PIN_FILE, pin("TT_MLIR_VERSION", &c0).as_str())]);
            let f1 = fe.commit(
                "Uplift third_party/tt-mlir",
                &[(CMAKE_PIN_FILE, pin("TT_MLIR_VERSION", &c1).as_str())],
            );
            fe.checkout_branch_at("main", &main_tip);

            let entries = vec![LinearEntry {
                frontend: Some(info(&fe, &f1)),
                core: Some(info(&core, &c1)),
                base: None,
            }];
            Setup {
                fe,
                core,
                f1,
                c1,
                entries,
            }
        }

        #[test]
        fn pin_points_at_rewritten_core() {
            let s = setup();
            let new_core = s.core.commit("rewritten", &[]);
            let mut remap = Remap::default();
            remap.insert(
                RemapKey {
                    core: s.c1.clone(),
                    base: None,
                },
                new_core.clone(),
            );

            let mut diags = Diagnostics::new();
            let branch = materialize_frontend(
                &s.entries,
                &s.fe,
                &PinArtifact::cmake("TT_MLIR_VERSION"),
                &remap,
                &plan(),
                &PatchMapping::new(),
                &mut diags,
            )
            .unwrap();

            let commit = info(&s.fe, &branch.commits[0]);
            assert_eq!(
                s.fe.file_at(&commit.oid, CMAKE_PIN_FILE).unwrap(),
                Some(pin("TT_MLIR_VERSION", &new_core))
            );
            assert_eq!(commit.author, info(&s.fe, &s.f1).author);
            assert!(commit.message.contains(&format!("[FE:{}]", s.f1.short(8))));
            assert!(diags.is_empty());
        }

        #[test]
        fn missing_remap_keeps_original_pin() {
            let s = setup();
            let mut diags = Diagnostics::new();
            let branch = materialize_frontend(
                &s.entries,
                &s.fe,
                &PinArtifact::cmake("TT_MLIR_VERSION"),
                &Remap::default(),
                &plan(),
                &PatchMapping::new(),
                &mut diags,
            )
            .unwrap();

            let commit = &branch.commits[0];
            assert_eq!(
                s.fe.file_at(commit, CMAKE_PIN_FILE).unwrap(),
                Some(pin("TT_MLIR_VERSION", &s.c1))
            );
            assert_eq!(
                diags.into_vec(),
                vec![Diagnostic::MissingRemapEntry {
                    core: s.c1.clone(),
                    base: None,
                }]
            );
        }

        #[test]
        fn patches_apply_and_failures_are_recovered() {
            let s = setup();
            s.fe.register_patch(
                "/patches/good.patch",
                PatchEffect::Write {
                    path: "fix.txt".into(),
                    contents: "fixed\n".into(),
                },
            );
            s.fe.register_patch("/patches/bad.patch", PatchEffect::Fail("does not apply".into()));

            let mut patches = PatchMapping::new();
            patches.insert(CommitPrefix::new(s.c1.short(8)).unwrap(), "/patches/good.patch");
            patches.insert(CommitPrefix::new(s.c1.as_str()).unwrap(), "/patches/bad.patch");

            let mut diags = Diagnostics::new();
            let branch = materialize_frontend(
                &s.entries,
                &s.fe,
                &PinArtifact::cmake("TT_MLIR_VERSION"),
                &Remap::default(),
                &plan(),
                &patches,
                &mut diags,
            )
            .unwrap();

            assert_eq!(branch.commits.len(), 1);
            assert_eq!(
                s.fe.file_at(&branch.commits[0], "fix.txt").unwrap().as_deref(),
                Some("fixed\n")
            );
            assert!(diags
                .iter()
                .any(|d| matches!(d, Diagnostic::PatchApplyFailure { patch, .. } if patch == Path::new("/patches/bad.patch"))));
        }
    }

    #[test]
    fn remap_serializes_as_records() {
        let core = Oid::new("a".repeat(40)).unwrap();
        let new = Oid::new("b".repeat(40)).unwrap();
        let mut remap = Remap::default();
        remap.insert(
            RemapKey {
                core: core.clone(),
                base: None,
            },
            new.clone(),
        );

        let json = serde_json::to_value(&remap).unwrap();
        assert_eq!(json[0]["core"], core.as_str());
        assert!(json[0]["base"].is_null());
        assert_eq!(json[0]["new"], new.as_str());
    }
}
