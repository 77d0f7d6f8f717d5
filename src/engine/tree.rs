//! engine::tree
//!
//! Expansion of uplift commits into the commits they subsume.
//!
//! # Architecture
//!
//! Building happens in two steps. [`TreeBuilder::build`] walks the frontend
//! commits and produces [`UpliftMappings`]: for every frontend uplift, the
//! core commits its pin change covers, and for every core uplift among
//! those, the base commits it covers. [`UpliftTree::assemble`] then turns the
//! flat, hash-keyed mappings into an owned nested tree in frontend order.
//!
//! The mappings are returned to the caller rather than accumulated in shared
//! state, so two builds never see each other's results.

use std::collections::HashMap;

use tracing::{debug, info};

use super::diagnostics::{Diagnostic, Diagnostics};
use super::error::UnrollError;
use super::pins::{classify, is_uplift, Classification, PinChange};
use super::range::Resolver;
use crate::core::layers::{Layer, PinSpec};
use crate::core::types::Oid;
use crate::git::{CommitInfo, Vcs};

/// The three repositories of a run.
#[derive(Clone, Copy)]
pub struct Layers<'a> {
    pub frontend: &'a dyn Vcs,
    pub core: &'a dyn Vcs,
    /// Only needed when base uplifts are expanded.
    pub base: Option<&'a dyn Vcs>,
}

/// Subsumed commit lists keyed by the uplift commit that subsumes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpliftMappings {
    /// Frontend uplift commit -> core commits, oldest first
    pub fe_to_core: HashMap<Oid, Vec<CommitInfo>>,
    /// Core uplift commit -> base commits, oldest first
    pub core_to_base: HashMap<Oid, Vec<CommitInfo>>,
}

/// Settings of one tree build.
#[derive(Debug, Clone)]
pub struct TreeOptions<'a> {
    /// How the frontend pins core
    pub frontend_pin: &'a PinSpec,
    /// How core pins base
    pub core_pin: &'a PinSpec,
    /// Remote used when a pinned commit is missing locally
    pub remote: &'a str,
    /// Keep core commits whole; do not expand base uplifts
    pub fe_only: bool,
    /// Replay the commit the old pin named too
    pub include_previous_pin: bool,
}

/// Builds [`UpliftMappings`] for a range of frontend commits.
pub struct TreeBuilder<'a> {
    layers: Layers<'a>,
    options: TreeOptions<'a>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(layers: Layers<'a>, options: TreeOptions<'a>) -> Self {
        Self { layers, options }
    }

    /// Expand every uplift in `fe_commits`.
    ///
    /// Uplift-marked commits without a parseable pin change are reported as
    /// [`Diagnostic::UnresolvableUplift`] and get no expansion.
    ///
    /// # Errors
    ///
    /// Fails when a pinned revision cannot be resolved even after fetching,
    /// or when base expansion is requested without a base repository.
    pub fn build(
        &self,
        fe_commits: &[CommitInfo],
        diags: &mut Diagnostics,
    ) -> Result<UpliftMappings, UnrollError> {
        let base = match (self.options.fe_only, self.layers.base) {
            (true, _) => None,
            (false, Some(base)) => Some(base),
            (false, None) => return Err(UnrollError::LayerUnavailable { layer: Layer::Base }),
        };

        let mut mappings = UpliftMappings::default();

        for fe_commit in fe_commits {
            let Some(change) = self.uplift_of(self.layers.frontend, fe_commit, self.options.frontend_pin, diags)?
            else {
                continue;
            };
            let core_commits = self.subsumed(self.layers.core, &change, diags)?;
            info!(
                frontend = fe_commit.oid.short(8),
                from = short(&change.before),
                to = short(&change.after),
                count = core_commits.len(),
                "expanded frontend uplift"
            );

            if let Some(base) = base {
                for core_commit in &core_commits {
                    if mappings.core_to_base.contains_key(&core_commit.oid) {
                        continue;
                    }
                    let Some(change) =
                        self.uplift_of(self.layers.core, core_commit, self.options.core_pin, diags)?
                    else {
                        continue;
                    };
                    let base_commits = self.subsumed(base, &change, diags)?;
                    debug!(
                        core = core_commit.oid.short(8),
                        count = base_commits.len(),
                        "expanded core uplift"
                    );
                    mappings
                        .core_to_base
                        .insert(core_commit.oid.clone(), base_commits);
                }
            }

            mappings
                .fe_to_core
                .insert(fe_commit.oid.clone(), core_commits);
        }

        Ok(mappings)
    }

    fn uplift_of(
        &self,
        vcs: &dyn Vcs,
        commit: &CommitInfo,
        spec: &PinSpec,
        diags: &mut Diagnostics,
    ) -> Result<Option<PinChange>, UnrollError> {
        if !is_uplift(commit, spec) {
            return Ok(None);
        }
        let diffs = vcs
            .diff(&commit.oid)
            .map_err(|e| UnrollError::git(vcs.name(), e))?;

        match classify(commit, &diffs, spec) {
            Classification::Uplift(change) => Ok(Some(change)),
            Classification::Plain => Ok(None),
            Classification::Unresolvable => {
                diags.push(Diagnostic::UnresolvableUplift {
                    repo: vcs.name().to_string(),
                    commit: commit.oid.clone(),
                });
                Ok(None)
            }
        }
    }

    fn subsumed(
        &self,
        vcs: &dyn Vcs,
        change: &PinChange,
        diags: &mut Diagnostics,
    ) -> Result<Vec<CommitInfo>, UnrollError> {
        let resolver = Resolver::new(vcs, self.options.remote);
        let before = resolver.resolve(&change.before, diags)?;
        let after = resolver.resolve(&change.after, diags)?;
        resolver.range_between(&before, self.options.include_previous_pin, &after)
    }
}

fn short(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

/// A core commit and the base commits it subsumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreNode {
    pub commit: CommitInfo,
    pub base: Vec<CommitInfo>,
}

/// A frontend commit and the core commits it subsumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendNode {
    pub commit: CommitInfo,
    pub core: Vec<CoreNode>,
}

/// Nested subsumption tree in frontend commit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpliftTree {
    pub nodes: Vec<FrontendNode>,
}

impl UpliftTree {
    /// Nest `mappings` under `fe_commits`, keeping their order.
    ///
    /// Commits without a mapping get empty child lists.
    pub fn assemble(fe_commits: Vec<CommitInfo>, mappings: &UpliftMappings) -> Self {
        let nodes = fe_commits
            .into_iter()
            .map(|commit| {
                let core = mappings
                    .fe_to_core
                    .get(&commit.oid)
                    .map(|core_commits| {
                        core_commits
                            .iter()
                            .map(|core_commit| CoreNode {
                                base: mappings
                                    .core_to_base
                                    .get(&core_commit.oid)
                                    .cloned()
                                    .unwrap_or_default(),
                                commit: core_commit.clone(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                FrontendNode { commit, core }
            })
            .collect();
        Self { nodes }
    }

    /// Number of core commits across all frontend nodes.
    pub fn core_count(&self) -> usize {
        self.nodes.iter().map(|n| n.core.len()).sum()
    }

    /// Number of base commits across all core nodes.
    pub fn base_count(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| &n.core)
            .map(|c| c.base.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layers::{core_preset, frontend_preset, CMAKE_PIN_FILE, CORE_UPLIFT_MARKER};
    use crate::git::mock::MockVcs;

    fn pin_line(var: &str, oid: &Oid) -> String {
        format!("set({var} \"{oid}\")\n")
    }

    struct Fixture {
        fe: MockVcs,
        core: MockVcs,
        base: MockVcs,
        core_commits: Vec<Oid>,
        base_commits: Vec<Oid>,
    }

    /// base: M1..M3; core: C1..C5 where C4 moves the base pin M1 -> M3.
    fn fixture() -> Fixture {
        let base = MockVcs::new("base");
        let base_commits: Vec<Oid> = (1..=3).map(|i| base.commit(&format!("M{i}"), &[])).collect();

        let core = MockVcs::new("core");
        let mut core_commits = Vec::new();
        let old_pin = pin_line("TT_METAL_VERSION", &base_commits[0]);
        let new_pin = pin_line("TT_METAL_VERSION", &base_commits[2]);
        for i in 1..=5 {
            let pin = if i >= 4 { &new_pin } else { &old_pin };
            let src = format!("v{i}\n");
            core_commits.push(core.commit(
                &format!("C{i}"),
                &[(CMAKE_PIN_FILE, pin.as_str()), ("src.cpp", src.as_str())],
            ));
        }

        let fe = MockVcs::new("fe");
        Fixture {
            fe,
            core,
            base,
            core_commits,
            base_commits,
        }
    }

    fn uplift_fe(fx: &Fixture, from: usize, to: usize) -> (Oid, Oid) {
        let before = pin_line("TT_MLIR_VERSION", &fx.core_commits[from]);
        let after = pin_line("TT_MLIR_VERSION", &fx.core_commits[to]);
        let first = fx.fe.commit("Initial pin", &[(CMAKE_PIN_FILE, before.as_str())]);
        let second = fx.fe.commit(
            &format!("{CORE_UPLIFT_MARKER} to {}", fx.core_commits[to].short(8)),
            &[(CMAKE_PIN_FILE, after.as_str())],
        );
        (first, second)
    }

    fn build(fx: &Fixture, fe_only: bool, include_previous_pin: bool) -> (Vec<CommitInfo>, UpliftMappings, Diagnostics) {
        let frontend_pin = frontend_preset("tt-xla").unwrap();
        let core_pin = core_preset();
        let layers = Layers {
            frontend: &fx.fe,
            core: &fx.core,
            base: Some(&fx.base as &dyn Vcs),
        };
        let builder = TreeBuilder::new(
            layers,
            TreeOptions {
                frontend_pin: &frontend_pin,
                core_pin: &core_pin,
                remote: "origin",
                fe_only,
                include_previous_pin,
            },
        );
        let head = fx.fe.resolve_ref("HEAD").unwrap();
        let fe_commits = fx.fe.commit_range(None, &head).unwrap();
        let mut diags = Diagnostics::new();
        let mappings = builder.build(&fe_commits, &mut diags).unwrap();
        (fe_commits, mappings, diags)
    }

    #[test]
    fn expands_frontend_and_core_uplifts() {
        let fx = fixture();
        let (_, uplift) = uplift_fe(&fx, 0, 4);
        let (_, mappings, diags) = build(&fx, false, false);

        let core: Vec<_> = mappings.fe_to_core[&uplift].iter().map(|c| c.oid.clone()).collect();
        assert_eq!(core, fx.core_commits[1..].to_vec());

        let base: Vec<_> = mappings.core_to_base[&fx.core_commits[3]]
            .iter()
            .map(|c| c.oid.clone())
            .collect();
        assert_eq!(base, fx.base_commits[1..].to_vec());
        assert_eq!(mappings.core_to_base.len(), 1);
        assert!(diags.is_empty());
    }

    #[test]
    fn fe_only_skips_base() {
        let fx = fixture();
        uplift_fe(&fx, 0, 4);
        let (_, mappings, _) = build(&fx, true, false);

        assert_eq!(mappings.fe_to_core.len(), 1);
        assert!(mappings.core_to_base.is_empty());
    }

    #[test]
    fn include_previous_pin_replays_old_pin() {
        let fx = fixture();
        let (_, uplift) = uplift_fe(&fx, 0, 4);
        let (_, mappings, _) = build(&fx, true, true);

        assert_eq!(mappings.fe_to_core[&uplift].len(), 5);
        assert_eq!(mappings.fe_to_core[&uplift][0].oid, fx.core_commits[0]);
    }

    #[test]
    fn marked_commit_without_pin_change_is_reported() {
        let fx = fixture();
        let bogus = fx.fe.commit(&format!("{CORE_UPLIFT_MARKER} (docs only)"), &[("README", "x\n")]);
        let (fe_commits, mappings, diags) = build(&fx, false, false);

        assert!(mappings.fe_to_core.is_empty());
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags.iter().next(),
            Some(&Diagnostic::UnresolvableUplift {
                repo: "fe".into(),
                commit: bogus,
            })
        );

        let tree = UpliftTree::assemble(fe_commits, &mappings);
        assert!(tree.nodes.iter().all(|n| n.core.is_empty()));
    }

    #[test]
    fn base_required_unless_fe_only() {
        let fx = fixture();
        let frontend_pin = frontend_preset("tt-xla").unwrap();
        let core_pin = core_preset();
        let builder = TreeBuilder::new(
            Layers {
                frontend: &fx.fe,
                core: &fx.core,
                base: None,
            },
            TreeOptions {
                frontend_pin: &frontend_pin,
                core_pin: &core_pin,
                remote: "origin",
                fe_only: false,
                include_previous_pin: false,
            },
        );
        let result = builder.build(&[], &mut Diagnostics::new());
        assert!(matches!(result, Err(UnrollError::LayerUnavailable { .. })));
    }

    #[test]
    fn assemble_nests_in_order() {
        let fx = fixture();
        uplift_fe(&fx, 0, 4);
        fx.fe.commit("Unrelated", &[("README", "y\n")]);
        let (fe_commits, mappings, _) = build(&fx, false, false);
        let tree = UpliftTree::assemble(fe_commits.clone(), &mappings);

        assert_eq!(tree.nodes.len(), fe_commits.len());
        assert_eq!(tree.core_count(), 4);
        assert_eq!(tree.base_count(), 2);
        let last = tree.nodes.last().unwrap();
        assert_eq!(last.commit.summary, "Unrelated");
        assert!(last.core.is_empty());
    }
}
