//! unroll - flatten cross-repository dependency uplifts into replayable branches
//!
//! Three repositories form a dependency chain: a frontend pins an exact core
//! revision, and the core pins an exact base revision. A single "uplift"
//! commit that moves a pin can fold dozens of upstream commits into one step.
//! unroll recovers that nested structure for a frontend range, linearizes it,
//! and replays it as one branch in the core repository and one in the
//! frontend repository, so every upstream step becomes its own commit that
//! can be bisected or patched.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Resolve, expand, flatten, materialize and verify
//! - [`core`] - Domain types, layer model, configuration and locking
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. Nothing is written until every fatal check has passed
//! 2. Rewritten branches are always recreated from their base branch
//! 3. Every rewritten commit names the original commits it stands for
//! 4. A run only succeeds once both branches pass verification

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
