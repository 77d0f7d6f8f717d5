//! engine
//!
//! Recovers the nested uplift structure of a frontend range and replays it
//! as two flattened branches.
//!
//! # Architecture
//!
//! Data flows one way through the modules:
//!
//! ```text
//! range -> pins -> tree -> flatten -> materialize -> verify
//! ```
//!
//! 1. **range**: resolve revisions (fetching on a miss) and walk first-parent ranges
//! 2. **pins**: classify commits and extract their `(before, after)` pin change
//! 3. **tree**: expand frontend uplifts into core ranges, and core uplifts into base ranges
//! 4. **flatten**: linearize the tree into `(frontend, core, base)` entries
//! 5. **materialize**: write the core branch, then the frontend branch pinned to it
//! 6. **verify**: check both branches carry exactly the expected provenance
//!
//! [`pipeline::unroll`] drives the whole sequence.
//!
//! # Invariants
//!
//! - All repository access goes through [`crate::git::Vcs`]
//! - Nothing is shared between runs; every mapping is a return value
//! - Recoverable problems become [`Diagnostic`]s, everything else aborts
//!
//! # Example
//!
//! ```ignore
//! use uplift_unroll::engine::{unroll, Layers, UnrollRequest};
//!
//! let layers = Layers { frontend: &fe, core: &core, base: Some(&base) };
//! let outcome = unroll(layers, &request)?;
//! for entry in &outcome.history {
//!     println!("{:?}", entry.remap_key());
//! }
//! ```

pub mod diagnostics;
pub mod error;
pub mod flatten;
pub mod materialize;
pub mod pins;
pub mod pipeline;
pub mod provenance;
pub mod range;
pub mod tree;
pub mod verify;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::UnrollError;
pub use flatten::{flatten, LinearEntry, RemapKey};
pub use materialize::{BranchPlan, MaterializedBranch, PatchMapping, Remap};
pub use pipeline::{unroll, UnrollOutcome, UnrollRequest};
pub use provenance::Provenance;
pub use tree::{Layers, UpliftTree};
