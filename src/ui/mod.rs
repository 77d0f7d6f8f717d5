//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! Everything the CLI prints for a person goes through this module so quiet
//! and JSON modes are honored in one place. Engine progress is logged with
//! `tracing` instead and lands on stderr.

pub mod output;
