//! core
//!
//! Core domain types, layer model and configuration for unroll.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, CommitPrefix
//! - [`layers`] - The frontend/core/base chain and how each layer pins the next
//! - [`config`] - Configuration schema and loading
//! - [`lock`] - Per-repository exclusive lock
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing

pub mod config;
pub mod layers;
pub mod lock;
pub mod types;
