//! Internal implementation modules for `wheelship-core`.
//!
//! Callers go through the re-exports in the crate root.

pub mod config;
pub mod container;
pub mod distribution;
pub mod python;
pub mod release;
pub mod runtime;
pub mod tooling;
