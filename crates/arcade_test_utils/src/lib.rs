//! # Arcade Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism and replay-fidelity harness
//! - Scene and input fixtures
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
