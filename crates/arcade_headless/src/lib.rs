//! # Arcade Headless
//!
//! Headless runner for the arcade simulation core.
//!
//! Runs scenarios without presentation, driven by scripted inputs or by JSON
//! commands on stdin. Used for CI, record/replay verification and agents.
//!
//! ## Modules
//!
//! - [`scenario`]: RON scenario files and built-in scenarios
//! - [`protocol`]: JSON-lines command and response types
//! - [`runner`]: one-shot runs, record playback and the interactive runner

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod protocol;
pub mod runner;
pub mod scenario;

pub use protocol::{Command, ObjectState, RecordInfo, Response};
pub use runner::{play_record, run_scenario, HeadlessRunner, PlaybackSummary, RunOptions, RunSummary};
pub use scenario::{Scenario, ScenarioError, ScriptError};
