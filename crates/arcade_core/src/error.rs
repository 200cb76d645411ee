//! Error types for the simulation core.

use thiserror::Error;

use crate::object::ObjectId;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for the simulation core.
///
/// Only [`EngineError::DuplicateIdentity`] is fatal to a running session.
/// [`EngineError::UnknownObject`] is recovered where it happens: objects can
/// die between an event being scheduled and dispatched, so dependent effects
/// are skipped. [`EngineError::InvalidTransition`] is only returned by the
/// strict `try_*` replay controls; operator commands treat it as a no-op.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An object was added under an id that is already registered.
    #[error("Duplicate object identity: {0}")]
    DuplicateIdentity(ObjectId),

    /// An explicit id below the allocator's high-water mark was added.
    /// Removed ids stay retired.
    #[error("Object identity already used: {0}")]
    StaleIdentity(ObjectId),

    /// A query or event referenced an id that is not registered.
    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),

    /// A replay command is not valid in the current replay mode.
    #[error("Invalid replay transition: {command} while {from}")]
    InvalidTransition {
        /// Mode the replay manager was in.
        from: String,
        /// Command that was rejected.
        command: String,
    },

    /// A finished record was required but none exists.
    #[error("No finished record")]
    NoRecord,

    /// Failed to encode or decode state.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Failed to read or write a replay file.
    #[error("I/O failed: {0}")]
    Io(String),

    /// Replay file written by an incompatible format version.
    #[error("Replay version mismatch: expected {expected}, found {found}")]
    ReplayVersionMismatch {
        /// Version this build understands.
        expected: u32,
        /// Version stored in the file.
        found: u32,
    },

    /// Engine configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Whether this error must terminate the running session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::DuplicateIdentity(_))
    }
}
