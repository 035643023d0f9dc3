//! Tester error types

use thiserror::Error;

/// Errors reported by control-thread operations.
///
/// The realtime path never produces these: it degrades to silence or a stale
/// meter reading instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TesterError {
    /// Buffers could not be reserved at initialization
    #[error("Failed to allocate {0} bytes for processing buffers")]
    AllocationFailure(usize),

    /// Blind test requested with too few participating channels
    #[error("Blind test needs at least 2 enabled channels, found {eligible}")]
    InsufficientChannels { eligible: usize },

    /// The shared state store could not be locked
    #[error("Shared state store is unavailable")]
    StoreUnavailable,

    /// A persisted value had the wrong type or shape
    #[error("Malformed persisted state at {path}: {reason}")]
    MalformedState { path: String, reason: String },

    /// A port id that does not exist in this variant
    #[error("Unknown port: {0}")]
    UnknownPort(String),

    /// A variant name that is not in the catalogue
    #[error("Unknown tester variant: {0}")]
    UnknownVariant(String),
}

/// Result type for tester operations
pub type TesterResult<T> = Result<T, TesterError>;
