//! Error types for the symbex bridge

/// Result type for marshaling and entry-point calls
pub type SymbexResult<T> = Result<T, SymbexError>;

/// Failures reported to the immediate caller of a marshaling operation.
///
/// None of these are fatal. Backend state touched earlier in the same call
/// (registered buffers, emitted assumptions) is left in place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbexError {
    /// The execution engine is not tracking symbolic data
    #[error("Not in symbolic mode")]
    NotSymbolicMode,

    /// Declared size or value range cannot hold the concrete input
    #[error("Incompatible constraints: {0}")]
    ConstraintViolation(String),

    /// Value kind that can never be made symbolic
    #[error("Cannot make symbolic: {0}")]
    InvalidTarget(String),

    /// Value kind outside the supported set
    #[error("Unsupported type: {got}")]
    UnsupportedType {
        /// Kind name of the rejected value
        got: &'static str,
    },

    /// Scratch buffer could not be reserved
    #[error("Out of memory reserving {bytes} scratch bytes")]
    AllocationFailure {
        /// Requested size in bytes
        bytes: usize,
    },

    /// A new host value could not be rebuilt from scratch memory
    #[error("Failed to construct value: {0}")]
    ConstructionFailure(String),

    /// Symbolic variable name rejected by the encoder
    #[error("Invalid symbolic name: {0}")]
    InvalidName(String),

    /// Entry point called with malformed arguments
    #[error("Argument error: {0}")]
    ArgumentError(String),
}
