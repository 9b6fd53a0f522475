//! Error types for dvhop-protocol.

use thiserror::Error;

/// Result type for dvhop-protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling protocol events.
#[derive(Debug, Error)]
pub enum Error {
    /// An incoming flooding message could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A message arrived on an interface the node has no binding for.
    #[error("no binding for interface {0}")]
    UnknownInterface(u32),

    /// The node has been shut down.
    #[error("node has been shut down")]
    ShutDown,
}

/// Reasons a wire message is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Fewer bytes than a flooding message occupies.
    #[error("truncated message: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Extra bytes after the flooding message.
    #[error("trailing bytes: expected {expected} bytes, got {actual}")]
    TrailingBytes { expected: usize, actual: usize },

    /// A coordinate is NaN or infinite.
    #[error("non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },
}
