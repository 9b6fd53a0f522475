//! Error types for dvhop-geometry.

use thiserror::Error;

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

/// Reasons a position cannot be computed from a set of references.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    /// Two references share (almost) the same position.
    #[error("reference points coincide (separation {separation})")]
    CoincidentReferences { separation: f64 },

    /// The three references lie on one line, so the frame has no second axis.
    #[error("reference points are colinear (offset {offset})")]
    CollinearReferences { offset: f64 },

    /// The average hop count is zero or negative, so no hop size exists.
    #[error("average hop count must be positive, got {0}")]
    NonPositiveHops(f64),

    /// An input or intermediate value was NaN or infinite.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}
