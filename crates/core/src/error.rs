//! Error types for the plot layout engine.

use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while laying out field plots.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Synthetic-grid layout needs a boundary and none was supplied.
    #[error("missing boundary: draw the area containing the plots before generating a layout")]
    MissingBoundary,

    /// Row/column inference produced no usable grid.
    #[error("degenerate inference: {0}")]
    DegenerateInference(String),

    /// A load was replaced by a newer one before it completed.
    #[error("load of study '{study}' (generation {generation}) was superseded")]
    Superseded {
        /// Study identifier of the superseded load.
        study: String,
        /// Generation number the load was started with.
        generation: u64,
    },

    /// A Voronoi or overlay step produced no cell for an input.
    #[error("partition geometry failure: {0}")]
    PartitionGeometry(String),

    /// Geometry that violates the polygon contract.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Caller supplied an argument outside the accepted domain.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The observation unit source failed.
    #[error("unit source error: {0}")]
    Source(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error marks a cancelled (superseded) load rather than a data error.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Superseded { .. })
    }

    /// Returns true if the caller cannot recover by retrying with the same inputs.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::MissingBoundary | Error::InvalidInput(_))
    }
}
