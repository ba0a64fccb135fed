mod circle;
mod laser;
mod plane;

pub use circle::*;
pub use laser::*;
pub use plane::*;

/// Error types for the fitting routines.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    /// Not enough points to constrain the model.
    #[error("Insufficient points: got {actual}, need at least {required}")]
    InsufficientPoints {
        /// Minimum number of points required.
        required: usize,
        /// Number of points given.
        actual: usize,
    },

    /// The points do not span the dimensions the model needs.
    #[error("Degenerate point configuration: {0}")]
    Degenerate(&'static str),

    /// RANSAC could not find a hypothesis supported by enough points.
    #[error("No consensus found: best hypothesis has {inliers} inliers")]
    NoConsensus {
        /// Number of inliers of the best hypothesis.
        inliers: usize,
    },
}
