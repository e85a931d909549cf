//! Error types for the metrics engine.

use thiserror::Error;

/// Contract violations raised by the metric functions.
///
/// All of them are detected before any convolution runs and are returned to
/// the caller as-is; there is nothing to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    /// The two inputs (or an input and its window) disagree in shape.
    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: [usize; 4], right: [usize; 4] },

    /// Window size is zero or even, so no center tap exists.
    #[error("window size must be a positive odd integer, got {0}")]
    InvalidWindowSize(usize),

    /// Window does not fit inside the spatial dimensions of the image.
    #[error("window size {window_size} exceeds image dimensions {height}x{width}")]
    WindowTooLarge {
        window_size: usize,
        height: usize,
        width: usize,
    },
}

pub type Result<T> = std::result::Result<T, MetricError>;
