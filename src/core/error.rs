//! Error types for formula replacement.
//!
//! Per-group failures (bad geometry, rendering trouble, an unavailable or
//! misbehaving model) are recoverable: the replacer logs them and restores the
//! original blocks. Only [`RecognitionError::ResourceExhausted`] is fatal and
//! propagates to the caller.

use std::time::Duration;

use thiserror::Error;

use crate::core::geometry::BBox;

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("recognition model unavailable: {0}")]
    Unavailable(String),

    #[error("recognition timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed recognition output: {0}")]
    MalformedOutput(String),

    #[error("recognition resources exhausted: {0}")]
    ResourceExhausted(String),
}

#[derive(Error, Debug)]
pub enum FormulaError {
    #[error("degenerate region {bbox:?} on page {pnum}")]
    InvalidGeometry { pnum: usize, bbox: BBox },

    #[error("failed to render page {pnum}: {message}")]
    Render { pnum: usize, message: String },

    #[error("failed to mask region: {0}")]
    Mask(String),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl FormulaError {
    /// Errors that must stop the whole run instead of falling back to the
    /// original blocks.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FormulaError::Recognition(RecognitionError::ResourceExhausted(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, FormulaError>;
