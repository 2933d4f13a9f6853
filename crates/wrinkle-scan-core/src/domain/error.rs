//! Error taxonomy for the analysis pipeline.

use thiserror::Error;

/// Failures the analysis pipeline distinguishes for callers.
///
/// The HTTP layer maps the first two variants to 400 responses with the
/// exact message text; anything else is an internal error.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The uploaded bytes could not be decoded as an image.
    #[error("Invalid image format")]
    InvalidImage,

    /// No face was found, so no regions could be extracted.
    #[error("No facial regions detected")]
    NoRegionsDetected,

    /// An unexpected failure inside the pipeline.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
