use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the spectral analysis core.
///
/// Every variant is fatal to the call that produced it; nothing in the core
/// retries. Non-finite asymmetry values are a normal output, not an error.
#[derive(Debug, Error)]
pub enum SpectraError {
    /// Wrong dimensionality or mismatched lengths.
    #[error("shape error: {0}")]
    Shape(String),

    /// Per-slice volumes disagree on spatial or spectral shape.
    #[error("shape mismatch in {path}: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        path: PathBuf,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Invalid or self-contradictory parameters.
    #[error("configuration error: {0}")]
    Config(String),

    /// An N-D array (N > 2) was given without a spatial mask to flatten it.
    #[error("a spatial mask is required to reduce a {0}-D array to a spectral matrix")]
    MaskRequired(usize),

    /// Degenerate statistical input, e.g. a zero-variance mask region.
    #[error("denoising failed: {0}")]
    Denoise(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("unsupported volume file extension: {0}")]
    UnsupportedExtension(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure inside the volume codec.
    #[error("volume codec error on {path}: {message}")]
    Volume { path: PathBuf, message: String },
}

pub type Result<T, E = SpectraError> = std::result::Result<T, E>;
