//! Engine error types

use thiserror::Error;

/// Errors surfaced by the rendering engine
///
/// Pointer, scroll and frame callbacks never produce these; they only come
/// out of construction and export.
#[derive(Error, Debug)]
pub enum WaveError {
    /// Host container could not be resolved at construction
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// Export requested before any tile has been drawn
    #[error("No waveform data has been rendered yet")]
    NoData,

    /// Export MIME type is not one we can encode
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Encoding a tile raster failed
    #[error("Failed to encode tile image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Result type for engine operations
pub type WaveResult<T> = Result<T, WaveError>;
