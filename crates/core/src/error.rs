//! Error types for table-of-contents generation.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while laying out or assembling a table of contents.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied input was rejected before any I/O took place.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A single slide could not be rasterized.
    #[error("Failed to render slide {slide}: {reason}")]
    Rendering {
        /// 1-based slide number that failed.
        slide: usize,
        /// Why the renderer gave up.
        reason: String,
    },

    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or writing error (for PPTX).
    #[error("XML error: {0}")]
    XmlError(String),

    /// The package is missing a part or a relationship it should have.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// Encoding a thumbnail image failed.
    #[error("Image error: {0}")]
    ImageError(String),
}
