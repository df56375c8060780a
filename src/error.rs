//! Error types for the wotermark crate.

/// Errors that can occur while resizing, watermarking, or re-encoding images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The image bytes are not in a supported format or are corrupt.
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),

    /// The composed image could not be encoded back to bytes.
    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),

    /// An image or target box has a zero dimension.
    #[error("invalid dimensions {width}x{height}: width and height must be positive")]
    InvalidDimensions {
        /// Offending width in pixels.
        width: u32,
        /// Offending height in pixels.
        height: u32,
    },

    /// The watermark configuration is missing, malformed, or out of range.
    #[error("invalid watermark configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
