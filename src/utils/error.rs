//! Error types for the fine-tuning pipeline.
//!
//! Uses thiserror for ergonomic error definitions. Every failure is
//! fatal for the run: there are no retries and no partial-epoch
//! recovery.

use thiserror::Error;

/// Main error type for fine-tuning operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// Error with dataset layout or contents
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error with model assembly or weights
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Specialized Result type for fine-tuning operations
pub type Result<T> = std::result::Result<T, Error>;
