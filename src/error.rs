//! Error types for background replacement operations

use thiserror::Error;

/// Result type alias for background replacement operations
pub type Result<T> = std::result::Result<T, BgSwapError>;

/// Error types for the matting-and-compositing pipeline
///
/// The variants separate retryable capability failures (`Extraction`) from
/// non-retryable input problems (`Decode`, `Format`) so callers can react
/// per kind instead of pattern-matching message strings.
#[derive(Error, Debug)]
pub enum BgSwapError {
    /// Input bytes did not decode as a raster image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Segmentation capability failure (network, auth, non-success status,
    /// malformed response)
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Channel or dimension mismatch between matte components
    #[error("Format error: {0}")]
    Format(String),

    /// Internal compositing invariant violation (should be unreachable)
    #[error("Composite error: {0}")]
    Composite(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors (local backend)
    #[error("Model error: {0}")]
    Model(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors while producing output artifacts
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl BgSwapError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new extraction error
    pub fn extraction<S: Into<String>>(msg: S) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create a new format error
    pub fn format_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::Format(msg.into())
    }

    /// Create a new composite invariant error
    pub fn composite<S: Into<String>>(msg: S) -> Self {
        Self::Composite(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create an extraction error from a non-success service response,
    /// carrying the status and body for diagnostics
    pub fn service_status(status: u16, body: &str) -> Self {
        Self::Extraction(format!(
            "segmentation service returned status {}: {}",
            status,
            body.trim()
        ))
    }

    /// Create a decode error with source context
    pub fn decode_failure(context: &str, error: &image::ImageError) -> Self {
        Self::Decode(format!("{}: {}", context, error))
    }

    /// Create a configuration error with the valid range spelled out
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Whether this failure came from the external segmentation capability
    /// and may succeed on retry
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Extraction(_))
    }
}
