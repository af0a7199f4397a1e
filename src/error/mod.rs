//! Error types for the multiband image compression library.

use thiserror::Error;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, HyperspecError>;

/// Main error type for the multiband image compression library.
#[derive(Error, Debug)]
pub enum HyperspecError {
    /// A compression parameter violates its documented bounds.
    #[error("parameter out of range: {0}")]
    ParameterOutOfRange(String),

    /// An input sample falls outside the configured dynamic range.
    #[error("sample out of range: {0}")]
    SampleOutOfRange(String),

    /// The code stream ended mid-codeword or mid-literal during decoding.
    #[error("truncated code stream: {0}")]
    TruncatedStream(String),

    /// A unary prefix ran past the configured length limit without a
    /// terminating zero.
    #[error("oversized unary prefix: {0}")]
    OversizedUnary(String),

    /// Declared dimensions do not match the available sample data.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Round-trip verification failed.
    #[error("verification failed: {0}")]
    Verification(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<toml::de::Error> for HyperspecError {
    fn from(err: toml::de::Error) -> Self {
        HyperspecError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HyperspecError {
    fn from(err: toml::ser::Error) -> Self {
        HyperspecError::Config(err.to_string())
    }
}
