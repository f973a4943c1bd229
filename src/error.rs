//! Error types for PulsePlane.

use thiserror::Error;

/// Common error type for PulsePlane.
///
/// OTP rejections (wrong code, expired code, resend throttling) are not
/// errors; they are reported as outcomes by [`crate::otp`]. This type covers
/// infrastructure and caller failures only.
#[derive(Error, Debug)]
pub enum PulseError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Hashing a one-time code failed.
    #[error("hash error: {0}")]
    Hash(#[from] crate::otp::HashError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for PulseError {
    fn from(e: sqlx::Error) -> Self {
        PulseError::Database(e.to_string())
    }
}

/// Result type alias for PulsePlane operations.
pub type Result<T> = std::result::Result<T, PulseError>;
