//! Error types for the CQL codec.

use thiserror::Error;

/// Convenience alias for `Result<T, CodecError>`.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors that can occur while encoding or decoding CQL frames and values.
///
/// A partial frame is not an error: [`Frame::parse`](crate::Frame::parse)
/// reports it as `Ok(None)` and leaves the input untouched.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("Invalid UTF-8 in {field}: {source}")]
    InvalidUtf8 {
        field: &'static str,
        source: std::string::FromUtf8Error,
    },

    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Unknown type code: 0x{0:04x}")]
    UnknownTypeCode(u16),

    #[error("Expected {expected} values, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Cannot encode column {column}: {reason}")]
    Encode { column: String, reason: String },

    #[error("Invalid value at row {row}, column {column}: {reason}")]
    RowValidation {
        row: usize,
        column: String,
        reason: String,
    },

    #[error("No such row: {0}")]
    NoSuchRow(usize),

    #[error("No such column: {0}")]
    NoSuchColumn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
