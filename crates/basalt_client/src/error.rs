//! Error types for the minimal client.

use thiserror::Error;

use basalt_protocol::CodecError;

/// Convenience alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Unexpected opcode, wrong response version, unknown authenticator,
    /// unknown result kind.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A server-returned ERROR frame.
    #[error("Server error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
