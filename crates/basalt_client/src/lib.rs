//! Minimal blocking client for the CQL native protocol.
//!
//! Exists to exercise and demonstrate the `basalt_protocol` codec: one
//! connection, one request in flight, synchronous I/O. No pooling, no
//! retries, no routing.

pub mod config;
pub mod connection;
pub mod error;

pub use config::Config;
pub use connection::{Connection, Prepared, QueryOutcome};
pub use error::{ClientError, Result};
