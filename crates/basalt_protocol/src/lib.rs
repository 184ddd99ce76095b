//! Wire-protocol codec for the Cassandra CQL v1/v2 native binary protocol.
//!
//! This crate is the layer between raw socket bytes and structured values:
//! a framed message buffer with typed read/write primitives ([`Frame`]),
//! message header assembly and parsing ([`FrameHeader`]), a per-type
//! registry of value codecs ([`CqlType`]/[`CqlValue`]), column metadata
//! with short-name resolution ([`ColumnMeta`]) and decoded result sets
//! ([`CqlResult`]). It is not a driver: connection pooling, retries and
//! statement routing live elsewhere.

pub mod error;
pub mod frame;
pub mod meta;
pub mod opcode;
pub mod result;
pub mod types;
pub mod value;

pub use error::{CodecError, Result};
pub use frame::{Frame, FrameHeader, ProtocolVersion};
pub use meta::{ColumnMeta, ColumnSpec};
pub use opcode::{Consistency, Opcode};
pub use result::CqlResult;
pub use types::CqlType;
pub use value::CqlValue;
