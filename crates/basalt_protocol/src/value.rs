//! Decoded CQL column values.

use std::hash::{Hash, Hasher};
use std::net::IpAddr;

/// A single decoded column value.
///
/// One integer variant carries `int`, `bigint`, `counter` and `timestamp`
/// columns; the per-type validators enforce the narrower windows. `List`
/// carries both `list` and `set` columns, which share a wire shape. `Null`
/// marks an absent cell; the wire-level `-1` length sentinel is translated
/// at the frame and column layers.
#[derive(Debug, Clone)]
pub enum CqlValue {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Canonical 8-4-4-4-12 lowercase hex form.
    Uuid(String),
    Varint(i128),
    Decimal { unscaled: i128, scale: i32 },
    Inet(IpAddr),
    List(Vec<CqlValue>),
    Map(Vec<(CqlValue, CqlValue)>),
}

// Floats compare and hash by bit pattern so values can key row maps.
impl PartialEq for CqlValue {
    fn eq(&self, other: &Self) -> bool {
        use CqlValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Text(a), Text(b)) => a == b,
            (Blob(a), Blob(b)) => a == b,
            (Uuid(a), Uuid(b)) => a == b,
            (Varint(a), Varint(b)) => a == b,
            (
                Decimal { unscaled: a, scale: sa },
                Decimal { unscaled: b, scale: sb },
            ) => a == b && sa == sb,
            (Inet(a), Inet(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CqlValue {}

impl Hash for CqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CqlValue::Null => {}
            CqlValue::Boolean(b) => b.hash(state),
            CqlValue::Int(i) => i.hash(state),
            CqlValue::Float(f) => f.to_bits().hash(state),
            CqlValue::Double(f) => f.to_bits().hash(state),
            CqlValue::Text(s) | CqlValue::Uuid(s) => s.hash(state),
            CqlValue::Blob(b) => b.hash(state),
            CqlValue::Varint(v) => v.hash(state),
            CqlValue::Decimal { unscaled, scale } => {
                unscaled.hash(state);
                scale.hash(state);
            }
            CqlValue::Inet(addr) => addr.hash(state),
            CqlValue::List(items) => items.hash(state),
            CqlValue::Map(pairs) => pairs.hash(state),
        }
    }
}

impl CqlValue {
    /// Whether this value is the absent marker.
    pub fn is_null(&self) -> bool {
        matches!(self, CqlValue::Null)
    }
}
