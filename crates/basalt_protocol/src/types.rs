//! Per-type registry of CQL column value codecs.
//!
//! Each [`CqlType`] descriptor exposes three total operations: `validate`
//! rejects a candidate value with a human-readable reason, `encode` turns an
//! accepted value into its CQL byte form, and `decode` is the inverse on
//! well-formed input. The parametric containers delegate element-wise.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{CodecError, Result};
use crate::frame::Frame;
use crate::value::CqlValue;

// ── Type codes (2-byte, as read from result metadata) ────────────────────

pub const TYPE_CUSTOM: u16 = 0x0000;
pub const TYPE_ASCII: u16 = 0x0001;
pub const TYPE_BIGINT: u16 = 0x0002;
pub const TYPE_BLOB: u16 = 0x0003;
pub const TYPE_BOOLEAN: u16 = 0x0004;
pub const TYPE_COUNTER: u16 = 0x0005;
pub const TYPE_DECIMAL: u16 = 0x0006;
pub const TYPE_DOUBLE: u16 = 0x0007;
pub const TYPE_FLOAT: u16 = 0x0008;
pub const TYPE_INT: u16 = 0x0009;
pub const TYPE_TEXT: u16 = 0x000A;
pub const TYPE_TIMESTAMP: u16 = 0x000B;
pub const TYPE_UUID: u16 = 0x000C;
pub const TYPE_VARCHAR: u16 = 0x000D;
pub const TYPE_VARINT: u16 = 0x000E;
pub const TYPE_TIMEUUID: u16 = 0x000F;
pub const TYPE_INET: u16 = 0x0010;
pub const TYPE_LIST: u16 = 0x0020;
pub const TYPE_MAP: u16 = 0x0021;
pub const TYPE_SET: u16 = 0x0022;

/// Widest varint/decimal-unscaled width accepted on the wire.
const MAX_VARINT_BYTES: usize = 16;

/// A CQL column type descriptor.
///
/// The parametric variants own their inner descriptors; there are no
/// cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CqlType {
    Custom(String),
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Text,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    Timeuuid,
    Inet,
    List(Box<CqlType>),
    Map(Box<CqlType>, Box<CqlType>),
    Set(Box<CqlType>),
}

impl CqlType {
    /// Read a type descriptor from a frame: a 2-byte code, recursively
    /// followed by parameter types for list/map/set and a class name for
    /// custom.
    pub fn from_frame(frame: &mut Frame) -> Result<Self> {
        let code = frame.read_short()?;
        Ok(match code {
            TYPE_CUSTOM => CqlType::Custom(frame.read_string()?),
            TYPE_ASCII => CqlType::Ascii,
            TYPE_BIGINT => CqlType::Bigint,
            TYPE_BLOB => CqlType::Blob,
            TYPE_BOOLEAN => CqlType::Boolean,
            TYPE_COUNTER => CqlType::Counter,
            TYPE_DECIMAL => CqlType::Decimal,
            TYPE_DOUBLE => CqlType::Double,
            TYPE_FLOAT => CqlType::Float,
            TYPE_INT => CqlType::Int,
            TYPE_TEXT => CqlType::Text,
            TYPE_TIMESTAMP => CqlType::Timestamp,
            TYPE_UUID => CqlType::Uuid,
            TYPE_VARCHAR => CqlType::Varchar,
            TYPE_VARINT => CqlType::Varint,
            TYPE_TIMEUUID => CqlType::Timeuuid,
            TYPE_INET => CqlType::Inet,
            TYPE_LIST => CqlType::List(Box::new(Self::from_frame(frame)?)),
            TYPE_MAP => {
                let key = Box::new(Self::from_frame(frame)?);
                let value = Box::new(Self::from_frame(frame)?);
                CqlType::Map(key, value)
            }
            TYPE_SET => CqlType::Set(Box::new(Self::from_frame(frame)?)),
            other => return Err(CodecError::UnknownTypeCode(other)),
        })
    }

    /// Write this descriptor in the same shape `from_frame` reads.
    pub fn write(&self, frame: &mut Frame) {
        frame.write_short(self.type_code());
        match self {
            CqlType::Custom(class) => frame.write_string(class),
            CqlType::List(inner) | CqlType::Set(inner) => inner.write(frame),
            CqlType::Map(key, value) => {
                key.write(frame);
                value.write(frame);
            }
            _ => {}
        }
    }

    pub fn type_code(&self) -> u16 {
        match self {
            CqlType::Custom(_) => TYPE_CUSTOM,
            CqlType::Ascii => TYPE_ASCII,
            CqlType::Bigint => TYPE_BIGINT,
            CqlType::Blob => TYPE_BLOB,
            CqlType::Boolean => TYPE_BOOLEAN,
            CqlType::Counter => TYPE_COUNTER,
            CqlType::Decimal => TYPE_DECIMAL,
            CqlType::Double => TYPE_DOUBLE,
            CqlType::Float => TYPE_FLOAT,
            CqlType::Int => TYPE_INT,
            CqlType::Text => TYPE_TEXT,
            CqlType::Timestamp => TYPE_TIMESTAMP,
            CqlType::Uuid => TYPE_UUID,
            CqlType::Varchar => TYPE_VARCHAR,
            CqlType::Varint => TYPE_VARINT,
            CqlType::Timeuuid => TYPE_TIMEUUID,
            CqlType::Inet => TYPE_INET,
            CqlType::List(_) => TYPE_LIST,
            CqlType::Map(_, _) => TYPE_MAP,
            CqlType::Set(_) => TYPE_SET,
        }
    }

    /// The textual name, with parametric types rendered as `list<int>`,
    /// `map<text,int>` and so on.
    pub fn name(&self) -> String {
        match self {
            CqlType::Custom(class) => class.clone(),
            CqlType::Ascii => "ascii".into(),
            CqlType::Bigint => "bigint".into(),
            CqlType::Blob => "blob".into(),
            CqlType::Boolean => "boolean".into(),
            CqlType::Counter => "counter".into(),
            CqlType::Decimal => "decimal".into(),
            CqlType::Double => "double".into(),
            CqlType::Float => "float".into(),
            CqlType::Int => "int".into(),
            CqlType::Text => "text".into(),
            CqlType::Timestamp => "timestamp".into(),
            CqlType::Uuid => "uuid".into(),
            CqlType::Varchar => "varchar".into(),
            CqlType::Varint => "varint".into(),
            CqlType::Timeuuid => "timeuuid".into(),
            CqlType::Inet => "inet".into(),
            CqlType::List(inner) => format!("list<{}>", inner.name()),
            CqlType::Map(key, value) => format!("map<{},{}>", key.name(), value.name()),
            CqlType::Set(inner) => format!("set<{}>", inner.name()),
        }
    }

    /// Resolve a textual type name, including nested parametric syntax
    /// such as `map<text,list<int>>`.
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if let Some(inner) = strip_param(name, "list") {
            return Ok(CqlType::List(Box::new(Self::parse(inner)?)));
        }
        if let Some(inner) = strip_param(name, "set") {
            return Ok(CqlType::Set(Box::new(Self::parse(inner)?)));
        }
        if let Some(inner) = strip_param(name, "map") {
            let (key, value) = split_map_params(inner)?;
            return Ok(CqlType::Map(
                Box::new(Self::parse(key)?),
                Box::new(Self::parse(value)?),
            ));
        }
        Ok(match name.to_ascii_lowercase().as_str() {
            "ascii" => CqlType::Ascii,
            "bigint" => CqlType::Bigint,
            "blob" => CqlType::Blob,
            "boolean" => CqlType::Boolean,
            "counter" => CqlType::Counter,
            "decimal" => CqlType::Decimal,
            "double" => CqlType::Double,
            "float" => CqlType::Float,
            "int" => CqlType::Int,
            "text" => CqlType::Text,
            "timestamp" => CqlType::Timestamp,
            "uuid" => CqlType::Uuid,
            "varchar" => CqlType::Varchar,
            "varint" => CqlType::Varint,
            "timeuuid" => CqlType::Timeuuid,
            "inet" => CqlType::Inet,
            other => {
                return Err(CodecError::Malformed(format!("unknown type name: {other}")))
            }
        })
    }

    // ── Value operations ─────────────────────────────────────────────────

    /// Check a candidate value against this type. Returns `None` when the
    /// value is acceptable, otherwise the reason it was rejected.
    pub fn validate(&self, value: &CqlValue) -> Option<String> {
        match (self, value) {
            (_, CqlValue::Null) => Some("null value".into()),
            (CqlType::Ascii, CqlValue::Text(s)) => s
                .chars()
                .find(|c| !c.is_ascii())
                .map(|c| format!("non-ASCII character {c:?}")),
            (CqlType::Text | CqlType::Varchar, CqlValue::Text(_)) => None,
            (CqlType::Blob | CqlType::Custom(_), CqlValue::Blob(_)) => None,
            (CqlType::Boolean, CqlValue::Boolean(_)) => None,
            (CqlType::Int, CqlValue::Int(i)) => {
                if *i < i64::from(i32::MIN) || *i > i64::from(i32::MAX) {
                    Some(format!("{i} out of range for int"))
                } else {
                    None
                }
            }
            (CqlType::Bigint | CqlType::Counter | CqlType::Timestamp, CqlValue::Int(_)) => {
                None
            }
            (CqlType::Float, CqlValue::Float(_)) => None,
            (CqlType::Double, CqlValue::Double(_)) => None,
            (CqlType::Varint, CqlValue::Varint(_)) => None,
            (CqlType::Decimal, CqlValue::Decimal { .. }) => None,
            (CqlType::Uuid | CqlType::Timeuuid, CqlValue::Uuid(s)) => {
                if parse_uuid(s).is_some() {
                    None
                } else {
                    Some(format!("not a valid uuid: {s:?}"))
                }
            }
            (CqlType::Inet, CqlValue::Inet(_)) => None,
            (CqlType::List(inner) | CqlType::Set(inner), CqlValue::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if let Some(reason) = inner.validate(item) {
                        return Some(format!("element {i}: {reason}"));
                    }
                }
                None
            }
            (CqlType::Map(key_type, value_type), CqlValue::Map(pairs)) => {
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if let Some(reason) = key_type.validate(key) {
                        return Some(format!("key {i}: {reason}"));
                    }
                    if let Some(reason) = value_type.validate(value) {
                        return Some(format!("value {i}: {reason}"));
                    }
                }
                None
            }
            _ => Some(format!("expected a {} value", self.name())),
        }
    }

    /// Encode an accepted value into its CQL byte form.
    ///
    /// Pre-condition: `validate(value)` returned `None`.
    pub fn encode(&self, value: &CqlValue) -> Result<Vec<u8>> {
        match (self, value) {
            (CqlType::Ascii | CqlType::Text | CqlType::Varchar, CqlValue::Text(s)) => {
                Ok(s.as_bytes().to_vec())
            }
            (CqlType::Blob | CqlType::Custom(_), CqlValue::Blob(b)) => Ok(b.clone()),
            (CqlType::Boolean, CqlValue::Boolean(b)) => Ok(vec![u8::from(*b)]),
            (CqlType::Int, CqlValue::Int(i)) => {
                let narrow = i32::try_from(*i).map_err(|_| {
                    CodecError::Malformed(format!("{i} out of range for int"))
                })?;
                Ok(narrow.to_be_bytes().to_vec())
            }
            (CqlType::Bigint | CqlType::Counter | CqlType::Timestamp, CqlValue::Int(i)) => {
                Ok(i.to_be_bytes().to_vec())
            }
            (CqlType::Float, CqlValue::Float(f)) => Ok(f.to_be_bytes().to_vec()),
            (CqlType::Double, CqlValue::Double(f)) => Ok(f.to_be_bytes().to_vec()),
            (CqlType::Varint, CqlValue::Varint(v)) => Ok(encode_varint(*v)),
            (CqlType::Decimal, CqlValue::Decimal { unscaled, scale }) => {
                let mut out = scale.to_be_bytes().to_vec();
                out.extend_from_slice(&encode_varint(*unscaled));
                Ok(out)
            }
            (CqlType::Uuid | CqlType::Timeuuid, CqlValue::Uuid(s)) => parse_uuid(s)
                .map(|b| b.to_vec())
                .ok_or_else(|| CodecError::Malformed(format!("invalid uuid: {s:?}"))),
            (CqlType::Inet, CqlValue::Inet(addr)) => Ok(match addr {
                IpAddr::V4(ip) => ip.octets().to_vec(),
                IpAddr::V6(ip) => ip.octets().to_vec(),
            }),
            (CqlType::List(inner) | CqlType::Set(inner), CqlValue::List(items)) => {
                let mut f = Frame::new();
                f.write_short(items.len() as u16);
                for item in items {
                    f.write_short_bytes(&inner.encode(item)?);
                }
                Ok(f.into_bytes().to_vec())
            }
            (CqlType::Map(key_type, value_type), CqlValue::Map(pairs)) => {
                let mut f = Frame::new();
                f.write_short(pairs.len() as u16);
                for (key, value) in pairs {
                    f.write_short_bytes(&key_type.encode(key)?);
                    f.write_short_bytes(&value_type.encode(value)?);
                }
                Ok(f.into_bytes().to_vec())
            }
            _ => Err(CodecError::Malformed(format!(
                "cannot encode value as {}",
                self.name()
            ))),
        }
    }

    /// Decode a server-provided byte string into a value.
    pub fn decode(&self, bytes: &[u8]) -> Result<CqlValue> {
        match self {
            CqlType::Ascii | CqlType::Text | CqlType::Varchar => {
                String::from_utf8(bytes.to_vec())
                    .map(CqlValue::Text)
                    .map_err(|source| CodecError::InvalidUtf8 { field: "text value", source })
            }
            CqlType::Blob | CqlType::Custom(_) => Ok(CqlValue::Blob(bytes.to_vec())),
            CqlType::Boolean => {
                expect_len(bytes, 1, "boolean")?;
                Ok(CqlValue::Boolean(bytes[0] != 0))
            }
            CqlType::Int => {
                expect_len(bytes, 4, "int")?;
                let v = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Ok(CqlValue::Int(i64::from(v)))
            }
            CqlType::Bigint | CqlType::Counter | CqlType::Timestamp => {
                expect_len(bytes, 8, "bigint")?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(bytes);
                Ok(CqlValue::Int(i64::from_be_bytes(arr)))
            }
            CqlType::Float => {
                expect_len(bytes, 4, "float")?;
                Ok(CqlValue::Float(f32::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ])))
            }
            CqlType::Double => {
                expect_len(bytes, 8, "double")?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(bytes);
                Ok(CqlValue::Double(f64::from_be_bytes(arr)))
            }
            CqlType::Varint => Ok(CqlValue::Varint(decode_varint(bytes)?)),
            CqlType::Decimal => {
                if bytes.len() < 4 {
                    return Err(CodecError::Malformed(format!(
                        "decimal value must carry a 4-byte scale, got {} bytes",
                        bytes.len()
                    )));
                }
                let scale = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let unscaled = decode_varint(&bytes[4..])?;
                Ok(CqlValue::Decimal { unscaled, scale })
            }
            CqlType::Uuid | CqlType::Timeuuid => {
                expect_len(bytes, 16, "uuid")?;
                let mut arr = [0u8; 16];
                arr.copy_from_slice(bytes);
                Ok(CqlValue::Uuid(format_uuid(&arr)))
            }
            CqlType::Inet => match bytes.len() {
                4 => {
                    let mut octets = [0u8; 4];
                    octets.copy_from_slice(bytes);
                    Ok(CqlValue::Inet(IpAddr::V4(Ipv4Addr::from(octets))))
                }
                16 => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(bytes);
                    Ok(CqlValue::Inet(IpAddr::V6(Ipv6Addr::from(octets))))
                }
                other => Err(CodecError::Malformed(format!(
                    "invalid inet address length: {other}"
                ))),
            },
            CqlType::List(inner) | CqlType::Set(inner) => {
                let mut f = Frame::from_bytes(bytes);
                let n = f.read_short()? as usize;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    let raw = f.read_short_bytes()?;
                    items.push(inner.decode(&raw)?);
                }
                Ok(CqlValue::List(items))
            }
            CqlType::Map(key_type, value_type) => {
                let mut f = Frame::from_bytes(bytes);
                let n = f.read_short()? as usize;
                let mut pairs = Vec::with_capacity(n);
                for _ in 0..n {
                    let key = key_type.decode(&f.read_short_bytes()?)?;
                    let value = value_type.decode(&f.read_short_bytes()?)?;
                    pairs.push((key, value));
                }
                Ok(CqlValue::Map(pairs))
            }
        }
    }
}

fn expect_len(bytes: &[u8], want: usize, what: &str) -> Result<()> {
    if bytes.len() != want {
        return Err(CodecError::Malformed(format!(
            "{what} value must be {want} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

// ── Varint helpers ───────────────────────────────────────────────────────

/// Minimal two's-complement big-endian encoding. The most significant bit
/// of the first byte carries the sign.
fn encode_varint(v: i128) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let lead = bytes[start];
        let next_high = bytes[start + 1] & 0x80 != 0;
        if (lead == 0x00 && !next_high) || (lead == 0xff && next_high) {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

/// Inverse of [`encode_varint`]. A zero-length input decodes to zero.
fn decode_varint(bytes: &[u8]) -> Result<i128> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > MAX_VARINT_BYTES {
        return Err(CodecError::Malformed(format!(
            "varint spans {} bytes, at most {MAX_VARINT_BYTES} supported",
            bytes.len()
        )));
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xff } else { 0x00 };
    let mut arr = [fill; 16];
    arr[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(arr))
}

// ── UUID helpers ─────────────────────────────────────────────────────────

fn format_uuid(b: &[u8; 16]) -> String {
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
    )
}

/// Accepts the canonical hyphenated form and bare 32-digit hex.
fn parse_uuid(s: &str) -> Option<[u8; 16]> {
    let hex: String = s.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut out = [0u8; 16];
    for (i, chunk) in out.iter_mut().enumerate() {
        *chunk = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16).ok()?;
    }
    Some(out)
}

// ── Name parsing helpers ─────────────────────────────────────────────────

fn strip_param<'a>(name: &'a str, kind: &str) -> Option<&'a str> {
    name.strip_prefix(kind)?
        .strip_prefix('<')?
        .strip_suffix('>')
}

/// Split `k,v` at the top-level comma, accounting for nested generics.
fn split_map_params(s: &str) -> Result<(&str, &str)> {
    let mut depth = 0usize;
    for (i, ch) in s.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Ok((&s[..i], &s[i + 1..])),
            _ => {}
        }
    }
    Err(CodecError::Malformed(format!(
        "map type needs two parameters: {s}"
    )))
}
