//! Framed message buffer for the CQL native protocol.
//!
//! All multi-byte integers are big-endian. Every message is framed as an
//! 8-byte header `[version][flags][stream][opcode][length: u32 BE]`
//! followed by exactly `length` body bytes.

use std::collections::HashMap;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CodecError, Result};

// ── Header constants ─────────────────────────────────────────────────────

/// Frame header size: version + flags + stream + opcode + u32 length.
pub const HEADER_SIZE: usize = 8;

/// Maximum frame body size: 64 MiB.
pub const MAX_BODY_SIZE: u32 = 64 * 1024 * 1024;

/// Frame header flag bits.
pub const FLAG_COMPRESS: u8 = 0x01;
pub const FLAG_TRACE: u8 = 0x02;

/// Protocol version selector.
///
/// Request frames carry 0x01/0x02 in the version byte, responses 0x81/0x82.
/// Column-metadata parsing branches on the version; every other primitive
/// is version-invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    #[default]
    V1,
    V2,
}

impl ProtocolVersion {
    pub fn request(self) -> u8 {
        match self {
            ProtocolVersion::V1 => 0x01,
            ProtocolVersion::V2 => 0x02,
        }
    }

    pub fn response(self) -> u8 {
        self.request() | 0x80
    }
}

/// The five fixed fields of a message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub flags: u8,
    pub stream: u8,
    pub opcode: u8,
    pub length: u32,
}

// ── Frame buffer ─────────────────────────────────────────────────────────

/// A mutable byte buffer with typed pack/unpack for every CQL wire
/// primitive.
///
/// Writes append at the end; reads consume from the front. Every unpack
/// fails with [`CodecError::Truncated`] when fewer bytes remain than the
/// primitive requires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    buf: BytesMut,
}

impl Frame {
    /// An empty frame.
    pub fn new() -> Self {
        Frame { buf: BytesMut::new() }
    }

    /// A frame initialised with a byte string.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Frame { buf: BytesMut::from(bytes.as_ref()) }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> BytesMut {
        self.buf
    }

    fn ensure(&self, need: usize) -> Result<()> {
        if self.buf.len() < need {
            return Err(CodecError::Truncated {
                expected: need,
                actual: self.buf.len(),
            });
        }
        Ok(())
    }

    fn read_raw(&mut self, n: usize) -> Result<Vec<u8>> {
        self.ensure(n)?;
        Ok(self.buf.split_to(n).to_vec())
    }

    // ── Unpack primitives ────────────────────────────────────────────────

    /// 2 bytes unsigned.
    pub fn read_short(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    /// 4 bytes signed two's complement.
    pub fn read_int(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    /// 8 bytes signed two's complement.
    pub fn read_long(&mut self) -> Result<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    /// Short length prefix, then UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<String> {
        let n = self.read_short()? as usize;
        let raw = self.read_raw(n)?;
        String::from_utf8(raw)
            .map_err(|source| CodecError::InvalidUtf8 { field: "string", source })
    }

    /// Int length prefix, then UTF-8 bytes.
    pub fn read_long_string(&mut self) -> Result<String> {
        let n = self.read_int()?;
        if n < 0 {
            return Err(CodecError::Malformed(format!(
                "negative long string length: {n}"
            )));
        }
        let raw = self.read_raw(n as usize)?;
        String::from_utf8(raw)
            .map_err(|source| CodecError::InvalidUtf8 { field: "long string", source })
    }

    /// 16 raw bytes.
    pub fn read_uuid(&mut self) -> Result<[u8; 16]> {
        self.ensure(16)?;
        let mut out = [0u8; 16];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Short count, then that many strings.
    pub fn read_string_list(&mut self) -> Result<Vec<String>> {
        let n = self.read_short()? as usize;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_string()?);
        }
        Ok(out)
    }

    /// Int length `n`; `n` raw bytes when `n >= 0`, absent when `n == -1`.
    pub fn read_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        let n = self.read_int()?;
        if n == -1 {
            return Ok(None);
        }
        if n < 0 {
            return Err(CodecError::Malformed(format!("negative bytes length: {n}")));
        }
        Ok(Some(self.read_raw(n as usize)?))
    }

    /// Short length prefix, then raw bytes.
    pub fn read_short_bytes(&mut self) -> Result<Vec<u8>> {
        let n = self.read_short()? as usize;
        self.read_raw(n)
    }

    /// 1-byte address length (4 or 16), address bytes, int port.
    pub fn read_inet(&mut self) -> Result<SocketAddr> {
        self.ensure(1)?;
        let len = self.buf.get_u8();
        let ip = match len {
            4 => {
                self.ensure(4)?;
                let mut octets = [0u8; 4];
                self.buf.copy_to_slice(&mut octets);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            16 => {
                self.ensure(16)?;
                let mut octets = [0u8; 16];
                self.buf.copy_to_slice(&mut octets);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            other => {
                return Err(CodecError::Malformed(format!(
                    "invalid inet address length: {other}"
                )))
            }
        };
        let port = self.read_int()?;
        Ok(SocketAddr::new(ip, port as u16))
    }

    /// Short count, then that many (string, string) pairs.
    pub fn read_string_map(&mut self) -> Result<HashMap<String, String>> {
        let n = self.read_short()? as usize;
        let mut out = HashMap::with_capacity(n);
        for _ in 0..n {
            let key = self.read_string()?;
            let value = self.read_string()?;
            out.insert(key, value);
        }
        Ok(out)
    }

    // ── Pack primitives ──────────────────────────────────────────────────

    pub fn write_short(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn write_int(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn write_long(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    pub fn write_string(&mut self, s: &str) {
        self.buf.put_u16(s.len() as u16);
        self.buf.put_slice(s.as_bytes());
    }

    pub fn write_long_string(&mut self, s: &str) {
        self.buf.put_i32(s.len() as i32);
        self.buf.put_slice(s.as_bytes());
    }

    pub fn write_uuid(&mut self, uuid: &[u8; 16]) {
        self.buf.put_slice(uuid);
    }

    pub fn write_string_list(&mut self, items: &[String]) {
        self.buf.put_u16(items.len() as u16);
        for s in items {
            self.write_string(s);
        }
    }

    pub fn write_bytes(&mut self, v: Option<&[u8]>) {
        match v {
            Some(bytes) => {
                self.buf.put_i32(bytes.len() as i32);
                self.buf.put_slice(bytes);
            }
            None => self.buf.put_i32(-1),
        }
    }

    pub fn write_short_bytes(&mut self, v: &[u8]) {
        self.buf.put_u16(v.len() as u16);
        self.buf.put_slice(v);
    }

    pub fn write_inet(&mut self, addr: SocketAddr) {
        match addr.ip() {
            IpAddr::V4(ip) => {
                self.buf.put_u8(4);
                self.buf.put_slice(&ip.octets());
            }
            IpAddr::V6(ip) => {
                self.buf.put_u8(16);
                self.buf.put_slice(&ip.octets());
            }
        }
        self.buf.put_i32(addr.port() as i32);
    }

    /// Keys are emitted in lexicographic order so identical inputs produce
    /// identical bytes regardless of the map's iteration order.
    pub fn write_string_map(&mut self, map: &HashMap<String, String>) {
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        self.buf.put_u16(keys.len() as u16);
        for key in keys {
            self.write_string(key);
            self.write_string(&map[key]);
        }
    }

    // ── Header framing ───────────────────────────────────────────────────

    /// Prepend an 8-byte header to the body and return the full message.
    pub fn into_message(self, version: u8, flags: u8, stream: u8, opcode: u8) -> BytesMut {
        let mut out = BytesMut::with_capacity(HEADER_SIZE + self.buf.len());
        out.put_u8(version);
        out.put_u8(flags);
        out.put_u8(stream);
        out.put_u8(opcode);
        out.put_u32(self.buf.len() as u32);
        out.put_slice(&self.buf);
        out
    }

    /// Try to parse one complete message from the front of `input`.
    ///
    /// Returns `Ok(None)` when fewer bytes than a full frame are present;
    /// nothing is consumed in that case. On success the `8 + length` prefix
    /// is removed and any trailing bytes are left untouched.
    pub fn parse(input: &mut BytesMut) -> Result<Option<(FrameHeader, Frame)>> {
        if input.len() < HEADER_SIZE {
            return Ok(None);
        }
        let length = u32::from_be_bytes([input[4], input[5], input[6], input[7]]);
        if length > MAX_BODY_SIZE {
            return Err(CodecError::FrameTooLarge { size: length, max: MAX_BODY_SIZE });
        }
        let total = HEADER_SIZE + length as usize;
        if input.len() < total {
            return Ok(None);
        }
        let header = FrameHeader {
            version: input[0],
            flags: input[1],
            stream: input[2],
            opcode: input[3],
            length,
        };
        input.advance(HEADER_SIZE);
        let body = input.split_to(length as usize);
        Ok(Some((header, Frame { buf: body })))
    }

    /// Block reading one complete message from `source`.
    ///
    /// Reads exactly 8 header bytes, then exactly `length` body bytes. A
    /// source that closes early surfaces as an IO error.
    pub fn recv(source: &mut impl Read) -> Result<(FrameHeader, Frame)> {
        let mut head = [0u8; HEADER_SIZE];
        source.read_exact(&mut head)?;
        let length = u32::from_be_bytes([head[4], head[5], head[6], head[7]]);
        if length > MAX_BODY_SIZE {
            return Err(CodecError::FrameTooLarge { size: length, max: MAX_BODY_SIZE });
        }
        let mut body = vec![0u8; length as usize];
        source.read_exact(&mut body)?;
        let header = FrameHeader {
            version: head[0],
            flags: head[1],
            stream: head[2],
            opcode: head[3],
            length,
        };
        Ok((header, Frame::from_bytes(&body)))
    }
}
