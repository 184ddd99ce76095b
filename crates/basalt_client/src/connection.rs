//! Blocking connection driving the codec over a byte stream.
//!
//! One request in flight at a time; the only suspension point is the
//! blocking read of a response frame. Everything above the socket is a
//! pure in-memory transformation through `basalt_protocol`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;

use tracing::{debug, warn};

use basalt_protocol::frame::FLAG_COMPRESS;
use basalt_protocol::opcode::{
    RESULT_PREPARED, RESULT_ROWS, RESULT_SCHEMA_CHANGE, RESULT_SET_KEYSPACE, RESULT_VOID,
};
use basalt_protocol::{
    ColumnMeta, Consistency, CqlResult, CqlValue, Frame, Opcode, ProtocolVersion,
};

use crate::config::Config;
use crate::error::{ClientError, Result};

const PASSWORD_AUTHENTICATOR: &str = "org.apache.cassandra.auth.PasswordAuthenticator";

/// Stream id used for every request; the client keeps a single request in
/// flight at a time.
const STREAM_ID: u8 = 1;

/// Outcome of a QUERY or EXECUTE round trip.
#[derive(Debug)]
pub enum QueryOutcome {
    Void,
    Rows(CqlResult),
    Keyspace(String),
    SchemaChange {
        change: String,
        keyspace: String,
        table: String,
    },
}

/// A server-side prepared statement: opaque id plus parameter metadata.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub id: Vec<u8>,
    pub params: ColumnMeta,
}

/// A blocking CQL connection over any byte stream.
pub struct Connection<S: Read + Write> {
    stream: S,
    config: Config,
}

impl Connection<TcpStream> {
    /// TCP connect, then run the STARTUP handshake.
    pub fn connect(config: Config) -> Result<Self> {
        let stream = TcpStream::connect(&config.addr)?;
        debug!(addr = %config.addr, "connected");
        let mut conn = Connection::over(stream, config);
        conn.startup()?;
        Ok(conn)
    }
}

impl<S: Read + Write> Connection<S> {
    /// Wrap an established byte stream. The handshake is not run; callers
    /// outside tests want [`Connection::connect`].
    pub fn over(stream: S, config: Config) -> Self {
        Connection { stream, config }
    }

    /// Send one request and block for its response.
    ///
    /// An ERROR response is decoded (int code, string message) and
    /// surfaced as [`ClientError::Server`].
    pub fn send_message(&mut self, opcode: Opcode, body: Frame) -> Result<(Opcode, Frame)> {
        let msg = body.into_message(self.config.version.request(), 0, STREAM_ID, opcode as u8);
        self.stream.write_all(&msg)?;
        self.stream.flush()?;

        let (header, mut frame) = Frame::recv(&mut self.stream)?;
        if header.version != self.config.version.response() {
            return Err(ClientError::Protocol(format!(
                "unexpected response version 0x{:02x}",
                header.version
            )));
        }
        if header.flags & FLAG_COMPRESS != 0 {
            return Err(ClientError::Protocol(
                "compressed response without negotiation".into(),
            ));
        }
        if header.stream != STREAM_ID {
            return Err(ClientError::Protocol(format!(
                "response for stream {} while waiting on {STREAM_ID}",
                header.stream
            )));
        }
        let response = Opcode::from_u8(header.opcode).ok_or_else(|| {
            ClientError::Protocol(format!("unknown opcode 0x{:02x}", header.opcode))
        })?;
        if response == Opcode::Error {
            let code = frame.read_int()?;
            let message = frame.read_string()?;
            warn!(code, %message, "server error");
            return Err(ClientError::Server { code, message });
        }
        Ok((response, frame))
    }

    /// STARTUP handshake, answering a password-authenticator challenge
    /// with CREDENTIALS when the server asks.
    pub fn startup(&mut self) -> Result<()> {
        let mut options = HashMap::new();
        options.insert("CQL_VERSION".to_string(), self.config.cql_version.clone());
        let mut body = Frame::new();
        body.write_string_map(&options);

        let (response, mut frame) = self.send_message(Opcode::Startup, body)?;
        match response {
            Opcode::Ready => {}
            Opcode::Authenticate => {
                let authenticator = frame.read_string()?;
                if authenticator != PASSWORD_AUTHENTICATOR {
                    return Err(ClientError::Protocol(format!(
                        "unknown authenticator: {authenticator}"
                    )));
                }
                let (username, password) = match (&self.config.username, &self.config.password)
                {
                    (Some(u), Some(p)) => (u.clone(), p.clone()),
                    _ => {
                        return Err(ClientError::Protocol(
                            "server requires authentication but no credentials were configured"
                                .into(),
                        ))
                    }
                };
                let mut credentials = HashMap::new();
                credentials.insert("username".to_string(), username);
                credentials.insert("password".to_string(), password);
                let mut body = Frame::new();
                body.write_string_map(&credentials);
                let (response, _) = self.send_message(Opcode::Credentials, body)?;
                if response != Opcode::Ready {
                    return Err(ClientError::Protocol(format!(
                        "expected READY after credentials, got {response:?}"
                    )));
                }
            }
            other => {
                return Err(ClientError::Protocol(format!(
                    "expected READY or AUTHENTICATE, got {other:?}"
                )))
            }
        }
        debug!("startup complete");
        Ok(())
    }

    /// Run one CQL statement.
    pub fn query(&mut self, cql: &str, consistency: Consistency) -> Result<QueryOutcome> {
        debug!(%cql, "query");
        let mut body = Frame::new();
        body.write_long_string(cql);
        body.write_short(consistency as u16);
        let (response, mut frame) = self.send_message(Opcode::Query, body)?;
        if response != Opcode::Result {
            return Err(ClientError::Protocol(format!(
                "expected RESULT, got {response:?}"
            )));
        }
        self.decode_result(&mut frame)
    }

    /// Parse a statement server-side, returning its id and parameter
    /// metadata.
    pub fn prepare(&mut self, cql: &str) -> Result<Prepared> {
        debug!(%cql, "prepare");
        let mut body = Frame::new();
        body.write_long_string(cql);
        let (response, mut frame) = self.send_message(Opcode::Prepare, body)?;
        if response != Opcode::Result {
            return Err(ClientError::Protocol(format!(
                "expected RESULT, got {response:?}"
            )));
        }
        let kind = frame.read_int()?;
        if kind != RESULT_PREPARED {
            return Err(ClientError::Protocol(format!(
                "expected PREPARED result, got kind {kind:#06x}"
            )));
        }
        let id = frame.read_short_bytes()?;
        let params = ColumnMeta::from_frame(&mut frame, self.config.version)?;
        // v2 appends result metadata after the parameter block; the rows
        // that come back from EXECUTE carry their own copy, so drop it.
        if self.config.version == ProtocolVersion::V2 && frame.remaining() > 0 {
            ColumnMeta::skip(&mut frame, self.config.version)?;
        }
        Ok(Prepared { id, params })
    }

    /// Execute a prepared statement with bound values, validated and
    /// encoded through the statement's parameter metadata.
    pub fn execute(
        &mut self,
        prepared: &Prepared,
        values: &[CqlValue],
        consistency: Consistency,
    ) -> Result<QueryOutcome> {
        let blobs = prepared.params.encode_data(values)?;
        let mut body = Frame::new();
        body.write_short_bytes(&prepared.id);
        body.write_short(blobs.len() as u16);
        for blob in &blobs {
            body.write_bytes(blob.as_deref());
        }
        body.write_short(consistency as u16);
        let (response, mut frame) = self.send_message(Opcode::Execute, body)?;
        if response != Opcode::Result {
            return Err(ClientError::Protocol(format!(
                "expected RESULT, got {response:?}"
            )));
        }
        self.decode_result(&mut frame)
    }

    fn decode_result(&self, frame: &mut Frame) -> Result<QueryOutcome> {
        let kind = frame.read_int()?;
        Ok(match kind {
            RESULT_VOID => QueryOutcome::Void,
            RESULT_ROWS => {
                QueryOutcome::Rows(CqlResult::from_frame(frame, self.config.version)?)
            }
            RESULT_SET_KEYSPACE => QueryOutcome::Keyspace(frame.read_string()?),
            RESULT_SCHEMA_CHANGE => QueryOutcome::SchemaChange {
                change: frame.read_string()?,
                keyspace: frame.read_string()?,
                table: frame.read_string()?,
            },
            other => {
                return Err(ClientError::Protocol(format!(
                    "unexpected result kind {other:#06x}"
                )))
            }
        })
    }
}
