//! Client connection configuration.

use basalt_protocol::ProtocolVersion;

/// Connection parameters for [`Connection`](crate::Connection).
#[derive(Debug, Clone)]
pub struct Config {
    /// Node address, e.g. "127.0.0.1:9042".
    pub addr: String,
    /// Credentials for the password authenticator, when the server asks.
    pub username: Option<String>,
    pub password: Option<String>,
    /// CQL version string sent in STARTUP.
    pub cql_version: String,
    /// Native protocol version to speak.
    pub version: ProtocolVersion,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: "127.0.0.1:9042".into(),
            username: None,
            password: None,
            cql_version: "3.0.5".into(),
            version: ProtocolVersion::V1,
        }
    }
}
