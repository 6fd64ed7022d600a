//! # Client Configuration
//!
//! Plain data supplied when the pool is created. Both structs derive serde so
//! they can be embedded in an application's own config file; the pool itself
//! never reads files or environment variables.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Where and how to connect to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server host name or IP address.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Password for AUTH. Only recorded here; issuing AUTH is up to the caller.
    #[serde(default)]
    pub password: Option<String>,
    /// Optional TCP connect timeout in milliseconds.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Disable Nagle's algorithm on every connection.
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,
}

fn default_nodelay() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            connect_timeout_ms: None,
            nodelay: true,
        }
    }
}

impl ConnectionConfig {
    /// Creates a config for `host:port` with defaults for everything else.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ConnectionConfig {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Resolves `(host, port)` into socket addresses.
    pub(crate) fn resolve(&self) -> ClientResult<Vec<SocketAddr>> {
        let target = format!("{}:{}", self.host, self.port);
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|err| ClientError::InvalidAddress(format!("{}: {}", target, err)))?
            .collect();
        if addrs.is_empty() {
            return Err(ClientError::InvalidAddress(target));
        }
        Ok(addrs)
    }
}

/// Pool configuration: the connection target plus the fixed pool size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    /// Number of connections opened up front; also the pool's fixed capacity.
    pub pool_size: usize,
}

impl PoolConfig {
    pub fn new(connection: ConnectionConfig, pool_size: usize) -> Self {
        PoolConfig {
            connection,
            pool_size,
        }
    }

    /// Checks the config before any connection is attempted.
    pub fn validate(&self) -> ClientResult<()> {
        if self.pool_size == 0 {
            return Err(ClientError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.connection.host.trim().is_empty() {
            return Err(ClientError::InvalidConfig("host must not be empty".to_string()));
        }
        Ok(())
    }
}
