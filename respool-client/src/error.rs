//! Errors surfaced by connections and the pool.

use respool_common::{RespError, ResponseValue};
use thiserror::Error;

/// Result type for the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while connecting, reading or writing.
    ///
    /// The connection that produced it should not be reused.
    #[error("io error: {0}")]
    Io(#[source] std::io::Error),

    /// RESP framing, argument or accessor error.
    #[error(transparent)]
    Resp(RespError),

    /// Server answered with an error reply.
    #[error("server error: {message}")]
    Server {
        /// Text after the `-` prefix.
        message: String,
        /// The decoded reply, for callers that still want to inspect it.
        reply: ResponseValue,
    },

    /// Connection was closed before the call.
    #[error("connection closed")]
    ConnectionClosed,

    /// Pool was closed; no more connections are handed out.
    #[error("connection pool closed")]
    PoolClosed,

    /// Every connection of the pool has been closed; `acquire` would never return.
    #[error("no live connections left in the pool")]
    PoolDrained,

    /// Configuration rejected before any connection was attempted.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Host/port did not resolve to any socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Some connections failed to close during pool shutdown.
    #[error("failed to close {} connection(s)", .failures.len())]
    Close { failures: Vec<std::io::Error> },
}

impl ClientError {
    /// True for transport-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Io(_))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err)
    }
}

// Decode failures caused by the socket are reported the same way as write
// failures.
impl From<RespError> for ClientError {
    fn from(err: RespError) -> Self {
        match err {
            RespError::Io(err) => ClientError::Io(err),
            other => ClientError::Resp(other),
        }
    }
}
