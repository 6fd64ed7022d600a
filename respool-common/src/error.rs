//! # Codec Errors
//!
//! Errors raised while encoding requests, decoding replies, or interpreting a
//! decoded [`ResponseValue`](crate::ResponseValue) through its accessors.

use thiserror::Error;

use crate::value::ReplyKind;

/// Result type for codec and accessor operations.
pub type RespResult<T> = Result<T, RespError>;

/// Errors surfaced by the RESP codec.
#[derive(Debug, Error)]
pub enum RespError {
    /// Transport read failed (EOF, reset, timeout) while a reply was in flight.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Reply framing is invalid, or an Error reply was read as a value.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Argument kind cannot be expressed as a RESP bulk string.
    #[error("unsupported argument type: {0}")]
    UnsupportedArgumentType(String),

    /// Accessor does not apply to this reply type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: ReplyKind,
    },

    /// Payload is not in the textual form the accessor needs.
    #[error("format error: {0}")]
    Format(String),

    /// Array cannot be paired into a map.
    #[error("array has an odd number of elements ({0})")]
    OddElementCount(usize),
}

impl RespError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        RespError::Protocol(msg.into())
    }

    /// True when the error came from the underlying transport.
    pub fn is_io(&self) -> bool {
        matches!(self, RespError::Io(_))
    }
}

/// Application-level error reply sent by the server (`-ERR ...`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServerError {
    /// Text following the `-` prefix.
    pub message: String,
}
