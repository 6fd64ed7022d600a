//! # Reply Values
//!
//! Purpose: Hold one decoded server reply and expose typed views of it.
//!
//! ## Design Principles
//! 1. **Eager Typing**: The reply tag is fixed at decode time; accessors only
//!    validate it against what the caller asks for.
//! 2. **Raw Payloads**: Payloads stay as bytes. Integer replies keep their
//!    decimal text and are parsed when consumed.
//! 3. **Read-Only Views**: Accessors never mutate and can be called repeatedly.

use std::collections::HashMap;
use std::fmt;

use crate::error::{RespError, RespResult, ServerError};

/// Type tag of a reply, taken from its RESP prefix byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    /// `+`
    SimpleStatus,
    /// `-`
    Error,
    /// `:`
    Integer,
    /// `$`
    BulkString,
    /// `*`
    Array,
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplyKind::SimpleStatus => "simple status",
            ReplyKind::Error => "error",
            ReplyKind::Integer => "integer",
            ReplyKind::BulkString => "bulk string",
            ReplyKind::Array => "array",
        };
        f.write_str(name)
    }
}

/// One decoded RESP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseValue {
    /// +OK or +PONG style responses.
    SimpleStatus(Vec<u8>),
    /// -ERR ... responses.
    Error(Vec<u8>),
    /// :123 responses, digits as received.
    Integer(Vec<u8>),
    /// $... bulk strings, with None for `$-1`.
    BulkString(Option<Vec<u8>>),
    /// *... arrays of scalar elements; None marks a nil element.
    Array(Vec<Option<Vec<u8>>>),
}

impl ResponseValue {
    /// Returns the type tag of this reply.
    pub fn kind(&self) -> ReplyKind {
        match self {
            ResponseValue::SimpleStatus(_) => ReplyKind::SimpleStatus,
            ResponseValue::Error(_) => ReplyKind::Error,
            ResponseValue::Integer(_) => ReplyKind::Integer,
            ResponseValue::BulkString(_) => ReplyKind::BulkString,
            ResponseValue::Array(_) => ReplyKind::Array,
        }
    }

    /// True only for the nil bulk string (`$-1`).
    pub fn is_nil(&self) -> bool {
        matches!(self, ResponseValue::BulkString(None))
    }

    /// Returns the server error carried by an Error reply.
    pub fn as_error(&self) -> Option<ServerError> {
        match self {
            ResponseValue::Error(message) => Some(ServerError {
                message: String::from_utf8_lossy(message).into_owned(),
            }),
            _ => None,
        }
    }

    /// Raw scalar payload. Nil bulk strings yield an empty slice.
    pub fn as_bytes(&self) -> RespResult<&[u8]> {
        match self {
            ResponseValue::SimpleStatus(data) | ResponseValue::Integer(data) => Ok(data.as_slice()),
            ResponseValue::BulkString(data) => Ok(data.as_deref().unwrap_or_default()),
            ResponseValue::Error(message) => Err(error_as_value(message)),
            ResponseValue::Array(_) => Err(RespError::TypeMismatch {
                expected: "scalar",
                actual: ReplyKind::Array,
            }),
        }
    }

    /// Parses the payload as a signed decimal integer.
    pub fn as_int(&self) -> RespResult<i64> {
        if self.is_nil() {
            return Err(RespError::Format("nil bulk string is not an integer".to_string()));
        }
        let data = self.as_bytes()?;
        std::str::from_utf8(data)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or_else(|| {
                RespError::Format(format!(
                    "not an integer: {:?}",
                    String::from_utf8_lossy(data)
                ))
            })
    }

    /// Returns the payload as UTF-8 text.
    ///
    /// A nil bulk string reads as the empty string; use [`Self::is_nil`] or
    /// [`Self::as_opt_string`] when the difference matters.
    pub fn as_string(&self) -> RespResult<String> {
        utf8(self.as_bytes()?.to_vec())
    }

    /// Like [`Self::as_string`], but a nil bulk string yields `None`.
    pub fn as_opt_string(&self) -> RespResult<Option<String>> {
        if self.is_nil() {
            return Ok(None);
        }
        self.as_string().map(Some)
    }

    /// Raw array elements, in server order.
    pub fn items(&self) -> RespResult<&[Option<Vec<u8>>]> {
        match self {
            ResponseValue::Array(items) => Ok(items.as_slice()),
            other => Err(RespError::TypeMismatch {
                expected: "array",
                actual: other.kind(),
            }),
        }
    }

    /// Array elements as strings. Nil elements read as empty strings.
    pub fn as_list(&self) -> RespResult<Vec<String>> {
        self.items()?
            .iter()
            .map(|item| utf8(item.clone().unwrap_or_default()))
            .collect()
    }

    /// Pairs array elements `(0,1), (2,3), ...` into a map.
    ///
    /// Later duplicate keys overwrite earlier ones.
    pub fn as_map(&self) -> RespResult<HashMap<String, String>> {
        let items = self.items()?;
        if items.len() % 2 != 0 {
            return Err(RespError::OddElementCount(items.len()));
        }
        let list = self.as_list()?;
        let mut map = HashMap::with_capacity(list.len() / 2);
        let mut iter = list.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            map.insert(key, value);
        }
        Ok(map)
    }
}

fn error_as_value(message: &[u8]) -> RespError {
    RespError::Protocol(format!(
        "error reply read as a value: {}",
        String::from_utf8_lossy(message)
    ))
}

fn utf8(data: Vec<u8>) -> RespResult<String> {
    String::from_utf8(data).map_err(|err| RespError::Format(format!("invalid utf-8: {}", err)))
}
