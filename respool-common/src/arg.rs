//! # Command Arguments
//!
//! A closed set of argument kinds a request may carry. Static callers build
//! arguments through `From` conversions; dynamic callers go through
//! `serde_json::Value`, where anything outside the set is rejected before a
//! single byte is encoded.

use serde_json::Value;

use crate::error::{RespError, RespResult};

/// One argument of a multi-bulk command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Raw bytes (UTF-8 text included).
    Bytes(Vec<u8>),
    /// Integer, sent as its decimal text.
    Int(i64),
    /// Nil, sent as `$-1`.
    Nil,
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Bytes(value.as_bytes().to_vec())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Bytes(value.into_bytes())
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Bytes(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Arg {
    fn from(value: &[u8; N]) -> Self {
        Arg::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Bytes(value)
    }
}

macro_rules! int_arg {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Int(i64::from(value))
                }
            }
        )*
    };
}

int_arg!(i8, i16, i32, i64, u8, u16, u32);

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Arg::Nil,
        }
    }
}

impl TryFrom<&Value> for Arg {
    type Error = RespError;

    fn try_from(value: &Value) -> RespResult<Self> {
        match value {
            Value::Null => Ok(Arg::Nil),
            Value::String(text) => Ok(Arg::from(text)),
            Value::Number(num) => num.as_i64().map(Arg::Int).ok_or_else(|| {
                RespError::UnsupportedArgumentType(format!("number {}", num))
            }),
            Value::Bool(_) => Err(RespError::UnsupportedArgumentType("bool".to_string())),
            Value::Array(_) => Err(RespError::UnsupportedArgumentType("array".to_string())),
            Value::Object(_) => Err(RespError::UnsupportedArgumentType("object".to_string())),
        }
    }
}

impl TryFrom<Value> for Arg {
    type Error = RespError;

    fn try_from(value: Value) -> RespResult<Self> {
        match value {
            Value::String(text) => Ok(Arg::Bytes(text.into_bytes())),
            other => Arg::try_from(&other),
        }
    }
}

/// Converts dynamic values into arguments, failing on the first unsupported one.
pub fn args_from_json(values: &[Value]) -> RespResult<Vec<Arg>> {
    values.iter().map(Arg::try_from).collect()
}
