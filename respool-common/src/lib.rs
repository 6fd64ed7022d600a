//! # RESP Protocol Types
//!
//! Purpose: Shared wire-level pieces of the respool client: command arguments,
//! the RESP request encoder and reply decoder, and the typed reply value.
//!
//! ## Design Principles
//! 1. **Transport-Agnostic**: The codec works on any `BufRead`, so it is tested
//!    against in-memory cursors and used over TCP unchanged.
//! 2. **Closed Argument Set**: Only bytes, integers and nil can be sent.
//! 3. **Typed Replies**: Every reply carries its tag; accessors check it.

pub mod arg;
pub mod codec;
pub mod error;
pub mod value;

// Re-export for convenience
pub use arg::{args_from_json, Arg};
pub use codec::{encode_args, encode_command, read_reply, MAX_BULK_LEN, MAX_LINE_LEN};
pub use error::{RespError, RespResult, ServerError};
pub use value::{ReplyKind, ResponseValue};
