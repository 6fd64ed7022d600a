//! # RESP Encoding and Parsing
//!
//! Purpose: Encode client commands in the multi-bulk form and decode exactly
//! one server reply per call from a buffered byte source.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down from the prefix byte.
//! 2. **Buffer Reuse**: Callers own the output and line buffers.
//! 3. **Binary-Safe**: Bulk payloads are delimited by their declared length,
//!    never by scanning for line terminators.
//! 4. **Fail Fast**: Bad framing is a protocol error; a short read is a
//!    transport error. No partial reply is ever returned.
//!
//! ## Wire Format
//!
//! ```text
//! request:  *<argc>\r\n  ($<len>\r\n<bytes>\r\n | $-1\r\n) * argc
//! replies:  +status\r\n  -error\r\n  :digits\r\n
//!           $<len>\r\n<bytes>\r\n  $-1\r\n
//!           *<count>\r\n<count scalar replies>
//! ```

use std::io::{self, BufRead, Read};

use crate::arg::Arg;
use crate::error::{RespError, RespResult};
use crate::value::ResponseValue;

/// Largest bulk payload accepted from a server (matches the server-side
/// default `proto-max-bulk-len`).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Longest status, error, integer or length line accepted, terminator included.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Encodes a command as a RESP array of bulk strings into `out`.
pub fn encode_command(args: &[Arg], out: &mut Vec<u8>) {
    out.push(b'*');
    push_decimal(out, args.len() as i64);
    out.extend_from_slice(b"\r\n");
    for arg in args {
        match arg {
            Arg::Bytes(data) => push_bulk(out, data),
            Arg::Int(value) => push_bulk(out, value.to_string().as_bytes()),
            Arg::Nil => out.extend_from_slice(b"$-1\r\n"),
        }
    }
}

/// Converts and encodes dynamic arguments. On failure `out` is left untouched.
pub fn encode_args<I, T>(args: I, out: &mut Vec<u8>) -> RespResult<()>
where
    I: IntoIterator<Item = T>,
    T: TryInto<Arg, Error = RespError>,
{
    let args = args
        .into_iter()
        .map(TryInto::try_into)
        .collect::<RespResult<Vec<Arg>>>()?;
    encode_command(&args, out);
    Ok(())
}

/// Reads one reply from the buffered reader.
pub fn read_reply<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> RespResult<ResponseValue> {
    read_line(reader, line_buf)?;
    let (&prefix, rest) = line_buf
        .split_first()
        .ok_or_else(|| RespError::protocol("empty reply line"))?;

    match prefix {
        b'+' => Ok(ResponseValue::SimpleStatus(rest.to_vec())),
        b'-' => Ok(ResponseValue::Error(rest.to_vec())),
        b':' => Ok(ResponseValue::Integer(rest.to_vec())),
        b'$' => {
            let len = parse_len(rest)?;
            Ok(ResponseValue::BulkString(read_bulk(reader, len)?))
        }
        b'*' => {
            let count = parse_len(rest)?;
            read_array(reader, count, line_buf)
        }
        other => Err(unrecognized(other)),
    }
}

fn read_array<R: BufRead>(
    reader: &mut R,
    count: i64,
    line_buf: &mut Vec<u8>,
) -> RespResult<ResponseValue> {
    // `*-1` (nil array) is folded into the empty array.
    if count == 0 || count == -1 {
        return Ok(ResponseValue::Array(Vec::new()));
    }
    if count < 0 {
        return Err(RespError::Protocol(format!("invalid array length {}", count)));
    }

    let mut items = Vec::with_capacity((count as usize).min(1024));
    for _ in 0..count {
        items.push(read_element(reader, line_buf)?);
    }
    Ok(ResponseValue::Array(items))
}

fn read_element<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> RespResult<Option<Vec<u8>>> {
    read_line(reader, line_buf)?;
    let (&prefix, rest) = line_buf
        .split_first()
        .ok_or_else(|| RespError::protocol("empty array element"))?;

    match prefix {
        b'+' | b'-' | b':' => Ok(Some(rest.to_vec())),
        b'$' => {
            let len = parse_len(rest)?;
            read_bulk(reader, len)
        }
        b'*' => Err(RespError::protocol("nested arrays are not supported")),
        other => Err(unrecognized(other)),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> RespResult<Option<Vec<u8>>> {
    if len == -1 {
        return Ok(None);
    }
    if len < 0 || len as u64 > MAX_BULK_LEN as u64 {
        return Err(RespError::Protocol(format!("invalid bulk length {}", len)));
    }

    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data)?;

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != *b"\r\n" {
        return Err(RespError::protocol("bulk string not terminated by CRLF"));
    }
    Ok(Some(data))
}

/// Reads up to and including `\n`; the terminator and a `\r` right before it
/// are stripped.
fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> RespResult<()> {
    buf.clear();
    reader.by_ref().take(MAX_LINE_LEN as u64).read_until(b'\n', buf)?;
    if buf.last() != Some(&b'\n') {
        if buf.len() >= MAX_LINE_LEN {
            return Err(RespError::Protocol(format!(
                "reply line longer than {} bytes",
                MAX_LINE_LEN
            )));
        }
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed mid-reply").into());
    }
    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(())
}

fn parse_len(data: &[u8]) -> RespResult<i64> {
    let (negative, digits) = match data.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, data),
    };
    if digits.is_empty() || digits.len() > 18 {
        return Err(bad_len(data));
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(bad_len(data));
        }
        value = value * 10 + (b - b'0') as i64;
    }
    Ok(if negative { -value } else { value })
}

fn bad_len(data: &[u8]) -> RespError {
    RespError::Protocol(format!("invalid length {:?}", String::from_utf8_lossy(data)))
}

fn unrecognized(prefix: u8) -> RespError {
    RespError::Protocol(format!("unrecognized reply type {:?}", prefix as char))
}

fn push_bulk(out: &mut Vec<u8>, data: &[u8]) {
    out.push(b'$');
    push_decimal(out, data.len() as i64);
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

fn push_decimal(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(value.to_string().as_bytes());
}
