//! Decoder for the binary `application/vnd.amazon.eventstream` framing.
//!
//! Frame layout (big-endian):
//! `total_len:u32 | headers_len:u32 | prelude_crc:u32 | headers | payload | message_crc:u32`
//! with CRC32C checksums over the prelude and over everything before the
//! trailing checksum.

use std::collections::HashMap;

use bedrock_chat_common::{Error, Result};
use bytes::BytesMut;
use crc32c::crc32c;

const PRELUDE_LEN: usize = 12;
/// Prelude plus trailing message CRC.
const MIN_MESSAGE_LEN: usize = 16;
/// Frames above this size are rejected instead of buffered.
const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Vec<u8>),
    String(String),
    Timestamp(i64),
    Uuid([u8; 16]),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub headers: HashMap<String, HeaderValue>,
    pub payload: Vec<u8>,
}

impl EventMessage {
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(HeaderValue::as_str)
    }

    /// `:message-type`: one of `event`, `exception`, `error`.
    pub fn message_type(&self) -> Option<&str> {
        self.header_str(":message-type")
    }

    /// `:event-type` for events, e.g. `chunk` or `trace`.
    pub fn event_type(&self) -> Option<&str> {
        self.header_str(":event-type")
    }

    pub fn exception_type(&self) -> Option<&str> {
        self.header_str(":exception-type")
    }
}

/// Incremental decoder: feed network bytes, pull complete messages.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: BytesMut,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes received that do not yet form a complete message.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next complete message, or `None` if more bytes are needed.
    pub fn next_message(&mut self) -> Result<Option<EventMessage>> {
        if self.buffer.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total_len = read_u32(&self.buffer[0..4]) as usize;
        if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&total_len) {
            return Err(Error::Stream(format!("invalid message length: {total_len}")));
        }
        if self.buffer.len() < total_len {
            return Ok(None);
        }

        let frame = self.buffer.split_to(total_len);
        parse_message(&frame).map(Some)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn parse_message(frame: &[u8]) -> Result<EventMessage> {
    let total_len = frame.len();
    let headers_len = read_u32(&frame[4..8]) as usize;

    if read_u32(&frame[8..12]) != crc32c(&frame[0..8]) {
        return Err(Error::Stream("prelude checksum mismatch".to_string()));
    }
    if read_u32(&frame[total_len - 4..]) != crc32c(&frame[..total_len - 4]) {
        return Err(Error::Stream("message checksum mismatch".to_string()));
    }

    let headers_end = PRELUDE_LEN + headers_len;
    if headers_end > total_len - 4 {
        return Err(Error::Stream(format!(
            "headers length {headers_len} exceeds message length {total_len}"
        )));
    }

    let headers = parse_headers(&frame[PRELUDE_LEN..headers_end])?;
    let payload = frame[headers_end..total_len - 4].to_vec();
    Ok(EventMessage { headers, payload })
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(Error::Stream(format!("truncated header {what}")));
        }
        let data = self.data;
        let slice = &data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

fn parse_headers(data: &[u8]) -> Result<HashMap<String, HeaderValue>> {
    let mut headers = HashMap::new();
    let mut cursor = Cursor { data, pos: 0 };

    while !cursor.is_empty() {
        let name_len = cursor.take(1, "name length")?[0] as usize;
        let name = String::from_utf8_lossy(cursor.take(name_len, "name")?).into_owned();
        let value_type = cursor.take(1, "value type")?[0];

        let value = match value_type {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => HeaderValue::Byte(i8::from_be_bytes(cursor.take_array("byte")?)),
            3 => HeaderValue::Short(i16::from_be_bytes(cursor.take_array("short")?)),
            4 => HeaderValue::Int(i32::from_be_bytes(cursor.take_array("int")?)),
            5 => HeaderValue::Long(i64::from_be_bytes(cursor.take_array("long")?)),
            6 | 7 => {
                let len = u16::from_be_bytes(cursor.take_array("value length")?) as usize;
                let raw = cursor.take(len, "value")?;
                if value_type == 6 {
                    HeaderValue::Bytes(raw.to_vec())
                } else {
                    HeaderValue::String(String::from_utf8_lossy(raw).into_owned())
                }
            }
            8 => HeaderValue::Timestamp(i64::from_be_bytes(cursor.take_array("timestamp")?)),
            9 => HeaderValue::Uuid(cursor.take_array("uuid")?),
            other => {
                return Err(Error::Stream(format!("unknown header value type: {other}")));
            }
        };
        headers.insert(name, value);
    }

    Ok(headers)
}
