//! NUL-delimited field encoding/decoding.
//!
//! Every frame payload is a sequence of ASCII tokens, each terminated by a
//! `\0` byte:
//!
//! ```text
//! [4-byte BE length] code \0 field \0 field \0 ... field \0
//! ```
//!
//! - integers / floats: ASCII decimal, empty token = `0`
//! - booleans: `1` / `0`
//! - decimals: exact base-10 (plain or scientific notation)
//! - timestamps: epoch seconds, `yyyymmdd`, or `yyyymmdd hh:mm:ss[ zone]`
//!
//! Both cursors carry a *sticky* error: the first failure is kept, every
//! later read or write becomes a no-op (reads return zero values), and the
//! caller checks once at the end. This keeps per-message decoders linear
//! instead of a `?` after every field.

use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use gateway_core::DepthError;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::wire_types::{OutgoingCode, FIELD_SEPARATOR, MAX_FRAME_LEN};

/// Errors that can arise when encoding/decoding frames and fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A frame announced a zero length.
    #[error("zero-length frame")]
    EmptyFrame,

    /// A frame exceeds [`MAX_FRAME_LEN`].
    #[error("frame of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),

    /// Ran out of fields while decoding.
    #[error("message truncated")]
    Truncated,

    /// A token is not valid UTF-8.
    #[error("field is not valid UTF-8")]
    InvalidUtf8,

    /// A token could not be parsed as the expected type.
    #[error("invalid {kind} field: {token:?}")]
    InvalidField { kind: &'static str, token: String },

    /// A string to be encoded contains the field separator.
    #[error("string field contains a NUL byte")]
    EmbeddedNul,

    /// A depth update carried an unknown side / operation code.
    #[error(transparent)]
    Depth(#[from] DepthError),
}

fn invalid(kind: &'static str, token: &str) -> ProtocolError {
    ProtocolError::InvalidField {
        kind,
        token: token.to_string(),
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Cursor over the fields of one frame payload.
#[derive(Debug)]
pub struct FieldDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
    error: Option<ProtocolError>,
    offset: FixedOffset,
}

impl<'a> FieldDecoder<'a> {
    /// Decode `payload`, interpreting zone-less timestamps as UTC.
    pub fn new(payload: &'a [u8]) -> Self {
        Self::with_offset(payload, Utc.fix())
    }

    /// Decode `payload`, interpreting zone-less timestamps in `offset`.
    pub fn with_offset(payload: &'a [u8], offset: FixedOffset) -> Self {
        FieldDecoder {
            buf: payload,
            pos: 0,
            error: None,
            offset,
        }
    }

    /// First error hit so far, if any.
    pub fn error(&self) -> Option<&ProtocolError> {
        self.error.as_ref()
    }

    /// True while unread fields remain and no error is stored.
    pub fn has_remaining(&self) -> bool {
        self.error.is_none() && self.pos < self.buf.len()
    }

    /// Return `value` unless an error was recorded while producing it.
    pub fn finish<T>(&self, value: T) -> Result<T, ProtocolError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(value),
        }
    }

    /// Record an error raised by a caller-side check (first error sticks).
    pub fn fail(&mut self, err: ProtocolError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub fn read_string(&mut self) -> String {
        self.next_str().map(str::to_string).unwrap_or_default()
    }

    pub fn read_i32(&mut self) -> i32 {
        self.read_parsed("int", 0)
    }

    pub fn read_i64(&mut self) -> i64 {
        self.read_parsed("long", 0)
    }

    /// Integer field where an empty token means "unset".
    pub fn read_optional_i32(&mut self) -> Option<i32> {
        match self.next_str() {
            Some("") | None => None,
            Some(tok) => match tok.parse::<i32>() {
                Ok(v) => Some(v),
                Err(_) => {
                    self.fail(invalid("int", tok));
                    None
                }
            },
        }
    }

    pub fn read_f64(&mut self) -> f64 {
        match self.next_str() {
            Some("") | None => 0.0,
            Some("Infinity") => f64::INFINITY,
            Some("-Infinity") => f64::NEG_INFINITY,
            Some(tok) => match tok.parse::<f64>() {
                Ok(v) => v,
                Err(_) => {
                    self.fail(invalid("float", tok));
                    0.0
                }
            },
        }
    }

    /// Booleans travel as integers; anything non-zero is `true`.
    pub fn read_bool(&mut self) -> bool {
        self.read_i32() != 0
    }

    pub fn read_decimal(&mut self) -> Decimal {
        match self.next_str() {
            Some("") | None => Decimal::ZERO,
            Some(tok) => {
                let parsed = if tok.contains(|c| c == 'e' || c == 'E') {
                    Decimal::from_scientific(tok)
                } else {
                    Decimal::from_str(tok)
                };
                match parsed {
                    Ok(v) => v,
                    Err(_) => {
                        self.fail(invalid("decimal", tok));
                        Decimal::ZERO
                    }
                }
            }
        }
    }

    /// Timestamp field; see the module docs for the accepted forms.
    pub fn read_timestamp(&mut self) -> DateTime<Utc> {
        let offset = self.offset;
        match self.next_str() {
            None => DateTime::<Utc>::default(),
            Some(tok) => match parse_timestamp(tok, offset) {
                Some(ts) => ts,
                None => {
                    self.fail(invalid("timestamp", tok));
                    DateTime::<Utc>::default()
                }
            },
        }
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn read_parsed<T: FromStr>(&mut self, kind: &'static str, zero: T) -> T {
        match self.next_str() {
            Some("") | None => zero,
            Some(tok) => match tok.parse::<T>() {
                Ok(v) => v,
                Err(_) => {
                    self.fail(invalid(kind, tok));
                    zero
                }
            },
        }
    }

    fn next_str(&mut self) -> Option<&'a str> {
        let raw = self.next_token()?;
        match std::str::from_utf8(raw) {
            Ok(s) => Some(s),
            Err(_) => {
                self.fail(ProtocolError::InvalidUtf8);
                None
            }
        }
    }

    fn next_token(&mut self) -> Option<&'a [u8]> {
        if self.error.is_some() {
            return None;
        }
        if self.pos >= self.buf.len() {
            self.fail(ProtocolError::Truncated);
            return None;
        }

        let rest = &self.buf[self.pos..];
        match rest.iter().position(|&b| b == FIELD_SEPARATOR) {
            Some(end) => {
                self.pos += end + 1;
                Some(&rest[..end])
            }
            None => {
                self.pos = self.buf.len();
                Some(rest)
            }
        }
    }
}

/// Parse the timestamp forms the gateway emits.
pub fn parse_timestamp(token: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if token.bytes().all(|b| b.is_ascii_digit()) {
        if token.len() == 8 {
            let date = NaiveDate::parse_from_str(token, "%Y%m%d").ok()?;
            return local_to_utc(date.and_hms_opt(0, 0, 0)?, offset);
        }
        let secs = token.parse::<i64>().ok()?;
        return DateTime::from_timestamp(secs, 0);
    }

    // `yyyymmdd-hh:mm:ss` is always UTC.
    if let Some((date, time)) = token.split_once('-') {
        if date.len() == 8 && !time.contains(' ') {
            let naive =
                NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y%m%d %H:%M:%S").ok()?;
            return Some(naive.and_utc());
        }
    }

    let mut parts = token.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    let zone = parts.next();
    let naive =
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y%m%d %H:%M:%S").ok()?;

    match zone {
        Some("UTC") | Some("GMT") => Some(naive.and_utc()),
        _ => local_to_utc(naive, offset),
    }
}

fn local_to_utc(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// ENCODING
// ============================================================================

/// Builder for one outgoing frame.
///
/// The 4-byte length header is reserved up front and back-patched by
/// [`FieldEncoder::finish`].
#[derive(Debug)]
pub struct FieldEncoder {
    buf: BytesMut,
    error: Option<ProtocolError>,
}

impl Default for FieldEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldEncoder {
    /// Start an empty frame.
    pub fn new() -> Self {
        let mut buf = BytesMut::with_capacity(128);
        buf.put_u32(0);
        FieldEncoder { buf, error: None }
    }

    /// Start a frame whose first field is `code`.
    pub fn with_code(code: OutgoingCode) -> Self {
        let mut enc = Self::new();
        enc.write_i32(code.as_i32());
        enc
    }

    pub fn write_str(&mut self, v: &str) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        if v.as_bytes().contains(&FIELD_SEPARATOR) {
            self.error = Some(ProtocolError::EmbeddedNul);
            return self;
        }
        self.buf.put_slice(v.as_bytes());
        self.buf.put_u8(FIELD_SEPARATOR);
        self
    }

    pub fn write_i32(&mut self, v: i32) -> &mut Self {
        self.write_str(&v.to_string())
    }

    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.write_str(&v.to_string())
    }

    /// `None` is written as an empty token ("unset").
    pub fn write_optional_i32(&mut self, v: Option<i32>) -> &mut Self {
        match v {
            Some(v) => self.write_i32(v),
            None => self.write_str(""),
        }
    }

    pub fn write_f64(&mut self, v: f64) -> &mut Self {
        if v.is_infinite() {
            let tok = if v > 0.0 { "Infinity" } else { "-Infinity" };
            return self.write_str(tok);
        }
        self.write_str(&v.to_string())
    }

    pub fn write_bool(&mut self, v: bool) -> &mut Self {
        self.write_str(if v { "1" } else { "0" })
    }

    pub fn write_decimal(&mut self, v: Decimal) -> &mut Self {
        self.write_str(&v.normalize().to_string())
    }

    /// Written as `yyyymmdd-hh:mm:ss` (UTC).
    pub fn write_timestamp(&mut self, v: DateTime<Utc>) -> &mut Self {
        self.write_str(&v.format("%Y%m%d-%H:%M:%S").to_string())
    }

    /// Back-patch the length header and hand out the finished frame.
    pub fn finish(mut self) -> Result<Bytes, ProtocolError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        let len = self.buf.len() - 4;
        if len == 0 {
            return Err(ProtocolError::EmptyFrame);
        }
        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge(len));
        }

        self.buf[..4].copy_from_slice(&(len as u32).to_be_bytes());
        Ok(self.buf.freeze())
    }
}
