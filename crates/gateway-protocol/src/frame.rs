//! Length-prefixed framing.
//!
//! ```text
//! [u32 BE length][payload: length bytes] [u32 BE length][payload] ...
//! ```
//!
//! A zero length is a protocol error, as is a length above
//! [`MAX_FRAME_LEN`]. The handshake is the one place where bytes are sent
//! outside a frame: the literal `API\0` prefix precedes the first frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::field_codec::ProtocolError;
use crate::wire_types::{API_SIGN, MAX_FRAME_LEN};

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Append one frame (`header + payload`) to `out`.
pub fn encode_frame(payload: &[u8], out: &mut BytesMut) -> Result<(), ProtocolError> {
    check_len(payload.len())?;
    out.reserve(HEADER_LEN + payload.len());
    out.put_u32(payload.len() as u32);
    out.put_slice(payload);
    Ok(())
}

/// Try to cut one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed; the partial frame is
/// left in place (and room for the rest is reserved).
pub fn split_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let len = (&buf[..HEADER_LEN]).get_u32() as usize;
    check_len(len)?;

    let needed = HEADER_LEN + len;
    if buf.len() < needed {
        buf.reserve(needed - buf.len());
        return Ok(None);
    }

    buf.advance(HEADER_LEN);
    Ok(Some(buf.split_to(len).freeze()))
}

/// Bytes that open a session: `API\0`, then a frame carrying
/// `v<min>..<max>[ <options>]` (no trailing NUL).
pub fn handshake(min_version: i32, max_version: i32, options: &str) -> Result<Bytes, ProtocolError> {
    let mut range = format!("v{min_version}..{max_version}");
    if !options.is_empty() {
        range.push(' ');
        range.push_str(options);
    }

    let mut out = BytesMut::with_capacity(API_SIGN.len() + HEADER_LEN + range.len());
    out.put_slice(API_SIGN);
    encode_frame(range.as_bytes(), &mut out)?;
    Ok(out.freeze())
}

fn check_len(len: usize) -> Result<(), ProtocolError> {
    if len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    Ok(())
}
