//! gateway-protocol
//!
//! Wire-level encoding/decoding for the gateway client.
//!
//! This crate turns typed requests (`gateway_core::Contract`, ...) into
//! framed bytes and incoming frames back into typed values. It performs
//! no I/O.
//!
//! - [`wire_types`]  : message codes, version bounds, framing limits
//! - [`field_codec`] : NUL-delimited field cursor (sticky-error) and builder
//! - [`frame`]       : length-prefix framing and the handshake bytes
//! - [`decode`]      : per-message decoders (gateway → client)
//! - [`encode`]      : per-request encoders (client → gateway)

pub mod wire_types;
pub mod field_codec;
pub mod frame;
pub mod decode;
pub mod encode;

pub use field_codec::{parse_timestamp, FieldDecoder, FieldEncoder, ProtocolError};
pub use frame::{encode_frame, handshake, split_frame, HEADER_LEN};
pub use wire_types::{
    is_suppressed_error, split_code, IncomingCode, OutgoingCode, MAX_CLIENT_VERSION,
    MAX_FRAME_LEN, MIN_CLIENT_VERSION, MIN_SERVER_VERSION,
};
