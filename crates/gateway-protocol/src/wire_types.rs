//! Low-level wire types and constants.
//!
//! This module defines:
//! - Message codes for incoming (gateway → client) and outgoing
//!   (client → gateway) messages.
//! - Handshake and protocol-version bounds.
//! - Framing limits.
//!
//! The field cursor lives in `field_codec`, framing in `frame`, and the
//! per-message layouts in `decode` / `encode`.

/// Literal prefix sent before the version-range frame.
pub const API_SIGN: &[u8; 4] = b"API\0";

/// Lowest protocol version this client can speak.
pub const MIN_CLIENT_VERSION: i32 = 100;

/// Highest protocol version this client can speak.
pub const MAX_CLIENT_VERSION: i32 = 187;

/// Server versions below this are refused during the handshake.
pub const MIN_SERVER_VERSION: i32 = 100;

/// Bias added to a message code to flag the alternate (length-delimited
/// sub-message) payload encoding.
pub const ALTERNATE_ENCODING_BIAS: i32 = 200;

/// Largest frame payload accepted from the wire.
pub const MAX_FRAME_LEN: usize = 0x00FF_FFFF;

/// Field separator inside a frame payload.
pub const FIELD_SEPARATOR: u8 = 0;

/// Split a raw message code into `(code, alternate_encoding)`.
pub fn split_code(raw: i32) -> (i32, bool) {
    if raw > ALTERNATE_ENCODING_BIAS {
        (raw - ALTERNATE_ENCODING_BIAS, true)
    } else {
        (raw, false)
    }
}

/// Incoming message codes (gateway → client) this client understands.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IncomingCode {
    TickPrice = 1,
    TickSize = 2,
    ErrorMessage = 4,
    NextValidId = 9,
    ContractData = 10,
    MarketDepth = 12,
    MarketDepthL2 = 13,
    ManagedAccounts = 15,
    HistoricalData = 17,
    TickGeneric = 45,
    TickString = 46,
    CurrentTime = 49,
    ContractDataEnd = 52,
    TickSnapshotEnd = 57,
    MarketDataType = 58,
    TickReqParams = 81,
}

impl IncomingCode {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            1 => Some(IncomingCode::TickPrice),
            2 => Some(IncomingCode::TickSize),
            4 => Some(IncomingCode::ErrorMessage),
            9 => Some(IncomingCode::NextValidId),
            10 => Some(IncomingCode::ContractData),
            12 => Some(IncomingCode::MarketDepth),
            13 => Some(IncomingCode::MarketDepthL2),
            15 => Some(IncomingCode::ManagedAccounts),
            17 => Some(IncomingCode::HistoricalData),
            45 => Some(IncomingCode::TickGeneric),
            46 => Some(IncomingCode::TickString),
            49 => Some(IncomingCode::CurrentTime),
            52 => Some(IncomingCode::ContractDataEnd),
            57 => Some(IncomingCode::TickSnapshotEnd),
            58 => Some(IncomingCode::MarketDataType),
            81 => Some(IncomingCode::TickReqParams),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Outgoing message codes (client → gateway).
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OutgoingCode {
    ReqMarketData = 1,
    CancelMarketData = 2,
    ReqIds = 8,
    ReqContractData = 9,
    ReqMarketDepth = 10,
    CancelMarketDepth = 11,
    ReqManagedAccounts = 17,
    ReqHistoricalData = 20,
    CancelHistoricalData = 25,
    ReqCurrentTime = 49,
    ReqMarketDataType = 59,
    StartApi = 71,
}

impl OutgoingCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Peer error codes that are benign noise and never surfaced.
///
/// - `300`: cancel for a ticker id the gateway no longer knows.
/// - `10167`: delayed data shown because live data is not subscribed.
pub const SUPPRESSED_ERROR_CODES: [i32; 2] = [300, 10167];

/// True when an error code from the peer should be dropped silently.
pub fn is_suppressed_error(code: i32) -> bool {
    SUPPRESSED_ERROR_CODES.contains(&code)
}
