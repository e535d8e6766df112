//! Value objects exchanged with the gateway.
//!
//! These are **transport-agnostic** logical types:
//! - request parameters the client encodes ([`Contract`],
//!   [`HistoricalDataRequest`]),
//! - decoded replies the client hands back to callers ([`ContractDetails`],
//!   [`Bar`], [`TickEvent`], [`DepthUpdate`], [`ErrorNotice`]).
//!
//! Note: field encoders / decoders live in the `gateway-protocol` crate;
//! this module is purely logical.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DepthError;
use crate::side::Side;

/// An instrument description as understood by the gateway.
///
/// Most requests only need a handful of these fields; unset strings are
/// sent as empty tokens and the gateway fills in the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Gateway-assigned contract id (`0` when unknown).
    pub con_id: i32,
    pub symbol: String,
    /// Security type, e.g. `"STK"`, `"FUT"`, `"CASH"`.
    pub sec_type: String,
    /// `yyyymm` or `yyyymmdd` for derivatives.
    pub last_trade_date_or_contract_month: String,
    pub strike: f64,
    /// `"C"` / `"P"` for options.
    pub right: String,
    pub multiplier: String,
    pub exchange: String,
    pub primary_exchange: String,
    pub currency: String,
    pub local_symbol: String,
    pub trading_class: String,
    pub include_expired: bool,
}

impl Contract {
    /// Convenience constructor for a stock.
    pub fn stock(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Contract {
            symbol: symbol.into(),
            sec_type: "STK".to_string(),
            exchange: exchange.into(),
            currency: currency.into(),
            ..Default::default()
        }
    }

    /// Convenience constructor for a currency pair, e.g. `forex("EUR", "USD")`.
    pub fn forex(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Contract {
            symbol: base.into(),
            sec_type: "CASH".to_string(),
            exchange: "IDEALPRO".to_string(),
            currency: quote.into(),
            ..Default::default()
        }
    }
}

/// One contract-details reply (several may arrive for one request).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractDetails {
    pub contract: Contract,
    pub market_name: String,
    pub min_tick: f64,
    pub long_name: String,
    /// Exchange time zone, e.g. `"US/Eastern"`.
    pub time_zone_id: String,
    /// Comma-separated list of valid exchanges.
    pub valid_exchanges: String,
}

/// Parameters of a historical bar request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalDataRequest {
    /// End of the window; `None` means "now".
    pub end: Option<DateTime<Utc>>,
    /// Gateway duration string, e.g. `"1 D"`, `"2 W"`.
    pub duration: String,
    /// Gateway bar size string, e.g. `"1 min"`, `"1 hour"`.
    pub bar_size: String,
    /// `"TRADES"`, `"MIDPOINT"`, `"BID"`, `"ASK"`, ...
    pub what_to_show: String,
    /// Regular trading hours only.
    pub use_rth: bool,
}

impl Default for HistoricalDataRequest {
    fn default() -> Self {
        HistoricalDataRequest {
            end: None,
            duration: "1 D".to_string(),
            bar_size: "1 hour".to_string(),
            what_to_show: "TRADES".to_string(),
            use_rth: true,
        }
    }
}

/// A single OHLC bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Decimal,
    /// Volume-weighted average price.
    pub wap: Decimal,
    /// Number of trades in the bar.
    pub count: i32,
}

/// Flags attached to a price tick (decoded from a bit mask).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickAttributes {
    pub can_auto_execute: bool,
    pub past_limit: bool,
    pub pre_open: bool,
}

impl TickAttributes {
    /// Decode the wire bit mask (bit 0 = can auto execute, bit 1 = past
    /// limit, bit 2 = pre open).
    pub fn from_mask(mask: i32) -> Self {
        TickAttributes {
            can_auto_execute: mask & 0x1 != 0,
            past_limit: mask & 0x2 != 0,
            pre_open: mask & 0x4 != 0,
        }
    }
}

/// One update delivered on a market-data stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TickEvent {
    Price {
        tick_type: i32,
        price: f64,
        size: Decimal,
        attributes: TickAttributes,
    },
    Size {
        tick_type: i32,
        size: Decimal,
    },
    Generic {
        tick_type: i32,
        value: f64,
    },
    String {
        tick_type: i32,
        value: String,
    },
    /// The gateway switched the stream between live / frozen / delayed data.
    MarketDataType(i32),
    /// Parameters the gateway applies to this stream.
    RequestParams {
        min_tick: f64,
        bbo_exchange: String,
        snapshot_permissions: i32,
    },
}

/// Depth-book operation carried by a depth update.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthOperation {
    Insert,
    Update,
    Delete,
}

impl DepthOperation {
    /// Parse the wire representation (`0` insert, `1` update, `2` delete).
    pub fn from_wire(v: i32) -> Result<Self, DepthError> {
        match v {
            0 => Ok(DepthOperation::Insert),
            1 => Ok(DepthOperation::Update),
            2 => Ok(DepthOperation::Delete),
            other => Err(DepthError::UnknownOperation(other)),
        }
    }
}

/// A single row change for a depth stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthUpdate {
    /// Row index, validated against the book depth when applied.
    pub position: i32,
    /// Market maker for level-2 updates, empty otherwise.
    pub market_maker: String,
    pub operation: DepthOperation,
    pub side: Side,
    pub price: f64,
    pub size: Decimal,
}

/// An error / informational notice sent by the gateway.
///
/// `id` is the correlation id the notice refers to, or `-1` when it is
/// not tied to any request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub id: i32,
    pub code: i32,
    pub message: String,
}

impl ErrorNotice {
    /// True when the notice is tied to a request id.
    pub fn has_request_id(&self) -> bool {
        self.id > 0
    }
}
