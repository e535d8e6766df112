//! Decoders for incoming messages (gateway → client).
//!
//! Each function expects a [`FieldDecoder`] positioned just *after* the
//! message code and consumes the rest of that message's fields:
//!
//! ```text
//! NextValidId (9):      version, order_id
//! CurrentTime (49):     version, epoch_seconds
//! ManagedAccounts (15): version, "ACC1,ACC2,..."
//! ErrorMessage (4):     version, id, code, message
//! ContractData (10):    version, req_id, symbol, sec_type, last_trade_date,
//!                       strike, right, exchange, currency, local_symbol,
//!                       market_name, trading_class, con_id, min_tick,
//!                       multiplier, valid_exchanges, long_name,
//!                       primary_exchange, time_zone_id
//! ContractDataEnd (52): version, req_id
//! HistoricalData (17):  req_id, start, end, count,
//!                       count × (time, open, high, low, close, volume, wap, bar_count)
//! TickPrice (1):        version, ticker_id, tick_type, price, size, attr_mask
//! TickSize (2):         version, ticker_id, tick_type, size
//! TickGeneric (45):     version, ticker_id, tick_type, value
//! TickString (46):      version, ticker_id, tick_type, value
//! TickSnapshotEnd (57): version, req_id
//! MarketDataType (58):  version, req_id, market_data_type
//! TickReqParams (81):   ticker_id, min_tick, bbo_exchange, snapshot_permissions
//! MarketDepth (12):     version, ticker_id, position, operation, side, price, size
//! MarketDepthL2 (13):   version, ticker_id, position, market_maker, operation,
//!                       side, price, size, is_smart_depth
//! ```
//!
//! The handshake reply is not a coded message; see [`handshake_reply`].

use chrono::{DateTime, Utc};
use gateway_core::{
    Bar, Contract, ContractDetails, DepthOperation, DepthUpdate, ErrorNotice, Side,
    TickAttributes, TickEvent,
};

use crate::field_codec::{FieldDecoder, ProtocolError};

/// Upper bound on up-front allocation for a bar list; the real count is
/// still honoured, the vector just grows past this.
const MAX_PREALLOCATED_BARS: usize = 4096;

/// Reply to the handshake: `(server_version, connection_time_or_redirect_host)`.
pub fn handshake_reply(fields: &mut FieldDecoder<'_>) -> Result<(i32, String), ProtocolError> {
    let server_version = fields.read_i32();
    let text = fields.read_string();
    fields.finish((server_version, text))
}

/// Raw order id announced by the gateway (range checks are the caller's job).
pub fn next_valid_id(fields: &mut FieldDecoder<'_>) -> Result<i64, ProtocolError> {
    let _version = fields.read_i32();
    let id = fields.read_i64();
    fields.finish(id)
}

pub fn current_time(fields: &mut FieldDecoder<'_>) -> Result<DateTime<Utc>, ProtocolError> {
    let _version = fields.read_i32();
    let secs = fields.read_i64();
    match DateTime::from_timestamp(secs, 0) {
        Some(ts) => fields.finish(ts),
        None => {
            fields.fail(ProtocolError::InvalidField {
                kind: "epoch",
                token: secs.to_string(),
            });
            fields.finish(DateTime::<Utc>::default())
        }
    }
}

pub fn managed_accounts(fields: &mut FieldDecoder<'_>) -> Result<Vec<String>, ProtocolError> {
    let _version = fields.read_i32();
    let list = fields.read_string();
    let accounts = list
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    fields.finish(accounts)
}

pub fn error_notice(fields: &mut FieldDecoder<'_>) -> Result<ErrorNotice, ProtocolError> {
    let _version = fields.read_i32();
    let id = fields.read_i32();
    let code = fields.read_i32();
    let message = fields.read_string();
    fields.finish(ErrorNotice { id, code, message })
}

pub fn contract_data(
    fields: &mut FieldDecoder<'_>,
) -> Result<(i32, ContractDetails), ProtocolError> {
    let _version = fields.read_i32();
    let req_id = fields.read_i32();

    let mut contract = Contract {
        symbol: fields.read_string(),
        sec_type: fields.read_string(),
        last_trade_date_or_contract_month: fields.read_string(),
        strike: fields.read_f64(),
        right: fields.read_string(),
        exchange: fields.read_string(),
        currency: fields.read_string(),
        local_symbol: fields.read_string(),
        ..Default::default()
    };
    let market_name = fields.read_string();
    contract.trading_class = fields.read_string();
    contract.con_id = fields.read_i32();
    let min_tick = fields.read_f64();
    contract.multiplier = fields.read_string();
    let valid_exchanges = fields.read_string();
    let long_name = fields.read_string();
    contract.primary_exchange = fields.read_string();
    let time_zone_id = fields.read_string();

    fields.finish((
        req_id,
        ContractDetails {
            contract,
            market_name,
            min_tick,
            long_name,
            time_zone_id,
            valid_exchanges,
        },
    ))
}

/// Request id of an end-of-list marker (`ContractDataEnd`, `TickSnapshotEnd`).
pub fn end_marker(fields: &mut FieldDecoder<'_>) -> Result<i32, ProtocolError> {
    let _version = fields.read_i32();
    let req_id = fields.read_i32();
    fields.finish(req_id)
}

pub fn historical_data(fields: &mut FieldDecoder<'_>) -> Result<(i32, Vec<Bar>), ProtocolError> {
    let req_id = fields.read_i32();
    let _start = fields.read_string();
    let _end = fields.read_string();
    let count = fields.read_i32();

    let count = match usize::try_from(count) {
        Ok(n) => n,
        Err(_) => {
            fields.fail(ProtocolError::InvalidField {
                kind: "bar count",
                token: count.to_string(),
            });
            0
        }
    };

    let mut bars = Vec::with_capacity(count.min(MAX_PREALLOCATED_BARS));
    for _ in 0..count {
        if fields.error().is_some() {
            break;
        }
        bars.push(Bar {
            time: fields.read_timestamp(),
            open: fields.read_f64(),
            high: fields.read_f64(),
            low: fields.read_f64(),
            close: fields.read_f64(),
            volume: fields.read_decimal(),
            wap: fields.read_decimal(),
            count: fields.read_i32(),
        });
    }

    fields.finish((req_id, bars))
}

pub fn tick_price(fields: &mut FieldDecoder<'_>) -> Result<(i32, TickEvent), ProtocolError> {
    let _version = fields.read_i32();
    let ticker_id = fields.read_i32();
    let tick_type = fields.read_i32();
    let price = fields.read_f64();
    let size = fields.read_decimal();
    let mask = fields.read_i32();
    fields.finish((
        ticker_id,
        TickEvent::Price {
            tick_type,
            price,
            size,
            attributes: TickAttributes::from_mask(mask),
        },
    ))
}

pub fn tick_size(fields: &mut FieldDecoder<'_>) -> Result<(i32, TickEvent), ProtocolError> {
    let _version = fields.read_i32();
    let ticker_id = fields.read_i32();
    let tick_type = fields.read_i32();
    let size = fields.read_decimal();
    fields.finish((ticker_id, TickEvent::Size { tick_type, size }))
}

pub fn tick_generic(fields: &mut FieldDecoder<'_>) -> Result<(i32, TickEvent), ProtocolError> {
    let _version = fields.read_i32();
    let ticker_id = fields.read_i32();
    let tick_type = fields.read_i32();
    let value = fields.read_f64();
    fields.finish((ticker_id, TickEvent::Generic { tick_type, value }))
}

pub fn tick_string(fields: &mut FieldDecoder<'_>) -> Result<(i32, TickEvent), ProtocolError> {
    let _version = fields.read_i32();
    let ticker_id = fields.read_i32();
    let tick_type = fields.read_i32();
    let value = fields.read_string();
    fields.finish((ticker_id, TickEvent::String { tick_type, value }))
}

/// `(req_id, market_data_type)`.
pub fn market_data_type(fields: &mut FieldDecoder<'_>) -> Result<(i32, i32), ProtocolError> {
    let _version = fields.read_i32();
    let req_id = fields.read_i32();
    let kind = fields.read_i32();
    fields.finish((req_id, kind))
}

pub fn tick_req_params(fields: &mut FieldDecoder<'_>) -> Result<(i32, TickEvent), ProtocolError> {
    let ticker_id = fields.read_i32();
    let min_tick = fields.read_f64();
    let bbo_exchange = fields.read_string();
    let snapshot_permissions = fields.read_i32();
    fields.finish((
        ticker_id,
        TickEvent::RequestParams {
            min_tick,
            bbo_exchange,
            snapshot_permissions,
        },
    ))
}

pub fn market_depth(fields: &mut FieldDecoder<'_>) -> Result<(i32, DepthUpdate), ProtocolError> {
    let _version = fields.read_i32();
    let ticker_id = fields.read_i32();
    let position = fields.read_i32();
    let operation = fields.read_i32();
    let side = fields.read_i32();
    let price = fields.read_f64();
    let size = fields.read_decimal();
    fields.finish(())?;

    Ok((
        ticker_id,
        DepthUpdate {
            position,
            market_maker: String::new(),
            operation: DepthOperation::from_wire(operation)?,
            side: Side::from_wire(side)?,
            price,
            size,
        },
    ))
}

pub fn market_depth_l2(
    fields: &mut FieldDecoder<'_>,
) -> Result<(i32, DepthUpdate), ProtocolError> {
    let _version = fields.read_i32();
    let ticker_id = fields.read_i32();
    let position = fields.read_i32();
    let market_maker = fields.read_string();
    let operation = fields.read_i32();
    let side = fields.read_i32();
    let price = fields.read_f64();
    let size = fields.read_decimal();
    let _is_smart_depth = fields.read_bool();
    fields.finish(())?;

    Ok((
        ticker_id,
        DepthUpdate {
            position,
            market_maker,
            operation: DepthOperation::from_wire(operation)?,
            side: Side::from_wire(side)?,
            price,
            size,
        },
    ))
}
