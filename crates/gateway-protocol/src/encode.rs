//! Encoders for outgoing requests (client → gateway).
//!
//! Every function returns one complete frame (length header included),
//! ready to be queued on the connection.
//!
//! ```text
//! StartApi (71):            2, client_id, optional_capabilities
//! ReqCurrentTime (49):      1
//! ReqManagedAccounts (17):  1
//! ReqIds (8):               1, num_ids
//! ReqContractData (9):      8, req_id, <contract>, include_expired, sec_id_type, sec_id
//! ReqHistoricalData (20):   req_id, <contract>, include_expired, end, bar_size,
//!                           duration, use_rth, what_to_show, format_date(=2),
//!                           keep_up_to_date(=0), chart_options
//! CancelHistoricalData(25): 1, req_id
//! ReqMarketData (1):        11, ticker_id, <contract>, delta_neutral(=0),
//!                           generic_ticks, snapshot, regulatory_snapshot, options
//! CancelMarketData (2):     2, ticker_id
//! ReqMarketDepth (10):      5, ticker_id, <contract>, rows, smart_depth, options
//! CancelMarketDepth (11):   1, ticker_id, smart_depth
//! ReqMarketDataType (59):   1, market_data_type
//!
//! <contract> = con_id, symbol, sec_type, last_trade_date, strike, right,
//!              multiplier, exchange, primary_exchange, currency,
//!              local_symbol, trading_class
//! ```

use bytes::Bytes;
use gateway_core::{Contract, HistoricalDataRequest};

use crate::field_codec::{FieldEncoder, ProtocolError};
use crate::wire_types::OutgoingCode;

/// Bars are always requested with epoch-second timestamps.
const FORMAT_DATE_EPOCH: i32 = 2;

/// Every server version this client accepts takes the capabilities
/// field, so it is always written (empty when none are configured).
pub fn start_api(client_id: i32, optional_capabilities: &str) -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::StartApi);
    enc.write_i32(2)
        .write_i32(client_id)
        .write_str(optional_capabilities);
    enc.finish()
}

pub fn req_current_time() -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::ReqCurrentTime);
    enc.write_i32(1);
    enc.finish()
}

pub fn req_managed_accounts() -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::ReqManagedAccounts);
    enc.write_i32(1);
    enc.finish()
}

pub fn req_ids(num_ids: i32) -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::ReqIds);
    enc.write_i32(1).write_i32(num_ids);
    enc.finish()
}

pub fn req_contract_details(req_id: i32, contract: &Contract) -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::ReqContractData);
    enc.write_i32(8).write_i32(req_id);
    write_contract(&mut enc, contract);
    enc.write_bool(contract.include_expired)
        .write_str("")
        .write_str("");
    enc.finish()
}

pub fn req_historical_data(
    req_id: i32,
    contract: &Contract,
    request: &HistoricalDataRequest,
) -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::ReqHistoricalData);
    enc.write_i32(req_id);
    write_contract(&mut enc, contract);
    enc.write_bool(contract.include_expired);
    match request.end {
        Some(end) => enc.write_timestamp(end),
        None => enc.write_str(""),
    };
    enc.write_str(&request.bar_size)
        .write_str(&request.duration)
        .write_bool(request.use_rth)
        .write_str(&request.what_to_show)
        .write_i32(FORMAT_DATE_EPOCH)
        .write_bool(false)
        .write_str("");
    enc.finish()
}

pub fn cancel_historical_data(req_id: i32) -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::CancelHistoricalData);
    enc.write_i32(1).write_i32(req_id);
    enc.finish()
}

pub fn req_market_data(
    ticker_id: i32,
    contract: &Contract,
    generic_ticks: &str,
    snapshot: bool,
    regulatory_snapshot: bool,
) -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::ReqMarketData);
    enc.write_i32(11).write_i32(ticker_id);
    write_contract(&mut enc, contract);
    enc.write_bool(false)
        .write_str(generic_ticks)
        .write_bool(snapshot)
        .write_bool(regulatory_snapshot)
        .write_str("");
    enc.finish()
}

pub fn cancel_market_data(ticker_id: i32) -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::CancelMarketData);
    enc.write_i32(2).write_i32(ticker_id);
    enc.finish()
}

pub fn req_market_depth(
    ticker_id: i32,
    contract: &Contract,
    rows: i32,
    smart_depth: bool,
) -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::ReqMarketDepth);
    enc.write_i32(5).write_i32(ticker_id);
    write_contract(&mut enc, contract);
    enc.write_i32(rows).write_bool(smart_depth).write_str("");
    enc.finish()
}

pub fn cancel_market_depth(ticker_id: i32, smart_depth: bool) -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::CancelMarketDepth);
    enc.write_i32(1).write_i32(ticker_id).write_bool(smart_depth);
    enc.finish()
}

pub fn req_market_data_type(market_data_type: i32) -> Result<Bytes, ProtocolError> {
    let mut enc = FieldEncoder::with_code(OutgoingCode::ReqMarketDataType);
    enc.write_i32(1).write_i32(market_data_type);
    enc.finish()
}

fn write_contract(enc: &mut FieldEncoder, c: &Contract) {
    enc.write_i32(c.con_id)
        .write_str(&c.symbol)
        .write_str(&c.sec_type)
        .write_str(&c.last_trade_date_or_contract_month)
        .write_f64(c.strike)
        .write_str(&c.right)
        .write_str(&c.multiplier)
        .write_str(&c.exchange)
        .write_str(&c.primary_exchange)
        .write_str(&c.currency)
        .write_str(&c.local_symbol)
        .write_str(&c.trading_class);
}
