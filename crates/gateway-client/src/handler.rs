//! Callbacks for messages not tied to any open request.
//!
//! Hooks run on the dispatch task, in arrival order; keep them short.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::ClientError;

/// Receiver for unsolicited gateway notifications.
///
/// Every hook has a no-op default, so implementors override only what
/// they care about.
pub trait EventHandler: Send + Sync {
    /// Error or informational notice. `id` is `-1` (or the id of a request
    /// that is no longer pending) when no open request claims it.
    fn error(&self, _id: i32, _code: i32, _message: &str) {}

    fn next_valid_id(&self, _id: i32) {}

    fn managed_accounts(&self, _accounts: &[String]) {}

    fn current_time(&self, _time: DateTime<Utc>) {}

    /// Market-data type switch for a stream that is no longer open.
    fn market_data_type(&self, _req_id: i32, _market_data_type: i32) {}

    /// The connection ended. Not called for a locally requested close.
    fn connection_closed(&self, _error: &ClientError) {}

    /// A message this client cannot decode, with its code as received
    /// (alternate-encoded messages keep their bias).
    fn unknown_message(&self, _code: i32) {}
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl EventHandler for NoopHandler {}

/// Writes every notification to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn error(&self, id: i32, code: i32, message: &str) {
        warn!(id, code, message, "gateway notice");
    }

    fn next_valid_id(&self, id: i32) {
        info!(id, "next valid id");
    }

    fn managed_accounts(&self, accounts: &[String]) {
        info!(accounts = %accounts.join(","), "managed accounts");
    }

    fn current_time(&self, time: DateTime<Utc>) {
        info!(%time, "gateway time");
    }

    fn market_data_type(&self, req_id: i32, market_data_type: i32) {
        info!(req_id, market_data_type, "market data type");
    }

    fn connection_closed(&self, error: &ClientError) {
        warn!(%error, "connection closed");
    }

    fn unknown_message(&self, code: i32) {
        warn!(code, "unknown message");
    }
}
