//! One outstanding call and its response slot.
//!
//! A [`Request`] is completed exactly once: by a terminal reply, a local
//! cancellation, a send failure, or connection teardown. Completion runs
//! the optional callback first, then fires the one-shot signal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gateway_core::{Bar, ContractDetails, MarketDepth, MarketDepthBook, TickEvent};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::ClientError;
use crate::types::{CompletionCallback, OutcomeRx, OutcomeTx};

/// How replies to a request are matched back to it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) enum RequestKey {
    /// Unique id carried on the wire; one terminal reply (possibly after
    /// several chunks).
    WithId(i32),
    /// No id on the wire: matched by reply code, oldest first. `seq` is a
    /// local pseudo-id used only for logging.
    WithoutId { code: i32, seq: i32 },
    /// Streaming: stays registered until cancelled or torn down.
    Ticker(i32),
}

impl RequestKey {
    pub(crate) fn id(&self) -> Option<i32> {
        match *self {
            RequestKey::WithId(id) | RequestKey::Ticker(id) => Some(id),
            RequestKey::WithoutId { .. } => None,
        }
    }
}

/// Response slot, one variant per kind of call.
#[derive(Debug)]
pub(crate) enum Response {
    CurrentTime(Option<DateTime<Utc>>),
    ManagedAccounts(Option<Vec<String>>),
    NextValidId(Option<i32>),
    ContractDetails(Vec<ContractDetails>),
    HistoricalBars(Option<Vec<Bar>>),
    MarketData {
        tx: mpsc::UnboundedSender<TickEvent>,
        snapshot: bool,
    },
    MarketDepth {
        book: MarketDepthBook,
        tx: mpsc::UnboundedSender<MarketDepth>,
    },
}

impl Response {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Response::CurrentTime(_) => "current time",
            Response::ManagedAccounts(_) => "managed accounts",
            Response::NextValidId(_) => "next valid id",
            Response::ContractDetails(_) => "contract details",
            Response::HistoricalBars(_) => "historical bars",
            Response::MarketData { .. } => "market data",
            Response::MarketDepth { .. } => "market depth",
        }
    }

    /// Error for a reply routed to a slot of the wrong kind.
    pub(crate) fn mismatch(&self, reply: &str) -> ClientError {
        ClientError::Internal(format!("{reply} reply routed to a {} request", self.kind()))
    }
}

struct State {
    response: Option<Response>,
    error: Option<ClientError>,
    done: bool,
    on_complete: Option<CompletionCallback>,
    signal: Option<OutcomeTx>,
}

pub(crate) struct Request {
    key: RequestKey,
    state: Mutex<State>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("key", &self.key)
            .field("done", &self.is_done())
            .finish()
    }
}

impl Request {
    /// A call whose caller awaits the returned receiver.
    pub(crate) fn new(key: RequestKey, response: Response) -> (Arc<Self>, OutcomeRx) {
        let (tx, rx) = oneshot::channel();
        let request = Request {
            key,
            state: Mutex::new(State {
                response: Some(response),
                error: None,
                done: false,
                on_complete: None,
                signal: Some(tx),
            }),
        };
        (Arc::new(request), rx)
    }

    /// A streaming call; `on_complete` sees the final error (if any)
    /// before the response (and with it the stream sender) is dropped.
    pub(crate) fn streaming(
        key: RequestKey,
        response: Response,
        on_complete: CompletionCallback,
    ) -> Arc<Self> {
        Arc::new(Request {
            key,
            state: Mutex::new(State {
                response: Some(response),
                error: None,
                done: false,
                on_complete: Some(on_complete),
                signal: None,
            }),
        })
    }

    pub(crate) fn key(&self) -> RequestKey {
        self.key
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state.lock().done
    }

    /// Run `handler` against the response slot.
    ///
    /// Returns `None` when the request is inert (already completed or
    /// carrying an error), otherwise the handler's verdict: `Ok(true)` for
    /// a terminal reply, `Ok(false)` when more is expected.
    pub(crate) fn handle<F>(&self, handler: F) -> Option<Result<bool, ClientError>>
    where
        F: FnOnce(&mut Response) -> Result<bool, ClientError>,
    {
        let mut state = self.state.lock();
        if state.done || state.error.is_some() {
            return None;
        }
        match state.response.as_mut() {
            Some(response) => Some(handler(response)),
            None => Some(Err(ClientError::Internal(
                "response slot already released".to_string(),
            ))),
        }
    }

    /// Finish the request. Only the first call has any effect; returns
    /// whether this call was it.
    pub(crate) fn complete(&self, err: Option<ClientError>) -> bool {
        let (response, error, callback, signal) = {
            let mut state = self.state.lock();
            if state.done {
                return false;
            }
            state.done = true;
            if state.error.is_none() {
                state.error = err;
            }
            (
                state.response.take(),
                state.error.clone(),
                state.on_complete.take(),
                state.signal.take(),
            )
        };

        if let Some(callback) = callback {
            callback(error.as_ref());
        }

        if let Some(signal) = signal {
            let outcome = match error {
                Some(err) => Err(err),
                None => response.ok_or_else(|| {
                    ClientError::Internal("request completed without a response".to_string())
                }),
            };
            let _ = signal.send(outcome);
        }
        true
    }
}
