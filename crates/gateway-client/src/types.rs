//! Shared types for the gateway client.
//!
//! This module defines:
//! - channel aliases between the connection tasks and the dispatch loop
//! - the completion channel of a one-shot request
//! - public stream aliases

use std::sync::Arc;

use bytes::Bytes;
use gateway_core::{MarketDepth, TickEvent};
use tokio::sync::{mpsc, oneshot};

use crate::error::ClientError;
use crate::handler::EventHandler;
use crate::request::Response;
use crate::subscription::Subscription;

/// Whole frame payloads from the reader task to the dispatch loop.
pub(crate) type InboundTx = mpsc::UnboundedSender<Bytes>;
pub(crate) type InboundRx = mpsc::UnboundedReceiver<Bytes>;

/// Final result of a one-shot request, delivered exactly once.
pub(crate) type Outcome = Result<Response, ClientError>;
pub(crate) type OutcomeTx = oneshot::Sender<Outcome>;
pub(crate) type OutcomeRx = oneshot::Receiver<Outcome>;

/// Invoked once when a request completes, before its signal fires.
pub(crate) type CompletionCallback = Box<dyn FnOnce(Option<&ClientError>) + Send>;

/// Event handler shared between the client and its dispatch task.
pub type SharedHandler = Arc<dyn EventHandler>;

/// Live quotes for one contract.
pub type TickStream = Subscription<TickEvent>;

/// Order-book snapshots for one contract, one per applied update.
pub type DepthStream = Subscription<MarketDepth>;
