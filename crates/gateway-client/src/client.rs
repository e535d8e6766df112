// crates/gateway-client/src/client.rs
//! The gateway client.
//!
//! [`Client::connect`] runs the whole connect sequence before returning:
//!
//! ```text
//! Dial → Handshake → (Redirect → Dial)* → StartAPI → AwaitFirstID → Ready
//! ```
//!
//! Once ready, a single dispatch task reads every incoming message in
//! order and routes it to the pending request it answers (through the
//! request manager) or to the [`EventHandler`](crate::EventHandler). A transport or protocol
//! failure ends the dispatch task and tears down every pending request
//! with the same error; there is no reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Utc};
use gateway_core::{
    Bar, Contract, ContractDetails, HistoricalDataRequest, MarketDepth, MarketDepthBook,
    TickEvent,
};
use gateway_protocol::{
    decode, encode, frame, is_suppressed_error, parse_timestamp, split_code, FieldDecoder,
    IncomingCode, ProtocolError, MAX_CLIENT_VERSION, MIN_CLIENT_VERSION, MIN_SERVER_VERSION,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::request::{Request, RequestKey, Response};
use crate::request_manager::{RequestManager, Target};
use crate::rundown::Rundown;
use crate::subscription::Subscription;
use crate::types::{DepthStream, OutcomeRx, SharedHandler, TickStream};

/// Redirect replies accepted before the connect sequence gives up.
pub const MAX_REDIRECTS: usize = 10;

/// Largest row count accepted by [`Client::market_depth`].
pub const MAX_DEPTH_ROWS: usize = 500;

/// A connected gateway client.
///
/// Dropping the client stops its background task; prefer
/// [`Client::close`] to wait for everything to wind down.
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    client_id: i32,
    server_version: i32,
    connection_time: Option<DateTime<Utc>>,
    tz_offset: FixedOffset,
    handler: SharedHandler,
    requests: RequestManager,
    connection: Mutex<Option<Arc<Connection>>>,
    ready: CancellationToken,
    down: CancellationToken,
    shutdown: CancellationToken,
    terminal_error: OnceLock<ClientError>,
    rundown: Rundown,
    dispatch_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    closing: AtomicBool,
}

/// What the connect sequence hands over once the first id arrived.
struct Session {
    connection: Connection,
    server_version: i32,
    connection_time: String,
    first_id: i32,
}

enum HandshakeReply {
    Accepted {
        server_version: i32,
        connection_time: String,
    },
    Redirect(String),
}

impl Client {
    /// Connect, negotiate, and wait for the first usable id.
    ///
    /// The whole sequence is bounded by `config.connect_timeout`. On any
    /// failure the partial connection is closed and no task is left behind.
    pub async fn connect(config: ClientConfig, handler: SharedHandler) -> Result<Self, ClientError> {
        config.validate()?;
        let tz_offset = config.tz_offset()?;
        let client_id = config.resolve_client_id();

        let session = match tokio::time::timeout(
            config.connect_timeout,
            establish(&config, client_id),
        )
        .await
        {
            Ok(session) => session?,
            Err(_) => {
                warn!(address = %config.address, "connect sequence timed out");
                return Err(ClientError::Timeout);
            }
        };

        let connection = Arc::new(session.connection);
        let connection_time = parse_timestamp(&session.connection_time, tz_offset);
        info!(
            peer = %connection.peer(),
            client_id,
            server_version = session.server_version,
            first_id = session.first_id,
            "connected to gateway"
        );

        let requests = RequestManager::new();
        requests.seed_ids(session.first_id);

        let inner = Arc::new(ClientInner {
            config,
            client_id,
            server_version: session.server_version,
            connection_time,
            tz_offset,
            handler,
            requests,
            connection: Mutex::new(Some(connection.clone())),
            ready: CancellationToken::new(),
            down: CancellationToken::new(),
            shutdown: CancellationToken::new(),
            terminal_error: OnceLock::new(),
            rundown: Rundown::new(),
            dispatch_task: tokio::sync::Mutex::new(None),
            closing: AtomicBool::new(false),
        });

        let task = tokio::spawn(run_dispatch(inner.clone(), connection));
        *inner.dispatch_task.lock().await = Some(task);
        inner.ready.cancel();

        Ok(Client { inner })
    }

    pub fn client_id(&self) -> i32 {
        self.inner.client_id
    }

    pub fn server_version(&self) -> i32 {
        self.inner.server_version
    }

    /// Connection time reported in the handshake, if it parsed.
    pub fn connection_time(&self) -> Option<DateTime<Utc>> {
        self.inner.connection_time
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Resolves once the connect sequence has completed.
    pub async fn ready(&self) {
        self.inner.ready.cancelled().await
    }

    /// Resolves once the connection is gone (failure or close).
    pub async fn disconnected(&self) {
        self.inner.down.cancelled().await
    }

    /// The error that ended the connection, if it has ended.
    pub fn last_error(&self) -> Option<ClientError> {
        self.inner.terminal_error.get().cloned()
    }

    /// Gateway wall-clock time.
    pub async fn current_time(&self) -> Result<DateTime<Utc>, ClientError> {
        let key = self.inner.requests.without_id_key(IncomingCode::CurrentTime.as_i32());
        let response = self
            .inner
            .call(key, Response::CurrentTime(None), encode::req_current_time(), None)
            .await?;
        match response {
            Response::CurrentTime(Some(time)) => Ok(time),
            other => Err(other.mismatch("current time")),
        }
    }

    /// Accounts visible to this session.
    pub async fn managed_accounts(&self) -> Result<Vec<String>, ClientError> {
        let key = self.inner.requests.without_id_key(IncomingCode::ManagedAccounts.as_i32());
        let response = self
            .inner
            .call(key, Response::ManagedAccounts(None), encode::req_managed_accounts(), None)
            .await?;
        match response {
            Response::ManagedAccounts(Some(accounts)) => Ok(accounts),
            other => Err(other.mismatch("managed accounts")),
        }
    }

    /// Next order id according to the gateway. Does not touch the
    /// correlation id counter.
    pub async fn next_valid_id(&self) -> Result<i32, ClientError> {
        let key = self.inner.requests.without_id_key(IncomingCode::NextValidId.as_i32());
        let response = self
            .inner
            .call(key, Response::NextValidId(None), encode::req_ids(1), None)
            .await?;
        match response {
            Response::NextValidId(Some(id)) => Ok(id),
            other => Err(other.mismatch("next valid id")),
        }
    }

    /// Every contract matching `contract` (may be several).
    pub async fn contract_details(
        &self,
        contract: &Contract,
    ) -> Result<Vec<ContractDetails>, ClientError> {
        let id = self.inner.requests.allocate_id()?;
        let response = self
            .inner
            .call(
                RequestKey::WithId(id),
                Response::ContractDetails(Vec::new()),
                encode::req_contract_details(id, contract),
                None,
            )
            .await?;
        match response {
            Response::ContractDetails(list) => Ok(list),
            other => Err(other.mismatch("contract data")),
        }
    }

    /// Historical bars for `contract`.
    pub async fn historical_data(
        &self,
        contract: &Contract,
        request: &HistoricalDataRequest,
    ) -> Result<Vec<Bar>, ClientError> {
        let id = self.inner.requests.allocate_id()?;
        let response = self
            .inner
            .call(
                RequestKey::WithId(id),
                Response::HistoricalBars(None),
                encode::req_historical_data(id, contract, request),
                encode::cancel_historical_data(id).ok(),
            )
            .await?;
        match response {
            Response::HistoricalBars(Some(bars)) => Ok(bars),
            other => Err(other.mismatch("historical data")),
        }
    }

    /// Stream quotes for `contract`. With `snapshot`, the stream ends by
    /// itself once the gateway has sent one full snapshot.
    pub fn market_data(
        &self,
        contract: &Contract,
        generic_ticks: &str,
        snapshot: bool,
    ) -> Result<TickStream, ClientError> {
        let id = self.inner.requests.allocate_id()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribe(
            id,
            Response::MarketData { tx, snapshot },
            rx,
            encode::req_market_data(id, contract, generic_ticks, snapshot, false),
            encode::cancel_market_data(id).ok(),
        )
    }

    /// Stream the order book for `contract`, `rows` levels per side. Each
    /// item is a full snapshot taken after one update was applied.
    pub fn market_depth(
        &self,
        contract: &Contract,
        rows: usize,
        smart_depth: bool,
    ) -> Result<DepthStream, ClientError> {
        let wire_rows = Some(rows)
            .filter(|r| (1..=MAX_DEPTH_ROWS).contains(r))
            .and_then(|r| i32::try_from(r).ok())
            .ok_or_else(|| {
                ClientError::Config(format!(
                    "depth row count {rows} outside 1..={MAX_DEPTH_ROWS}"
                ))
            })?;

        let id = self.inner.requests.allocate_id()?;
        let (tx, rx) = mpsc::unbounded_channel::<MarketDepth>();
        self.inner.subscribe(
            id,
            Response::MarketDepth {
                book: MarketDepthBook::new(rows),
                tx,
            },
            rx,
            encode::req_market_depth(id, contract, wire_rows, smart_depth),
            encode::cancel_market_depth(id, smart_depth).ok(),
        )
    }

    /// Switch between live (1), frozen (2), delayed (3) and
    /// delayed-frozen (4) market data.
    pub fn set_market_data_type(&self, market_data_type: i32) -> Result<(), ClientError> {
        let _guard = self.inner.rundown.acquire().ok_or(ClientError::Closed)?;
        let frame = encode::req_market_data_type(market_data_type)?;
        self.inner.send(&frame)
    }

    /// Stop admitting calls, wait for in-flight ones, close the connection
    /// and join the dispatch task. Idempotent.
    pub async fn close(&self) {
        self.inner.closing.store(true, Ordering::Release);
        if self.inner.rundown.begin_close() {
            debug!(client_id = self.inner.client_id, "closing client");
        }
        self.inner.shutdown.cancel();
        self.inner.rundown.wait().await;

        let mut task = self.inner.dispatch_task.lock().await;
        if let Some(task) = task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "dispatch task failed");
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.inner.closing.store(true, Ordering::Release);
        self.inner.shutdown.cancel();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.inner.config.address)
            .field("client_id", &self.inner.client_id)
            .field("server_version", &self.inner.server_version)
            .field("connected", &self.inner.is_connected())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Connect sequence
// ----------------------------------------------------------------------------

async fn establish(config: &ClientConfig, client_id: i32) -> Result<Session, ClientError> {
    let mut address = config.address.clone();
    let mut redirects = 0usize;

    let (connection, server_version, connection_time) = loop {
        let connection =
            Connection::connect(&address, config.dial_timeout, config.write_timeout).await?;

        match handshake(&connection, &config.connect_options).await {
            Ok(HandshakeReply::Accepted {
                server_version,
                connection_time,
            }) => break (connection, server_version, connection_time),
            Ok(HandshakeReply::Redirect(host)) => {
                connection.close().await;
                redirects += 1;
                if redirects > MAX_REDIRECTS {
                    return Err(ClientError::TooManyRedirects(MAX_REDIRECTS));
                }
                address = redirect_address(&host, &address);
                info!(%address, redirects, "redirected by gateway");
            }
            Err(err) => {
                connection.close().await;
                return Err(err);
            }
        }
    };

    let first_id = async {
        let start = encode::start_api(client_id, &config.optional_capabilities)?;
        connection.send(&start)?;
        await_first_id(&connection).await
    }
    .await;

    match first_id {
        Ok(first_id) => Ok(Session {
            connection,
            server_version,
            connection_time,
            first_id,
        }),
        Err(err) => {
            connection.close().await;
            Err(err)
        }
    }
}

async fn handshake(connection: &Connection, options: &str) -> Result<HandshakeReply, ClientError> {
    let hello = frame::handshake(MIN_CLIENT_VERSION, MAX_CLIENT_VERSION, options)?;
    connection.send(&hello)?;

    let reply = connection.recv().await?;
    let mut fields = FieldDecoder::new(&reply);
    let (server_version, text) = decode::handshake_reply(&mut fields)?;

    if server_version < 0 {
        return Ok(HandshakeReply::Redirect(text));
    }
    if server_version < MIN_SERVER_VERSION {
        return Err(ClientError::UnsupportedServerVersion(server_version));
    }
    Ok(HandshakeReply::Accepted {
        server_version,
        connection_time: text,
    })
}

/// Drop everything until the first `NextValidId`.
async fn await_first_id(connection: &Connection) -> Result<i32, ClientError> {
    loop {
        let payload = connection.recv().await?;
        let mut fields = FieldDecoder::new(&payload);
        let (code, _) = split_code(fields.read_i32());
        fields.finish(())?;

        if code != IncomingCode::NextValidId.as_i32() {
            debug!(code, "dropping message received before the first id");
            continue;
        }
        let raw = decode::next_valid_id(&mut fields)?;
        return Ok(clamp_id(raw));
    }
}

/// Ids outside `1..=i32::MAX` fall back to 1.
fn clamp_id(raw: i64) -> i32 {
    i32::try_from(raw).ok().filter(|id| *id >= 1).unwrap_or(1)
}

/// A redirect target without a port keeps the port we dialled.
fn redirect_address(host: &str, previous: &str) -> String {
    let host = host.trim();
    if host.contains(':') {
        return host.to_string();
    }
    match previous.rsplit_once(':') {
        Some((_, port)) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

// ----------------------------------------------------------------------------
// Request plumbing
// ----------------------------------------------------------------------------

impl ClientInner {
    fn is_connected(&self) -> bool {
        !self.down.is_cancelled() && self.connection.lock().is_some()
    }

    fn closed_error(&self) -> ClientError {
        self.terminal_error.get().cloned().unwrap_or(ClientError::Closed)
    }

    /// Queue `frame` on the current connection. Holding the connection
    /// lock across the enqueue means a racing teardown is either after us
    /// or visible to us.
    fn send(&self, frame: &[u8]) -> Result<(), ClientError> {
        let connection = self.connection.lock();
        match connection.as_ref() {
            Some(connection) => connection.send(frame),
            None => Err(self.closed_error()),
        }
    }

    /// Register, send, then wait for completion, connection loss or the
    /// request timeout, whichever comes first.
    async fn call(
        &self,
        key: RequestKey,
        response: Response,
        frame: Result<Bytes, ProtocolError>,
        cancel_frame: Option<Bytes>,
    ) -> Result<Response, ClientError> {
        let _guard = self.rundown.acquire().ok_or(ClientError::Closed)?;
        let frame = frame?;

        let (request, outcome) = Request::new(key, response);
        self.requests.register(request.clone())?;
        if let Err(err) = self.send(&frame) {
            self.requests.cancel(&request, err.clone());
            return Err(err);
        }

        let _pending = PendingGuard {
            inner: self,
            request: &request,
            cancel_frame,
        };
        self.wait_outcome(outcome).await
    }

    async fn wait_outcome(&self, outcome: OutcomeRx) -> Result<Response, ClientError> {
        tokio::select! {
            biased;
            res = outcome => res.unwrap_or(Err(ClientError::Closed)),
            _ = self.down.cancelled() => Err(self.closed_error()),
            _ = request_deadline(self.config.request_timeout) => Err(ClientError::Timeout),
        }
    }

    fn subscribe<T: Send + 'static>(
        self: &Arc<Self>,
        id: i32,
        response: Response,
        rx: mpsc::UnboundedReceiver<T>,
        frame: Result<Bytes, ProtocolError>,
        cancel_frame: Option<Bytes>,
    ) -> Result<Subscription<T>, ClientError> {
        let _guard = self.rundown.acquire().ok_or(ClientError::Closed)?;
        let frame = frame?;

        let error = Arc::new(OnceLock::new());
        let slot = error.clone();
        let request = Request::streaming(
            RequestKey::Ticker(id),
            response,
            Box::new(move |err: Option<&ClientError>| {
                if let Some(err) = err {
                    let _ = slot.set(err.clone());
                }
            }),
        );

        self.requests.register(request.clone())?;
        if let Err(err) = self.send(&frame) {
            self.requests.cancel(&request, err.clone());
            return Err(err);
        }

        let inner = Arc::clone(self);
        let cancel = Box::new(move || {
            if inner.requests.cancel(&request, ClientError::Cancelled) {
                debug!(id, "stream cancelled");
                if let Some(frame) = cancel_frame {
                    if let Err(err) = inner.send(&frame) {
                        debug!(id, error = %err, "cancel not sent");
                    }
                }
            }
        });
        Ok(Subscription::new(id, rx, error, cancel))
    }
}

/// Resolves after `timeout`; never resolves without one.
async fn request_deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Cleans up after a call that returned without its request completing
/// (timeout, connection loss, or the caller dropping the future).
struct PendingGuard<'a> {
    inner: &'a ClientInner,
    request: &'a Arc<Request>,
    cancel_frame: Option<Bytes>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.request.is_done() {
            return;
        }
        match self.request.key() {
            // Left queued so its late reply is absorbed in order.
            RequestKey::WithoutId { code, seq } => {
                debug!(code, seq, "abandoning request");
                self.request.complete(Some(ClientError::Cancelled));
            }
            key => {
                if self.inner.requests.cancel(self.request, ClientError::Cancelled) {
                    debug!(id = ?key.id(), "abandoning request");
                    if let Some(frame) = &self.cancel_frame {
                        let _ = self.inner.send(frame);
                    }
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Dispatch loop
// ----------------------------------------------------------------------------

async fn run_dispatch(inner: Arc<ClientInner>, connection: Arc<Connection>) {
    let err = loop {
        let payload = tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => break ClientError::Closed,
            payload = connection.recv() => payload,
        };

        match payload {
            Ok(payload) => {
                if let Err(err) = inner.handle_message(&payload) {
                    break err;
                }
            }
            Err(err) => break err,
        }
    };
    drop(connection);

    inner.connection_lost(err).await;
}

impl ClientInner {
    async fn connection_lost(&self, err: ClientError) {
        let err = err.classify();
        let _ = self.terminal_error.set(err.clone());
        self.down.cancel();

        let connection = self.connection.lock().take();
        if let Some(connection) = connection {
            connection.close().await;
        }

        self.requests.teardown(&err);

        if self.closing.load(Ordering::Acquire) {
            debug!("dispatch loop stopped");
        } else {
            warn!(error = %err, "connection lost");
            self.handler.connection_closed(&err);
        }
    }

    /// Decode one message and route it. An error here is fatal for the
    /// connection.
    fn handle_message(&self, payload: &[u8]) -> Result<(), ClientError> {
        let mut fields = FieldDecoder::with_offset(payload, self.tz_offset);
        let raw = fields.read_i32();
        fields.finish(())?;

        let (code, alternate) = split_code(raw);
        let code = match IncomingCode::from_i32(code) {
            Some(code) if !alternate => code,
            _ => {
                debug!(code = raw, "unhandled message");
                self.handler.unknown_message(raw);
                return Ok(());
            }
        };

        match code {
            IncomingCode::TickPrice
            | IncomingCode::TickSize
            | IncomingCode::TickGeneric
            | IncomingCode::TickString
            | IncomingCode::TickReqParams => {
                let tick = match code {
                    IncomingCode::TickPrice => decode::tick_price(&mut fields)?,
                    IncomingCode::TickSize => decode::tick_size(&mut fields)?,
                    IncomingCode::TickGeneric => decode::tick_generic(&mut fields)?,
                    IncomingCode::TickString => decode::tick_string(&mut fields)?,
                    _ => decode::tick_req_params(&mut fields)?,
                };
                self.on_tick(tick);
            }

            IncomingCode::MarketDataType => {
                let (req_id, kind) = decode::market_data_type(&mut fields)?;
                let routed = self.on_tick((req_id, TickEvent::MarketDataType(kind)));
                if !routed {
                    self.handler.market_data_type(req_id, kind);
                }
            }

            IncomingCode::TickSnapshotEnd => {
                let req_id = decode::end_marker(&mut fields)?;
                self.requests.dispatch(Target::Id(req_id), |response| match response {
                    Response::MarketData { .. } => Ok(true),
                    other => Err(other.mismatch("snapshot end")),
                });
            }

            IncomingCode::MarketDepth | IncomingCode::MarketDepthL2 => {
                let (ticker, update) = if code == IncomingCode::MarketDepth {
                    decode::market_depth(&mut fields)?
                } else {
                    decode::market_depth_l2(&mut fields)?
                };
                self.requests.dispatch(Target::Id(ticker), |response| match response {
                    Response::MarketDepth { book, tx } => {
                        match book.apply(&update) {
                            Ok(()) => {
                                let _ = tx.send(book.snapshot());
                            }
                            Err(err) => warn!(ticker, error = %err, "depth update skipped"),
                        }
                        Ok(false)
                    }
                    other => Err(other.mismatch("market depth")),
                });
            }

            IncomingCode::ContractData => {
                let (req_id, details) = decode::contract_data(&mut fields)?;
                self.requests.dispatch(Target::Id(req_id), |response| match response {
                    Response::ContractDetails(list) => {
                        list.push(details);
                        Ok(false)
                    }
                    other => Err(other.mismatch("contract data")),
                });
            }

            IncomingCode::ContractDataEnd => {
                let req_id = decode::end_marker(&mut fields)?;
                self.requests.dispatch(Target::Id(req_id), |response| match response {
                    Response::ContractDetails(_) => Ok(true),
                    other => Err(other.mismatch("contract data end")),
                });
            }

            IncomingCode::HistoricalData => {
                let (req_id, bars) = decode::historical_data(&mut fields)?;
                self.requests.dispatch(Target::Id(req_id), |response| match response {
                    Response::HistoricalBars(slot) => {
                        *slot = Some(bars);
                        Ok(true)
                    }
                    other => Err(other.mismatch("historical data")),
                });
            }

            IncomingCode::CurrentTime => {
                let time = decode::current_time(&mut fields)?;
                let routed = self.requests.dispatch(Target::Code(code.as_i32()), |response| {
                    match response {
                        Response::CurrentTime(slot) => {
                            *slot = Some(time);
                            Ok(true)
                        }
                        other => Err(other.mismatch("current time")),
                    }
                });
                if !routed {
                    self.handler.current_time(time);
                }
            }

            IncomingCode::ManagedAccounts => {
                let accounts = decode::managed_accounts(&mut fields)?;
                let unsolicited = accounts.clone();
                let routed = self.requests.dispatch(Target::Code(code.as_i32()), |response| {
                    match response {
                        Response::ManagedAccounts(slot) => {
                            *slot = Some(accounts);
                            Ok(true)
                        }
                        other => Err(other.mismatch("managed accounts")),
                    }
                });
                if !routed {
                    self.handler.managed_accounts(&unsolicited);
                }
            }

            IncomingCode::NextValidId => {
                let id = clamp_id(decode::next_valid_id(&mut fields)?);
                let routed = self.requests.dispatch(Target::Code(code.as_i32()), |response| {
                    match response {
                        Response::NextValidId(slot) => {
                            *slot = Some(id);
                            Ok(true)
                        }
                        other => Err(other.mismatch("next valid id")),
                    }
                });
                if !routed {
                    self.handler.next_valid_id(id);
                }
            }

            IncomingCode::ErrorMessage => {
                let notice = decode::error_notice(&mut fields)?;
                if is_suppressed_error(notice.code) {
                    debug!(id = notice.id, code = notice.code, message = %notice.message, "suppressed notice");
                    return Ok(());
                }
                let routed = notice.has_request_id()
                    && self.requests.fail(
                        notice.id,
                        ClientError::Api {
                            code: notice.code,
                            message: notice.message.clone(),
                        },
                    );
                if !routed {
                    self.handler.error(notice.id, notice.code, &notice.message);
                }
            }
        }
        Ok(())
    }

    /// Push one event to the market-data stream `ticker`; `false` when no
    /// such stream is open.
    fn on_tick(&self, (ticker, event): (i32, TickEvent)) -> bool {
        self.requests.dispatch(Target::Id(ticker), |response| match response {
            Response::MarketData { tx, .. } => {
                let _ = tx.send(event);
                Ok(false)
            }
            other => Err(other.mismatch("tick")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_keeps_port_when_missing() {
        assert_eq!(redirect_address("10.0.0.2", "127.0.0.1:4002"), "10.0.0.2:4002");
        assert_eq!(redirect_address("10.0.0.2:4001", "127.0.0.1:4002"), "10.0.0.2:4001");
    }

    #[test]
    fn first_id_is_clamped() {
        assert_eq!(clamp_id(42), 42);
        assert_eq!(clamp_id(0), 1);
        assert_eq!(clamp_id(-5), 1);
        assert_eq!(clamp_id(i64::from(i32::MAX) + 1), 1);
    }
}
