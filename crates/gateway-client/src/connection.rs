// crates/gateway-client/src/connection.rs
//! Framed connection: one socket, one reader task, one writer task.
//!
//! - `send` appends to an outbound buffer and wakes the writer; it never
//!   waits on the network.
//! - The reader reassembles length-prefixed frames and hands each payload
//!   to a single consumer (`recv`).
//! - The first real failure of either task is stored as the connection
//!   fault; later failures and local-closure errors are dropped.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use gateway_protocol::frame;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::ClientError;
use crate::rundown::Rundown;
use crate::types::{InboundRx, InboundTx};

const READ_BUFFER_CAPACITY: usize = 64 * 1024;
const WRITE_CHUNK: usize = 16 * 1024;

/// One-shot error slot shared by the reader and writer.
#[derive(Debug, Default)]
struct Fault {
    slot: OnceLock<ClientError>,
    raised: CancellationToken,
}

impl Fault {
    fn raise(&self, err: ClientError) {
        if err.is_cancellation() {
            return;
        }
        if self.slot.set(err).is_ok() {
            self.raised.cancel();
        }
    }

    fn get(&self) -> Option<ClientError> {
        self.slot.get().cloned()
    }
}

#[derive(Debug)]
struct Shared {
    outbound: Mutex<BytesMut>,
    wake_writer: Notify,
    fault: Fault,
    shutdown: CancellationToken,
    rundown: Rundown,
    write_timeout: Duration,
}

pub(crate) struct Connection {
    shared: Arc<Shared>,
    inbound: tokio::sync::Mutex<InboundRx>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    peer: SocketAddr,
}

impl Connection {
    /// Dial `addr` (bounded by `dial_timeout`) and start the I/O tasks.
    pub(crate) async fn connect(
        addr: &str,
        dial_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let stream = match timeout(dial_timeout, TcpStream::connect(addr)).await {
            Ok(res) => res?,
            Err(_) => return Err(ClientError::Timeout),
        };
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;

        let (read_half, write_half) = stream.into_split();
        let (tx, rx): (InboundTx, InboundRx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            outbound: Mutex::new(BytesMut::with_capacity(WRITE_CHUNK)),
            wake_writer: Notify::new(),
            fault: Fault::default(),
            shutdown: CancellationToken::new(),
            rundown: Rundown::new(),
            write_timeout,
        });

        let reader = tokio::spawn(run_reader(shared.clone(), read_half, tx));
        let writer = tokio::spawn(run_writer(shared.clone(), write_half));
        debug!(%peer, "connection established");

        Ok(Connection {
            shared,
            inbound: tokio::sync::Mutex::new(rx),
            tasks: tokio::sync::Mutex::new(vec![reader, writer]),
            peer,
        })
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queue bytes for the writer. Never blocks.
    pub(crate) fn send(&self, bytes: &[u8]) -> Result<(), ClientError> {
        let _guard = self.shared.rundown.acquire().ok_or(ClientError::Closed)?;
        if let Some(err) = self.shared.fault.get() {
            return Err(err);
        }

        self.shared.outbound.lock().extend_from_slice(bytes);
        self.shared.wake_writer.notify_one();
        Ok(())
    }

    /// Next frame payload, in arrival order.
    ///
    /// Frames that arrived before a fault are still delivered; after that
    /// the fault (or [`ClientError::Closed`] on a clean EOF) is returned.
    pub(crate) async fn recv(&self) -> Result<Bytes, ClientError> {
        let _guard = self.shared.rundown.acquire().ok_or(ClientError::Closed)?;
        let mut inbound = self.inbound.lock().await;

        tokio::select! {
            biased;
            msg = inbound.recv() => match msg {
                Some(payload) => Ok(payload),
                None => Err(self.shared.fault.get().unwrap_or(ClientError::Closed)),
            },
            _ = self.shared.fault.raised.cancelled() => {
                Err(self.shared.fault.get().unwrap_or(ClientError::Closed))
            }
            _ = self.shared.shutdown.cancelled() => Err(ClientError::Closed),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.shared.rundown.is_closing()
    }

    /// Stop admitting operations, wait for in-flight ones, stop both
    /// tasks (closing the socket). Idempotent.
    pub(crate) async fn close(&self) {
        if self.shared.rundown.begin_close() {
            debug!(peer = %self.peer, "closing connection");
        }
        self.shared.shutdown.cancel();
        self.shared.rundown.wait().await;

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            if let Err(err) = task.await {
                warn!(peer = %self.peer, error = %err, "connection task failed");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

// ----------------------------------------------------------------------------
// I/O tasks
// ----------------------------------------------------------------------------

async fn run_reader(shared: Arc<Shared>, mut stream: OwnedReadHalf, tx: InboundTx) {
    let mut buf = BytesMut::with_capacity(READ_BUFFER_CAPACITY);

    loop {
        loop {
            match frame::split_frame(&mut buf) {
                Ok(Some(payload)) => {
                    trace!(len = payload.len(), "frame received");
                    if tx.send(payload).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    shared.fault.raise(err.into());
                    return;
                }
            }
        }

        let read = tokio::select! {
            _ = shared.shutdown.cancelled() => return,
            res = stream.read_buf(&mut buf) => res,
        };

        match read {
            Ok(0) if buf.is_empty() => {
                debug!("peer closed the connection");
                return;
            }
            Ok(0) => {
                shared.fault.raise(ClientError::from(std::io::Error::from(
                    std::io::ErrorKind::UnexpectedEof,
                )));
                return;
            }
            Ok(_) => {}
            Err(err) => {
                if !shared.shutdown.is_cancelled() {
                    shared.fault.raise(err.into());
                }
                return;
            }
        }
    }
}

async fn run_writer(shared: Arc<Shared>, mut stream: OwnedWriteHalf) {
    loop {
        let shutting_down = tokio::select! {
            _ = shared.wake_writer.notified() => false,
            _ = shared.shutdown.cancelled() => true,
        };

        if let Err(err) = flush(&shared, &mut stream).await {
            if !shutting_down {
                shared.fault.raise(err);
            }
            return;
        }

        if shutting_down {
            let _ = stream.shutdown().await;
            return;
        }
    }
}

async fn flush(shared: &Shared, stream: &mut OwnedWriteHalf) -> Result<(), ClientError> {
    loop {
        let chunk = {
            let mut out = shared.outbound.lock();
            if out.is_empty() {
                return Ok(());
            }
            let n = out.len().min(WRITE_CHUNK);
            out.split_to(n).freeze()
        };

        match timeout(shared.write_timeout, stream.write_all(&chunk)).await {
            Ok(Ok(())) => trace!(len = chunk.len(), "chunk written"),
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => return Err(ClientError::Timeout),
        }
    }
}
