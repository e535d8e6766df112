//! Error type shared by the connection, the request manager and the
//! public client API.

use std::io;
use std::sync::Arc;

use gateway_protocol::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the gateway client.
///
/// The type is `Clone` because one connection-level failure is handed to
/// every pending request (and to the event handler) at teardown.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Dial, read or write failure on the socket.
    #[error("i/o error: {0}")]
    Io(Arc<io::Error>),

    /// Malformed frame or field from the peer, or an unencodable request.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The connection (or the client) is closed.
    #[error("connection closed")]
    Closed,

    /// A dial, connect, write or request deadline expired.
    #[error("operation timed out")]
    Timeout,

    /// The request was abandoned locally.
    #[error("request cancelled")]
    Cancelled,

    /// The gateway kept redirecting past the limit.
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// The gateway speaks a protocol version older than we support.
    #[error("unsupported server version {0}")]
    UnsupportedServerVersion(i32),

    /// The gateway rejected one request.
    #[error("gateway error {code}: {message}")]
    Api { code: i32, message: String },

    /// Invalid configuration or call argument.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Broken internal invariant (id counter not seeded, wrong response slot, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        ClientError::Io(Arc::new(err))
    }
}

impl ClientError {
    /// Locally requested closure; never reported as a connection fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ClientError::Cancelled | ClientError::Closed)
    }

    /// The peer went away underneath us (reset, broken pipe, EOF mid-frame).
    pub fn is_peer_reset(&self) -> bool {
        match self {
            ClientError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// Normalise the error that ended a connection: expected closures and
    /// peer resets collapse into [`ClientError::Closed`].
    pub fn classify(self) -> Self {
        if self.is_cancellation() || self.is_peer_reset() {
            ClientError::Closed
        } else {
            self
        }
    }
}
