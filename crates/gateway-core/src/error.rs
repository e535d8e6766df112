//! Error types for the core gateway domain.
//!
//! The core is mostly infallible: the only operation that can reject its
//! input is applying a depth update to a [`MarketDepthBook`](crate::MarketDepthBook),
//! where the peer-supplied position or operation can be out of range.

use thiserror::Error;

/// Errors raised while applying a depth update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DepthError {
    /// The row position is negative or not below the configured depth.
    #[error("depth position {position} outside 0..{depth}")]
    PositionOutOfRange { position: i32, depth: usize },

    /// The operation code is not insert (0), update (1) or delete (2).
    #[error("unknown depth operation {0}")]
    UnknownOperation(i32),

    /// The side code is not ask (0) or bid (1).
    #[error("unknown depth side {0}")]
    UnknownSide(i32),
}
