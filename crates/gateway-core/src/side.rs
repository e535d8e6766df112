//! Book side (Bid / Ask) for depth updates.

use serde::{Deserialize, Serialize};

use crate::error::DepthError;

/// Side of a market depth book.
///
/// On the wire the gateway encodes the side as an integer:
/// `0` = ask, `1` = bid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Ask,
    Bid,
}

impl Side {
    /// Parse the wire representation.
    pub fn from_wire(v: i32) -> Result<Self, DepthError> {
        match v {
            0 => Ok(Side::Ask),
            1 => Ok(Side::Bid),
            other => Err(DepthError::UnknownSide(other)),
        }
    }
}
