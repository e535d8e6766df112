//! Best bid / best ask view of a depth book.
//!
//! This is separate from [`MarketDepth`](crate::depth_book::MarketDepth)
//! so callers that only care about the inside market do not have to carry
//! every row around.

use serde::{Deserialize, Serialize};

use crate::depth_book::DepthLevel;

/// Inside market of a depth book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopOfBook {
    /// Best bid (row 0 of the bid side), if any.
    pub bid: Option<DepthLevel>,
    /// Best ask (row 0 of the ask side), if any.
    pub ask: Option<DepthLevel>,
}

impl TopOfBook {
    pub fn new(bid: Option<DepthLevel>, ask: Option<DepthLevel>) -> Self {
        TopOfBook { bid, ask }
    }

    /// Returns `true` if there is *no* bid and *no* ask.
    pub fn is_empty(&self) -> bool {
        self.bid.is_none() && self.ask.is_none()
    }

    /// Ask minus bid, when both sides are present.
    pub fn spread(&self) -> Option<f64> {
        match (&self.bid, &self.ask) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Midpoint, when both sides are present.
    pub fn mid(&self) -> Option<f64> {
        match (&self.bid, &self.ask) {
            (Some(bid), Some(ask)) => Some((ask.price + bid.price) / 2.0),
            _ => None,
        }
    }
}
