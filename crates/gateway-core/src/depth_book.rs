//! Fixed-depth, position-addressed market depth book.
//!
//! Unlike a price-keyed book, the gateway addresses depth rows by
//! **position**: every update says "insert / update / delete row `n` on
//! side `s`". The book therefore keeps each side as a dense `Vec` whose
//! index is the row number:
//! - Bids: row 0 is the best (highest) bid.
//! - Asks: row 0 is the best (lowest) ask.
//!
//! Invariants, for a book of depth `D`:
//! - `len(side) <= D` at all times,
//! - rows are dense `0..len` (gaps are filled with empty levels).
//!
//! The book has no concurrency of its own; it is owned and mutated by the
//! single task that consumes the depth stream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DepthError;
use crate::messages::{DepthOperation, DepthUpdate};
use crate::side::Side;
use crate::top_of_book::TopOfBook;

/// One row of the book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: f64,
    pub size: Decimal,
    /// Market maker for level-2 rows, empty otherwise.
    pub market_maker: String,
}

impl DepthLevel {
    pub fn new(price: f64, size: Decimal) -> Self {
        DepthLevel {
            price,
            size,
            market_maker: String::new(),
        }
    }
}

/// An owned copy of both sides, handed to stream consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketDepth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl MarketDepth {
    /// Best bid / best ask of this snapshot.
    pub fn top(&self) -> TopOfBook {
        TopOfBook::new(self.bids.first().cloned(), self.asks.first().cloned())
    }
}

/// Two-sided book bounded by a configured number of rows.
#[derive(Debug, Clone)]
pub struct MarketDepthBook {
    depth: usize,
    bids: Vec<DepthLevel>,
    asks: Vec<DepthLevel>,
}

impl MarketDepthBook {
    /// Create an empty book holding at most `depth` rows per side.
    ///
    /// Rows are allocated as updates arrive, never up front.
    pub fn new(depth: usize) -> Self {
        MarketDepthBook {
            depth,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// Configured maximum number of rows per side.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn bids(&self) -> &[DepthLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[DepthLevel] {
        &self.asks
    }

    /// Copy both sides out of the book.
    pub fn snapshot(&self) -> MarketDepth {
        MarketDepth {
            bids: self.bids.clone(),
            asks: self.asks.clone(),
        }
    }

    /// Best bid / best ask.
    pub fn top(&self) -> TopOfBook {
        TopOfBook::new(self.bids.first().cloned(), self.asks.first().cloned())
    }

    /// Apply one update.
    ///
    /// The position is validated before anything is touched, so a rejected
    /// update leaves the book unchanged.
    pub fn apply(&mut self, update: &DepthUpdate) -> Result<(), DepthError> {
        let position = self.check_position(update.position)?;
        let depth = self.depth;

        let level = DepthLevel {
            price: update.price,
            size: update.size,
            market_maker: update.market_maker.clone(),
        };

        let rows = match update.side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };

        match update.operation {
            DepthOperation::Insert => Self::insert(rows, depth, position, level),
            DepthOperation::Update => Self::update(rows, position, level),
            DepthOperation::Delete => Self::delete(rows, position),
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn check_position(&self, position: i32) -> Result<usize, DepthError> {
        match usize::try_from(position) {
            Ok(p) if p < self.depth => Ok(p),
            _ => Err(DepthError::PositionOutOfRange {
                position,
                depth: self.depth,
            }),
        }
    }

    /// Insert at `position`, shifting later rows towards the tail.
    ///
    /// At capacity the last row falls off so the length stays at `depth`.
    fn insert(rows: &mut Vec<DepthLevel>, depth: usize, position: usize, level: DepthLevel) {
        if rows.len() >= depth {
            rows.truncate(depth.saturating_sub(1));
        }
        if position > rows.len() {
            rows.resize_with(position, DepthLevel::default);
        }
        rows.insert(position, level);
    }

    /// Overwrite `position`, growing the side with empty rows if needed.
    fn update(rows: &mut Vec<DepthLevel>, position: usize, level: DepthLevel) {
        if position >= rows.len() {
            rows.resize_with(position + 1, DepthLevel::default);
        }
        rows[position] = level;
    }

    /// Remove `position`; out-of-range deletes are ignored.
    fn delete(rows: &mut Vec<DepthLevel>, position: usize) {
        if position < rows.len() {
            rows.remove(position);
        }
    }
}
