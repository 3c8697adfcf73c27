use std::collections::BTreeMap;

use crate::{book::Depth, enums::Side, Price4, Stock};

/// The aggregate state of one price level in a [`DepthSnapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DepthLevel {
    /// The price of the level.
    pub price: Price4,
    /// The aggregate remaining shares.
    pub shares: u64,
    /// The number of resting orders.
    pub orders: u32,
}

/// A read-only view of the price levels of one instrument at a point in time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DepthSnapshot {
    /// The instrument symbol.
    pub symbol: Stock,
    /// The stock locate code of the instrument.
    pub stock_locate: u16,
    /// The time the snapshot was requested for, in nanoseconds since midnight.
    pub timestamp: u64,
    /// Bid levels, highest price first.
    pub bids: Vec<DepthLevel>,
    /// Ask levels, lowest price first.
    pub asks: Vec<DepthLevel>,
}

impl DepthSnapshot {
    pub(crate) fn from_levels(
        symbol: Stock,
        stock_locate: u16,
        timestamp: u64,
        bids: &BTreeMap<Price4, Depth>,
        asks: &BTreeMap<Price4, Depth>,
    ) -> Self {
        let to_level = |(price, depth): (&Price4, &Depth)| DepthLevel {
            price: *price,
            shares: depth.shares,
            orders: depth.orders,
        };
        Self {
            symbol,
            stock_locate,
            timestamp,
            bids: bids.iter().rev().map(to_level).collect(),
            asks: asks.iter().map(to_level).collect(),
        }
    }

    /// Keeps at most `n` levels per side.
    pub fn truncate(&mut self, n: usize) {
        self.bids.truncate(n);
        self.asks.truncate(n);
    }

    /// Returns the levels of one side, best first.
    pub fn levels(&self, side: Side) -> &[DepthLevel] {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Returns the highest bid level.
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    /// Returns the lowest ask level.
    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }

    /// Returns `true` if neither side has any levels.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
