//! Per-instrument limit order books maintained from add, execute, cancel, delete and
//! replace messages.
//!
//! Every mutation returns the [`LevelChange`]s it caused so consumers can stream
//! incremental depth updates, and so the [`Session`](crate::Session) can journal
//! them to serve historical snapshots.

use std::collections::{BTreeMap, HashMap};

use crate::{
    enums::{Coded, Side, YesNo},
    message::{OrderExecutedWithPriceMsg, OrderReplaceMsg},
    Error, Message, Mpid, Price4, Result, Stock,
};

/// The aggregate state of one price level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Depth {
    /// The sum of the remaining shares of every order at the level.
    pub shares: u64,
    /// The number of orders at the level.
    pub orders: u32,
}

impl Depth {
    /// Returns `true` if no orders or no shares rest at the level, either of which
    /// removes it from the book.
    pub fn is_empty(&self) -> bool {
        self.orders == 0 || self.shares == 0
    }
}

/// One price level touched by a mutation, with its aggregate state before and
/// after. An `after` of [`Depth::default()`] means the level was removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LevelChange {
    /// The side of the book.
    pub side: Side,
    /// The price of the level.
    pub price: Price4,
    /// The level before the mutation.
    pub before: Depth,
    /// The level after the mutation.
    pub after: Depth,
}

/// An order resting on the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Order {
    /// The order reference number, unique among resting orders for the day.
    pub order_ref: u64,
    /// The stock locate code of the instrument.
    pub stock_locate: u16,
    /// The side of the book the order rests on.
    pub side: Side,
    /// The display price.
    pub price: Price4,
    /// The remaining shares.
    pub shares: u32,
    /// The entering firm, for orders added with attribution.
    pub attribution: Option<Mpid>,
    /// The time the order was added, in nanoseconds since midnight.
    pub timestamp: u64,
    /// Set when an execution or cancellation exceeded the remaining shares.
    pub underflowed: bool,
}

/// An execution against a resting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Execution {
    /// The reference number of the resting order.
    pub order_ref: u64,
    /// The side of the resting order.
    pub side: Side,
    /// The number of shares actually removed from the book.
    pub shares: u32,
    /// The execution price, which is the display price unless executed with price.
    pub price: Price4,
    /// Whether the execution counts toward volume and last price.
    pub printable: bool,
    /// The match number of the execution.
    pub match_number: u64,
}

/// The outcome of applying a message to an [`OrderBook`].
#[derive(Debug, Default)]
pub struct BookUpdate {
    /// The levels that changed, at most one entry per level.
    pub changes: Vec<LevelChange>,
    /// Orders that left the book, in their final state.
    pub removed: Vec<Order>,
    /// The execution, for execute messages.
    pub executed: Option<Execution>,
    /// A recoverable data-integrity problem that was clamped while applying the
    /// message. The mutation still took effect.
    pub anomaly: Option<Error>,
}

impl BookUpdate {
    /// Returns `true` if the book wasn't changed.
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty() && self.removed.is_empty()
    }

    /// Adds `change`, merging it with an earlier change to the same level.
    fn push_change(&mut self, change: LevelChange) {
        match self
            .changes
            .iter_mut()
            .find(|c| c.side == change.side && c.price == change.price)
        {
            Some(existing) => existing.after = change.after,
            None => self.changes.push(change),
        }
        self.changes.retain(|c| c.before != c.after);
    }

    fn merge(&mut self, other: BookUpdate) {
        for change in other.changes {
            self.push_change(change);
        }
        self.removed.extend(other.removed);
        if self.anomaly.is_none() {
            self.anomaly = other.anomaly;
        }
    }
}

/// The limit order book of a single instrument.
///
/// Invariants, checked by [`check_invariants()`](Self::check_invariants):
/// - the shares of each level equal the sum of the remaining shares of the orders
///   resting at it, and its order count equals their number
/// - levels without orders are removed
/// - no two resting orders share a reference number
#[derive(Clone, Debug)]
pub struct OrderBook {
    stock_locate: u16,
    symbol: Stock,
    bids: BTreeMap<Price4, Depth>,
    asks: BTreeMap<Price4, Depth>,
    orders: HashMap<u64, Order>,
}

impl OrderBook {
    /// Creates an empty book.
    pub fn new(stock_locate: u16, symbol: Stock) -> Self {
        Self {
            stock_locate,
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: HashMap::new(),
        }
    }

    /// Returns the stock locate code.
    pub fn stock_locate(&self) -> u16 {
        self.stock_locate
    }

    /// Returns the instrument symbol.
    pub fn symbol(&self) -> &Stock {
        &self.symbol
    }

    /// Applies a single message. Messages that don't act on resting orders leave
    /// the book unchanged and return an empty update.
    ///
    /// # Errors
    /// This function returns an error, leaving the book unchanged, if:
    /// - an add uses the reference number of a resting order:
    ///   [`Error::DuplicateOrderReference`]
    /// - an execute, cancel, delete or replace names an order that isn't resting:
    ///   [`Error::UnknownOrderReference`]
    /// - an add has an unmapped side: [`Error::InvalidEnumValue`]
    ///
    /// Over-executions and over-cancellations aren't errors: they're clamped and
    /// reported in [`BookUpdate::anomaly`].
    pub fn apply(&mut self, msg: &Message) -> Result<BookUpdate> {
        match msg {
            Message::AddOrder(add) => self.insert(Order {
                order_ref: add.order_ref,
                stock_locate: add.hd.stock_locate,
                side: add.side.try_get("side")?,
                price: add.price,
                shares: add.shares,
                attribution: None,
                timestamp: add.hd.timestamp,
                underflowed: false,
            }),
            Message::AddOrderMpid(add) => self.insert(Order {
                order_ref: add.order_ref,
                stock_locate: add.hd.stock_locate,
                side: add.side.try_get("side")?,
                price: add.price,
                shares: add.shares,
                attribution: Some(add.attribution),
                timestamp: add.hd.timestamp,
                underflowed: false,
            }),
            Message::OrderExecuted(exec) => {
                self.execute(exec.order_ref, exec.executed_shares, exec.match_number, None)
            }
            Message::OrderExecutedWithPrice(exec) => self.execute_with_price(exec),
            Message::OrderCancel(cancel) => self
                .reduce(cancel.order_ref, cancel.cancelled_shares)
                .map(|(update, _)| update),
            Message::OrderDelete(delete) => self.delete(delete.order_ref),
            Message::OrderReplace(replace) => self.replace(replace),
            Message::SystemEvent(_)
            | Message::StockDirectory(_)
            | Message::StockTradingAction(_)
            | Message::RegShoRestriction(_)
            | Message::MarketParticipantPosition(_)
            | Message::MwcbDeclineLevel(_)
            | Message::MwcbStatus(_)
            | Message::IpoQuotingPeriod(_)
            | Message::LuldAuctionCollar(_)
            | Message::OperationalHalt(_)
            | Message::Trade(_)
            | Message::CrossTrade(_)
            | Message::BrokenTrade(_)
            | Message::Noii(_)
            | Message::RetailInterest(_)
            | Message::DirectListingPriceDiscovery(_) => Ok(BookUpdate::default()),
        }
    }

    fn insert(&mut self, order: Order) -> Result<BookUpdate> {
        if self.orders.contains_key(&order.order_ref) {
            return Err(Error::DuplicateOrderReference {
                order_ref: order.order_ref,
            });
        }
        let mut update = BookUpdate::default();
        if order.shares == 0 {
            // terminal on arrival
            update.removed.push(order);
            return Ok(update);
        }
        let level = self.levels_mut(order.side).entry(order.price).or_default();
        let before = *level;
        level.shares += u64::from(order.shares);
        level.orders += 1;
        update.push_change(LevelChange {
            side: order.side,
            price: order.price,
            before,
            after: *level,
        });
        self.orders.insert(order.order_ref, order);
        Ok(update)
    }

    fn execute_with_price(&mut self, exec: &OrderExecutedWithPriceMsg) -> Result<BookUpdate> {
        let mut update = self.execute(
            exec.order_ref,
            exec.executed_shares,
            exec.match_number,
            Some(exec.execution_price),
        )?;
        if let Some(execution) = update.executed.as_mut() {
            execution.printable = exec.printable == Coded::Known(YesNo::Yes);
        }
        Ok(update)
    }

    fn execute(
        &mut self,
        order_ref: u64,
        requested: u32,
        match_number: u64,
        price: Option<Price4>,
    ) -> Result<BookUpdate> {
        let (mut update, before) = self.reduce(order_ref, requested)?;
        update.executed = Some(Execution {
            order_ref,
            side: before.side,
            shares: requested.min(before.shares),
            price: price.unwrap_or(before.price),
            printable: true,
            match_number,
        });
        Ok(update)
    }

    /// Reduces the remaining shares of an order, removing it at zero. Returns the
    /// update and the order as it was before.
    fn reduce(&mut self, order_ref: u64, requested: u32) -> Result<(BookUpdate, Order)> {
        let order = self
            .orders
            .get_mut(&order_ref)
            .ok_or(Error::UnknownOrderReference { order_ref })?;
        let before = *order;
        let mut update = BookUpdate::default();
        let reduced = if requested > order.shares {
            update.anomaly = Some(Error::QuantityUnderflow {
                order_ref,
                requested,
                remaining: order.shares,
            });
            order.underflowed = true;
            order.shares
        } else {
            requested
        };
        order.shares -= reduced;
        let filled = order.shares == 0;
        if filled {
            if let Some(order) = self.orders.remove(&order_ref) {
                update.removed.push(order);
            }
        }
        update.push_change(self.reduce_level(before.side, before.price, reduced, filled));
        Ok((update, before))
    }

    fn delete(&mut self, order_ref: u64) -> Result<BookUpdate> {
        let order = self
            .orders
            .remove(&order_ref)
            .ok_or(Error::UnknownOrderReference { order_ref })?;
        let mut update = BookUpdate::default();
        update.push_change(self.reduce_level(order.side, order.price, order.shares, true));
        update.removed.push(order);
        Ok(update)
    }

    fn replace(&mut self, msg: &OrderReplaceMsg) -> Result<BookUpdate> {
        let original = *self
            .orders
            .get(&msg.original_order_ref)
            .ok_or(Error::UnknownOrderReference {
                order_ref: msg.original_order_ref,
            })?;
        if msg.new_order_ref != msg.original_order_ref
            && self.orders.contains_key(&msg.new_order_ref)
        {
            return Err(Error::DuplicateOrderReference {
                order_ref: msg.new_order_ref,
            });
        }
        let mut update = self.delete(msg.original_order_ref)?;
        let added = self.insert(Order {
            order_ref: msg.new_order_ref,
            price: msg.price,
            shares: msg.shares,
            timestamp: msg.hd.timestamp,
            underflowed: false,
            ..original
        })?;
        update.merge(added);
        Ok(update)
    }

    fn reduce_level(
        &mut self,
        side: Side,
        price: Price4,
        shares: u32,
        remove_order: bool,
    ) -> LevelChange {
        let levels = self.levels_mut(side);
        let before = levels.get(&price).copied().unwrap_or_default();
        let mut after = Depth {
            shares: before.shares.saturating_sub(u64::from(shares)),
            orders: before.orders.saturating_sub(u32::from(remove_order)),
        };
        if after.is_empty() {
            levels.remove(&price);
            after = Depth::default();
        } else {
            levels.insert(price, after);
        }
        LevelChange {
            side,
            price,
            before,
            after,
        }
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<Price4, Depth> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    pub(crate) fn levels(&self, side: Side) -> &BTreeMap<Price4, Depth> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Returns the highest bid level.
    pub fn best_bid(&self) -> Option<(Price4, Depth)> {
        self.bids.iter().next_back().map(|(p, d)| (*p, *d))
    }

    /// Returns the lowest ask level.
    pub fn best_ask(&self) -> Option<(Price4, Depth)> {
        self.asks.iter().next().map(|(p, d)| (*p, *d))
    }

    /// Returns the best ask minus the best bid in raw price units, or `None` if
    /// either side is empty. Negative when the book is crossed.
    pub fn spread(&self) -> Option<i64> {
        let (bid, _) = self.best_bid()?;
        let (ask, _) = self.best_ask()?;
        Some(i64::from(ask.raw()) - i64::from(bid.raw()))
    }

    /// Returns the levels of one side, best first.
    pub fn iter_levels(&self, side: Side) -> Box<dyn Iterator<Item = (Price4, Depth)> + '_> {
        let levels = self.levels(side).iter().map(|(p, d)| (*p, *d));
        match side {
            Side::Buy => Box::new(levels.rev()),
            Side::Sell => Box::new(levels),
        }
    }

    /// Returns up to `n` levels of one side, best first.
    pub fn depth(&self, side: Side, n: usize) -> Vec<(Price4, Depth)> {
        self.iter_levels(side).take(n).collect()
    }

    /// Returns the level at `price`, if any orders rest there.
    pub fn level(&self, side: Side, price: Price4) -> Option<Depth> {
        self.levels(side).get(&price).copied()
    }

    /// Returns the number of levels on one side.
    pub fn level_count(&self, side: Side) -> usize {
        self.levels(side).len()
    }

    /// Returns the resting order with `order_ref`.
    pub fn order(&self, order_ref: u64) -> Option<&Order> {
        self.orders.get(&order_ref)
    }

    /// Returns the number of resting orders.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Returns `true` if no orders are resting.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Recomputes every level from the resting orders and compares with the
    /// aggregated levels.
    ///
    /// # Errors
    /// This function returns an [`Error::InvariantViolation`] describing the first
    /// disagreement found.
    pub fn check_invariants(&self) -> Result<()> {
        let mut bids = BTreeMap::<Price4, Depth>::new();
        let mut asks = BTreeMap::<Price4, Depth>::new();
        for (order_ref, order) in &self.orders {
            if *order_ref != order.order_ref {
                return Err(Error::InvariantViolation(format!(
                    "order {} indexed under {order_ref}",
                    order.order_ref
                )));
            }
            if order.shares == 0 {
                return Err(Error::InvariantViolation(format!(
                    "order {order_ref} rests with zero shares"
                )));
            }
            let levels = match order.side {
                Side::Buy => &mut bids,
                Side::Sell => &mut asks,
            };
            let level = levels.entry(order.price).or_default();
            level.shares += u64::from(order.shares);
            level.orders += 1;
        }
        for (side, exp, actual) in [
            (Side::Buy, &bids, &self.bids),
            (Side::Sell, &asks, &self.asks),
        ] {
            if exp != actual {
                return Err(Error::InvariantViolation(format!(
                    "{side:?} levels {actual:?} don't match resting orders {exp:?}"
                )));
            }
        }
        Ok(())
    }
}
