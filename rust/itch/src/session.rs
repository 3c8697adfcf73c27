//! Replaying ITCH messages into the order books of every instrument in a session.
//!
//! [`Session`] holds the state and applies one message at a time without doing any
//! I/O. [`Replayer`] drives a [`Session`] from a decoder.
mod replay;
mod snapshot;

pub use self::{
    replay::{Replayer, SessionConfig},
    snapshot::{DepthLevel, DepthSnapshot},
};

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    fmt,
};

use crate::{
    book::{Execution, LevelChange, OrderBook},
    enums::{
        FinancialStatus, HaltAction, MarketCategory, RegShoAction, Side, SystemEventCode,
        TradingState,
    },
    Error, ErrorKind, Message, Price4, Result, Stock,
};

/// A recoverable problem found while applying a message. The message was applied
/// with the offending mutation ignored or clamped.
#[derive(Debug)]
pub struct Anomaly {
    /// The stream offset of the message.
    pub offset: u64,
    /// The type tag of the message, if it could be read.
    pub tag: Option<u8>,
    /// The problem.
    pub error: Error,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            Some(tag) => write!(
                f,
                "{} in {:?} message at offset {}",
                self.error,
                char::from(tag),
                self.offset
            ),
            None => write!(f, "{} at offset {}", self.error, self.offset),
        }
    }
}

/// The result of applying a single message to a [`Session`].
#[derive(Debug)]
pub struct Step {
    /// The stream offset of the message, including any length prefix.
    pub offset: u64,
    /// The message.
    pub message: Message,
    /// The price levels the message changed.
    pub changes: Vec<LevelChange>,
    /// The execution against a resting order, for execute messages.
    pub execution: Option<Execution>,
    /// Recoverable problems found while applying the message.
    pub anomalies: Vec<Anomaly>,
}

/// Reference data and trading statistics for one instrument, updated from
/// administrative and trade messages.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Instrument {
    /// The stock locate code.
    pub stock_locate: u16,
    /// The symbol.
    pub symbol: Stock,
    /// The listing market, from the stock directory.
    pub market_category: Option<MarketCategory>,
    /// The financial status, from the stock directory.
    pub financial_status: Option<FinancialStatus>,
    /// The number of shares in a round lot, from the stock directory.
    pub round_lot_size: Option<u32>,
    /// Whether only round lots are accepted, from the stock directory.
    pub round_lots_only: Option<bool>,
    /// The latest trading state.
    pub trading_state: Option<TradingState>,
    /// The latest Reg SHO short sale price test status.
    pub reg_sho_action: Option<RegShoAction>,
    /// The latest operational halt action.
    pub operational_halt: Option<HaltAction>,
    /// The price of the latest printable execution, trade or cross.
    pub last_price: Option<Price4>,
    /// Cumulative printable executed shares.
    pub volume: u64,
    /// The number of printable executions, trades and crosses.
    pub trade_count: u64,
}

impl Instrument {
    fn new(stock_locate: u16, symbol: Stock) -> Self {
        Self {
            stock_locate,
            symbol,
            market_category: None,
            financial_status: None,
            round_lot_size: None,
            round_lots_only: None,
            trading_state: None,
            reg_sho_action: None,
            operational_halt: None,
            last_price: None,
            volume: 0,
            trade_count: 0,
        }
    }

    fn record_print(&mut self, price: Price4, shares: u64) {
        self.last_price = Some(price);
        self.volume += shares;
        self.trade_count += 1;
    }
}

/// Diagnostic counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SessionStats {
    /// The total number of messages applied.
    pub messages: u64,
    /// The number of messages applied, by type tag.
    pub by_type: BTreeMap<char, u64>,
    /// The number of recoverable problems, by kind.
    pub anomalies: BTreeMap<ErrorKind, u64>,
}

impl SessionStats {
    /// Returns the number of messages applied with `tag`.
    pub fn message_count(&self, tag: u8) -> u64 {
        self.by_type.get(&char::from(tag)).copied().unwrap_or_default()
    }

    /// Returns the number of recoverable problems of `kind`.
    pub fn anomaly_count(&self, kind: ErrorKind) -> u64 {
        self.anomalies.get(&kind).copied().unwrap_or_default()
    }

    /// Returns the total number of recoverable problems.
    pub fn total_anomalies(&self) -> u64 {
        self.anomalies.values().sum()
    }
}

#[derive(Clone, Copy, Debug)]
struct JournalEntry {
    timestamp: u64,
    stock_locate: u16,
    change: LevelChange,
}

/// The state of a replay: one [`OrderBook`] per instrument, instrument reference
/// data, the replay clock and diagnostic counters.
///
/// Level changes from the last `history_ns` nanoseconds of replay time are
/// journaled so [`snapshot()`](Self::snapshot) can look back without rewinding
/// the stream.
#[derive(Debug)]
pub struct Session {
    books: HashMap<u16, OrderBook>,
    instruments: HashMap<u16, Instrument>,
    symbols: HashMap<Stock, u16>,
    clock: u64,
    journal: VecDeque<JournalEntry>,
    /// The latest timestamp dropped from the journal.
    journal_floor: Option<u64>,
    history_ns: u64,
    stats: SessionStats,
    system_event: Option<SystemEventCode>,
    finished: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Session {
    /// Creates an empty session that retains `history_ns` nanoseconds of level
    /// changes for historical snapshots.
    pub fn new(history_ns: u64) -> Self {
        Self {
            books: HashMap::new(),
            instruments: HashMap::new(),
            symbols: HashMap::new(),
            clock: 0,
            journal: VecDeque::new(),
            journal_floor: None,
            history_ns,
            stats: SessionStats::default(),
            system_event: None,
            finished: false,
        }
    }

    /// Registers an instrument before replay, as if its stock directory message
    /// had been seen.
    pub fn seed_instrument(&mut self, stock_locate: u16, symbol: Stock) {
        self.instrument_mut(stock_locate, Some(symbol));
    }

    /// Applies a single message decoded at `offset`.
    ///
    /// Never fails: data-integrity problems are reported in
    /// [`Step::anomalies`] and counted in [`stats()`](Self::stats).
    pub fn apply(&mut self, offset: u64, message: Message) -> Step {
        let mut step = Step {
            offset,
            message,
            changes: Vec::new(),
            execution: None,
            anomalies: Vec::new(),
        };
        self.stats.messages += 1;
        *self.stats.by_type.entry(message.tag_char()).or_default() += 1;

        let timestamp = message.timestamp();
        if timestamp < self.clock {
            self.report(
                &mut step,
                Error::TimestampRegression {
                    previous: self.clock,
                    timestamp,
                },
            );
        } else {
            self.clock = timestamp;
        }
        for error in message.invalid_fields() {
            self.report(&mut step, error);
        }

        self.update_instrument(&message);
        if message.is_book_event() {
            self.apply_to_book(&mut step);
        }
        self.prune_journal();
        step
    }

    fn apply_to_book(&mut self, step: &mut Step) {
        let message = step.message;
        let locate = message.stock_locate();
        if !self.books.contains_key(&locate) {
            match message.stock() {
                // only adds carry a symbol
                Some(symbol) => {
                    self.instrument_mut(locate, Some(*symbol));
                }
                None => {
                    if let Some(order_ref) = message.order_ref() {
                        self.report(step, Error::UnknownOrderReference { order_ref });
                    }
                    return;
                }
            }
        }
        let Some(book) = self.books.get_mut(&locate) else {
            return;
        };
        match book.apply(&message) {
            Ok(update) => {
                for change in update.changes.iter() {
                    self.journal.push_back(JournalEntry {
                        timestamp: self.clock,
                        stock_locate: locate,
                        change: *change,
                    });
                }
                step.changes = update.changes;
                step.execution = update.executed;
                if let Some(execution) = update.executed.filter(|e| e.printable) {
                    if let Some(instrument) = self.instruments.get_mut(&locate) {
                        instrument.record_print(execution.price, u64::from(execution.shares));
                    }
                }
                if let Some(error) = update.anomaly {
                    self.report(step, error);
                }
            }
            // already reported from the decoded fields
            Err(Error::InvalidEnumValue { .. }) => {}
            Err(error) => self.report(step, error),
        }
    }

    fn update_instrument(&mut self, message: &Message) {
        let locate = message.stock_locate();
        match message {
            Message::SystemEvent(msg) => {
                self.system_event = msg.event_code.get();
                tracing::debug!(
                    event = ?msg.event_code,
                    timestamp = msg.hd.timestamp,
                    "System event"
                );
            }
            Message::StockDirectory(msg) => {
                let instrument = self.instrument_mut(locate, Some(msg.stock));
                instrument.market_category = msg.market_category.get();
                instrument.financial_status = msg.financial_status.get();
                instrument.round_lot_size = Some(msg.round_lot_size);
                instrument.round_lots_only = msg.round_lots_only.get().map(bool::from);
            }
            Message::StockTradingAction(msg) => {
                self.instrument_mut(locate, Some(msg.stock)).trading_state =
                    msg.trading_state.get();
            }
            Message::RegShoRestriction(msg) => {
                self.instrument_mut(locate, Some(msg.stock)).reg_sho_action =
                    msg.reg_sho_action.get();
            }
            Message::OperationalHalt(msg) => {
                self.instrument_mut(locate, Some(msg.stock)).operational_halt =
                    msg.halt_action.get();
            }
            Message::Trade(msg) => {
                self.instrument_mut(locate, Some(msg.stock))
                    .record_print(msg.price, u64::from(msg.shares));
            }
            Message::CrossTrade(msg) if msg.shares > 0 => {
                self.instrument_mut(locate, Some(msg.stock))
                    .record_print(msg.cross_price, msg.shares);
            }
            _ => {}
        }
    }

    /// Returns the instrument with `stock_locate`, creating it along with its book
    /// if it's new.
    fn instrument_mut(&mut self, stock_locate: u16, symbol: Option<Stock>) -> &mut Instrument {
        let symbol = symbol.unwrap_or_default();
        if !symbol.is_blank() {
            self.symbols.entry(symbol).or_insert(stock_locate);
        }
        self.books
            .entry(stock_locate)
            .or_insert_with(|| OrderBook::new(stock_locate, symbol));
        self.instruments
            .entry(stock_locate)
            .or_insert_with(|| Instrument::new(stock_locate, symbol))
    }

    fn report(&mut self, step: &mut Step, error: Error) {
        let anomaly = Anomaly {
            offset: step.offset,
            tag: Some(step.message.tag()),
            error,
        };
        self.record_anomaly(&anomaly);
        step.anomalies.push(anomaly);
    }

    pub(crate) fn record_anomaly(&mut self, anomaly: &Anomaly) {
        tracing::warn!(
            offset = anomaly.offset,
            kind = %anomaly.error.kind(),
            "{anomaly}"
        );
        *self.stats.anomalies.entry(anomaly.error.kind()).or_default() += 1;
    }

    fn prune_journal(&mut self) {
        let horizon = self.clock.saturating_sub(self.history_ns);
        while let Some(entry) = self.journal.front() {
            if entry.timestamp >= horizon {
                break;
            }
            self.journal_floor = Some(entry.timestamp);
            self.journal.pop_front();
        }
    }

    /// Marks the end of the stream. Afterwards snapshots may be requested for any
    /// time at or after the latest timestamp.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Returns `true` if [`finish()`](Self::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the latest message timestamp applied, in nanoseconds since midnight.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Returns the latest system event.
    pub fn system_event(&self) -> Option<SystemEventCode> {
        self.system_event
    }

    /// Returns the diagnostic counters.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Returns the stock locate code of `symbol`.
    pub fn stock_locate(&self, symbol: &str) -> Option<u16> {
        let symbol = symbol.parse::<Stock>().ok()?;
        self.symbols.get(&symbol).copied()
    }

    /// Returns the book of `symbol`.
    pub fn book(&self, symbol: &str) -> Option<&OrderBook> {
        self.stock_locate(symbol)
            .and_then(|locate| self.books.get(&locate))
    }

    /// Returns the book with `stock_locate`.
    pub fn book_by_locate(&self, stock_locate: u16) -> Option<&OrderBook> {
        self.books.get(&stock_locate)
    }

    /// Returns an iterator over every book.
    pub fn books(&self) -> impl Iterator<Item = &OrderBook> {
        self.books.values()
    }

    /// Returns the reference data and statistics of `symbol`.
    pub fn instrument(&self, symbol: &str) -> Option<&Instrument> {
        self.stock_locate(symbol)
            .and_then(|locate| self.instruments.get(&locate))
    }

    /// Returns an iterator over every instrument.
    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }

    /// Returns the depth of `symbol` as of the last applied message with a
    /// timestamp at or before `at`. Level changes newer than `at` are undone on a
    /// copy of the current levels; the session itself is unchanged.
    ///
    /// # Errors
    /// This function returns an [`Error::UnknownInstrument`] if `symbol` hasn't
    /// been seen, and an [`Error::SnapshotUnavailable`] if `at` is older than the
    /// retained history or, before the stream is finished, newer than the replay
    /// clock.
    pub fn snapshot(&self, symbol: &str, at: u64) -> Result<DepthSnapshot> {
        let locate = self
            .stock_locate(symbol)
            .ok_or_else(|| Error::UnknownInstrument {
                symbol: symbol.to_owned(),
            })?;
        if at > self.clock && !self.finished {
            return Err(Error::SnapshotUnavailable {
                requested: at,
                reason: "replay hasn't reached the requested time",
            });
        }
        if self.journal_floor.is_some_and(|floor| at < floor) {
            return Err(Error::SnapshotUnavailable {
                requested: at,
                reason: "requested time is older than the retained history",
            });
        }
        let Some(book) = self.books.get(&locate) else {
            return Err(Error::UnknownInstrument {
                symbol: symbol.to_owned(),
            });
        };
        let mut bids = book.levels(Side::Buy).clone();
        let mut asks = book.levels(Side::Sell).clone();
        for entry in self
            .journal
            .iter()
            .rev()
            .take_while(|entry| entry.timestamp > at)
            .filter(|entry| entry.stock_locate == locate)
        {
            let change = &entry.change;
            let levels = match change.side {
                Side::Buy => &mut bids,
                Side::Sell => &mut asks,
            };
            if change.before.is_empty() {
                levels.remove(&change.price);
            } else {
                levels.insert(change.price, change.before);
            }
        }
        Ok(DepthSnapshot::from_levels(
            *book.symbol(),
            locate,
            at,
            &bids,
            &asks,
        ))
    }

    /// Returns the current depth of `symbol`.
    ///
    /// # Errors
    /// This function returns an [`Error::UnknownInstrument`] if `symbol` hasn't
    /// been seen.
    pub fn current_snapshot(&self, symbol: &str) -> Result<DepthSnapshot> {
        self.snapshot(symbol, self.clock)
    }
}
