//! A crate for decoding NASDAQ TotalView-ITCH 5.0 feeds and replaying them into
//! per-instrument limit order books.
//!
//! The pipeline, leaves first:
//! - [`catalog`]: the static schema of every message type
//! - [`codec`]: big-endian field decoding and encoding
//! - [`decode`]: slice and stream decoders producing [`Message`]s in arrival order
//! - [`book`]: the order book engine applying add, execute, cancel, delete and
//!   replace events to aggregated price levels
//! - [`session`]: the replayer that routes messages to books and answers depth
//!   snapshot queries

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::missing_errors_doc)]

pub mod book;
pub mod catalog;
pub mod codec;
pub mod decode;
pub mod encode;
pub mod enums;
pub mod error;
pub mod message;
pub mod pretty;
pub mod session;
#[cfg(test)]
mod test_utils;

pub use crate::{
    book::{BookUpdate, Depth, Execution, LevelChange, Order, OrderBook},
    catalog::{FieldKind, FieldSpec, MessageSpec},
    codec::{Alpha, Mpid, Price4, Price8, Stock},
    decode::{DecodeMessage, Framing, SliceDecoder, StreamDecoder},
    encode::{EncodeMessage, MessageEncoder},
    enums::{Coded, Side},
    error::{Error, ErrorKind, Result},
    message::{Message, MessageHeader},
    session::{
        Anomaly, DepthLevel, DepthSnapshot, Instrument, Replayer, Session, SessionConfig,
        SessionStats, Step,
    },
};

/// The length in bytes of the header common to every ITCH message: message type,
/// stock locate, tracking number and timestamp.
pub const HEADER_LEN: usize = 11;
/// The length in bytes of the longest message in the catalog.
pub const MAX_MESSAGE_LEN: usize = 50;
/// The length in bytes of the big-endian length prefix used in
/// [`Framing::LengthPrefixed`] files.
pub const LENGTH_PREFIX_LEN: usize = 2;
/// The denominator of the 4-decimal prices used in most ITCH price fields.
pub const PRICE4_SCALE: u32 = 10_000;
/// The denominator of the 8-decimal prices used in MWCB decline level messages.
pub const PRICE8_SCALE: u64 = 100_000_000;
/// The number of nanoseconds in a day, the upper bound of ITCH timestamps.
pub const NANOS_PER_DAY: u64 = 86_400_000_000_000;
