//! Types for errors that can occur while decoding and replaying ITCH.
use thiserror::Error;

/// An error that can occur while decoding an ITCH stream or applying it to order
/// books.
///
/// Errors fall in two groups, see [`Error::is_fatal()`]:
/// - structural stream errors after which message boundaries can no longer be
///   trusted, which halt replay
/// - semantic data-integrity errors, which are counted and skipped or clamped
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error while reading or writing an ITCH stream.
    #[error("IO error: {source:?} while {context}")]
    Io {
        /// The original error.
        #[source]
        source: std::io::Error,
        /// The context in which the error occurred.
        context: String,
    },
    /// A message type tag not present in the catalog.
    #[error("unknown message type {:?} at offset {offset}", char::from(*.tag))]
    UnknownMessageType {
        /// The unrecognized tag byte.
        tag: u8,
        /// The stream offset of the tag.
        offset: u64,
    },
    /// The input ended before the declared length of a message.
    #[error(
        "truncated message{} at offset {offset}: expected {expected} bytes, found {available}",
        fmt_opt_tag(.tag)
    )]
    TruncatedMessage {
        /// The message type tag, if it could be read.
        tag: Option<u8>,
        /// The stream offset of the start of the message.
        offset: u64,
        /// The number of bytes required.
        expected: usize,
        /// The number of bytes available.
        available: usize,
    },
    /// A length prefix that disagrees with the catalog length for the message type.
    #[error(
        "message of type {:?} at offset {offset} declares length {declared}, expected {expected}",
        char::from(*.tag)
    )]
    LengthMismatch {
        /// The message type tag.
        tag: u8,
        /// The stream offset of the length prefix.
        offset: u64,
        /// The length from the catalog.
        expected: usize,
        /// The length from the prefix.
        declared: usize,
    },
    /// A modify, cancel, delete or execute message for an order that isn't resting.
    #[error("unknown order reference number {order_ref}")]
    UnknownOrderReference {
        /// The order reference number.
        order_ref: u64,
    },
    /// An add message for a reference number that's already resting.
    #[error("order reference number {order_ref} is already resting")]
    DuplicateOrderReference {
        /// The order reference number.
        order_ref: u64,
    },
    /// An execution or cancellation of more shares than remain on the order.
    #[error(
        "order {order_ref} reduced by {requested} shares with only {remaining} remaining"
    )]
    QuantityUnderflow {
        /// The order reference number.
        order_ref: u64,
        /// The number of shares executed or cancelled.
        requested: u32,
        /// The number of shares that were resting.
        remaining: u32,
    },
    /// A message timestamp earlier than one already replayed.
    #[error("timestamp {timestamp} is earlier than previous timestamp {previous}")]
    TimestampRegression {
        /// The latest timestamp replayed so far.
        previous: u64,
        /// The offending timestamp.
        timestamp: u64,
    },
    /// A single-character code that isn't mapped for its field.
    #[error("invalid value {:?} for field {field}", char::from(*.byte))]
    InvalidEnumValue {
        /// The name of the field.
        field: &'static str,
        /// The offending byte.
        byte: u8,
    },
    /// A depth snapshot that can't be served without rewinding the stream.
    #[error("no snapshot available at {requested}: {reason}")]
    SnapshotUnavailable {
        /// The requested timestamp.
        requested: u64,
        /// Why the snapshot can't be produced.
        reason: &'static str,
    },
    /// A symbol that hasn't been seen in the stream.
    #[error("unknown instrument '{symbol}'")]
    UnknownInstrument {
        /// The requested symbol.
        symbol: String,
    },
    /// Replay was halted by an earlier structural error.
    #[error("replay halted by a structural error at offset {offset}")]
    Halted {
        /// The stream offset of the message that halted replay.
        offset: u64,
    },
    /// An invalid argument was passed to a function.
    #[error("bad argument {param_name}: {desc}")]
    BadArgument {
        /// The name of the parameter to which the bad argument was passed.
        param_name: String,
        /// The description of why the argument was invalid.
        desc: String,
    },
    /// Aggregated book state disagrees with the resting orders.
    #[error("order book invariant violated: {0}")]
    InvariantViolation(String),
}

/// An alias for a `Result` with [`itch::Error`](crate::Error) as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A field-less mirror of [`Error`] used for counting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum ErrorKind {
    /// See [`Error::Io`].
    Io,
    /// See [`Error::UnknownMessageType`].
    UnknownMessageType,
    /// See [`Error::TruncatedMessage`].
    TruncatedMessage,
    /// See [`Error::LengthMismatch`].
    LengthMismatch,
    /// See [`Error::UnknownOrderReference`].
    UnknownOrderReference,
    /// See [`Error::DuplicateOrderReference`].
    DuplicateOrderReference,
    /// See [`Error::QuantityUnderflow`].
    QuantityUnderflow,
    /// See [`Error::TimestampRegression`].
    TimestampRegression,
    /// See [`Error::InvalidEnumValue`].
    InvalidEnumValue,
    /// See [`Error::SnapshotUnavailable`].
    SnapshotUnavailable,
    /// See [`Error::UnknownInstrument`].
    UnknownInstrument,
    /// See [`Error::Halted`].
    Halted,
    /// See [`Error::BadArgument`].
    BadArgument,
    /// See [`Error::InvariantViolation`].
    InvariantViolation,
}

impl ErrorKind {
    /// Converts the kind to its `str` representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Io => "io",
            ErrorKind::UnknownMessageType => "unknown_message_type",
            ErrorKind::TruncatedMessage => "truncated_message",
            ErrorKind::LengthMismatch => "length_mismatch",
            ErrorKind::UnknownOrderReference => "unknown_order_reference",
            ErrorKind::DuplicateOrderReference => "duplicate_order_reference",
            ErrorKind::QuantityUnderflow => "quantity_underflow",
            ErrorKind::TimestampRegression => "timestamp_regression",
            ErrorKind::InvalidEnumValue => "invalid_enum_value",
            ErrorKind::SnapshotUnavailable => "snapshot_unavailable",
            ErrorKind::UnknownInstrument => "unknown_instrument",
            ErrorKind::Halted => "halted",
            ErrorKind::BadArgument => "bad_argument",
            ErrorKind::InvariantViolation => "invariant_violation",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Creates a new I/O [`itch::Error`](crate::Error).
    pub fn io(error: std::io::Error, context: impl ToString) -> Self {
        Self::Io {
            source: error,
            context: context.to_string(),
        }
    }

    /// Creates a new bad argument [`itch::Error`](crate::Error).
    pub fn bad_argument(param_name: impl ToString, desc: impl ToString) -> Self {
        Self::BadArgument {
            param_name: param_name.to_string(),
            desc: desc.to_string(),
        }
    }

    /// Returns the field-less kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } => ErrorKind::Io,
            Error::UnknownMessageType { .. } => ErrorKind::UnknownMessageType,
            Error::TruncatedMessage { .. } => ErrorKind::TruncatedMessage,
            Error::LengthMismatch { .. } => ErrorKind::LengthMismatch,
            Error::UnknownOrderReference { .. } => ErrorKind::UnknownOrderReference,
            Error::DuplicateOrderReference { .. } => ErrorKind::DuplicateOrderReference,
            Error::QuantityUnderflow { .. } => ErrorKind::QuantityUnderflow,
            Error::TimestampRegression { .. } => ErrorKind::TimestampRegression,
            Error::InvalidEnumValue { .. } => ErrorKind::InvalidEnumValue,
            Error::SnapshotUnavailable { .. } => ErrorKind::SnapshotUnavailable,
            Error::UnknownInstrument { .. } => ErrorKind::UnknownInstrument,
            Error::Halted { .. } => ErrorKind::Halted,
            Error::BadArgument { .. } => ErrorKind::BadArgument,
            Error::InvariantViolation(_) => ErrorKind::InvariantViolation,
        }
    }

    /// Returns `true` if the error means message boundaries in the stream can no
    /// longer be trusted and replay must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io { .. }
                | Error::UnknownMessageType { .. }
                | Error::TruncatedMessage { .. }
                | Error::LengthMismatch { .. }
                | Error::Halted { .. }
        )
    }
}

fn fmt_opt_tag(tag: &Option<u8>) -> String {
    if let Some(tag) = tag {
        format!(" of type {:?}", char::from(*tag))
    } else {
        String::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_errors_are_fatal() {
        assert!(Error::UnknownMessageType { tag: b'Z', offset: 0 }.is_fatal());
        assert!(Error::TruncatedMessage {
            tag: Some(b'A'),
            offset: 12,
            expected: 36,
            available: 3
        }
        .is_fatal());
        assert!(!Error::UnknownOrderReference { order_ref: 1 }.is_fatal());
        assert!(!Error::QuantityUnderflow {
            order_ref: 1,
            requested: 2,
            remaining: 1
        }
        .is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::UnknownMessageType {
            tag: b'z',
            offset: 1024,
        };
        assert_eq!(err.to_string(), "unknown message type 'z' at offset 1024");
        let err = Error::TruncatedMessage {
            tag: None,
            offset: 7,
            expected: 2,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "truncated message at offset 7: expected 2 bytes, found 1"
        );
        let err = Error::InvalidEnumValue {
            field: "side",
            byte: b'Q',
        };
        assert_eq!(err.to_string(), "invalid value 'Q' for field side");
        assert_eq!(err.kind(), ErrorKind::InvalidEnumValue);
    }
}
