//! Decoding ITCH messages from byte slices and [`io::Read`] streams. Decoders
//! implement the [`DecodeMessage`] trait.
mod slice;
mod stream;

pub use self::{slice::SliceDecoder, stream::StreamDecoder};

use std::{fs::File, io::BufReader, path::Path};

use crate::{catalog, Error, Message, Result, LENGTH_PREFIX_LEN};

/// How consecutive messages are delimited in a stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Framing {
    /// Messages back to back, each starting with its type tag. The length of each
    /// message comes from the catalog, so an unknown type can't be skipped.
    Raw,
    /// Each message is preceded by its length as a 2-byte big-endian integer, as in
    /// the binary files distributed by NASDAQ.
    #[default]
    LengthPrefixed,
}

impl Framing {
    /// Returns the number of bytes preceding each message.
    pub const fn prefix_len(&self) -> usize {
        match self {
            Framing::Raw => 0,
            Framing::LengthPrefixed => LENGTH_PREFIX_LEN,
        }
    }
}

/// Trait for types that decode a sequence of [`Message`]s.
pub trait DecodeMessage {
    /// Tries to decode the next message. Returns `Ok(None)` if the input ended
    /// cleanly at a message boundary.
    ///
    /// # Errors
    /// This function returns an [`Error::UnknownMessageType`] if the type tag isn't
    /// in the catalog, an [`Error::TruncatedMessage`] if the input ends inside a
    /// message, and an [`Error::LengthMismatch`] if a length prefix disagrees with
    /// the catalog. It returns an [`Error::Io`] if the underlying reader fails.
    fn decode_message(&mut self) -> Result<Option<Message>>;

    /// Returns the offset of the next message from the start of the input.
    fn offset(&self) -> u64;

    /// Returns `true` if the last error left the decoder at the start of the next
    /// message, so decoding can continue past it.
    fn can_resync(&self) -> bool;

    /// Tries to decode all remaining messages into a `Vec`.
    ///
    /// # Errors
    /// This function returns the first error encountered, see
    /// [`decode_message()`](Self::decode_message).
    fn decode_messages(mut self) -> Result<Vec<Message>>
    where
        Self: Sized,
    {
        let mut res = Vec::new();
        while let Some(msg) = self.decode_message()? {
            res.push(msg);
        }
        Ok(res)
    }
}

/// Decodes the single message at the start of `buf`, where `offset` is the
/// position of `buf` within the overall input and is only used for error
/// context. Returns the message and the number of bytes it occupied.
///
/// # Errors
/// This function returns an [`Error::UnknownMessageType`] if the first byte isn't
/// a known type tag and an [`Error::TruncatedMessage`] if `buf` is shorter than the
/// length of the message type.
pub fn decode_message(buf: &[u8], offset: u64) -> Result<(Message, usize)> {
    let Some(&tag) = buf.first() else {
        return Err(Error::TruncatedMessage {
            tag: None,
            offset,
            expected: 1,
            available: 0,
        });
    };
    let spec = catalog::lookup(tag).ok_or(Error::UnknownMessageType { tag, offset })?;
    if buf.len() < spec.length {
        return Err(Error::TruncatedMessage {
            tag: Some(tag),
            offset,
            expected: spec.length,
            available: buf.len(),
        });
    }
    let msg = Message::decode_body(tag, buf).ok_or(Error::UnknownMessageType { tag, offset })?;
    Ok((msg, spec.length))
}

impl StreamDecoder<BufReader<File>> {
    /// Creates a new [`StreamDecoder`] from the file at `path`.
    ///
    /// # Errors
    /// This function returns an error if the file can't be opened.
    pub fn from_file(path: impl AsRef<Path>, framing: Framing) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            Error::io(
                e,
                format!(
                    "opening ITCH file to decode at path '{}'",
                    path.as_ref().display()
                ),
            )
        })?;
        Ok(Self::new(BufReader::new(file), framing))
    }
}
