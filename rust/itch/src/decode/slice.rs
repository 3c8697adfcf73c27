use super::{decode_message, DecodeMessage, Framing};
use crate::{catalog, Error, Message, Result, LENGTH_PREFIX_LEN};

/// A decoder of ITCH messages from an in-memory buffer, such as a memory-mapped
/// file.
///
/// Also an [`Iterator`] of messages that ends at the end of the buffer or after the
/// first error it can't decode past.
#[derive(Clone, Debug)]
pub struct SliceDecoder<'a> {
    buf: &'a [u8],
    framing: Framing,
    pos: usize,
    resyncable: bool,
    done: bool,
}

impl<'a> SliceDecoder<'a> {
    /// Creates a new `SliceDecoder` over `buf`.
    pub fn new(buf: &'a [u8], framing: Framing) -> Self {
        Self {
            buf,
            framing,
            pos: 0,
            resyncable: false,
            done: false,
        }
    }

    /// Returns the bytes that haven't been decoded yet.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Tries to decode the next message. Returns `Ok(None)` at the end of the
    /// buffer.
    ///
    /// # Errors
    /// See [`DecodeMessage::decode_message()`].
    pub fn decode(&mut self) -> Result<Option<Message>> {
        self.resyncable = false;
        let rest = self.remaining();
        if rest.is_empty() {
            return Ok(None);
        }
        let start = self.pos as u64;
        let (msg, consumed) = match self.framing {
            Framing::Raw => decode_message(rest, start)?,
            Framing::LengthPrefixed => {
                let Some((prefix, frame)) = rest.split_first_chunk::<LENGTH_PREFIX_LEN>() else {
                    return Err(Error::TruncatedMessage {
                        tag: None,
                        offset: start,
                        expected: LENGTH_PREFIX_LEN,
                        available: rest.len(),
                    });
                };
                let declared = usize::from(u16::from_be_bytes(*prefix));
                let body_start = start + LENGTH_PREFIX_LEN as u64;
                let Some(frame) = frame.get(..declared).filter(|frame| !frame.is_empty()) else {
                    return Err(Error::TruncatedMessage {
                        tag: frame.first().copied(),
                        offset: body_start,
                        expected: declared.max(1),
                        available: frame.len().min(declared),
                    });
                };
                let tag = frame[0];
                let Some(spec) = catalog::lookup(tag) else {
                    self.pos += LENGTH_PREFIX_LEN + declared;
                    self.resyncable = true;
                    return Err(Error::UnknownMessageType { tag, offset: start });
                };
                if spec.length != declared {
                    return Err(Error::LengthMismatch {
                        tag,
                        offset: start,
                        expected: spec.length,
                        declared,
                    });
                }
                let (msg, len) = decode_message(frame, body_start)?;
                (msg, LENGTH_PREFIX_LEN + len)
            }
        };
        self.pos += consumed;
        Ok(Some(msg))
    }
}

impl<'a> DecodeMessage for SliceDecoder<'a> {
    fn decode_message(&mut self) -> Result<Option<Message>> {
        self.decode()
    }

    fn offset(&self) -> u64 {
        self.pos as u64
    }

    fn can_resync(&self) -> bool {
        self.resyncable
    }
}

impl<'a> Iterator for SliceDecoder<'a> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decode() {
            Ok(Some(msg)) => Some(Ok(msg)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = !self.resyncable;
                Some(Err(err))
            }
        }
    }
}
