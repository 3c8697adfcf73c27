//! Encoding ITCH messages to files and streams, the inverse of [`decode`](crate::decode).
use std::io;

use crate::{decode::Framing, Error, Message, Result, LENGTH_PREFIX_LEN, MAX_MESSAGE_LEN};

/// Trait for types that encode ITCH messages.
pub trait EncodeMessage {
    /// Encodes a single message.
    ///
    /// # Errors
    /// This function returns an error if it's unable to write to the underlying writer.
    fn encode_message(&mut self, msg: &Message) -> Result<()>;

    /// Flushes any buffered content to the true output.
    ///
    /// # Errors
    /// This function returns an error if it's unable to flush the underlying writer.
    fn flush(&mut self) -> Result<()>;

    /// Encodes a slice of messages.
    ///
    /// # Errors
    /// This function returns an error if it's unable to write to the underlying writer.
    fn encode_messages(&mut self, msgs: &[Message]) -> Result<()> {
        for msg in msgs {
            self.encode_message(msg)?;
        }
        self.flush()
    }
}

/// An encoder of framed ITCH messages to an [`io::Write`]r.
pub struct MessageEncoder<W>
where
    W: io::Write,
{
    writer: W,
    framing: Framing,
    buffer: [u8; LENGTH_PREFIX_LEN + MAX_MESSAGE_LEN],
}

impl<W> MessageEncoder<W>
where
    W: io::Write,
{
    /// Creates a new [`MessageEncoder`] that will write to `writer` with `framing`.
    pub fn new(writer: W, framing: Framing) -> Self {
        Self {
            writer,
            framing,
            buffer: [0; LENGTH_PREFIX_LEN + MAX_MESSAGE_LEN],
        }
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Returns a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consumes the encoder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> EncodeMessage for MessageEncoder<W>
where
    W: io::Write,
{
    fn encode_message(&mut self, msg: &Message) -> Result<()> {
        let length = msg.spec().length;
        let prefix_len = self.framing.prefix_len();
        if prefix_len > 0 {
            self.buffer[..prefix_len].copy_from_slice(&(length as u16).to_be_bytes());
        }
        let end = prefix_len + length;
        msg.encode_into(&mut self.buffer[prefix_len..end]);
        self.writer
            .write_all(&self.buffer[..end])
            .map_err(|e| Error::io(e, format!("writing {:?} message", msg.tag_char())))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::io(e, "flushing output"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{enums::Side, test_utils::*};

    #[test]
    fn test_encode_prefixed() {
        let mut encoder = MessageEncoder::new(Vec::new(), Framing::LengthPrefixed);
        encoder
            .encode_messages(&[delete(9), add_order(1, Side::Buy, 1, "A", 1)])
            .unwrap();
        let buf = encoder.into_inner();
        assert_eq!(buf.len(), 2 + 19 + 2 + 36);
        assert_eq!(&buf[..3], &[0, 19, b'D']);
        assert_eq!(&buf[21..24], &[0, 36, b'A']);
    }

    #[test]
    fn test_encode_raw() {
        let mut encoder = MessageEncoder::new(Vec::new(), Framing::Raw);
        encoder.encode_message(&delete(9)).unwrap();
        assert_eq!(encoder.get_ref(), &delete(9).encode());
    }
}
