use std::io;

use super::{decode_message, DecodeMessage, Framing};
use crate::{catalog, Error, Message, Result, LENGTH_PREFIX_LEN, MAX_MESSAGE_LEN};

/// A decoder of ITCH messages from an [`io::Read`]er. Reads through a single buffer
/// sized for the longest message in the catalog, which is reused for every message.
///
/// Also an [`Iterator`] of messages that ends at the end of the input or after the
/// first error it can't decode past.
pub struct StreamDecoder<R>
where
    R: io::Read,
{
    reader: R,
    framing: Framing,
    buffer: [u8; MAX_MESSAGE_LEN],
    offset: u64,
    resyncable: bool,
    done: bool,
}

impl<R> StreamDecoder<R>
where
    R: io::Read,
{
    /// Creates a new `StreamDecoder` that will decode from `reader`.
    pub fn new(reader: R, framing: Framing) -> Self {
        Self {
            reader,
            framing,
            buffer: [0; MAX_MESSAGE_LEN],
            offset: 0,
            resyncable: false,
            done: false,
        }
    }

    /// Returns the framing the decoder expects.
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Returns a mutable reference to the inner reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consumes the decoder and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Tries to decode the next message. Returns `Ok(None)` if the reader is
    /// exhausted at a message boundary.
    ///
    /// # Errors
    /// See [`DecodeMessage::decode_message()`].
    pub fn decode(&mut self) -> Result<Option<Message>> {
        self.resyncable = false;
        match self.framing {
            Framing::Raw => self.decode_raw(),
            Framing::LengthPrefixed => self.decode_prefixed(),
        }
    }

    fn decode_raw(&mut self) -> Result<Option<Message>> {
        let start = self.offset;
        if self.fill(0, 1)? == 0 {
            return Ok(None);
        }
        let tag = self.buffer[0];
        let spec = catalog::lookup(tag).ok_or(Error::UnknownMessageType { tag, offset: start })?;
        self.read_body(spec.length, start)
    }

    fn decode_prefixed(&mut self) -> Result<Option<Message>> {
        let start = self.offset;
        let mut prefix = [0; LENGTH_PREFIX_LEN];
        let read = read_fully(&mut self.reader, &mut prefix)
            .map_err(|e| Error::io(e, "reading length prefix"))?;
        self.offset += read as u64;
        match read {
            0 => return Ok(None),
            LENGTH_PREFIX_LEN => {}
            available => {
                return Err(Error::TruncatedMessage {
                    tag: None,
                    offset: start,
                    expected: LENGTH_PREFIX_LEN,
                    available,
                })
            }
        }
        let declared = usize::from(u16::from_be_bytes(prefix));
        let body_start = self.offset;
        if declared == 0 || self.fill(0, 1)? == 0 {
            return Err(Error::TruncatedMessage {
                tag: None,
                offset: body_start,
                expected: declared.max(1),
                available: 0,
            });
        }
        let tag = self.buffer[0];
        let Some(spec) = catalog::lookup(tag) else {
            self.skip(declared - 1, tag, body_start, declared)?;
            tracing::debug!(
                offset = start,
                tag = %char::from(tag),
                len = declared,
                "Skipped frame with unknown message type"
            );
            self.resyncable = true;
            return Err(Error::UnknownMessageType { tag, offset: start });
        };
        if declared != spec.length {
            return Err(Error::LengthMismatch {
                tag,
                offset: start,
                expected: spec.length,
                declared,
            });
        }
        self.read_body(spec.length, body_start)
    }

    /// Reads the rest of a message whose tag is already in the buffer.
    fn read_body(&mut self, length: usize, start: u64) -> Result<Option<Message>> {
        let read = self.fill(1, length)?;
        if read < length - 1 {
            return Err(Error::TruncatedMessage {
                tag: Some(self.buffer[0]),
                offset: start,
                expected: length,
                available: read + 1,
            });
        }
        decode_message(&self.buffer[..length], start).map(|(msg, _)| Some(msg))
    }

    /// Fills `buffer[from..to]`, returning the number of bytes read, which is only
    /// less than requested at the end of the input.
    fn fill(&mut self, from: usize, to: usize) -> Result<usize> {
        let read = read_fully(&mut self.reader, &mut self.buffer[from..to])
            .map_err(|e| Error::io(e, "reading ITCH message"))?;
        self.offset += read as u64;
        Ok(read)
    }

    /// Discards the remaining `count` bytes of a frame.
    fn skip(&mut self, count: usize, tag: u8, start: u64, declared: usize) -> Result<()> {
        let mut frame = io::Read::take(&mut self.reader, count as u64);
        let skipped = io::copy(&mut frame, &mut io::sink())
            .map_err(|e| Error::io(e, "skipping unknown message"))?;
        self.offset += skipped;
        if skipped < count as u64 {
            return Err(Error::TruncatedMessage {
                tag: Some(tag),
                offset: start,
                expected: declared,
                available: 1 + skipped as usize,
            });
        }
        Ok(())
    }
}

/// Like [`io::Read::read_exact()`] but returns the number of bytes read when the
/// input ends early instead of an error.
fn read_fully(reader: &mut impl io::Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl<R> DecodeMessage for StreamDecoder<R>
where
    R: io::Read,
{
    fn decode_message(&mut self) -> Result<Option<Message>> {
        self.decode()
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn can_resync(&self) -> bool {
        self.resyncable
    }
}

impl<R> Iterator for StreamDecoder<R>
where
    R: io::Read,
{
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

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::*;

    use super::*;
    use crate::{
        encode::{EncodeMessage, MessageEncoder},
        enums::Side,
        test_utils::*,
    };

    fn encode_all(framing: Framing, msgs: &[Message]) -> Vec<u8> {
        let mut encoder = MessageEncoder::new(Vec::new(), framing);
        for msg in msgs {
            encoder.encode_message(msg).unwrap();
        }
        encoder.into_inner()
    }

    fn sample() -> Vec<Message> {
        vec![
            stock_directory(LOCATE, "AAPL"),
            add_order(555, Side::Buy, 100, "AAPL", 1_500_000),
            executed(555, 40),
            delete(555),
        ]
    }

    #[rstest]
    fn test_decode_in_order(#[values(Framing::Raw, Framing::LengthPrefixed)] framing: Framing) {
        let msgs = sample();
        let buf = encode_all(framing, &msgs);
        let mut decoder = StreamDecoder::new(Cursor::new(buf.clone()), framing);
        for exp in msgs.iter() {
            assert_eq!(decoder.decode().unwrap().as_ref(), Some(exp));
        }
        assert!(decoder.decode().unwrap().is_none());
        assert_eq!(decoder.offset(), buf.len() as u64);
        // stays at end
        assert!(decoder.decode().unwrap().is_none());
    }

    #[rstest]
    fn test_decode_messages_via_trait(
        #[values(Framing::Raw, Framing::LengthPrefixed)] framing: Framing,
    ) {
        let msgs = sample();
        let decoder = StreamDecoder::new(Cursor::new(encode_all(framing, &msgs)), framing);
        assert_eq!(decoder.decode_messages().unwrap(), msgs);
    }

    #[test]
    fn test_truncated_inside_message() {
        let mut buf = encode_all(Framing::Raw, &sample());
        buf.truncate(39 + 10);
        let mut decoder = StreamDecoder::new(Cursor::new(buf), Framing::Raw);
        decoder.decode().unwrap().unwrap();
        assert!(matches!(
            decoder.decode(),
            Err(Error::TruncatedMessage {
                tag: Some(b'A'),
                offset: 39,
                expected: 36,
                available: 10
            })
        ));
    }

    #[test]
    fn test_truncated_prefix() {
        let mut decoder = StreamDecoder::new(Cursor::new(vec![0u8]), Framing::LengthPrefixed);
        assert!(matches!(
            decoder.decode(),
            Err(Error::TruncatedMessage {
                tag: None,
                offset: 0,
                expected: 2,
                available: 1
            })
        ));
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let mut buf = encode_all(Framing::LengthPrefixed, &[delete(3)]);
        buf[1] = 20;
        buf.push(0);
        let mut decoder = StreamDecoder::new(Cursor::new(buf), Framing::LengthPrefixed);
        let err = decoder.decode().unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                tag: b'D',
                offset: 0,
                expected: 19,
                declared: 20
            }
        ));
        assert!(err.is_fatal());
        assert!(!decoder.can_resync());
    }

    #[test]
    fn test_unknown_type_resyncs_with_prefix() {
        let mut buf = vec![0, 4, b'z', 1, 2, 3];
        buf.extend(encode_all(Framing::LengthPrefixed, &[delete(3)]));
        let mut decoder = StreamDecoder::new(Cursor::new(buf), Framing::LengthPrefixed);
        assert!(matches!(
            decoder.decode(),
            Err(Error::UnknownMessageType {
                tag: b'z',
                offset: 0
            })
        ));
        assert!(decoder.can_resync());
        assert_eq!(decoder.offset(), 6);
        assert_eq!(decoder.decode().unwrap(), Some(delete(3)));
        assert!(!decoder.can_resync());
    }

    #[test]
    fn test_unknown_type_raw_is_not_resyncable() {
        let mut decoder = StreamDecoder::new(Cursor::new(b"z123".to_vec()), Framing::Raw);
        assert!(matches!(
            decoder.decode(),
            Err(Error::UnknownMessageType { tag: b'z', offset: 0 })
        ));
        assert!(!decoder.can_resync());
    }

    #[test]
    fn test_iterator_stops_after_fatal_error() {
        let mut buf = encode_all(Framing::Raw, &[delete(1)]);
        buf.push(b'z');
        buf.extend(delete(2).encode());
        let res: Vec<_> = StreamDecoder::new(Cursor::new(buf), Framing::Raw).collect();
        assert_eq!(res.len(), 2);
        assert!(res[0].is_ok());
        assert!(res[1].is_err());
    }
}
