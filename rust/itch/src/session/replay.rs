use std::{
    fs::File,
    io::{self, BufReader},
    ops::ControlFlow,
    path::Path,
};

use super::{Anomaly, DepthSnapshot, Session, Step};
use crate::{
    decode::{DecodeMessage, Framing, StreamDecoder},
    Error, Result, Stock,
};

/// Settings for a [`Replayer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// How messages are delimited in the input.
    pub framing: Framing,
    /// How many nanoseconds of replay time to retain level changes for so
    /// historical snapshots can be served.
    pub history_ns: u64,
    /// Whether to skip past messages with unknown types instead of halting, when
    /// the framing allows it.
    pub skip_unknown: bool,
    /// The capacity of the read buffer used by [`Replayer::from_file()`].
    pub read_buffer_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            history_ns: 0,
            skip_unknown: false,
            read_buffer_capacity: 64 * 1024,
        }
    }
}

impl SessionConfig {
    /// Sets [`framing`](Self::framing).
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Sets [`history_ns`](Self::history_ns).
    pub fn with_history_ns(mut self, history_ns: u64) -> Self {
        self.history_ns = history_ns;
        self
    }

    /// Sets [`skip_unknown`](Self::skip_unknown).
    pub fn with_skip_unknown(mut self, skip_unknown: bool) -> Self {
        self.skip_unknown = skip_unknown;
        self
    }

    /// Sets [`read_buffer_capacity`](Self::read_buffer_capacity).
    ///
    /// # Errors
    /// This function returns an error if `capacity` is zero.
    pub fn with_read_buffer_capacity(mut self, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::bad_argument(
                "capacity",
                "read buffer capacity must be greater than zero",
            ));
        }
        self.read_buffer_capacity = capacity;
        Ok(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Running,
    Finished,
    Halted { offset: u64 },
}

/// Drives a [`Session`] from a decoder, one message at a time.
pub struct Replayer<D> {
    decoder: D,
    session: Session,
    config: SessionConfig,
    state: State,
}

impl<R> Replayer<StreamDecoder<R>>
where
    R: io::Read,
{
    /// Creates a new `Replayer` that decodes from `reader` with the framing in
    /// `config`.
    pub fn new(reader: R, config: SessionConfig) -> Self {
        Self::with_decoder(StreamDecoder::new(reader, config.framing), config)
    }
}

impl Replayer<StreamDecoder<BufReader<File>>> {
    /// Creates a new `Replayer` that replays the file at `path`.
    ///
    /// # Errors
    /// This function returns an error if the file can't be opened.
    pub fn from_file(path: impl AsRef<Path>, config: SessionConfig) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            Error::io(
                e,
                format!("opening ITCH file at path '{}'", path.as_ref().display()),
            )
        })?;
        Ok(Self::new(
            BufReader::with_capacity(config.read_buffer_capacity, file),
            config,
        ))
    }
}

impl<D> Replayer<D>
where
    D: DecodeMessage,
{
    /// Creates a new `Replayer` from an existing decoder. The framing in `config`
    /// is ignored.
    pub fn with_decoder(decoder: D, config: SessionConfig) -> Self {
        Self {
            decoder,
            session: Session::new(config.history_ns),
            config,
            state: State::Running,
        }
    }

    /// Registers an instrument before replay.
    pub fn seed_instrument(&mut self, stock_locate: u16, symbol: Stock) {
        self.session.seed_instrument(stock_locate, symbol);
    }

    /// Decodes and applies the next message. Returns `Ok(None)` at the end of the
    /// stream.
    ///
    /// # Errors
    /// This function returns the structural error that halted the stream, and
    /// an [`Error::Halted`] on every call after that.
    pub fn advance(&mut self) -> Result<Option<Step>> {
        match self.state {
            State::Running => {}
            State::Finished => return Ok(None),
            State::Halted { offset } => return Err(Error::Halted { offset }),
        }
        loop {
            let offset = self.decoder.offset();
            match self.decoder.decode_message() {
                Ok(Some(message)) => return Ok(Some(self.session.apply(offset, message))),
                Ok(None) => {
                    self.state = State::Finished;
                    self.session.finish();
                    let stats = self.session.stats();
                    tracing::info!(
                        messages = stats.messages,
                        anomalies = stats.total_anomalies(),
                        offset = self.decoder.offset(),
                        "Reached end of stream"
                    );
                    return Ok(None);
                }
                Err(error) if self.config.skip_unknown && self.decoder.can_resync() => {
                    let tag = match error {
                        Error::UnknownMessageType { tag, .. } => Some(tag),
                        _ => None,
                    };
                    self.session.record_anomaly(&Anomaly { offset, tag, error });
                }
                Err(error) => {
                    self.state = State::Halted { offset };
                    tracing::debug!(offset, %error, "Halted replay");
                    return Err(error);
                }
            }
        }
    }

    /// Replays until the end of the stream, calling `on_step` with every applied
    /// message. Stops early at a message boundary if `on_step` returns
    /// [`ControlFlow::Break`]. Returns the number of messages applied by this call.
    ///
    /// # Errors
    /// This function returns an error if the stream halts, see
    /// [`advance()`](Self::advance).
    pub fn run_to_end<F>(&mut self, mut on_step: F) -> Result<u64>
    where
        F: FnMut(&Step) -> ControlFlow<()>,
    {
        let mut count = 0;
        while let Some(step) = self.advance()? {
            count += 1;
            if on_step(&step).is_break() {
                break;
            }
        }
        Ok(count)
    }

    /// Returns the depth of `symbol` as of `at`, in nanoseconds since midnight.
    ///
    /// # Errors
    /// See [`Session::snapshot()`].
    pub fn snapshot(&self, symbol: &str, at: u64) -> Result<DepthSnapshot> {
        self.session.snapshot(symbol, at)
    }

    /// Returns a reference to the session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Consumes the replayer and returns the session state.
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Returns the offset of the next message in the input.
    pub fn offset(&self) -> u64 {
        self.decoder.offset()
    }

    /// Returns the settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns `true` if the end of the stream was reached.
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Returns `true` if replay stopped on a structural error.
    pub fn is_halted(&self) -> bool {
        matches!(self.state, State::Halted { .. })
    }
}
