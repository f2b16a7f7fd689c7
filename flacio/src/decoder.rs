//! The decoder session.

use flacio_codec::StreamDecoder;
use flacio_core::error::{Error, Result};
use flacio_core::io::{ByteStream, StreamAdapter};
use flacio_core::sample::SampleBlock;
use std::fs::File;
use std::mem;
use std::path::Path;
use tracing::debug;

/// A block only partially handed to the caller; the rest is served by the
/// next read.
struct Carry {
    block: SampleBlock,
    offset: usize,
}

enum State<S: ByteStream> {
    Created { stream: S },
    Open {
        engine: StreamDecoder<S>,
        carry: Option<Carry>,
    },
    Closed,
}

/// Stream properties, all zero until the metadata has been read.
#[derive(Debug, Clone, Copy, Default)]
struct Summary {
    channels: u8,
    sample_rate: u32,
    bits_per_sample: u8,
    total_samples: u64,
}

/// A decode session bound to one input stream.
///
/// Stream properties (`channels`, `sample_rate`, `bits_per_sample`,
/// `total_samples`) are outputs: zero until [`read_metadata`] (or the
/// first [`read`]) has consumed the stream's metadata section. One
/// session must not be shared across threads; exclusive access is
/// enforced by `&mut self`.
///
/// [`read_metadata`]: Decoder::read_metadata
/// [`read`]: Decoder::read
///
/// # Example
///
/// ```no_run
/// use flacio::Decoder;
///
/// let mut decoder = Decoder::open_path("in.flac")?;
/// decoder.open()?;
/// decoder.read_metadata()?;
/// while let Some(samples) = decoder.read(4096)? {
///     // interleaved frames, decoder.channels() samples each
/// }
/// decoder.close()?;
/// # Ok::<(), flacio::Error>(())
/// ```
pub struct Decoder<S: ByteStream> {
    state: State<S>,
    summary: Summary,
}

impl<S: ByteStream> std::fmt::Debug for Decoder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl Decoder<File> {
    /// Open the file at `path` and bind a decoder to it.
    ///
    /// The file is owned by the session and closed when the session
    /// closes.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io("open", e))?;
        Self::new(file)
    }
}

impl<S: ByteStream> Decoder<S> {
    /// Bind a decoder to a caller-supplied stream.
    ///
    /// The stream's readability is checked here, not later. Pass
    /// `&mut stream` to keep ownership on the caller's side.
    pub fn new(stream: S) -> Result<Self> {
        if !stream.readable() {
            return Err(Error::MissingCapability {
                capability: "reading",
            });
        }
        Ok(Self {
            state: State::Created { stream },
            summary: Summary::default(),
        })
    }

    /// Whether the session has been opened and not yet closed.
    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open { .. })
    }

    /// Whether the session is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Start the engine. No stream bytes are consumed yet.
    ///
    /// A no-op if the session is already open; opening a closed session
    /// is an error.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            State::Open { .. } => return Ok(()),
            State::Closed => {
                return Err(Error::InvalidState {
                    operation: "open",
                    state: "closed",
                })
            }
            State::Created { .. } => {}
        }

        let State::Created { stream } = mem::replace(&mut self.state, State::Closed) else {
            unreachable!("state checked above");
        };

        let adapter = StreamAdapter::for_reading(stream)?;
        debug!(seekable = adapter.seekable(), "decoder session opened");
        self.state = State::Open {
            engine: StreamDecoder::new(adapter),
            carry: None,
        };
        Ok(())
    }

    /// Advance the engine to the end of the metadata section and
    /// populate the stream properties.
    ///
    /// Requires an open session; idempotent after the first success.
    pub fn read_metadata(&mut self) -> Result<()> {
        let result = match &mut self.state {
            State::Open { engine, .. } => engine.read_metadata(),
            other => {
                return Err(Error::InvalidState {
                    operation: "read_metadata",
                    state: match other {
                        State::Created { .. } => "unopened",
                        _ => "closed",
                    },
                })
            }
        };

        if let Err(e) = result {
            self.state = State::Closed;
            return Err(e);
        }
        self.refresh_summary();
        Ok(())
    }

    /// Decode up to `max_frames` frames, opening the session first if
    /// needed.
    ///
    /// Returns interleaved samples (`channels` values per frame), a
    /// short result near the end of the stream, or `None` once no more
    /// data is available. A partially consumed engine block is carried
    /// over to the next call. If the stream's properties change
    /// mid-stream, a read stops at the boundary so one result never
    /// mixes properties.
    pub fn read(&mut self, max_frames: usize) -> Result<Option<Vec<i32>>> {
        self.open()?;

        let gathered = {
            let State::Open { engine, carry } = &mut self.state else {
                unreachable!("open() succeeded");
            };

            let mut out: Vec<i32> = Vec::new();
            let mut attrs: Option<SampleBlock> = None;
            let mut remaining = max_frames;
            let mut failure = None;

            if let Some(c) = carry.take() {
                let available = c.block.frame_count() - c.offset;
                let take = available.min(remaining);
                c.block.interleave_range(c.offset, take, &mut out);
                remaining -= take;
                if take < available {
                    *carry = Some(Carry {
                        offset: c.offset + take,
                        block: c.block,
                    });
                } else {
                    attrs = Some(c.block);
                }
            }

            while remaining > 0 && carry.is_none() {
                match engine.next_block() {
                    Ok(Some(block)) => {
                        if let Some(prev) = &attrs {
                            if !prev.attrs_match(&block) {
                                // Leave the differing block for later
                                // reads.
                                *carry = Some(Carry { block, offset: 0 });
                                break;
                            }
                        }
                        let take = block.frame_count().min(remaining);
                        block.interleave_range(0, take, &mut out);
                        remaining -= take;
                        if take < block.frame_count() {
                            *carry = Some(Carry {
                                block,
                                offset: take,
                            });
                        } else {
                            attrs = Some(block);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            match failure {
                Some(e) => Err(e),
                None => Ok(out),
            }
        };

        self.refresh_summary();

        match gathered {
            Err(e) => {
                self.state = State::Closed;
                Err(e)
            }
            Ok(out) if out.is_empty() => Ok(None),
            Ok(out) => Ok(Some(out)),
        }
    }

    /// Release the input stream. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if !matches!(self.state, State::Closed) {
            debug!("decoder session closed");
        }
        self.state = State::Closed;
        Ok(())
    }

    fn refresh_summary(&mut self) {
        if self.summary.channels != 0 {
            return;
        }
        if let State::Open { engine, .. } = &self.state {
            if let Some(info) = engine.stream_info() {
                self.summary = Summary {
                    channels: info.channels,
                    sample_rate: info.sample_rate,
                    bits_per_sample: info.bits_per_sample,
                    total_samples: info.total_samples,
                };
            }
        }
    }

    /// Number of channels; 0 until the metadata has been read.
    pub fn channels(&self) -> u8 {
        self.summary.channels
    }

    /// Sample rate in Hz; 0 until the metadata has been read.
    pub fn sample_rate(&self) -> u32 {
        self.summary.sample_rate
    }

    /// Bits per sample; 0 until the metadata has been read.
    pub fn bits_per_sample(&self) -> u8 {
        self.summary.bits_per_sample
    }

    /// Total frames in the stream; 0 until the metadata has been read,
    /// and 0 for streams whose writer could not patch the count in.
    pub fn total_samples(&self) -> u64 {
        self.summary.total_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_only_stream_rejected_at_construction() {
        use flacio_core::io::WriteOnly;
        let err = Decoder::new(WriteOnly::new(Vec::new())).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingCapability {
                capability: "reading"
            }
        ));
    }

    #[test]
    fn test_read_metadata_before_open_is_a_state_error() {
        let mut dec = Decoder::new(Cursor::new(Vec::new())).unwrap();
        let err = dec.read_metadata().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                operation: "read_metadata",
                state: "unopened"
            }
        ));
    }

    #[test]
    fn test_metadata_outputs_zero_before_read() {
        let dec = Decoder::new(Cursor::new(Vec::new())).unwrap();
        assert_eq!(dec.channels(), 0);
        assert_eq!(dec.sample_rate(), 0);
        assert_eq!(dec.bits_per_sample(), 0);
        assert_eq!(dec.total_samples(), 0);
    }

    #[test]
    fn test_empty_stream_reads_none_without_error() {
        let mut dec = Decoder::new(Cursor::new(Vec::new())).unwrap();
        assert!(dec.read(1000).unwrap().is_none());
        assert!(dec.is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut dec = Decoder::new(Cursor::new(Vec::new())).unwrap();
        dec.open().unwrap();
        dec.close().unwrap();
        dec.close().unwrap();
        assert!(dec.is_closed());
    }

    #[test]
    fn test_read_after_close_is_a_state_error() {
        let mut dec = Decoder::new(Cursor::new(Vec::new())).unwrap();
        dec.close().unwrap();
        assert!(matches!(
            dec.read(10),
            Err(Error::InvalidState { operation: "open", .. })
        ));
    }

    #[test]
    fn test_corrupt_marker_is_a_format_error() {
        let mut dec = Decoder::new(Cursor::new(b"RIFF....".to_vec())).unwrap();
        dec.open().unwrap();
        let err = dec.read_metadata().unwrap_err();
        assert!(err.is_format());
        assert!(dec.is_closed());
    }
}
