//! The encoder session.

use crate::framer::Framer;
use crate::options::EncoderOptions;
use flacio_codec::StreamEncoder;
use flacio_core::error::{Error, Result};
use flacio_core::io::{ByteStream, StreamAdapter};
use std::fs::File;
use std::mem;
use std::path::Path;
use tracing::{debug, warn};

enum State<S: ByteStream> {
    Created { stream: S },
    Open { engine: StreamEncoder<S>, framer: Framer },
    Closed,
}

impl<S: ByteStream> State<S> {
    fn name(&self) -> &'static str {
        match self {
            State::Created { .. } => "unopened",
            State::Open { .. } => "open",
            State::Closed => "closed",
        }
    }
}

/// An encode session bound to one output stream.
///
/// The session moves through `Created → Open → Closed`: configuration is
/// mutable while created, frozen once open, and the close transition is
/// guaranteed on every exit path (explicit [`close`], drop, or an engine
/// failure). One session must not be shared across threads; exclusive
/// access is enforced by `&mut self`.
///
/// [`close`]: Encoder::close
///
/// # Example
///
/// ```no_run
/// use flacio::Encoder;
///
/// let mut encoder = Encoder::create_path("out.flac")?;
/// encoder.set_sample_rate(48_000)?;
/// encoder.write(&[0, 0, 100, -100])?; // two stereo frames
/// encoder.close()?;
/// # Ok::<(), flacio::Error>(())
/// ```
pub struct Encoder<S: ByteStream> {
    state: State<S>,
    options: EncoderOptions,
}

impl<S: ByteStream> std::fmt::Debug for Encoder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("state", &self.state.name())
            .finish_non_exhaustive()
    }
}

impl Encoder<File> {
    /// Create the output file at `path` and bind an encoder to it.
    ///
    /// The file is owned by the session and closed when the session
    /// closes.
    pub fn create_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_path_with_options(path, EncoderOptions::new())
    }

    /// [`create_path`](Encoder::create_path) with a prepared option set.
    pub fn create_path_with_options(
        path: impl AsRef<Path>,
        options: EncoderOptions,
    ) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::io("open", e))?;
        Self::with_options(file, options)
    }
}

impl<S: ByteStream> Encoder<S> {
    /// Bind an encoder to a caller-supplied stream.
    ///
    /// The stream's writability is checked here, not later: a stream
    /// without write support never produces a session. Pass `&mut stream`
    /// to keep ownership on the caller's side.
    pub fn new(stream: S) -> Result<Self> {
        Self::with_options(stream, EncoderOptions::new())
    }

    /// [`new`](Encoder::new) with a prepared option set.
    pub fn with_options(stream: S, options: EncoderOptions) -> Result<Self> {
        if !stream.writable() {
            return Err(Error::MissingCapability {
                capability: "writing",
            });
        }
        Ok(Self {
            state: State::Created { stream },
            options,
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

    /// Start the engine and write the provisional stream header.
    ///
    /// A no-op if the session is already open. Opening a closed session
    /// is an error. If opening fails partway, everything acquired is
    /// released and the session ends up closed.
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

        // On any failure below the stream is dropped here, which is the
        // rollback: an owned file is closed, a borrowed stream is handed
        // back untouched.
        let cfg = self.options.resolve()?;
        let adapter = StreamAdapter::for_writing(stream)?;
        let engine = StreamEncoder::new(adapter, cfg)?;
        let framer = Framer::new(
            self.options.channels(),
            self.options.bits_per_sample(),
            self.options.blocksize(),
        );

        debug!(
            channels = self.options.channels(),
            bits_per_sample = self.options.bits_per_sample(),
            sample_rate = self.options.sample_rate(),
            blocksize = self.options.blocksize(),
            seekable = engine.output_seekable(),
            "encoder session opened"
        );
        self.state = State::Open { engine, framer };
        Ok(())
    }

    /// Encode interleaved frames, opening the session first if needed.
    ///
    /// The input must contain whole frames (`channels` samples each) and
    /// every sample must fit the configured bit depth; violations are
    /// reported with the offending frame and channel, and buffer nothing.
    /// Zero-length input is a no-op.
    pub fn write(&mut self, samples: &[i32]) -> Result<()> {
        self.open()?;

        let engine_result = {
            let State::Open { engine, framer } = &mut self.state else {
                unreachable!("open() succeeded");
            };
            // Validation failures leave the session open and unchanged.
            framer.push(samples)?;

            let mut result = Ok(());
            while let Some(planes) = framer.take_full_block() {
                result = engine.process(&planes);
                if result.is_err() {
                    break;
                }
            }
            result
        };

        // An engine failure is unrecoverable for this stream.
        if let Err(e) = engine_result {
            self.state = State::Closed;
            return Err(e);
        }
        Ok(())
    }

    /// Finalize the stream and release the output.
    ///
    /// Flushes the trailing partial block, finishes the engine (patching
    /// the total-sample count into the header when the output is
    /// seekable), and closes the owned stream if the session opened it
    /// from a path. Idempotent; the session is closed afterwards even if
    /// finalization failed, in which case the failure is returned after
    /// the transition completes.
    pub fn close(&mut self) -> Result<()> {
        match mem::replace(&mut self.state, State::Closed) {
            State::Created { .. } | State::Closed => Ok(()),
            State::Open { engine, mut framer } => {
                let seekable = engine.output_seekable();
                let result = (move || {
                    let mut engine = engine;
                    if let Some(partial) = framer.take_partial() {
                        engine.process(&partial)?;
                    }
                    let samples = engine.samples_written();
                    engine.finish()?;
                    Ok(samples)
                })();

                match result {
                    Ok(samples) => {
                        if seekable {
                            debug!(total_samples = samples, "encoder session closed");
                        } else {
                            debug!(
                                total_samples = samples,
                                "encoder session closed; output not seekable, header patch skipped"
                            );
                        }
                        Ok(())
                    }
                    Err(e) => {
                        warn!(error = %e, "encoder finalization failed");
                        Err(e)
                    }
                }
            }
        }
    }

    fn configurable(&self, operation: &'static str) -> Result<()> {
        match self.state {
            State::Created { .. } => Ok(()),
            _ => Err(Error::InvalidState {
                operation,
                state: self.state.name(),
            }),
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> u8 {
        self.options.channels()
    }

    /// Set the number of channels. Only before the session opens.
    pub fn set_channels(&mut self, value: u8) -> Result<()> {
        self.configurable("set_channels")?;
        self.options.set_channels(value)
    }

    /// Bits per sample.
    pub fn bits_per_sample(&self) -> u8 {
        self.options.bits_per_sample()
    }

    /// Set the bits per sample. Only before the session opens.
    pub fn set_bits_per_sample(&mut self, value: u8) -> Result<()> {
        self.configurable("set_bits_per_sample")?;
        self.options.set_bits_per_sample(value)
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.options.sample_rate()
    }

    /// Set the sample rate. Only before the session opens.
    pub fn set_sample_rate(&mut self, value: u32) -> Result<()> {
        self.configurable("set_sample_rate")?;
        self.options.set_sample_rate(value)
    }

    /// Expected total frame count written into the provisional header.
    pub fn total_samples_estimate(&self) -> u64 {
        self.options.total_samples_estimate()
    }

    /// Set the expected total frame count. Only before the session opens.
    pub fn set_total_samples_estimate(&mut self, value: u64) -> Result<()> {
        self.configurable("set_total_samples_estimate")?;
        self.options.set_total_samples_estimate(value)
    }

    /// Compression level 0-8.
    pub fn compression_level(&self) -> u8 {
        self.options.compression_level()
    }

    /// Set the compression level. Only before the session opens.
    pub fn set_compression_level(&mut self, value: u8) -> Result<()> {
        self.configurable("set_compression_level")?;
        self.options.set_compression_level(value)
    }

    /// Whether the stream is restricted to the streamable subset.
    pub fn streamable_subset(&self) -> bool {
        self.options.streamable_subset()
    }

    /// Restrict the stream to the streamable subset. Only before the
    /// session opens.
    pub fn set_streamable_subset(&mut self, value: bool) -> Result<()> {
        self.configurable("set_streamable_subset")?;
        self.options.set_streamable_subset(value)
    }

    /// Whether frames are re-decoded and compared before being written.
    pub fn verify(&self) -> bool {
        self.options.verify()
    }

    /// Enable verify mode. Only before the session opens.
    pub fn set_verify(&mut self, value: bool) -> Result<()> {
        self.configurable("set_verify")?;
        self.options.set_verify(value)
    }

    /// Block size in frames.
    pub fn blocksize(&self) -> u16 {
        self.options.blocksize()
    }

    /// Set the block size. Only before the session opens.
    pub fn set_blocksize(&mut self, value: u16) -> Result<()> {
        self.configurable("set_blocksize")?;
        self.options.set_blocksize(value)
    }

    /// Whether mid-side coding is tried for stereo input.
    pub fn do_mid_side_stereo(&self) -> bool {
        self.options.do_mid_side_stereo()
    }

    /// Enable mid-side stereo. Only before the session opens.
    pub fn set_do_mid_side_stereo(&mut self, value: bool) -> Result<()> {
        self.configurable("set_do_mid_side_stereo")?;
        self.options.set_do_mid_side_stereo(value)
    }

    /// Whether the stereo decision is re-evaluated only periodically.
    pub fn loose_mid_side_stereo(&self) -> bool {
        self.options.loose_mid_side_stereo()
    }

    /// Enable loose mid-side stereo. Only before the session opens.
    pub fn set_loose_mid_side_stereo(&mut self, value: bool) -> Result<()> {
        self.configurable("set_loose_mid_side_stereo")?;
        self.options.set_loose_mid_side_stereo(value)
    }

    /// The apodization window specification.
    pub fn apodization(&self) -> String {
        self.options.apodization().to_string()
    }

    /// Set the apodization window specification. Only before the session
    /// opens.
    pub fn set_apodization(&mut self, spec: &str) -> Result<()> {
        self.configurable("set_apodization")?;
        self.options.set_apodization(spec)
    }

    /// Maximum LPC order.
    pub fn max_lpc_order(&self) -> u8 {
        self.options.max_lpc_order()
    }

    /// Set the maximum LPC order. Only before the session opens.
    pub fn set_max_lpc_order(&mut self, value: u8) -> Result<()> {
        self.configurable("set_max_lpc_order")?;
        self.options.set_max_lpc_order(value)
    }

    /// Quantized coefficient precision (0 = automatic).
    pub fn qlp_coeff_precision(&self) -> u8 {
        self.options.qlp_coeff_precision()
    }

    /// Set the quantized coefficient precision. Only before the session
    /// opens.
    pub fn set_qlp_coeff_precision(&mut self, value: u8) -> Result<()> {
        self.configurable("set_qlp_coeff_precision")?;
        self.options.set_qlp_coeff_precision(value)
    }

    /// Whether coefficient precisions are searched.
    pub fn do_qlp_coeff_prec_search(&self) -> bool {
        self.options.do_qlp_coeff_prec_search()
    }

    /// Enable the coefficient precision search. Only before the session
    /// opens.
    pub fn set_do_qlp_coeff_prec_search(&mut self, value: bool) -> Result<()> {
        self.configurable("set_do_qlp_coeff_prec_search")?;
        self.options.set_do_qlp_coeff_prec_search(value)
    }

    /// Whether all predictor orders are searched.
    pub fn do_exhaustive_model_search(&self) -> bool {
        self.options.do_exhaustive_model_search()
    }

    /// Enable the exhaustive model search. Only before the session opens.
    pub fn set_do_exhaustive_model_search(&mut self, value: bool) -> Result<()> {
        self.configurable("set_do_exhaustive_model_search")?;
        self.options.set_do_exhaustive_model_search(value)
    }

    /// Minimum Rice partition order.
    pub fn min_residual_partition_order(&self) -> u8 {
        self.options.min_residual_partition_order()
    }

    /// Set the minimum Rice partition order. Only before the session
    /// opens.
    pub fn set_min_residual_partition_order(&mut self, value: u8) -> Result<()> {
        self.configurable("set_min_residual_partition_order")?;
        self.options.set_min_residual_partition_order(value)
    }

    /// Maximum Rice partition order.
    pub fn max_residual_partition_order(&self) -> u8 {
        self.options.max_residual_partition_order()
    }

    /// Set the maximum Rice partition order. Only before the session
    /// opens.
    pub fn set_max_residual_partition_order(&mut self, value: u8) -> Result<()> {
        self.configurable("set_max_residual_partition_order")?;
        self.options.set_max_residual_partition_order(value)
    }
}

impl<S: ByteStream> Drop for Encoder<S> {
    /// Abandoned sessions still finalize: drop runs the same close path,
    /// discarding any error after logging it.
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                warn!(error = %e, "encoder close failed during drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_only_sink_is_accepted() {
        use flacio_core::io::WriteOnly;
        assert!(Encoder::new(WriteOnly::new(Vec::new())).is_ok());
    }

    #[test]
    fn test_read_only_stream_rejected_at_construction() {
        use flacio_core::io::ReadOnly;
        let err = Encoder::new(ReadOnly::new(std::io::empty())).unwrap_err();
        assert!(matches!(err, Error::MissingCapability { .. }));
    }

    #[test]
    fn test_open_is_idempotent() {
        let mut sink = Cursor::new(Vec::new());
        {
            let mut enc = Encoder::new(&mut sink).unwrap();
            enc.open().unwrap();
            enc.open().unwrap();
            enc.close().unwrap();
        }
        // One marker + one STREAMINFO block, not two.
        assert_eq!(sink.get_ref().len(), 42);
    }

    #[test]
    fn test_setters_rejected_after_open() {
        let mut sink = Cursor::new(Vec::new());
        let mut enc = Encoder::new(&mut sink).unwrap();
        enc.open().unwrap();
        let err = enc.set_channels(1).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                operation: "set_channels",
                state: "open"
            }
        ));
        // Getters still work.
        assert_eq!(enc.channels(), 2);
    }

    #[test]
    fn test_setters_rejected_after_close() {
        let mut sink = Cursor::new(Vec::new());
        let mut enc = Encoder::new(&mut sink).unwrap();
        enc.open().unwrap();
        enc.close().unwrap();
        assert!(matches!(
            enc.set_verify(true),
            Err(Error::InvalidState { state: "closed", .. })
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut sink = Cursor::new(Vec::new());
        let mut enc = Encoder::new(&mut sink).unwrap();
        enc.write(&[1, 2]).unwrap();
        enc.close().unwrap();
        enc.close().unwrap();
        assert!(enc.is_closed());
    }

    #[test]
    fn test_close_without_open_writes_nothing() {
        let mut sink = Cursor::new(Vec::new());
        {
            let mut enc = Encoder::new(&mut sink).unwrap();
            enc.close().unwrap();
        }
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn test_open_after_close_is_a_state_error() {
        let mut sink = Cursor::new(Vec::new());
        let mut enc = Encoder::new(&mut sink).unwrap();
        enc.close().unwrap();
        assert!(matches!(
            enc.open(),
            Err(Error::InvalidState {
                operation: "open",
                ..
            })
        ));
    }

    #[test]
    fn test_failed_open_rolls_back_to_closed() {
        let mut sink = Cursor::new(Vec::new());
        let mut enc = Encoder::new(&mut sink).unwrap();
        // Conflicting options surface at open time.
        enc.set_blocksize(8192).unwrap();
        assert!(enc.open().is_err());
        assert!(enc.is_closed());
    }

    #[test]
    fn test_out_of_range_sample_leaves_session_open() {
        let mut sink = Cursor::new(Vec::new());
        let mut enc = Encoder::new(&mut sink).unwrap();
        let err = enc.write(&[0, 40_000]).unwrap_err();
        assert!(matches!(err, Error::SampleOutOfRange { .. }));
        assert!(enc.is_open());
        // The session is still usable.
        enc.write(&[0, 1]).unwrap();
        enc.close().unwrap();
    }
}
