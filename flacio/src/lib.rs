//! # flacio
//!
//! Streaming FLAC encode and decode sessions over caller-supplied byte
//! streams.
//!
//! A session binds one stream to one codec engine instance and walks the
//! `Created → Open → Closed` lifecycle: configuration is mutable before
//! open, frozen after, and resources are released on every exit path
//! (explicit close, drop, or failure). Streams are anything implementing
//! [`ByteStream`]; files, in-memory cursors, and non-seekable pipe
//! wrappers are provided. On a seekable output the encoder seeks back at
//! close to patch the true total-sample count into the stream header; on
//! a non-seekable one the patch is skipped and the provisional header
//! stands.
//!
//! ## Encoding
//!
//! ```
//! use flacio::{Decoder, Encoder};
//! use std::io::Cursor;
//!
//! let mut stream = Cursor::new(Vec::new());
//!
//! let mut encoder = Encoder::new(&mut stream)?;
//! encoder.set_sample_rate(48_000)?;
//! encoder.write(&[100, -100, 200, -200])?; // two stereo frames
//! encoder.close()?;
//! drop(encoder); // releases the borrow on `stream`
//!
//! stream.set_position(0);
//!
//! let mut decoder = Decoder::new(&mut stream)?;
//! decoder.open()?;
//! decoder.read_metadata()?;
//! assert_eq!(decoder.channels(), 2);
//! assert_eq!(decoder.sample_rate(), 48_000);
//! assert_eq!(decoder.total_samples(), 2);
//! assert_eq!(decoder.read(10)?, Some(vec![100, -100, 200, -200]));
//! assert_eq!(decoder.read(10)?, None);
//! # Ok::<(), flacio::Error>(())
//! ```
//!
//! Sessions are single-threaded: `&mut self` on every operation makes
//! concurrent use of one session impossible without an external lock, and
//! two sessions must not share one underlying stream object; give each
//! its own handle.

#![warn(missing_docs)]

mod decoder;
mod encoder;
mod framer;
mod options;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use options::EncoderOptions;

pub use flacio_codec::{Apodization, StreamInfo};
pub use flacio_core::error::{Error, FormatError, Result};
pub use flacio_core::io::{ByteStream, ReadOnly, WriteOnly};
pub use flacio_core::sample::SampleBlock;
