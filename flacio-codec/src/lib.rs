//! # flacio-codec
//!
//! The codec engine behind flacio: a block-based FLAC-compatible stream
//! encoder and decoder that perform all I/O through a
//! [`StreamAdapter`](flacio_core::StreamAdapter), never touching the
//! underlying stream directly.
//!
//! The engine surface is deliberately small:
//!
//! - [`StreamEncoder`]: construct bound to an adapter with an
//!   [`EncoderConfig`], feed per-channel blocks with
//!   [`StreamEncoder::process`], finalize with [`StreamEncoder::finish`]
//!   (which patches the stream header in place when the output is
//!   seekable).
//! - [`StreamDecoder`]: construct bound to an adapter, pull metadata with
//!   [`StreamDecoder::read_metadata`], then pull blocks with
//!   [`StreamDecoder::next_block`] until it returns `None`.
//!
//! Session lifecycle, option validation, and sample framing live one layer
//! up, in the `flacio` crate.

#![warn(missing_docs)]

mod bitstream;
mod crc;
mod frame;
mod md5;

pub mod decoder;
pub mod encoder;
pub mod metadata;
pub mod window;

pub use decoder::StreamDecoder;
pub use encoder::{EncoderConfig, StreamEncoder};
pub use metadata::StreamInfo;
pub use window::Apodization;

/// Maximum number of channels in a stream.
pub const MAX_CHANNELS: u8 = 8;

/// Maximum bits per sample.
pub const MAX_BITS_PER_SAMPLE: u8 = 32;

/// Minimum bits per sample.
pub const MIN_BITS_PER_SAMPLE: u8 = 4;

/// Maximum sample rate in Hz.
pub const MAX_SAMPLE_RATE: u32 = 655_350;

/// Minimum block size in frames.
pub const MIN_BLOCK_SIZE: u16 = 16;

/// Maximum LPC order.
pub const MAX_LPC_ORDER: u8 = 32;

/// Maximum quantized coefficient precision.
pub const MAX_QLP_COEFF_PRECISION: u8 = 15;

/// Minimum quantized coefficient precision (0 selects it automatically).
pub const MIN_QLP_COEFF_PRECISION: u8 = 5;

/// Maximum Rice partition order.
pub const MAX_PARTITION_ORDER: u8 = 15;

/// Bit depths above this fall back to unpredicted subframes, keeping
/// residuals within the 32-bit Rice fold.
pub(crate) const MAX_PREDICTED_BITS: u8 = 24;
