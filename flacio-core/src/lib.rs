//! # flacio-core
//!
//! Core types shared by the flacio codec library:
//! - Error handling types
//! - The caller-facing byte-stream contract and the engine-facing adapter
//! - Per-channel sample block buffers

#![warn(missing_docs)]

pub mod error;
pub mod io;
pub mod sample;

pub use error::{Error, FormatError, Result};
pub use io::{ByteStream, ReadOnly, StreamAdapter, WriteOnly};
pub use sample::SampleBlock;
