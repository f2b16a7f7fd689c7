//! Error types for the flacio library.
//!
//! One taxonomy is shared by all components: stream capability failures are
//! reported at bind time, configuration and sample-range failures at the
//! point of assignment, and I/O failures tagged with the operation that
//! raised them.

use thiserror::Error;

/// Main error type for the flacio library.
#[derive(Error, Debug)]
pub enum Error {
    /// The supplied stream lacks a capability the session requires.
    /// Raised when the stream is bound, never mid-operation.
    #[error("stream does not support {capability}")]
    MissingCapability {
        /// The missing capability ("reading", "writing").
        capability: &'static str,
    },

    /// A configuration option was assigned a value outside its domain.
    #[error("invalid value for {option}: {value}")]
    InvalidOption {
        /// Option name as exposed on the session.
        option: &'static str,
        /// Rejected value, rendered for diagnostics.
        value: String,
    },

    /// A sample does not fit the configured bit depth's signed range.
    #[error("sample {value} at frame {frame}, channel {channel} exceeds {bits}-bit range")]
    SampleOutOfRange {
        /// Index of the offending frame within the written slice.
        frame: usize,
        /// Channel the sample belongs to.
        channel: usize,
        /// Configured bits per sample.
        bits: u8,
        /// The rejected sample value.
        value: i32,
    },

    /// An operation was attempted in a session state that forbids it.
    #[error("{operation} is not allowed on a {state} session")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// Human-readable session state ("open", "closed", ...).
        state: &'static str,
    },

    /// The underlying stream raised during an I/O operation.
    #[error("I/O error during {operation}: {source}")]
    Io {
        /// Which adapter operation failed.
        operation: &'static str,
        /// The unchanged error from the stream.
        #[source]
        source: std::io::Error,
    },

    /// Corrupt or unsupported stream content.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// A seek was requested on a stream bound as non-seekable.
    #[error("seek requested on a non-seekable stream")]
    NotSeekable,
}

/// Errors describing corrupt or unsupported stream content.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The stream does not begin with the `fLaC` marker.
    #[error("invalid stream marker")]
    InvalidMarker,

    /// A metadata block is malformed or the STREAMINFO block is missing.
    #[error("invalid metadata block")]
    InvalidMetadata,

    /// A frame header failed to parse.
    #[error("invalid frame header")]
    InvalidFrameHeader,

    /// A subframe failed to parse.
    #[error("invalid subframe")]
    InvalidSubframe,

    /// A residual partition failed to parse.
    #[error("invalid residual partition")]
    InvalidRicePartition,

    /// Frame header CRC-8 check failed.
    #[error("header CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CrcMismatch {
        /// CRC stored in the stream.
        expected: u8,
        /// CRC computed over the received bytes.
        actual: u8,
    },

    /// Whole-frame CRC-16 check failed.
    #[error("frame CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    Crc16Mismatch {
        /// CRC stored in the stream.
        expected: u16,
        /// CRC computed over the received bytes.
        actual: u16,
    },

    /// The stream ended in the middle of a structure.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The stream uses a feature this decoder does not support.
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// Verify mode found a decode mismatch in a frame about to be written.
    #[error("verify mismatch in frame {frame}")]
    VerifyMismatch {
        /// Ordinal of the frame that failed verification.
        frame: u64,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Tag an I/O error with the adapter operation that raised it.
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Error::Io { operation, source }
    }

    /// Check if this error reports corrupt or unsupported stream content.
    #[must_use]
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidOption {
            option: "channels",
            value: "9".into(),
        };
        assert_eq!(err.to_string(), "invalid value for channels: 9");
    }

    #[test]
    fn test_sample_range_display_names_offender() {
        let err = Error::SampleOutOfRange {
            frame: 17,
            channel: 1,
            bits: 16,
            value: 32768,
        };
        let msg = err.to_string();
        assert!(msg.contains("32768"));
        assert!(msg.contains("frame 17"));
        assert!(msg.contains("channel 1"));
    }

    #[test]
    fn test_format_error_conversion() {
        let err: Error = FormatError::InvalidMarker.into();
        assert!(err.is_format());
        assert!(!Error::NotSeekable.is_format());
    }

    #[test]
    fn test_io_tagging() {
        let err = Error::io(
            "seek",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(err.to_string().contains("seek"));
    }
}
