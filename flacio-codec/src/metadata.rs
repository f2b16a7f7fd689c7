//! Stream marker and metadata block handling.
//!
//! The stream opens with the `fLaC` marker followed by metadata blocks,
//! the first of which is always STREAMINFO. The encoder writes STREAMINFO
//! with a provisional total-sample count and rewrites it in place at
//! finish time when the output stream is seekable.

use byteorder::{BigEndian, ByteOrder};
use flacio_core::error::{FormatError, Result};
use flacio_core::io::{ByteStream, StreamAdapter};

/// Stream marker bytes.
pub const STREAM_MARKER: [u8; 4] = *b"fLaC";

/// Encoded size of the STREAMINFO block body.
pub const STREAM_INFO_LEN: usize = 34;

/// Byte offset of the STREAMINFO body in a stream this engine writes
/// (marker plus one block header).
pub const STREAM_INFO_OFFSET: u64 = 8;

const BLOCK_TYPE_STREAMINFO: u8 = 0;

/// The STREAMINFO metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Minimum block size in frames.
    pub min_block_size: u16,
    /// Maximum block size in frames.
    pub max_block_size: u16,
    /// Minimum frame size in bytes (0 = unknown).
    pub min_frame_size: u32,
    /// Maximum frame size in bytes (0 = unknown).
    pub max_frame_size: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels (1-8).
    pub channels: u8,
    /// Bits per sample (4-32).
    pub bits_per_sample: u8,
    /// Total frames in the stream (0 = unknown).
    pub total_samples: u64,
    /// MD5 signature of the unencoded audio data.
    pub md5_signature: [u8; 16],
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            min_block_size: 4096,
            max_block_size: 4096,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
            total_samples: 0,
            md5_signature: [0; 16],
        }
    }
}

impl StreamInfo {
    /// Encode to the 34-byte wire form.
    pub fn encode(&self) -> [u8; STREAM_INFO_LEN] {
        let mut data = [0u8; STREAM_INFO_LEN];

        BigEndian::write_u16(&mut data[0..2], self.min_block_size);
        BigEndian::write_u16(&mut data[2..4], self.max_block_size);
        BigEndian::write_u24(&mut data[4..7], self.min_frame_size);
        BigEndian::write_u24(&mut data[7..10], self.max_frame_size);

        // 20 bits sample rate, 3 bits channels-1, 5 bits bps-1,
        // 36 bits total samples.
        let channels = self.channels - 1;
        let bps = self.bits_per_sample - 1;
        data[10] = (self.sample_rate >> 12) as u8;
        data[11] = (self.sample_rate >> 4) as u8;
        data[12] = ((self.sample_rate << 4) as u8) | ((channels << 1) & 0x0E) | ((bps >> 4) & 0x01);
        data[13] = ((bps << 4) & 0xF0) | ((self.total_samples >> 32) as u8 & 0x0F);
        BigEndian::write_u32(&mut data[14..18], self.total_samples as u32);

        data[18..34].copy_from_slice(&self.md5_signature);
        data
    }

    /// Parse from the wire form.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < STREAM_INFO_LEN {
            return Err(FormatError::InvalidMetadata.into());
        }

        let min_block_size = BigEndian::read_u16(&data[0..2]);
        let max_block_size = BigEndian::read_u16(&data[2..4]);
        let min_frame_size = BigEndian::read_u24(&data[4..7]);
        let max_frame_size = BigEndian::read_u24(&data[7..10]);

        let sample_rate = ((data[10] as u32) << 12)
            | ((data[11] as u32) << 4)
            | ((data[12] as u32) >> 4);
        let channels = ((data[12] >> 1) & 0x07) + 1;
        let bits_per_sample = (((data[12] & 0x01) << 4) | ((data[13] >> 4) & 0x0F)) + 1;
        let total_samples =
            ((data[13] as u64 & 0x0F) << 32) | u64::from(BigEndian::read_u32(&data[14..18]));

        let mut md5_signature = [0u8; 16];
        md5_signature.copy_from_slice(&data[18..34]);

        Ok(Self {
            min_block_size,
            max_block_size,
            min_frame_size,
            max_frame_size,
            sample_rate,
            channels,
            bits_per_sample,
            total_samples,
            md5_signature,
        })
    }
}

/// Write the stream marker and the STREAMINFO block (flagged as the last
/// metadata block).
pub(crate) fn write_stream_header<S: ByteStream>(
    io: &mut StreamAdapter<S>,
    info: &StreamInfo,
) -> Result<()> {
    io.write_all(&STREAM_MARKER)?;
    io.write_all(&[0x80 | BLOCK_TYPE_STREAMINFO, 0x00, 0x00, STREAM_INFO_LEN as u8])?;
    io.write_all(&info.encode())?;
    Ok(())
}

/// Rewrite the STREAMINFO body in place. The caller must have verified
/// the adapter is seekable; the write position is restored afterwards.
pub(crate) fn patch_stream_info<S: ByteStream>(
    io: &mut StreamAdapter<S>,
    info: &StreamInfo,
) -> Result<()> {
    let end = io.tell()?;
    io.seek(STREAM_INFO_OFFSET)?;
    io.write_all(&info.encode())?;
    io.seek(end)?;
    Ok(())
}

fn read_exact<S: ByteStream>(io: &mut StreamAdapter<S>, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = io.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(FormatError::UnexpectedEof.into());
        }
        filled += n;
    }
    Ok(())
}

/// Read the stream marker and walk the metadata blocks, returning the
/// STREAMINFO. Padding, Vorbis comments, and unknown block types are
/// skipped. Returns `None` when the stream ends cleanly before the first
/// marker byte (an empty input is not an error, it is an empty stream).
pub(crate) fn read_stream_header<S: ByteStream>(
    io: &mut StreamAdapter<S>,
) -> Result<Option<StreamInfo>> {
    let mut first = [0u8; 1];
    if io.read(&mut first)? == 0 {
        return Ok(None);
    }

    let mut marker = [0u8; 4];
    marker[0] = first[0];
    read_exact(io, &mut marker[1..])?;
    if marker != STREAM_MARKER {
        return Err(FormatError::InvalidMarker.into());
    }

    let mut stream_info = None;
    loop {
        let mut header = [0u8; 4];
        read_exact(io, &mut header)?;

        let is_last = header[0] & 0x80 != 0;
        let block_type = header[0] & 0x7F;
        let length = BigEndian::read_u24(&header[1..4]) as usize;

        let mut data = vec![0u8; length];
        read_exact(io, &mut data)?;

        if block_type == BLOCK_TYPE_STREAMINFO {
            stream_info = Some(StreamInfo::parse(&data)?);
        }

        if is_last {
            break;
        }
    }

    match stream_info {
        Some(info) => Ok(Some(info)),
        None => Err(FormatError::InvalidMetadata.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_info() -> StreamInfo {
        StreamInfo {
            min_block_size: 1024,
            max_block_size: 4096,
            min_frame_size: 120,
            max_frame_size: 9000,
            sample_rate: 96000,
            channels: 2,
            bits_per_sample: 16,
            total_samples: 0x3_1234_5678,
            md5_signature: [7; 16],
        }
    }

    #[test]
    fn test_stream_info_round_trip() {
        let info = sample_info();
        let parsed = StreamInfo::parse(&info.encode()).unwrap();
        assert_eq!(parsed, info);
    }

    #[test]
    fn test_stream_info_extremes() {
        for (channels, bits, rate) in [(1, 4, 1), (8, 32, 655_350), (3, 17, 44_100)] {
            let info = StreamInfo {
                channels,
                bits_per_sample: bits,
                sample_rate: rate,
                total_samples: u64::MAX >> 28,
                ..StreamInfo::default()
            };
            let parsed = StreamInfo::parse(&info.encode()).unwrap();
            assert_eq!(parsed.channels, channels);
            assert_eq!(parsed.bits_per_sample, bits);
            assert_eq!(parsed.sample_rate, rate);
            assert_eq!(parsed.total_samples, info.total_samples);
        }
    }

    #[test]
    fn test_header_write_then_read() {
        let mut out = StreamAdapter::for_writing(Cursor::new(Vec::new())).unwrap();
        let info = sample_info();
        write_stream_header(&mut out, &info).unwrap();
        let bytes = out.into_inner().into_inner();
        assert_eq!(&bytes[0..4], b"fLaC");

        let mut input = StreamAdapter::for_reading(Cursor::new(bytes)).unwrap();
        let parsed = read_stream_header(&mut input).unwrap().unwrap();
        assert_eq!(parsed, info);
    }

    #[test]
    fn test_patch_rewrites_in_place() {
        let mut out = StreamAdapter::for_writing(Cursor::new(Vec::new())).unwrap();
        let mut info = sample_info();
        info.total_samples = 0;
        write_stream_header(&mut out, &info).unwrap();
        out.write_all(b"frame data").unwrap();

        info.total_samples = 100;
        patch_stream_info(&mut out, &info).unwrap();

        let bytes = out.into_inner().into_inner();
        let mut input = StreamAdapter::for_reading(Cursor::new(bytes)).unwrap();
        let parsed = read_stream_header(&mut input).unwrap().unwrap();
        assert_eq!(parsed.total_samples, 100);
    }

    #[test]
    fn test_empty_stream_is_not_an_error() {
        let mut input = StreamAdapter::for_reading(Cursor::new(Vec::new())).unwrap();
        assert!(read_stream_header(&mut input).unwrap().is_none());
    }

    #[test]
    fn test_bad_marker() {
        let mut input =
            StreamAdapter::for_reading(Cursor::new(b"WAVEfmt ".to_vec())).unwrap();
        let err = read_stream_header(&mut input).unwrap_err();
        assert!(err.to_string().contains("marker"));
    }

    #[test]
    fn test_truncated_marker() {
        let mut input = StreamAdapter::for_reading(Cursor::new(b"fL".to_vec())).unwrap();
        assert!(read_stream_header(&mut input).is_err());
    }

    #[test]
    fn test_skips_foreign_blocks() {
        let mut out = StreamAdapter::for_writing(Cursor::new(Vec::new())).unwrap();
        out.write_all(&STREAM_MARKER).unwrap();
        // STREAMINFO, not last.
        out.write_all(&[0x00, 0x00, 0x00, STREAM_INFO_LEN as u8]).unwrap();
        out.write_all(&sample_info().encode()).unwrap();
        // PADDING block, last.
        out.write_all(&[0x81, 0x00, 0x00, 0x04]).unwrap();
        out.write_all(&[0u8; 4]).unwrap();

        let bytes = out.into_inner().into_inner();
        let mut input = StreamAdapter::for_reading(Cursor::new(bytes)).unwrap();
        let parsed = read_stream_header(&mut input).unwrap().unwrap();
        assert_eq!(parsed, sample_info());
    }
}
