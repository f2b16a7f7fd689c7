//! Structural decoding of one audio frame.
//!
//! Frames are parsed bit-exactly straight off the adapter: the header
//! tells the decoder precisely how many bits every structure occupies, so
//! no read-ahead or sync scanning is needed, and the CRCs are checked over
//! exactly the bytes the stream delivered. The same routine decodes frames
//! from the live stream and, in verify mode, frames the encoder is about
//! to write.

use crate::bitstream::BitSource;
use crate::crc::{crc16, crc8};
use crate::metadata::StreamInfo;
use flacio_core::error::{FormatError, Result};
use flacio_core::io::{ByteStream, StreamAdapter};
use flacio_core::sample::SampleBlock;

/// 14-bit frame sync code.
pub(crate) const FRAME_SYNC: u32 = 0x3FFE;

/// Stereo channel layouts beyond independent coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelLayout {
    Independent(u8),
    LeftSide,
    RightSide,
    MidSide,
}

impl ChannelLayout {
    fn channel_count(self) -> u8 {
        match self {
            ChannelLayout::Independent(n) => n,
            _ => 2,
        }
    }

    /// Side channels carry one extra bit of depth.
    fn subframe_bps(self, channel: u8, base: u8) -> u8 {
        match self {
            ChannelLayout::LeftSide if channel == 1 => base + 1,
            ChannelLayout::RightSide if channel == 0 => base + 1,
            ChannelLayout::MidSide if channel == 1 => base + 1,
            _ => base,
        }
    }
}

/// Decode the next frame, or `None` when the stream ends cleanly at a
/// frame boundary.
pub(crate) fn read_frame<S: ByteStream>(
    io: &mut StreamAdapter<S>,
    info: &StreamInfo,
) -> Result<Option<SampleBlock>> {
    let mut first = [0u8; 1];
    if io.read(&mut first)? == 0 {
        return Ok(None);
    }

    let mut bits = BitSource::resume(io, first[0]);

    if bits.read_bits(14)? != FRAME_SYNC {
        return Err(FormatError::InvalidFrameHeader.into());
    }
    let _reserved = bits.read_bit()?;
    let _variable_blocksize = bits.read_bit()?;

    let block_size_code = bits.read_bits(4)? as u8;
    let sample_rate_code = bits.read_bits(4)? as u8;

    let channel_code = bits.read_bits(4)? as u8;
    let layout = match channel_code {
        0..=7 => ChannelLayout::Independent(channel_code + 1),
        8 => ChannelLayout::LeftSide,
        9 => ChannelLayout::RightSide,
        10 => ChannelLayout::MidSide,
        _ => return Err(FormatError::InvalidFrameHeader.into()),
    };

    let sample_size_code = bits.read_bits(3)? as u8;
    let bits_per_sample = match sample_size_code {
        0 => info.bits_per_sample,
        1 => 8,
        2 => 12,
        4 => 16,
        5 => 20,
        6 => 24,
        7 => 32,
        _ => return Err(FormatError::InvalidFrameHeader.into()),
    };
    let _reserved = bits.read_bit()?;

    let _frame_number = bits.read_utf8_coded()?;

    let block_size = match block_size_code {
        0 => return Err(FormatError::InvalidFrameHeader.into()),
        1 => 192,
        2..=5 => 576 << (block_size_code - 2),
        6 => bits.read_bits(8)? + 1,
        7 => bits.read_bits(16)? + 1,
        _ => 256 << (block_size_code - 8),
    } as usize;

    let sample_rate = match sample_rate_code {
        0 => info.sample_rate,
        1 => 88_200,
        2 => 176_400,
        3 => 192_000,
        4 => 8_000,
        5 => 16_000,
        6 => 22_050,
        7 => 24_000,
        8 => 32_000,
        9 => 44_100,
        10 => 48_000,
        11 => 96_000,
        12 => bits.read_bits(8)? * 1000,
        13 => bits.read_bits(16)?,
        14 => bits.read_bits(16)? * 10,
        _ => return Err(FormatError::InvalidFrameHeader.into()),
    };

    debug_assert!(bits.is_byte_aligned());
    let actual_crc8 = crc8(bits.consumed());
    let expected_crc8 = bits.read_bits(8)? as u8;
    if actual_crc8 != expected_crc8 {
        return Err(FormatError::CrcMismatch {
            expected: expected_crc8,
            actual: actual_crc8,
        }
        .into());
    }

    if !matches!(layout, ChannelLayout::Independent(_)) && bits_per_sample >= 32 {
        // A side channel would need 33 bits.
        return Err(FormatError::Unsupported("side-coded 32-bit stereo".into()).into());
    }

    let channels = layout.channel_count();
    let mut planes = Vec::with_capacity(channels as usize);
    for ch in 0..channels {
        let bps = layout.subframe_bps(ch, bits_per_sample);
        planes.push(decode_subframe(&mut bits, block_size, bps)?);
    }

    decorrelate(layout, &mut planes);

    bits.align_to_byte();
    let actual_crc16 = crc16(bits.consumed());
    let expected_crc16 = bits.read_bits(16)? as u16;
    if actual_crc16 != expected_crc16 {
        return Err(FormatError::Crc16Mismatch {
            expected: expected_crc16,
            actual: actual_crc16,
        }
        .into());
    }

    Ok(Some(SampleBlock::new(planes, sample_rate, bits_per_sample)))
}

/// Undo inter-channel decorrelation in place.
fn decorrelate(layout: ChannelLayout, planes: &mut [Vec<i32>]) {
    match layout {
        ChannelLayout::Independent(_) => {}
        ChannelLayout::LeftSide => {
            // side = left - right
            for i in 0..planes[0].len() {
                planes[1][i] = planes[0][i].wrapping_sub(planes[1][i]);
            }
        }
        ChannelLayout::RightSide => {
            // side = left - right, channel 0 holds side
            for i in 0..planes[0].len() {
                planes[0][i] = planes[1][i].wrapping_add(planes[0][i]);
            }
        }
        ChannelLayout::MidSide => {
            // mid = (left + right) >> 1, side = left - right
            for i in 0..planes[0].len() {
                let mid = planes[0][i];
                let side = planes[1][i];
                planes[0][i] = mid + ((side + 1) >> 1);
                planes[1][i] = mid - (side >> 1);
            }
        }
    }
}

fn decode_subframe<S: ByteStream>(
    bits: &mut BitSource<'_, S>,
    block_size: usize,
    bps: u8,
) -> Result<Vec<i32>> {
    let _padding = bits.read_bit()?;

    let type_code = bits.read_bits(6)? as u8;

    let has_wasted_bits = bits.read_bit()?;
    let wasted_bits = if has_wasted_bits {
        bits.read_unary()? as u8 + 1
    } else {
        0
    };
    if wasted_bits >= bps {
        return Err(FormatError::InvalidSubframe.into());
    }
    let effective_bps = bps - wasted_bits;

    let mut samples = match type_code {
        0 => {
            let value = bits.read_signed(effective_bps)?;
            vec![value; block_size]
        }
        1 => {
            let mut samples = Vec::with_capacity(block_size);
            for _ in 0..block_size {
                samples.push(bits.read_signed(effective_bps)?);
            }
            samples
        }
        8..=12 => decode_fixed(bits, block_size, effective_bps, type_code & 0x07)?,
        32..=63 => decode_lpc(bits, block_size, effective_bps, (type_code & 0x1F) + 1)?,
        _ => return Err(FormatError::InvalidSubframe.into()),
    };

    if wasted_bits > 0 {
        for sample in &mut samples {
            *sample <<= wasted_bits;
        }
    }

    Ok(samples)
}

fn decode_fixed<S: ByteStream>(
    bits: &mut BitSource<'_, S>,
    block_size: usize,
    bps: u8,
    order: u8,
) -> Result<Vec<i32>> {
    if order as usize > block_size {
        return Err(FormatError::InvalidSubframe.into());
    }

    let mut samples = Vec::with_capacity(block_size);
    for _ in 0..order {
        samples.push(bits.read_signed(bps)?);
    }

    let residual = decode_residual(bits, block_size, order as usize)?;

    let coeffs: &[i64] = match order {
        0 => &[],
        1 => &[1],
        2 => &[2, -1],
        3 => &[3, -3, 1],
        4 => &[4, -6, 4, -1],
        _ => return Err(FormatError::InvalidSubframe.into()),
    };

    for &r in &residual {
        let mut prediction = 0i64;
        for (j, &coef) in coeffs.iter().enumerate() {
            prediction += coef * i64::from(samples[samples.len() - 1 - j]);
        }
        samples.push((i64::from(r) + prediction) as i32);
    }

    Ok(samples)
}

fn decode_lpc<S: ByteStream>(
    bits: &mut BitSource<'_, S>,
    block_size: usize,
    bps: u8,
    order: u8,
) -> Result<Vec<i32>> {
    if order as usize >= block_size {
        return Err(FormatError::InvalidSubframe.into());
    }

    let mut samples = Vec::with_capacity(block_size);
    for _ in 0..order {
        samples.push(bits.read_signed(bps)?);
    }

    let precision = bits.read_bits(4)? as u8 + 1;
    if precision > 15 {
        return Err(FormatError::InvalidSubframe.into());
    }
    let shift = bits.read_signed(5)?;
    if shift < 0 {
        return Err(FormatError::Unsupported("negative LPC shift".into()).into());
    }

    let mut coeffs = Vec::with_capacity(order as usize);
    for _ in 0..order {
        coeffs.push(i64::from(bits.read_signed(precision)?));
    }

    let residual = decode_residual(bits, block_size, order as usize)?;

    for &r in &residual {
        let mut prediction = 0i64;
        for (j, &coef) in coeffs.iter().enumerate() {
            prediction += coef * i64::from(samples[samples.len() - 1 - j]);
        }
        samples.push((i64::from(r) + (prediction >> shift)) as i32);
    }

    Ok(samples)
}

fn decode_residual<S: ByteStream>(
    bits: &mut BitSource<'_, S>,
    block_size: usize,
    predictor_order: usize,
) -> Result<Vec<i32>> {
    let coding_method = bits.read_bits(2)? as u8;
    let param_bits = match coding_method {
        0 => 4,
        1 => 5,
        _ => return Err(FormatError::InvalidRicePartition.into()),
    };
    let escape = (1u32 << param_bits) - 1;

    let partition_order = bits.read_bits(4)? as u8;
    let partitions = 1usize << partition_order;
    if partition_order > 0 && block_size % partitions != 0 {
        return Err(FormatError::InvalidRicePartition.into());
    }

    let mut residual = Vec::with_capacity(block_size - predictor_order);
    for partition in 0..partitions {
        let base = block_size >> partition_order;
        let count = if partition == 0 {
            base.checked_sub(predictor_order)
                .ok_or(FormatError::InvalidRicePartition)?
        } else {
            base
        };

        let param = bits.read_bits(param_bits)?;
        if param == escape {
            let raw_bits = bits.read_bits(5)? as u8;
            for _ in 0..count {
                residual.push(bits.read_signed(raw_bits)?);
            }
        } else {
            for _ in 0..count {
                residual.push(bits.read_rice_signed(param as u8)?);
            }
        }
    }

    Ok(residual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_eof_at_frame_boundary_is_none() {
        let mut io = StreamAdapter::for_reading(Cursor::new(Vec::new())).unwrap();
        let info = StreamInfo::default();
        assert!(read_frame(&mut io, &info).unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_a_header_error() {
        let mut io =
            StreamAdapter::for_reading(Cursor::new(vec![0x12, 0x34, 0x56, 0x78])).unwrap();
        let info = StreamInfo::default();
        let err = read_frame(&mut io, &info).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_truncated_frame_is_eof_error() {
        // Valid sync byte then nothing.
        let mut io = StreamAdapter::for_reading(Cursor::new(vec![0xFF])).unwrap();
        let info = StreamInfo::default();
        let err = read_frame(&mut io, &info).unwrap_err();
        assert!(matches!(
            err,
            flacio_core::Error::Format(FormatError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_mid_side_reconstruction() {
        // decorrelate() must invert mid = (l + r) >> 1, side = l - r.
        for (l, r) in [(3, 1), (3, 0), (-3, 0), (0, -3), (1, 2), (-7, -8), (0, 0)] {
            let mid = (l + r) >> 1;
            let side = l - r;
            let mut planes = vec![vec![mid], vec![side]];
            decorrelate(ChannelLayout::MidSide, &mut planes);
            assert_eq!((planes[0][0], planes[1][0]), (l, r), "l={l} r={r}");
        }
    }

    #[test]
    fn test_left_side_reconstruction() {
        let (l, r) = (100, -250);
        let mut planes = vec![vec![l], vec![l - r]];
        decorrelate(ChannelLayout::LeftSide, &mut planes);
        assert_eq!((planes[0][0], planes[1][0]), (l, r));

        let mut planes = vec![vec![l - r], vec![r]];
        decorrelate(ChannelLayout::RightSide, &mut planes);
        assert_eq!((planes[0][0], planes[1][0]), (l, r));
    }
}
