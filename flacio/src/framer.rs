//! Encode-side sample framing.
//!
//! Callers hand the encoder flat interleaved frames; the engine wants
//! per-channel blocks of at most the configured block size. The framer
//! validates every sample against the session's bit depth, de-interleaves
//! into pending per-channel buffers, and drains full blocks. Whatever is
//! left at close time is the final partial block.

use flacio_core::error::{Error, Result};

pub(crate) struct Framer {
    channels: usize,
    bits_per_sample: u8,
    blocksize: usize,
    pending: Vec<Vec<i32>>,
}

impl Framer {
    pub(crate) fn new(channels: u8, bits_per_sample: u8, blocksize: u16) -> Self {
        Self {
            channels: usize::from(channels),
            bits_per_sample,
            blocksize: usize::from(blocksize),
            pending: vec![Vec::new(); usize::from(channels)],
        }
    }

    /// Validate and buffer interleaved frames.
    ///
    /// The whole slice is validated before anything is buffered, so a
    /// rejected write leaves the pending state untouched. Zero-length
    /// input is a no-op.
    pub(crate) fn push(&mut self, samples: &[i32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        if samples.len() % self.channels != 0 {
            return Err(Error::InvalidOption {
                option: "samples",
                value: format!(
                    "{} values do not form whole {}-channel frames",
                    samples.len(),
                    self.channels
                ),
            });
        }

        if self.bits_per_sample < 32 {
            let max = (1i32 << (self.bits_per_sample - 1)) - 1;
            let min = -max - 1;
            for (index, &sample) in samples.iter().enumerate() {
                if !(min..=max).contains(&sample) {
                    return Err(Error::SampleOutOfRange {
                        frame: index / self.channels,
                        channel: index % self.channels,
                        bits: self.bits_per_sample,
                        value: sample,
                    });
                }
            }
        }

        for (index, &sample) in samples.iter().enumerate() {
            self.pending[index % self.channels].push(sample);
        }
        Ok(())
    }

    /// Frames currently buffered.
    pub(crate) fn pending_frames(&self) -> usize {
        self.pending[0].len()
    }

    /// Drain one full block, if a full block is buffered.
    pub(crate) fn take_full_block(&mut self) -> Option<Vec<Vec<i32>>> {
        if self.pending_frames() < self.blocksize {
            return None;
        }
        Some(
            self.pending
                .iter_mut()
                .map(|plane| plane.drain(..self.blocksize).collect())
                .collect(),
        )
    }

    /// Drain whatever is buffered, full block or not.
    pub(crate) fn take_partial(&mut self) -> Option<Vec<Vec<i32>>> {
        if self.pending_frames() == 0 {
            return None;
        }
        Some(self.pending.iter_mut().map(std::mem::take).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleaves_in_frame_order() {
        let mut framer = Framer::new(2, 16, 4);
        framer.push(&[1, -1, 2, -2, 3, -3, 4, -4, 5, -5]).unwrap();
        let block = framer.take_full_block().unwrap();
        assert_eq!(block[0], vec![1, 2, 3, 4]);
        assert_eq!(block[1], vec![-1, -2, -3, -4]);
        assert_eq!(framer.pending_frames(), 1);
        let tail = framer.take_partial().unwrap();
        assert_eq!(tail[0], vec![5]);
        assert_eq!(tail[1], vec![-5]);
        assert!(framer.take_partial().is_none());
    }

    #[test]
    fn test_zero_length_is_a_noop() {
        let mut framer = Framer::new(2, 16, 4);
        framer.push(&[]).unwrap();
        assert_eq!(framer.pending_frames(), 0);
        assert!(framer.take_full_block().is_none());
    }

    #[test]
    fn test_misaligned_frames_rejected() {
        let mut framer = Framer::new(2, 16, 4);
        let err = framer.push(&[1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("frames"));
        assert_eq!(framer.pending_frames(), 0);
    }

    #[test]
    fn test_range_boundaries_at_16_bits() {
        let mut framer = Framer::new(1, 16, 16);
        framer.push(&[32_767, -32_768]).unwrap();

        let err = framer.push(&[32_768]).unwrap_err();
        assert!(matches!(
            err,
            Error::SampleOutOfRange {
                frame: 0,
                channel: 0,
                bits: 16,
                value: 32_768,
            }
        ));

        assert!(framer.push(&[-32_769]).is_err());
    }

    #[test]
    fn test_rejected_write_buffers_nothing() {
        let mut framer = Framer::new(2, 8, 16);
        // The bad sample sits mid-slice in channel 1 of frame 1.
        let err = framer.push(&[1, 2, 3, 128, 5, 6]).unwrap_err();
        assert!(matches!(
            err,
            Error::SampleOutOfRange {
                frame: 1,
                channel: 1,
                value: 128,
                ..
            }
        ));
        assert_eq!(framer.pending_frames(), 0);
    }

    #[test]
    fn test_32_bit_depth_accepts_full_range() {
        let mut framer = Framer::new(1, 32, 16);
        framer.push(&[i32::MAX, i32::MIN]).unwrap();
        assert_eq!(framer.pending_frames(), 2);
    }

    #[test]
    fn test_multiple_full_blocks() {
        let mut framer = Framer::new(1, 16, 4);
        framer.push(&(0..10).collect::<Vec<i32>>()).unwrap();
        assert_eq!(framer.take_full_block().unwrap()[0], vec![0, 1, 2, 3]);
        assert_eq!(framer.take_full_block().unwrap()[0], vec![4, 5, 6, 7]);
        assert!(framer.take_full_block().is_none());
        assert_eq!(framer.pending_frames(), 2);
    }
}
