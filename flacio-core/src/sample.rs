//! Per-channel sample block buffers.
//!
//! The codec engine works on blocks of per-channel (planar) `i32` samples;
//! callers work with flat interleaved frames. [`SampleBlock`] is the planar
//! representation plus the stream attributes the block was decoded or
//! encoded with.

/// A bounded run of consecutive frames, stored per channel.
///
/// Every channel plane holds the same number of samples; plane `c` holds
/// the samples of channel `c` in frame order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBlock {
    planes: Vec<Vec<i32>>,
    sample_rate: u32,
    bits_per_sample: u8,
}

impl SampleBlock {
    /// Build a block from per-channel planes.
    ///
    /// All planes must have equal length.
    pub fn new(planes: Vec<Vec<i32>>, sample_rate: u32, bits_per_sample: u8) -> Self {
        debug_assert!(
            planes.windows(2).all(|w| w[0].len() == w[1].len()),
            "channel planes must have equal length"
        );
        Self {
            planes,
            sample_rate,
            bits_per_sample,
        }
    }

    /// Build a block by de-interleaving flat frames.
    ///
    /// `frames.len()` must be a multiple of `channels`.
    pub fn from_interleaved(
        frames: &[i32],
        channels: usize,
        sample_rate: u32,
        bits_per_sample: u8,
    ) -> Self {
        debug_assert!(channels > 0 && frames.len() % channels == 0);
        let frame_count = frames.len() / channels;
        let mut planes = vec![Vec::with_capacity(frame_count); channels];
        for (i, &sample) in frames.iter().enumerate() {
            planes[i % channels].push(sample);
        }
        Self::new(planes, sample_rate, bits_per_sample)
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.planes.len()
    }

    /// Number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    /// Whether the block holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Sample rate the block belongs to.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Bit depth the samples are bounded by.
    pub fn bits_per_sample(&self) -> u8 {
        self.bits_per_sample
    }

    /// One channel's samples.
    pub fn channel(&self, index: usize) -> &[i32] {
        &self.planes[index]
    }

    /// All channel planes.
    pub fn planes(&self) -> &[Vec<i32>] {
        &self.planes
    }

    /// Consume the block, returning the channel planes.
    pub fn into_planes(self) -> Vec<Vec<i32>> {
        self.planes
    }

    /// Re-interleave a range of frames into a flat caller-facing buffer,
    /// preserving frame order.
    pub fn interleave_range(&self, start: usize, count: usize, out: &mut Vec<i32>) {
        let end = (start + count).min(self.frame_count());
        for frame in start..end {
            for plane in &self.planes {
                out.push(plane[frame]);
            }
        }
    }

    /// Re-interleave the whole block.
    pub fn interleave(&self) -> Vec<i32> {
        let mut out = Vec::with_capacity(self.frame_count() * self.channel_count());
        self.interleave_range(0, self.frame_count(), &mut out);
        out
    }

    /// Whether another block carries the same stream attributes.
    pub fn attrs_match(&self, other: &SampleBlock) -> bool {
        self.channel_count() == other.channel_count()
            && self.sample_rate == other.sample_rate
            && self.bits_per_sample == other.bits_per_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved_round_trip() {
        let frames = [1, -1, 2, -2, 3, -3];
        let block = SampleBlock::from_interleaved(&frames, 2, 44100, 16);
        assert_eq!(block.channel_count(), 2);
        assert_eq!(block.frame_count(), 3);
        assert_eq!(block.channel(0), &[1, 2, 3]);
        assert_eq!(block.channel(1), &[-1, -2, -3]);
        assert_eq!(block.interleave(), frames);
    }

    #[test]
    fn test_interleave_range_partial() {
        let block = SampleBlock::new(vec![vec![10, 20, 30], vec![11, 21, 31]], 48000, 24);
        let mut out = Vec::new();
        block.interleave_range(1, 5, &mut out);
        assert_eq!(out, vec![20, 21, 30, 31]);
    }

    #[test]
    fn test_empty_block() {
        let block = SampleBlock::from_interleaved(&[], 2, 44100, 16);
        assert!(block.is_empty());
        assert_eq!(block.interleave(), Vec::<i32>::new());
    }

    #[test]
    fn test_attrs_match() {
        let a = SampleBlock::new(vec![vec![0]], 44100, 16);
        let b = SampleBlock::new(vec![vec![5]], 44100, 16);
        let c = SampleBlock::new(vec![vec![5]], 48000, 16);
        assert!(a.attrs_match(&b));
        assert!(!a.attrs_match(&c));
    }
}
