//! Block-based stream encoder.
//!
//! The encoder is handed fully-framed per-channel blocks (at most one
//! configured block size each), assembles each frame in memory, and hands
//! it to the adapter in a single write. `finish` rewrites the STREAMINFO
//! block in place when the output stream is seekable; on a non-seekable
//! sink the provisional header stands and the patch is skipped.

use crate::bitstream::BitWriter;
use crate::crc::{crc16, crc8};
use crate::frame::{self, FRAME_SYNC};
use crate::md5::Md5;
use crate::metadata::{self, StreamInfo};
use crate::window::Apodization;
use crate::{
    MAX_BITS_PER_SAMPLE, MAX_CHANNELS, MAX_LPC_ORDER, MAX_PARTITION_ORDER, MAX_PREDICTED_BITS,
    MAX_QLP_COEFF_PRECISION, MAX_SAMPLE_RATE, MIN_BITS_PER_SAMPLE, MIN_BLOCK_SIZE,
    MIN_QLP_COEFF_PRECISION,
};
use flacio_core::error::{Error, FormatError, Result};
use flacio_core::io::{ByteStream, StreamAdapter};
use std::io::Cursor;

/// Residuals past this magnitude disqualify a predictor candidate; the
/// Rice fold must stay inside 32 bits.
const MAX_RESIDUAL: i64 = 1 << 30;

/// With loose mid-side selection, the stereo decision is re-evaluated
/// every this many frames.
const LOOSE_STEREO_REEVALUATION: u64 = 8;

/// Fully-resolved encoder configuration.
///
/// The engine accepts concrete values only; translating unset options
/// into these defaults is the session layer's job.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Number of channels (1-8).
    pub channels: u8,
    /// Bits per sample (4-32).
    pub bits_per_sample: u8,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Block size in frames.
    pub blocksize: u16,
    /// Expected total frame count, written provisionally into the header
    /// (0 = unknown).
    pub total_samples_estimate: u64,
    /// Try mid-side coding for stereo input.
    pub do_mid_side_stereo: bool,
    /// Re-evaluate the stereo decision only periodically.
    pub loose_mid_side_stereo: bool,
    /// Apodization windows for LPC analysis; the first is applied.
    pub apodization: Vec<Apodization>,
    /// Maximum LPC order (0 disables LPC).
    pub max_lpc_order: u8,
    /// Quantized coefficient precision in bits (0 = pick automatically).
    pub qlp_coeff_precision: u8,
    /// Search coefficient precisions instead of using one.
    pub do_qlp_coeff_prec_search: bool,
    /// Search all predictor orders instead of the maximum only.
    pub do_exhaustive_model_search: bool,
    /// Minimum Rice partition order.
    pub min_residual_partition_order: u8,
    /// Maximum Rice partition order.
    pub max_residual_partition_order: u8,
    /// Re-decode every frame before writing it.
    pub verify: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            bits_per_sample: 16,
            sample_rate: 44100,
            blocksize: 4096,
            total_samples_estimate: 0,
            do_mid_side_stereo: true,
            loose_mid_side_stereo: false,
            apodization: vec![Apodization::Tukey(0.5)],
            max_lpc_order: 8,
            qlp_coeff_precision: 0,
            do_qlp_coeff_prec_search: false,
            do_exhaustive_model_search: false,
            min_residual_partition_order: 0,
            max_residual_partition_order: 5,
            verify: false,
        }
    }
}

impl EncoderConfig {
    /// Check every field against the engine's legal domain.
    pub fn validate(&self) -> Result<()> {
        fn reject(option: &'static str, value: impl ToString) -> Error {
            Error::InvalidOption {
                option,
                value: value.to_string(),
            }
        }

        if !(1..=MAX_CHANNELS).contains(&self.channels) {
            return Err(reject("channels", self.channels));
        }
        if !(MIN_BITS_PER_SAMPLE..=MAX_BITS_PER_SAMPLE).contains(&self.bits_per_sample) {
            return Err(reject("bits_per_sample", self.bits_per_sample));
        }
        if !(1..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(reject("sample_rate", self.sample_rate));
        }
        if self.blocksize < MIN_BLOCK_SIZE {
            return Err(reject("blocksize", self.blocksize));
        }
        if self.max_lpc_order > MAX_LPC_ORDER {
            return Err(reject("max_lpc_order", self.max_lpc_order));
        }
        if self.qlp_coeff_precision != 0
            && !(MIN_QLP_COEFF_PRECISION..=MAX_QLP_COEFF_PRECISION)
                .contains(&self.qlp_coeff_precision)
        {
            return Err(reject("qlp_coeff_precision", self.qlp_coeff_precision));
        }
        if self.min_residual_partition_order > MAX_PARTITION_ORDER {
            return Err(reject(
                "min_residual_partition_order",
                self.min_residual_partition_order,
            ));
        }
        if self.max_residual_partition_order > MAX_PARTITION_ORDER {
            return Err(reject(
                "max_residual_partition_order",
                self.max_residual_partition_order,
            ));
        }
        if self.min_residual_partition_order > self.max_residual_partition_order {
            return Err(reject(
                "min_residual_partition_order",
                self.min_residual_partition_order,
            ));
        }
        Ok(())
    }

    fn qlp_precision(&self) -> u8 {
        if self.qlp_coeff_precision == 0 {
            14
        } else {
            self.qlp_coeff_precision
        }
    }
}

/// Stereo coding decision for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StereoMode {
    Independent,
    MidSide,
}

/// The block-based stream encoder.
pub struct StreamEncoder<S> {
    io: StreamAdapter<S>,
    cfg: EncoderConfig,
    info: StreamInfo,
    md5: Md5,
    frame_number: u64,
    samples_written: u64,
    min_frame_size: u32,
    max_frame_size: u32,
    stereo_mode: StereoMode,
    frames_since_stereo_eval: u64,
    finished: bool,
}

impl<S: ByteStream> StreamEncoder<S> {
    /// Validate the configuration and write the provisional stream
    /// header.
    pub fn new(mut io: StreamAdapter<S>, cfg: EncoderConfig) -> Result<Self> {
        cfg.validate()?;

        let info = StreamInfo {
            min_block_size: cfg.blocksize,
            max_block_size: cfg.blocksize,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: cfg.sample_rate,
            channels: cfg.channels,
            bits_per_sample: cfg.bits_per_sample,
            total_samples: cfg.total_samples_estimate,
            md5_signature: [0; 16],
        };

        metadata::write_stream_header(&mut io, &info)?;

        Ok(Self {
            io,
            cfg,
            info,
            md5: Md5::new(),
            frame_number: 0,
            samples_written: 0,
            min_frame_size: u32::MAX,
            max_frame_size: 0,
            stereo_mode: StereoMode::Independent,
            frames_since_stereo_eval: 0,
            finished: false,
        })
    }

    /// The configuration the encoder was opened with.
    pub fn config(&self) -> &EncoderConfig {
        &self.cfg
    }

    /// Frames written so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Frames (blocks) emitted so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Encode one block of per-channel samples.
    ///
    /// `planes` must hold one plane per configured channel; all planes
    /// equal length, at most the configured block size. A zero-length
    /// block is a no-op.
    pub fn process(&mut self, planes: &[Vec<i32>]) -> Result<()> {
        if planes.len() != self.cfg.channels as usize {
            return Err(Error::InvalidOption {
                option: "channels",
                value: planes.len().to_string(),
            });
        }
        let block_size = planes[0].len();
        if block_size == 0 {
            return Ok(());
        }
        debug_assert!(block_size <= self.cfg.blocksize as usize);
        debug_assert!(planes.iter().all(|p| p.len() == block_size));

        self.update_md5(planes, block_size);
        let bytes = self.encode_frame(planes, block_size)?;

        if self.cfg.verify {
            self.verify_frame(&bytes, planes)?;
        }

        self.io.write_all(&bytes)?;

        let frame_len = bytes.len() as u32;
        self.min_frame_size = self.min_frame_size.min(frame_len);
        self.max_frame_size = self.max_frame_size.max(frame_len);
        self.frame_number += 1;
        self.samples_written += block_size as u64;
        Ok(())
    }

    /// Finalize the stream.
    ///
    /// Patches STREAMINFO in place (true total sample count, MD5
    /// signature, frame size bounds) when the output is seekable; skips
    /// the patch silently otherwise.
    pub fn finish(mut self) -> Result<StreamAdapter<S>> {
        debug_assert!(!self.finished);
        self.finished = true;

        self.info.total_samples = self.samples_written;
        self.info.md5_signature = std::mem::replace(&mut self.md5, Md5::new()).finalize();
        if self.min_frame_size != u32::MAX {
            self.info.min_frame_size = self.min_frame_size;
            self.info.max_frame_size = self.max_frame_size;
        }

        if self.io.seekable() {
            metadata::patch_stream_info(&mut self.io, &self.info)?;
        }

        Ok(self.io)
    }

    /// Whether the output was seekable at bind time (and so whether the
    /// header patch will run).
    pub fn output_seekable(&self) -> bool {
        self.io.seekable()
    }

    fn update_md5(&mut self, planes: &[Vec<i32>], block_size: usize) {
        let byte_width = usize::from(self.cfg.bits_per_sample.div_ceil(8));
        let mut raw = Vec::with_capacity(block_size * planes.len() * byte_width);
        for frame in 0..block_size {
            for plane in planes {
                raw.extend_from_slice(&plane[frame].to_le_bytes()[..byte_width]);
            }
        }
        self.md5.update(&raw);
    }

    fn verify_frame(&self, bytes: &[u8], planes: &[Vec<i32>]) -> Result<()> {
        let mismatch = Error::from(FormatError::VerifyMismatch {
            frame: self.frame_number,
        });

        let mut replay = StreamAdapter::for_reading(Cursor::new(bytes))?;
        let decoded = frame::read_frame(&mut replay, &self.info)?
            .ok_or(FormatError::UnexpectedEof)?;

        if decoded.planes() != planes {
            return Err(mismatch);
        }
        Ok(())
    }

    fn encode_frame(&mut self, planes: &[Vec<i32>], block_size: usize) -> Result<Vec<u8>> {
        let bps = self.cfg.bits_per_sample;
        let mode = self.pick_stereo_mode(planes);
        let channel_code = match mode {
            StereoMode::Independent => u32::from(self.cfg.channels - 1),
            StereoMode::MidSide => 10,
        };

        let mut bw = BitWriter::new();
        self.write_frame_header(&mut bw, block_size, channel_code);

        match mode {
            StereoMode::MidSide => {
                let (mid, side) = mid_side(&planes[0], &planes[1]);
                self.encode_subframe(&mut bw, &mid, bps, block_size);
                self.encode_subframe(&mut bw, &side, bps + 1, block_size);
            }
            StereoMode::Independent => {
                for plane in planes {
                    self.encode_subframe(&mut bw, plane, bps, block_size);
                }
            }
        }

        bw.align_to_byte();
        let frame_crc = crc16(bw.as_bytes());
        bw.write_bits(u32::from(frame_crc), 16);

        Ok(bw.into_bytes())
    }

    fn pick_stereo_mode(&mut self, planes: &[Vec<i32>]) -> StereoMode {
        if self.cfg.channels != 2
            || !self.cfg.do_mid_side_stereo
            || self.cfg.bits_per_sample > MAX_PREDICTED_BITS
        {
            return StereoMode::Independent;
        }

        if self.cfg.loose_mid_side_stereo && self.frames_since_stereo_eval > 0 {
            self.frames_since_stereo_eval =
                (self.frames_since_stereo_eval + 1) % LOOSE_STEREO_REEVALUATION;
            return self.stereo_mode;
        }

        let (mid, side) = mid_side(&planes[0], &planes[1]);
        let independent = plane_bits_estimate(&planes[0]) + plane_bits_estimate(&planes[1]);
        let decorrelated = plane_bits_estimate(&mid) + plane_bits_estimate(&side);

        self.stereo_mode = if decorrelated < independent {
            StereoMode::MidSide
        } else {
            StereoMode::Independent
        };
        self.frames_since_stereo_eval = 1;
        self.stereo_mode
    }

    fn write_frame_header(&self, bw: &mut BitWriter, block_size: usize, channel_code: u32) {
        bw.write_bits(FRAME_SYNC, 14);
        bw.write_bit(false); // reserved
        bw.write_bit(false); // fixed block size strategy

        let block_size_code: u32 = match block_size {
            192 => 1,
            576 => 2,
            1152 => 3,
            2304 => 4,
            4608 => 5,
            256 => 8,
            512 => 9,
            1024 => 10,
            2048 => 11,
            4096 => 12,
            8192 => 13,
            16384 => 14,
            32768 => 15,
            _ if block_size <= 256 => 6,
            _ => 7,
        };
        bw.write_bits(block_size_code, 4);

        let sample_rate_code: u32 = match self.cfg.sample_rate {
            88_200 => 1,
            176_400 => 2,
            192_000 => 3,
            8_000 => 4,
            16_000 => 5,
            22_050 => 6,
            24_000 => 7,
            32_000 => 8,
            44_100 => 9,
            48_000 => 10,
            96_000 => 11,
            _ => 0, // taken from STREAMINFO
        };
        bw.write_bits(sample_rate_code, 4);

        bw.write_bits(channel_code, 4);

        let sample_size_code: u32 = match self.cfg.bits_per_sample {
            8 => 1,
            12 => 2,
            16 => 4,
            20 => 5,
            24 => 6,
            32 => 7,
            _ => 0, // taken from STREAMINFO
        };
        bw.write_bits(sample_size_code, 3);
        bw.write_bit(false); // reserved

        bw.write_utf8_coded(self.frame_number);

        if block_size_code == 6 {
            bw.write_bits((block_size - 1) as u32, 8);
        } else if block_size_code == 7 {
            bw.write_bits((block_size - 1) as u32, 16);
        }

        debug_assert!(bw.is_byte_aligned());
        let header_crc = crc8(bw.as_bytes());
        bw.write_bits(u32::from(header_crc), 8);
    }

    fn encode_subframe(&self, bw: &mut BitWriter, samples: &[i32], bps: u8, block_size: usize) {
        bw.write_bit(false); // padding

        if samples.iter().all(|&s| s == samples[0]) {
            bw.write_bits(0, 6); // constant
            bw.write_bit(false); // no wasted bits
            bw.write_signed(samples[0], bps);
            return;
        }

        let verbatim_bits = samples.len() as u64 * u64::from(bps);
        let mut best = SubframePlan::Verbatim;
        let mut best_bits = verbatim_bits;

        if bps <= MAX_PREDICTED_BITS && block_size > 8 {
            if let Some((order, residual, plan)) = self.best_fixed(samples, bps, block_size) {
                let bits = u64::from(order) * u64::from(bps) + plan.bits;
                if bits < best_bits {
                    best_bits = bits;
                    best = SubframePlan::Fixed {
                        order,
                        residual,
                        plan,
                    };
                }
            }

            if let Some(lpc) = self.best_lpc(samples, bps, block_size) {
                let bits = u64::from(lpc.order) * u64::from(bps)
                    + 4
                    + 5
                    + u64::from(lpc.order) * u64::from(lpc.precision)
                    + lpc.plan.bits;
                if bits < best_bits {
                    best = SubframePlan::Lpc(lpc);
                }
            }
        }

        match best {
            SubframePlan::Verbatim => {
                bw.write_bits(1, 6);
                bw.write_bit(false);
                for &sample in samples {
                    bw.write_signed(sample, bps);
                }
            }
            SubframePlan::Fixed {
                order,
                residual,
                plan,
            } => {
                bw.write_bits(8 + u32::from(order), 6);
                bw.write_bit(false);
                for &sample in &samples[..order as usize] {
                    bw.write_signed(sample, bps);
                }
                write_residual(bw, &residual, block_size, order as usize, &plan);
            }
            SubframePlan::Lpc(lpc) => {
                bw.write_bits(32 + u32::from(lpc.order - 1), 6);
                bw.write_bit(false);
                for &sample in &samples[..lpc.order as usize] {
                    bw.write_signed(sample, bps);
                }
                bw.write_bits(u32::from(lpc.precision - 1), 4);
                bw.write_signed(lpc.shift, 5);
                for &coef in &lpc.coeffs {
                    bw.write_signed(coef, lpc.precision);
                }
                write_residual(bw, &lpc.residual, block_size, lpc.order as usize, &lpc.plan);
            }
        }
    }

    fn best_fixed(
        &self,
        samples: &[i32],
        bps: u8,
        block_size: usize,
    ) -> Option<(u8, Vec<i32>, ResidualPlan)> {
        let mut best: Option<(u8, Vec<i32>, ResidualPlan)> = None;

        for order in 0..=4u8 {
            if order as usize >= samples.len() {
                break;
            }
            let Some(residual) = fixed_residual(samples, order as usize) else {
                continue;
            };
            let plan = self.plan_residual(&residual, block_size, order as usize);
            let total = plan.bits + u64::from(order) * u64::from(bps);
            if best
                .as_ref()
                .map_or(true, |(o, _, p)| total < p.bits + u64::from(*o) * u64::from(bps))
            {
                best = Some((order, residual, plan));
            }
        }

        best
    }

    fn best_lpc(&self, samples: &[i32], bps: u8, block_size: usize) -> Option<LpcPlan> {
        let max_order = usize::from(self.cfg.max_lpc_order);
        if max_order == 0 || samples.len() <= max_order * 2 {
            return None;
        }
        let max_order = max_order.min(samples.len() / 2).min(32);

        let window = self
            .cfg
            .apodization
            .first()
            .unwrap_or(&Apodization::Rectangle)
            .coefficients(samples.len());
        let autoc = autocorrelation(samples, &window, max_order);
        if autoc[0] <= 0.0 {
            return None;
        }

        let orders: Vec<usize> = if self.cfg.do_exhaustive_model_search {
            (1..=max_order).collect()
        } else {
            vec![max_order]
        };

        let precisions: Vec<u8> = if self.cfg.do_qlp_coeff_prec_search {
            (MIN_QLP_COEFF_PRECISION..=MAX_QLP_COEFF_PRECISION).collect()
        } else {
            vec![self.cfg.qlp_precision()]
        };

        let mut best: Option<LpcPlan> = None;
        for &order in &orders {
            let Some(coeffs) = levinson(&autoc, order) else {
                continue;
            };
            for &precision in &precisions {
                let Some((quantized, shift)) = quantize_coeffs(&coeffs, precision) else {
                    continue;
                };
                let Some(residual) = lpc_residual(samples, &quantized, shift) else {
                    continue;
                };
                let plan = self.plan_residual(&residual, block_size, order);
                let total = plan.bits
                    + u64::from(order as u8) * u64::from(bps)
                    + 4
                    + 5
                    + order as u64 * u64::from(precision);
                if best.as_ref().map_or(true, |b| total < b.total_bits(bps)) {
                    best = Some(LpcPlan {
                        order: order as u8,
                        precision,
                        shift,
                        coeffs: quantized,
                        residual,
                        plan,
                    });
                }
            }
        }

        best
    }

    /// Find the cheapest Rice partitioning for a residual.
    fn plan_residual(
        &self,
        residual: &[i32],
        block_size: usize,
        predictor_order: usize,
    ) -> ResidualPlan {
        let mut best: Option<ResidualPlan> = None;

        let max_po = self.cfg.max_residual_partition_order.min(8);
        for po in self.cfg.min_residual_partition_order..=max_po {
            let partitions = 1usize << po;
            if po > 0 && block_size % partitions != 0 {
                continue;
            }
            if block_size >> po <= predictor_order {
                continue;
            }

            let mut params = Vec::with_capacity(partitions);
            let mut bits = 2 + 4u64; // coding method + partition order
            let mut offset = 0usize;
            for partition in 0..partitions {
                let count = (block_size >> po)
                    - if partition == 0 { predictor_order } else { 0 };
                let slice = &residual[offset..offset + count];
                let (param, cost) = best_rice_param(slice);
                params.push(param);
                bits += 4 + cost;
                offset += count;
            }

            if best.as_ref().map_or(true, |b| bits < b.bits) {
                best = Some(ResidualPlan {
                    partition_order: po,
                    params,
                    bits,
                });
            }
        }

        best.unwrap_or_else(|| {
            // Partition order 0 is always representable.
            let (param, cost) = best_rice_param(residual);
            ResidualPlan {
                partition_order: 0,
                params: vec![param],
                bits: 2 + 4 + 4 + cost,
            }
        })
    }
}

/// One possible encoding for a subframe.
enum SubframePlan {
    Verbatim,
    Fixed {
        order: u8,
        residual: Vec<i32>,
        plan: ResidualPlan,
    },
    Lpc(LpcPlan),
}

struct LpcPlan {
    order: u8,
    precision: u8,
    shift: i32,
    coeffs: Vec<i32>,
    residual: Vec<i32>,
    plan: ResidualPlan,
}

impl LpcPlan {
    fn total_bits(&self, bps: u8) -> u64 {
        self.plan.bits
            + u64::from(self.order) * u64::from(bps)
            + 4
            + 5
            + u64::from(self.order) * u64::from(self.precision)
    }
}

/// Chosen Rice partitioning: order, per-partition parameters, total bits.
struct ResidualPlan {
    partition_order: u8,
    params: Vec<u8>,
    bits: u64,
}

fn mid_side(left: &[i32], right: &[i32]) -> (Vec<i32>, Vec<i32>) {
    let mut mid = Vec::with_capacity(left.len());
    let mut side = Vec::with_capacity(left.len());
    for (&l, &r) in left.iter().zip(right) {
        mid.push((l + r) >> 1);
        side.push(l - r);
    }
    (mid, side)
}

fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Exact Rice cost of a partition and the parameter achieving it.
fn best_rice_param(slice: &[i32]) -> (u8, u64) {
    let mut best_param = 0u8;
    let mut best_cost = u64::MAX;
    for param in 0..=14u8 {
        let mut cost = 0u64;
        for &v in slice {
            cost += u64::from(zigzag(v) >> param) + 1 + u64::from(param);
        }
        if cost < best_cost {
            best_cost = cost;
            best_param = param;
        }
    }
    (best_param, best_cost)
}

fn write_residual(
    bw: &mut BitWriter,
    residual: &[i32],
    block_size: usize,
    predictor_order: usize,
    plan: &ResidualPlan,
) {
    bw.write_bits(0, 2); // 4-bit Rice parameters
    bw.write_bits(u32::from(plan.partition_order), 4);

    let mut offset = 0usize;
    for (partition, &param) in plan.params.iter().enumerate() {
        let count = (block_size >> plan.partition_order)
            - if partition == 0 { predictor_order } else { 0 };
        bw.write_bits(u32::from(param), 4);
        for &v in &residual[offset..offset + count] {
            bw.write_rice_signed(v, param);
        }
        offset += count;
    }
}

/// Rough per-plane cost used only for the stereo decision.
fn plane_bits_estimate(samples: &[i32]) -> u64 {
    if samples.len() < 3 {
        return samples.len() as u64 * 32;
    }
    let mut sum = 0u64;
    for w in samples.windows(3) {
        let second_diff =
            i64::from(w[2]) - 2 * i64::from(w[1]) + i64::from(w[0]);
        sum += second_diff.unsigned_abs();
    }
    let mean = sum / (samples.len() as u64 - 2) + 1;
    let k = 64 - mean.leading_zeros() as u64;
    samples.len() as u64 * (k + 2)
}

fn fixed_residual(samples: &[i32], order: usize) -> Option<Vec<i32>> {
    let coeffs: &[i64] = match order {
        0 => &[],
        1 => &[1],
        2 => &[2, -1],
        3 => &[3, -3, 1],
        4 => &[4, -6, 4, -1],
        _ => return None,
    };

    let mut residual = Vec::with_capacity(samples.len() - order);
    for i in order..samples.len() {
        let mut prediction = 0i64;
        for (j, &coef) in coeffs.iter().enumerate() {
            prediction += coef * i64::from(samples[i - 1 - j]);
        }
        let r = i64::from(samples[i]) - prediction;
        if r.abs() >= MAX_RESIDUAL {
            return None;
        }
        residual.push(r as i32);
    }
    Some(residual)
}

fn autocorrelation(samples: &[i32], window: &[f64], max_lag: usize) -> Vec<f64> {
    let windowed: Vec<f64> = samples
        .iter()
        .zip(window)
        .map(|(&s, &w)| f64::from(s) * w)
        .collect();

    let mut autoc = vec![0.0f64; max_lag + 1];
    for (lag, value) in autoc.iter_mut().enumerate() {
        let mut acc = 0.0;
        for i in lag..windowed.len() {
            acc += windowed[i] * windowed[i - lag];
        }
        *value = acc;
    }
    autoc
}

/// Levinson-Durbin recursion for the forward predictor
/// `s[i] ~ sum(a[j] * s[i-1-j])`.
fn levinson(autoc: &[f64], order: usize) -> Option<Vec<f64>> {
    let mut a = vec![0.0f64; order];
    let mut err = autoc[0];

    for i in 0..order {
        if err <= 0.0 {
            return None;
        }
        let mut acc = autoc[i + 1];
        for j in 0..i {
            acc -= a[j] * autoc[i - j];
        }
        let k = acc / err;

        for j in 0..i / 2 {
            let tmp = a[j];
            a[j] = tmp - k * a[i - 1 - j];
            a[i - 1 - j] -= k * tmp;
        }
        if i % 2 == 1 {
            a[i / 2] -= k * a[i / 2];
        }
        a[i] = k;

        err *= 1.0 - k * k;
    }

    Some(a)
}

/// Quantize coefficients to `precision` bits with a common shift in
/// 0..=15. Coefficients are clamped into the representable range; a
/// useless quantization (all zero) is rejected.
fn quantize_coeffs(coeffs: &[f64], precision: u8) -> Option<(Vec<i32>, i32)> {
    let cmax = coeffs.iter().fold(0.0f64, |m, &c| m.max(c.abs()));
    if cmax <= 0.0 || !cmax.is_finite() {
        return None;
    }

    let headroom = f64::from(precision) - 1.0 - cmax.log2().ceil();
    let shift = (headroom as i32).clamp(0, 15);

    let limit = (1i64 << (precision - 1)) - 1;
    let scale = (1i64 << shift) as f64;
    let mut quantized = Vec::with_capacity(coeffs.len());
    let mut any_nonzero = false;
    for &c in coeffs {
        let q = (c * scale).round() as i64;
        let q = q.clamp(-limit - 1, limit) as i32;
        any_nonzero |= q != 0;
        quantized.push(q);
    }

    if !any_nonzero {
        return None;
    }
    Some((quantized, shift))
}

/// Residual under quantized coefficients, exactly as the decoder will
/// reconstruct it. Oversized residuals reject the candidate.
fn lpc_residual(samples: &[i32], coeffs: &[i32], shift: i32) -> Option<Vec<i32>> {
    let order = coeffs.len();
    let mut residual = Vec::with_capacity(samples.len() - order);
    for i in order..samples.len() {
        let mut prediction = 0i64;
        for (j, &coef) in coeffs.iter().enumerate() {
            prediction += i64::from(coef) * i64::from(samples[i - 1 - j]);
        }
        let r = i64::from(samples[i]) - (prediction >> shift);
        if r.abs() >= MAX_RESIDUAL {
            return None;
        }
        residual.push(r as i32);
    }
    Some(residual)
}
