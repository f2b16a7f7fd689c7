//! Encoder configuration options and their validator.
//!
//! Options left unset are omitted from the resolved configuration: the
//! engine preset supplies the value, and the validator never invents
//! defaults of its own. Every setter validates against a static domain
//! table before storing, so a rejected assignment leaves the previous
//! value in place.

use flacio_codec::window;
use flacio_codec::EncoderConfig;
use flacio_core::error::{Error, Result};

/// Option domains, mirroring the engine's configuration schema.
#[derive(Debug, Clone, Copy)]
enum Domain {
    IntRange(u64, u64),
    AnyInt,
    Flag,
    WindowSpec,
}

/// The static option table: name, domain. Mutability is uniform; every
/// encoder option is writable before `open()` and read-only after.
const OPTION_DOMAINS: &[(&str, Domain)] = &[
    ("channels", Domain::IntRange(1, 8)),
    ("bits_per_sample", Domain::IntRange(4, 32)),
    ("sample_rate", Domain::IntRange(1, 655_350)),
    ("total_samples_estimate", Domain::AnyInt),
    ("compression_level", Domain::IntRange(0, 8)),
    ("streamable_subset", Domain::Flag),
    ("verify", Domain::Flag),
    ("blocksize", Domain::IntRange(16, 65_535)),
    ("do_mid_side_stereo", Domain::Flag),
    ("loose_mid_side_stereo", Domain::Flag),
    ("apodization", Domain::WindowSpec),
    ("max_lpc_order", Domain::IntRange(0, 32)),
    ("qlp_coeff_precision", Domain::IntRange(0, 15)),
    ("do_qlp_coeff_prec_search", Domain::Flag),
    ("do_exhaustive_model_search", Domain::Flag),
    ("min_residual_partition_order", Domain::IntRange(0, 15)),
    ("max_residual_partition_order", Domain::IntRange(0, 15)),
];

fn domain_of(option: &'static str) -> Domain {
    OPTION_DOMAINS
        .iter()
        .find(|(name, _)| *name == option)
        .map(|(_, domain)| *domain)
        .unwrap_or_else(|| unreachable!("unknown option {option}"))
}

/// Validate one integer-valued option against the table.
fn check_int(option: &'static str, value: u64) -> Result<()> {
    match domain_of(option) {
        Domain::IntRange(lo, hi) if !(lo..=hi).contains(&value) => Err(Error::InvalidOption {
            option,
            value: value.to_string(),
        }),
        Domain::IntRange(..) | Domain::AnyInt => Ok(()),
        Domain::Flag | Domain::WindowSpec => unreachable!("{option} is not integer-valued"),
    }
}

/// `qlp_coeff_precision` is 0 (automatic) or 5..=15; the plain range in
/// the table cannot express the hole.
fn check_qlp_precision(value: u8) -> Result<()> {
    check_int("qlp_coeff_precision", u64::from(value))?;
    if (1..5).contains(&value) {
        return Err(Error::InvalidOption {
            option: "qlp_coeff_precision",
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Per-level tuning preset applied at open time. Explicitly set options
/// take precedence over the preset.
struct Preset {
    do_mid_side_stereo: bool,
    loose_mid_side_stereo: bool,
    apodization: &'static str,
    max_lpc_order: u8,
    do_qlp_coeff_prec_search: bool,
    do_exhaustive_model_search: bool,
    min_residual_partition_order: u8,
    max_residual_partition_order: u8,
}

static PRESETS: [Preset; 9] = [
    Preset {
        do_mid_side_stereo: false,
        loose_mid_side_stereo: false,
        apodization: "tukey(0.5)",
        max_lpc_order: 0,
        do_qlp_coeff_prec_search: false,
        do_exhaustive_model_search: false,
        min_residual_partition_order: 0,
        max_residual_partition_order: 3,
    },
    Preset {
        do_mid_side_stereo: true,
        loose_mid_side_stereo: true,
        apodization: "tukey(0.5)",
        max_lpc_order: 0,
        do_qlp_coeff_prec_search: false,
        do_exhaustive_model_search: false,
        min_residual_partition_order: 0,
        max_residual_partition_order: 3,
    },
    Preset {
        do_mid_side_stereo: true,
        loose_mid_side_stereo: false,
        apodization: "tukey(0.5)",
        max_lpc_order: 0,
        do_qlp_coeff_prec_search: false,
        do_exhaustive_model_search: false,
        min_residual_partition_order: 0,
        max_residual_partition_order: 3,
    },
    Preset {
        do_mid_side_stereo: false,
        loose_mid_side_stereo: false,
        apodization: "tukey(0.5)",
        max_lpc_order: 6,
        do_qlp_coeff_prec_search: false,
        do_exhaustive_model_search: false,
        min_residual_partition_order: 0,
        max_residual_partition_order: 4,
    },
    Preset {
        do_mid_side_stereo: true,
        loose_mid_side_stereo: true,
        apodization: "tukey(0.5)",
        max_lpc_order: 8,
        do_qlp_coeff_prec_search: false,
        do_exhaustive_model_search: false,
        min_residual_partition_order: 0,
        max_residual_partition_order: 4,
    },
    Preset {
        do_mid_side_stereo: true,
        loose_mid_side_stereo: false,
        apodization: "tukey(0.5)",
        max_lpc_order: 8,
        do_qlp_coeff_prec_search: false,
        do_exhaustive_model_search: false,
        min_residual_partition_order: 0,
        max_residual_partition_order: 5,
    },
    Preset {
        do_mid_side_stereo: true,
        loose_mid_side_stereo: false,
        apodization: "tukey(0.5);partial_tukey(2)",
        max_lpc_order: 8,
        do_qlp_coeff_prec_search: false,
        do_exhaustive_model_search: false,
        min_residual_partition_order: 0,
        max_residual_partition_order: 6,
    },
    Preset {
        do_mid_side_stereo: true,
        loose_mid_side_stereo: false,
        apodization: "tukey(0.5);partial_tukey(2)",
        max_lpc_order: 12,
        do_qlp_coeff_prec_search: false,
        do_exhaustive_model_search: false,
        min_residual_partition_order: 0,
        max_residual_partition_order: 6,
    },
    Preset {
        do_mid_side_stereo: true,
        loose_mid_side_stereo: false,
        apodization: "tukey(0.5);partial_tukey(2);punchout_tukey(3)",
        max_lpc_order: 12,
        do_qlp_coeff_prec_search: false,
        do_exhaustive_model_search: false,
        min_residual_partition_order: 0,
        max_residual_partition_order: 6,
    },
];

const DEFAULT_COMPRESSION_LEVEL: u8 = 5;
const DEFAULT_BLOCKSIZE: u16 = 4096;

/// The encoder option set.
///
/// Getters report the value the engine will receive: an explicitly set
/// value, or the default implied by the current compression level.
#[derive(Debug, Clone, Default)]
pub struct EncoderOptions {
    channels: Option<u8>,
    bits_per_sample: Option<u8>,
    sample_rate: Option<u32>,
    total_samples_estimate: Option<u64>,
    compression_level: Option<u8>,
    streamable_subset: Option<bool>,
    verify: Option<bool>,
    blocksize: Option<u16>,
    do_mid_side_stereo: Option<bool>,
    loose_mid_side_stereo: Option<bool>,
    apodization: Option<String>,
    max_lpc_order: Option<u8>,
    qlp_coeff_precision: Option<u8>,
    do_qlp_coeff_prec_search: Option<bool>,
    do_exhaustive_model_search: Option<bool>,
    min_residual_partition_order: Option<u8>,
    max_residual_partition_order: Option<u8>,
}

impl EncoderOptions {
    /// A fresh option set with everything unset.
    pub fn new() -> Self {
        Self::default()
    }

    fn preset(&self) -> &'static Preset {
        &PRESETS[usize::from(self.compression_level())]
    }

    /// Number of channels (default 2).
    pub fn channels(&self) -> u8 {
        self.channels.unwrap_or(2)
    }

    /// Set the number of channels.
    pub fn set_channels(&mut self, value: u8) -> Result<()> {
        check_int("channels", u64::from(value))?;
        self.channels = Some(value);
        Ok(())
    }

    /// Bits per sample (default 16).
    pub fn bits_per_sample(&self) -> u8 {
        self.bits_per_sample.unwrap_or(16)
    }

    /// Set the bits per sample.
    pub fn set_bits_per_sample(&mut self, value: u8) -> Result<()> {
        check_int("bits_per_sample", u64::from(value))?;
        self.bits_per_sample = Some(value);
        Ok(())
    }

    /// Sample rate in Hz (default 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(44_100)
    }

    /// Set the sample rate.
    pub fn set_sample_rate(&mut self, value: u32) -> Result<()> {
        check_int("sample_rate", u64::from(value))?;
        self.sample_rate = Some(value);
        Ok(())
    }

    /// Expected total frame count, written provisionally into the stream
    /// header (default 0 = unknown).
    pub fn total_samples_estimate(&self) -> u64 {
        self.total_samples_estimate.unwrap_or(0)
    }

    /// Set the expected total frame count.
    pub fn set_total_samples_estimate(&mut self, value: u64) -> Result<()> {
        check_int("total_samples_estimate", value)?;
        self.total_samples_estimate = Some(value);
        Ok(())
    }

    /// Compression level 0-8 (default 5).
    pub fn compression_level(&self) -> u8 {
        self.compression_level.unwrap_or(DEFAULT_COMPRESSION_LEVEL)
    }

    /// Set the compression level.
    pub fn set_compression_level(&mut self, value: u8) -> Result<()> {
        check_int("compression_level", u64::from(value))?;
        self.compression_level = Some(value);
        Ok(())
    }

    /// Whether the stream is restricted to the streamable subset
    /// (default true).
    pub fn streamable_subset(&self) -> bool {
        self.streamable_subset.unwrap_or(true)
    }

    /// Restrict (or not) the stream to the streamable subset.
    pub fn set_streamable_subset(&mut self, value: bool) -> Result<()> {
        self.streamable_subset = Some(value);
        Ok(())
    }

    /// Whether every frame is re-decoded and compared before being
    /// written (default false).
    pub fn verify(&self) -> bool {
        self.verify.unwrap_or(false)
    }

    /// Enable or disable verify mode.
    pub fn set_verify(&mut self, value: bool) -> Result<()> {
        self.verify = Some(value);
        Ok(())
    }

    /// Block size in frames (default 4096).
    pub fn blocksize(&self) -> u16 {
        self.blocksize.unwrap_or(DEFAULT_BLOCKSIZE)
    }

    /// Set the block size.
    pub fn set_blocksize(&mut self, value: u16) -> Result<()> {
        check_int("blocksize", u64::from(value))?;
        self.blocksize = Some(value);
        Ok(())
    }

    /// Whether mid-side coding is tried for stereo input.
    pub fn do_mid_side_stereo(&self) -> bool {
        self.do_mid_side_stereo
            .unwrap_or(self.preset().do_mid_side_stereo)
    }

    /// Enable or disable mid-side stereo.
    pub fn set_do_mid_side_stereo(&mut self, value: bool) -> Result<()> {
        self.do_mid_side_stereo = Some(value);
        Ok(())
    }

    /// Whether the stereo decision is re-evaluated only periodically.
    pub fn loose_mid_side_stereo(&self) -> bool {
        self.loose_mid_side_stereo
            .unwrap_or(self.preset().loose_mid_side_stereo)
    }

    /// Enable or disable loose mid-side stereo.
    pub fn set_loose_mid_side_stereo(&mut self, value: bool) -> Result<()> {
        self.loose_mid_side_stereo = Some(value);
        Ok(())
    }

    /// The apodization window specification.
    pub fn apodization(&self) -> &str {
        self.apodization
            .as_deref()
            .unwrap_or(self.preset().apodization)
    }

    /// Set the apodization window specification, e.g.
    /// `"tukey(0.5);hann"`. The grammar is validated here; the offending
    /// window spec is named on rejection.
    pub fn set_apodization(&mut self, spec: &str) -> Result<()> {
        window::parse_specification(spec).map_err(|bad| Error::InvalidOption {
            option: "apodization",
            value: bad,
        })?;
        self.apodization = Some(spec.to_string());
        Ok(())
    }

    /// Maximum LPC order.
    pub fn max_lpc_order(&self) -> u8 {
        self.max_lpc_order.unwrap_or(self.preset().max_lpc_order)
    }

    /// Set the maximum LPC order (0 disables LPC).
    pub fn set_max_lpc_order(&mut self, value: u8) -> Result<()> {
        check_int("max_lpc_order", u64::from(value))?;
        self.max_lpc_order = Some(value);
        Ok(())
    }

    /// Quantized coefficient precision (0 = automatic).
    pub fn qlp_coeff_precision(&self) -> u8 {
        self.qlp_coeff_precision.unwrap_or(0)
    }

    /// Set the quantized coefficient precision: 0, or 5..=15.
    pub fn set_qlp_coeff_precision(&mut self, value: u8) -> Result<()> {
        check_qlp_precision(value)?;
        self.qlp_coeff_precision = Some(value);
        Ok(())
    }

    /// Whether coefficient precisions are searched.
    pub fn do_qlp_coeff_prec_search(&self) -> bool {
        self.do_qlp_coeff_prec_search
            .unwrap_or(self.preset().do_qlp_coeff_prec_search)
    }

    /// Enable or disable the coefficient precision search.
    pub fn set_do_qlp_coeff_prec_search(&mut self, value: bool) -> Result<()> {
        self.do_qlp_coeff_prec_search = Some(value);
        Ok(())
    }

    /// Whether all predictor orders are searched.
    pub fn do_exhaustive_model_search(&self) -> bool {
        self.do_exhaustive_model_search
            .unwrap_or(self.preset().do_exhaustive_model_search)
    }

    /// Enable or disable the exhaustive model search.
    pub fn set_do_exhaustive_model_search(&mut self, value: bool) -> Result<()> {
        self.do_exhaustive_model_search = Some(value);
        Ok(())
    }

    /// Minimum Rice partition order.
    pub fn min_residual_partition_order(&self) -> u8 {
        self.min_residual_partition_order
            .unwrap_or(self.preset().min_residual_partition_order)
    }

    /// Set the minimum Rice partition order.
    pub fn set_min_residual_partition_order(&mut self, value: u8) -> Result<()> {
        check_int("min_residual_partition_order", u64::from(value))?;
        self.min_residual_partition_order = Some(value);
        Ok(())
    }

    /// Maximum Rice partition order.
    pub fn max_residual_partition_order(&self) -> u8 {
        self.max_residual_partition_order
            .unwrap_or(self.preset().max_residual_partition_order)
    }

    /// Set the maximum Rice partition order.
    pub fn set_max_residual_partition_order(&mut self, value: u8) -> Result<()> {
        check_int("max_residual_partition_order", u64::from(value))?;
        self.max_residual_partition_order = Some(value);
        Ok(())
    }

    /// Resolve the option set into a concrete engine configuration,
    /// checking cross-option constraints that only apply to the whole
    /// set.
    pub(crate) fn resolve(&self) -> Result<EncoderConfig> {
        let windows = window::parse_specification(self.apodization())
            .map_err(|bad| Error::InvalidOption {
                option: "apodization",
                value: bad,
            })?;

        let cfg = EncoderConfig {
            channels: self.channels(),
            bits_per_sample: self.bits_per_sample(),
            sample_rate: self.sample_rate(),
            blocksize: self.blocksize(),
            total_samples_estimate: self.total_samples_estimate(),
            do_mid_side_stereo: self.do_mid_side_stereo(),
            loose_mid_side_stereo: self.loose_mid_side_stereo(),
            apodization: windows,
            max_lpc_order: self.max_lpc_order(),
            qlp_coeff_precision: self.qlp_coeff_precision(),
            do_qlp_coeff_prec_search: self.do_qlp_coeff_prec_search(),
            do_exhaustive_model_search: self.do_exhaustive_model_search(),
            min_residual_partition_order: self.min_residual_partition_order(),
            max_residual_partition_order: self.max_residual_partition_order(),
            verify: self.verify(),
        };
        cfg.validate()?;

        if self.streamable_subset() {
            self.check_streamable_subset(&cfg)?;
        }
        Ok(cfg)
    }

    fn check_streamable_subset(&self, cfg: &EncoderConfig) -> Result<()> {
        fn conflict(option: &'static str, value: impl std::fmt::Display) -> Error {
            Error::InvalidOption {
                option,
                value: format!("{value} (outside the streamable subset)"),
            }
        }

        if cfg.blocksize > 16_384 {
            return Err(conflict("blocksize", cfg.blocksize));
        }
        if cfg.sample_rate <= 48_000 {
            if cfg.blocksize > 4_608 {
                return Err(conflict("blocksize", cfg.blocksize));
            }
            if cfg.max_lpc_order > 12 {
                return Err(conflict("max_lpc_order", cfg.max_lpc_order));
            }
        }
        if !matches!(cfg.bits_per_sample, 8 | 12 | 16 | 20 | 24 | 32) {
            return Err(conflict("bits_per_sample", cfg.bits_per_sample));
        }
        if !subset_expressible_rate(cfg.sample_rate) {
            return Err(conflict("sample_rate", cfg.sample_rate));
        }
        if cfg.max_residual_partition_order > 8 {
            return Err(conflict(
                "max_residual_partition_order",
                cfg.max_residual_partition_order,
            ));
        }
        Ok(())
    }
}

/// Whether a frame header can carry the rate without falling back to
/// STREAMINFO, a subset requirement.
fn subset_expressible_rate(rate: u32) -> bool {
    const TABLED: [u32; 11] = [
        88_200, 176_400, 192_000, 8_000, 16_000, 22_050, 24_000, 32_000, 44_100, 48_000, 96_000,
    ];
    TABLED.contains(&rate)
        || rate < 65_536
        || (rate % 10 == 0 && rate < 655_360)
        || (rate % 1000 == 0 && rate / 1000 <= 255)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flacio_codec::Apodization;

    #[test]
    fn test_defaults_are_cd_audio() {
        let opts = EncoderOptions::new();
        assert_eq!(opts.channels(), 2);
        assert_eq!(opts.bits_per_sample(), 16);
        assert_eq!(opts.sample_rate(), 44_100);
        assert_eq!(opts.compression_level(), 5);
        assert_eq!(opts.blocksize(), 4096);
        assert!(opts.streamable_subset());
        assert!(!opts.verify());
    }

    #[test]
    fn test_rejected_value_keeps_previous() {
        let mut opts = EncoderOptions::new();
        opts.set_channels(4).unwrap();
        let err = opts.set_channels(9).unwrap_err();
        assert!(err.to_string().contains("channels"));
        assert!(err.to_string().contains('9'));
        assert_eq!(opts.channels(), 4);
    }

    #[test]
    fn test_domain_edges() {
        let mut opts = EncoderOptions::new();
        assert!(opts.set_bits_per_sample(3).is_err());
        assert!(opts.set_bits_per_sample(4).is_ok());
        assert!(opts.set_bits_per_sample(32).is_ok());
        assert!(opts.set_bits_per_sample(33).is_err());

        assert!(opts.set_sample_rate(0).is_err());
        assert!(opts.set_sample_rate(655_350).is_ok());
        assert!(opts.set_sample_rate(655_351).is_err());

        assert!(opts.set_compression_level(8).is_ok());
        assert!(opts.set_compression_level(9).is_err());

        assert!(opts.set_blocksize(15).is_err());
        assert!(opts.set_blocksize(16).is_ok());
    }

    #[test]
    fn test_qlp_precision_hole() {
        let mut opts = EncoderOptions::new();
        assert!(opts.set_qlp_coeff_precision(0).is_ok());
        assert!(opts.set_qlp_coeff_precision(4).is_err());
        assert!(opts.set_qlp_coeff_precision(5).is_ok());
        assert!(opts.set_qlp_coeff_precision(15).is_ok());
        assert!(opts.set_qlp_coeff_precision(16).is_err());
    }

    #[test]
    fn test_apodization_grammar() {
        let mut opts = EncoderOptions::new();
        opts.set_apodization("hann;tukey(0.3)").unwrap();
        assert_eq!(opts.apodization(), "hann;tukey(0.3)");

        let err = opts.set_apodization("hann;wedge").unwrap_err();
        assert!(err.to_string().contains("wedge"));
        // The previous value survives the rejection.
        assert_eq!(opts.apodization(), "hann;tukey(0.3)");
    }

    #[test]
    fn test_preset_follows_compression_level() {
        let mut opts = EncoderOptions::new();
        opts.set_compression_level(0).unwrap();
        assert_eq!(opts.max_lpc_order(), 0);
        assert!(!opts.do_mid_side_stereo());

        opts.set_compression_level(8).unwrap();
        assert_eq!(opts.max_lpc_order(), 12);
        assert!(opts.do_mid_side_stereo());
        assert!(opts.apodization().contains("punchout_tukey"));
    }

    #[test]
    fn test_explicit_option_overrides_preset() {
        let mut opts = EncoderOptions::new();
        opts.set_compression_level(8).unwrap();
        opts.set_max_lpc_order(2).unwrap();
        assert_eq!(opts.max_lpc_order(), 2);
        let cfg = opts.resolve().unwrap();
        assert_eq!(cfg.max_lpc_order, 2);
        assert!(cfg.do_mid_side_stereo);
    }

    #[test]
    fn test_subset_rejects_large_blocksize_at_cd_rate() {
        let mut opts = EncoderOptions::new();
        opts.set_blocksize(8192).unwrap();
        let err = opts.resolve().unwrap_err();
        assert!(err.to_string().contains("blocksize"));

        opts.set_streamable_subset(false).unwrap();
        assert!(opts.resolve().is_ok());
    }

    #[test]
    fn test_subset_rejects_odd_bit_depth() {
        let mut opts = EncoderOptions::new();
        opts.set_bits_per_sample(17).unwrap();
        assert!(opts.resolve().is_err());
        opts.set_streamable_subset(false).unwrap();
        assert!(opts.resolve().is_ok());
    }

    #[test]
    fn test_subset_allows_high_rate_blocksize() {
        let mut opts = EncoderOptions::new();
        opts.set_sample_rate(96_000).unwrap();
        opts.set_blocksize(8192).unwrap();
        assert!(opts.resolve().is_ok());
    }

    #[test]
    fn test_resolve_default_set() {
        let cfg = EncoderOptions::new().resolve().unwrap();
        assert_eq!(cfg.channels, 2);
        assert_eq!(cfg.blocksize, 4096);
        assert_eq!(cfg.max_lpc_order, 8);
        assert_eq!(cfg.apodization, vec![Apodization::Tukey(0.5)]);
    }
}
