//! Apodization windows applied to sample blocks before LPC analysis.
//!
//! The window specification grammar is part of the engine's configuration
//! schema: one or more specs separated by `;`, each a window name with an
//! optional parenthesized parameter. Windows only influence which
//! predictor the encoder picks; they never affect decodability.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// One apodization window function.
#[derive(Debug, Clone, PartialEq)]
pub enum Apodization {
    /// Triangular window (zero endpoints).
    Bartlett,
    /// Bartlett-Hann compound window.
    BartlettHann,
    /// Three-term Blackman window.
    Blackman,
    /// Four-term Blackman-Harris window (-92 dB sidelobes).
    BlackmanHarris4Term92Db,
    /// Squared Welch window.
    Connes,
    /// Five-term flat-top window.
    Flattop,
    /// Gaussian window; the parameter is the standard deviation as a
    /// fraction of half the window length, in (0, 0.5].
    Gauss(f64),
    /// Hamming window.
    Hamming,
    /// Hann window.
    Hann,
    /// Kaiser-Bessel window (cosine-series approximation).
    KaiserBessel,
    /// Four-term Nuttall window.
    Nuttall,
    /// No windowing.
    Rectangle,
    /// Triangular window (non-zero endpoints).
    Triangle,
    /// Tukey (tapered cosine) window; the parameter is the taper fraction
    /// in [0, 1].
    Tukey(f64),
    /// A set of `n` Tukey windows over overlapping partial ranges.
    PartialTukey(u32),
    /// A set of `n` Tukey windows with punched-out ranges.
    PunchoutTukey(u32),
    /// Welch (parabolic) window.
    Welch,
}

impl fmt::Display for Apodization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Apodization::Bartlett => write!(f, "bartlett"),
            Apodization::BartlettHann => write!(f, "bartlett_hann"),
            Apodization::Blackman => write!(f, "blackman"),
            Apodization::BlackmanHarris4Term92Db => write!(f, "blackman_harris_4term_92db"),
            Apodization::Connes => write!(f, "connes"),
            Apodization::Flattop => write!(f, "flattop"),
            Apodization::Gauss(stddev) => write!(f, "gauss({stddev})"),
            Apodization::Hamming => write!(f, "hamming"),
            Apodization::Hann => write!(f, "hann"),
            Apodization::KaiserBessel => write!(f, "kaiser_bessel"),
            Apodization::Nuttall => write!(f, "nuttall"),
            Apodization::Rectangle => write!(f, "rectangle"),
            Apodization::Triangle => write!(f, "triangle"),
            Apodization::Tukey(p) => write!(f, "tukey({p})"),
            Apodization::PartialTukey(n) => write!(f, "partial_tukey({n})"),
            Apodization::PunchoutTukey(n) => write!(f, "punchout_tukey({n})"),
            Apodization::Welch => write!(f, "welch"),
        }
    }
}

impl FromStr for Apodization {
    /// The offending spec, for error reporting.
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();

        let (name, param) = match spec.find('(') {
            Some(open) => {
                let close = spec.rfind(')').filter(|&c| c > open);
                match close {
                    Some(close) if close == spec.len() - 1 => {
                        (&spec[..open], Some(&spec[open + 1..close]))
                    }
                    _ => return Err(spec.to_string()),
                }
            }
            None => (spec, None),
        };

        let parse_f64 = |p: Option<&str>| -> Result<f64, String> {
            p.ok_or_else(|| spec.to_string())?
                .trim()
                .parse::<f64>()
                .map_err(|_| spec.to_string())
        };
        let parse_u32 = |p: Option<&str>| -> Result<u32, String> {
            p.ok_or_else(|| spec.to_string())?
                .trim()
                .parse::<u32>()
                .map_err(|_| spec.to_string())
        };

        let window = match name {
            "bartlett" => Apodization::Bartlett,
            "bartlett_hann" => Apodization::BartlettHann,
            "blackman" => Apodization::Blackman,
            "blackman_harris_4term_92db" => Apodization::BlackmanHarris4Term92Db,
            "connes" => Apodization::Connes,
            "flattop" => Apodization::Flattop,
            "gauss" => {
                let stddev = parse_f64(param)?;
                if !(stddev > 0.0 && stddev <= 0.5) {
                    return Err(spec.to_string());
                }
                return Ok(Apodization::Gauss(stddev));
            }
            "hamming" => Apodization::Hamming,
            "hann" => Apodization::Hann,
            "kaiser_bessel" => Apodization::KaiserBessel,
            "nuttall" => Apodization::Nuttall,
            "rectangle" => Apodization::Rectangle,
            "triangle" => Apodization::Triangle,
            "tukey" => {
                let p = parse_f64(param)?;
                if !(0.0..=1.0).contains(&p) {
                    return Err(spec.to_string());
                }
                return Ok(Apodization::Tukey(p));
            }
            "partial_tukey" => {
                let n = parse_u32(param)?;
                if n == 0 {
                    return Err(spec.to_string());
                }
                return Ok(Apodization::PartialTukey(n));
            }
            "punchout_tukey" => {
                let n = parse_u32(param)?;
                if n == 0 {
                    return Err(spec.to_string());
                }
                return Ok(Apodization::PunchoutTukey(n));
            }
            "welch" => Apodization::Welch,
            _ => return Err(spec.to_string()),
        };

        if param.is_some() {
            // Parameterless windows reject a parameter.
            return Err(spec.to_string());
        }
        Ok(window)
    }
}

/// Parse a `;`-separated window specification list.
///
/// On failure the error carries the first offending spec.
pub fn parse_specification(spec: &str) -> Result<Vec<Apodization>, String> {
    let mut windows = Vec::new();
    for part in spec.split(';') {
        if part.trim().is_empty() {
            continue;
        }
        windows.push(part.parse::<Apodization>()?);
    }
    if windows.is_empty() {
        return Err(spec.to_string());
    }
    Ok(windows)
}

impl Apodization {
    /// Evaluate the window over `n` points.
    ///
    /// The multi-window Tukey families describe window *sets* for a search
    /// loop this engine does not carry; they are analyzed as `tukey(0.5)`.
    pub(crate) fn coefficients(&self, n: usize) -> Vec<f64> {
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            return vec![1.0];
        }

        let last = (n - 1) as f64;
        let cosine_series = |coeffs: &[f64]| -> Vec<f64> {
            (0..n)
                .map(|i| {
                    let x = i as f64 / last;
                    coeffs
                        .iter()
                        .enumerate()
                        .map(|(k, &c)| {
                            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                            sign * c * (2.0 * PI * k as f64 * x).cos()
                        })
                        .sum()
                })
                .collect()
        };

        match self {
            Apodization::Bartlett => (0..n)
                .map(|i| 1.0 - (2.0 * i as f64 / last - 1.0).abs())
                .collect(),
            Apodization::BartlettHann => (0..n)
                .map(|i| {
                    let x = i as f64 / last;
                    0.62 - 0.48 * (x - 0.5).abs() - 0.38 * (2.0 * PI * x).cos()
                })
                .collect(),
            Apodization::Blackman => cosine_series(&[0.42, 0.50, 0.08]),
            Apodization::BlackmanHarris4Term92Db => {
                cosine_series(&[0.35875, 0.48829, 0.14128, 0.01168])
            }
            Apodization::Connes => (0..n)
                .map(|i| {
                    let x = 2.0 * i as f64 / last - 1.0;
                    let y = 1.0 - x * x;
                    y * y
                })
                .collect(),
            Apodization::Flattop => cosine_series(&[
                0.21557895, 0.41663158, 0.277263158, 0.083578947, 0.006947368,
            ]),
            Apodization::Gauss(stddev) => (0..n)
                .map(|i| {
                    let x = (i as f64 - last / 2.0) / (stddev * last / 2.0);
                    (-0.5 * x * x).exp()
                })
                .collect(),
            Apodization::Hamming => cosine_series(&[0.54, 0.46]),
            Apodization::Hann => cosine_series(&[0.5, 0.5]),
            Apodization::KaiserBessel => cosine_series(&[0.402, 0.498, 0.098, 0.001]),
            Apodization::Nuttall => {
                cosine_series(&[0.3635819, 0.4891775, 0.1365995, 0.0106411])
            }
            Apodization::Rectangle => vec![1.0; n],
            Apodization::Triangle => (0..n)
                .map(|i| {
                    let half = (n as f64 + 1.0) / 2.0;
                    1.0 - ((i as f64 + 1.0) - half).abs() / half
                })
                .collect(),
            Apodization::Tukey(p) => tukey(n, *p),
            Apodization::PartialTukey(_) | Apodization::PunchoutTukey(_) => tukey(n, 0.5),
            Apodization::Welch => (0..n)
                .map(|i| {
                    let x = 2.0 * i as f64 / last - 1.0;
                    1.0 - x * x
                })
                .collect(),
        }
    }
}

fn tukey(n: usize, p: f64) -> Vec<f64> {
    let last = (n - 1) as f64;
    let taper = p.clamp(0.0, 1.0) * last / 2.0;
    (0..n)
        .map(|i| {
            let i = i as f64;
            if taper < f64::EPSILON {
                1.0
            } else if i < taper {
                0.5 * (1.0 + (PI * (i / taper - 1.0)).cos())
            } else if i > last - taper {
                0.5 * (1.0 + (PI * ((i - last) / taper + 1.0)).cos())
            } else {
                1.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_names() {
        assert_eq!("hann".parse::<Apodization>().unwrap(), Apodization::Hann);
        assert_eq!(
            " rectangle ".parse::<Apodization>().unwrap(),
            Apodization::Rectangle
        );
        assert_eq!(
            "blackman_harris_4term_92db".parse::<Apodization>().unwrap(),
            Apodization::BlackmanHarris4Term92Db
        );
    }

    #[test]
    fn test_parse_parameterized() {
        assert_eq!(
            "tukey(0.25)".parse::<Apodization>().unwrap(),
            Apodization::Tukey(0.25)
        );
        assert_eq!(
            "gauss(0.2)".parse::<Apodization>().unwrap(),
            Apodization::Gauss(0.2)
        );
        assert_eq!(
            "partial_tukey(2)".parse::<Apodization>().unwrap(),
            Apodization::PartialTukey(2)
        );
    }

    #[test]
    fn test_parse_rejects_bad_specs() {
        for bad in [
            "hanning",
            "tukey",
            "tukey(1.5)",
            "tukey(-0.1)",
            "gauss(0)",
            "gauss(0.7)",
            "hann(0.5)",
            "partial_tukey(0)",
            "tukey(0.5",
            "",
        ] {
            assert!(bad.parse::<Apodization>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_parse_specification_list() {
        let windows = parse_specification("tukey(0.5);partial_tukey(2);punchout_tukey(3)").unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], Apodization::Tukey(0.5));
    }

    #[test]
    fn test_parse_specification_reports_offender() {
        let err = parse_specification("hann;bogus(1)").unwrap_err();
        assert_eq!(err, "bogus(1)");
    }

    #[test]
    fn test_rectangle_is_flat() {
        assert_eq!(Apodization::Rectangle.coefficients(4), vec![1.0; 4]);
    }

    #[test]
    fn test_hann_endpoints_and_peak() {
        let w = Apodization::Hann.coefficients(5);
        assert!(w[0].abs() < 1e-12);
        assert!(w[4].abs() < 1e-12);
        assert!((w[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tukey_zero_is_rectangle() {
        let w = Apodization::Tukey(0.0).coefficients(8);
        assert!(w.iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_windows_stay_in_unit_range() {
        let windows = [
            Apodization::Bartlett,
            Apodization::BartlettHann,
            Apodization::Blackman,
            Apodization::Connes,
            Apodization::Gauss(0.25),
            Apodization::Hamming,
            Apodization::Hann,
            Apodization::KaiserBessel,
            Apodization::Nuttall,
            Apodization::Triangle,
            Apodization::Tukey(0.5),
            Apodization::Welch,
        ];
        for window in windows {
            for &v in &window.coefficients(64) {
                assert!((-1e-9..=1.0 + 1e-9).contains(&v), "{window}: {v}");
            }
        }
    }
}
