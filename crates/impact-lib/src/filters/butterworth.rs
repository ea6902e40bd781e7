//! Butterworth low-pass and band-stop filters as cascaded second-order sections.
//!
//! Design goes through the analog prototype and a pre-warped bilinear transform
//! (`s = (1 - z^-1) / (1 + z^-1)`, `wc = tan(pi * fc / fs)`). Sections run in Direct Form II
//! transposed and start from the steady state of the edge sample so a flat lead-in does not
//! ring. Zero-phase mode makes a second pass from the last sample back to the first.

use super::{Adjustment, Filtered};
use crate::error::{EngineError, Result};
use log::warn;
use realfft::num_complex::Complex64;
use std::f64::consts::PI;

pub const MAX_ORDER: usize = 8;
/// Fraction of Nyquist a cutoff is pulled back to when requested just below Nyquist.
pub const NYQUIST_MARGIN: f64 = 0.99;

/// One biquad: `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// State that makes a constant input `x0` pass straight through. Valid because every
    /// section designed here has unity gain at DC.
    fn steady_state(&self, x0: f64) -> [f64; 2] {
        let z2 = (self.b2 - self.a2) * x0;
        let z1 = (self.b1 - self.a1) * x0 + z2;
        [z1, z2]
    }

    #[inline]
    fn step(&self, x: f64, z: &mut [f64; 2]) -> f64 {
        let y = self.b0 * x + z[0];
        z[0] = self.b1 * x - self.a1 * y + z[1];
        z[1] = self.b2 * x - self.a2 * y;
        y
    }

    fn run_forward(&self, data: &mut [f64]) {
        let Some(&x0) = data.first() else {
            return;
        };
        let mut z = self.steady_state(x0);
        for x in data.iter_mut() {
            *x = self.step(*x, &mut z);
        }
    }

    fn run_backward(&self, data: &mut [f64]) {
        let Some(&x0) = data.last() else {
            return;
        };
        let mut z = self.steady_state(x0);
        for x in data.iter_mut().rev() {
            *x = self.step(*x, &mut z);
        }
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let num = self.b0 + z_inv * (self.b1 + z_inv * self.b2);
        let den = 1.0 + z_inv * (self.a1 + z_inv * self.a2);
        num / den
    }

    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }
}

/// A designed cascade plus whatever was changed from the request to make it stable.
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    pub sections: Vec<Biquad>,
    pub adjustments: Vec<Adjustment>,
}

impl SosFilter {
    pub fn lowpass(cutoff_hz: f64, fs: f64, order: usize) -> Result<Self> {
        check_order(order)?;
        let mut adjustments = Vec::new();
        let cutoff = check_cutoff(cutoff_hz, fs, &mut adjustments)?;
        Ok(Self {
            sections: lowpass_sections(cutoff / fs, order),
            adjustments,
        })
    }

    pub fn bandstop(low_hz: f64, high_hz: f64, fs: f64, order: usize) -> Result<Self> {
        check_order(order)?;
        if !(low_hz < high_hz) {
            return Err(EngineError::InvalidBand { low_hz, high_hz });
        }
        let mut adjustments = Vec::new();
        let low = check_cutoff(low_hz, fs, &mut adjustments)?;
        let high = check_cutoff(high_hz, fs, &mut adjustments)?;
        if !(low < high) {
            return Err(EngineError::InvalidBand {
                low_hz: low,
                high_hz: high,
            });
        }
        Ok(Self {
            sections: bandstop_sections(low / fs, high / fs, order),
            adjustments,
        })
    }

    /// Filter a copy of `data`. Zero-phase runs every section forward, then every section
    /// backward over the forward output.
    pub fn apply(&self, data: &[f64], zero_phase: bool) -> Vec<f64> {
        let mut out = data.to_vec();
        for section in &self.sections {
            section.run_forward(&mut out);
        }
        if zero_phase {
            for section in &self.sections {
                section.run_backward(&mut out);
            }
        }
        out
    }

    /// Magnitude of a single pass at `freq_hz`.
    pub fn gain_at(&self, freq_hz: f64, fs: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / fs;
        let z_inv = Complex64::from_polar(1.0, -w);
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
            .norm()
    }
}

/// Butterworth low-pass of `data` sampled at `fs`.
pub fn butterworth_lowpass(
    data: &[f64],
    fs: f64,
    cutoff_hz: f64,
    order: usize,
    zero_phase: bool,
) -> Result<Filtered> {
    let filter = SosFilter::lowpass(cutoff_hz, fs, order)?;
    Ok(Filtered {
        data: filter.apply(data, zero_phase),
        adjustments: filter.adjustments,
    })
}

/// Butterworth band-stop (notch) of `data` removing `low_hz..high_hz`.
pub fn butterworth_bandstop(
    data: &[f64],
    fs: f64,
    low_hz: f64,
    high_hz: f64,
    order: usize,
    zero_phase: bool,
) -> Result<Filtered> {
    let filter = SosFilter::bandstop(low_hz, high_hz, fs, order)?;
    Ok(Filtered {
        data: filter.apply(data, zero_phase),
        adjustments: filter.adjustments,
    })
}

fn check_order(order: usize) -> Result<()> {
    if order == 0 || order > MAX_ORDER {
        return Err(EngineError::InvalidOrder { order });
    }
    Ok(())
}

fn check_cutoff(requested_hz: f64, fs: f64, adjustments: &mut Vec<Adjustment>) -> Result<f64> {
    if !(fs > 0.0) || !fs.is_finite() {
        return Err(EngineError::DegenerateTimebase(format!(
            "sample rate {fs} Hz"
        )));
    }
    let nyquist_hz = fs / 2.0;
    if !(requested_hz > 0.0) || requested_hz >= nyquist_hz {
        return Err(EngineError::CutoffOutOfRange {
            requested_hz,
            nyquist_hz,
        });
    }
    let limit = NYQUIST_MARGIN * nyquist_hz;
    if requested_hz > limit {
        warn!("cutoff {requested_hz:.2} Hz pulled back to {limit:.2} Hz (fs {fs} Hz)");
        adjustments.push(Adjustment::CutoffClamped {
            requested_hz,
            applied_hz: limit,
        });
        return Ok(limit);
    }
    Ok(requested_hz)
}

/// Angle of the k-th prototype pole pair measured from the negative real axis.
fn pole_angle(k: usize, order: usize) -> f64 {
    PI * (2 * k + 1 + order % 2) as f64 / (2 * order) as f64
}

fn lowpass_sections(normalized_cutoff: f64, order: usize) -> Vec<Biquad> {
    let wc = (PI * normalized_cutoff).tan();
    let wc2 = wc * wc;
    let mut sections = Vec::with_capacity(order.div_ceil(2));

    if order % 2 == 1 {
        // Real pole at s = -wc.
        let k = wc / (1.0 + wc);
        sections.push(Biquad {
            b0: k,
            b1: k,
            b2: 0.0,
            a1: (wc - 1.0) / (wc + 1.0),
            a2: 0.0,
        });
    }

    for k in 0..order / 2 {
        let zeta = pole_angle(k, order).cos();
        let two_zeta_wc = 2.0 * zeta * wc;
        let a0 = 1.0 + two_zeta_wc + wc2;
        sections.push(Biquad {
            b0: wc2 / a0,
            b1: 2.0 * wc2 / a0,
            b2: wc2 / a0,
            a1: 2.0 * (wc2 - 1.0) / a0,
            a2: (1.0 - two_zeta_wc + wc2) / a0,
        });
    }
    sections
}

fn bandstop_sections(normalized_low: f64, normalized_high: f64, order: usize) -> Vec<Biquad> {
    let w1 = (PI * normalized_low).tan();
    let w2 = (PI * normalized_high).tan();
    let bandwidth = w2 - w1;
    let w0_sq = w1 * w2;

    // Each prototype pole p maps to the roots of s^2 - (B/p) s + w0^2.
    let mut poles = Vec::with_capacity(2 * order);
    for k in 0..order {
        let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
        let p = Complex64::from_polar(1.0, theta);
        let half = Complex64::new(bandwidth, 0.0) / (p * 2.0);
        let disc = (half * half - w0_sq).sqrt();
        poles.push(bilinear(half + disc));
        poles.push(bilinear(half - disc));
    }
    let notch = bilinear(Complex64::new(0.0, w0_sq.sqrt()));

    pair_conjugates(&poles)
        .into_iter()
        .map(|(p1, p2)| {
            let mut section = Biquad {
                b0: 1.0,
                b1: -2.0 * notch.re,
                b2: 1.0,
                a1: -(p1 + p2).re,
                a2: (p1 * p2).re,
            };
            let gain = section.dc_gain();
            section.b0 /= gain;
            section.b1 /= gain;
            section.b2 /= gain;
            section
        })
        .collect()
}

fn bilinear(s: Complex64) -> Complex64 {
    (1.0 + s) / (1.0 - s)
}

fn pair_conjugates(poles: &[Complex64]) -> Vec<(Complex64, Complex64)> {
    const IMAG_EPS: f64 = 1e-10;
    let mut pairs = Vec::with_capacity(poles.len() / 2);
    let mut reals = Vec::new();
    for p in poles {
        if p.im > IMAG_EPS {
            pairs.push((*p, p.conj()));
        } else if p.im.abs() <= IMAG_EPS {
            reals.push(Complex64::new(p.re, 0.0));
        }
    }
    reals.sort_by(|a, b| a.re.total_cmp(&b.re));
    for chunk in reals.chunks(2) {
        let second = chunk.get(1).copied().unwrap_or(Complex64::new(0.0, 0.0));
        pairs.push((chunk[0], second));
    }
    pairs
}
