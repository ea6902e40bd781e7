//! Ringing analysis of the impact window: FFT peak picking and a zero-crossing estimate
//! used to size smoothing windows.

use crate::error::{EngineError, Result};
use crate::filters::odd_at_least;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub band_low_hz: f64,
    pub band_high_hz: f64,
    pub max_peaks: usize,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            band_low_hz: 5.0,
            band_high_hz: 300.0,
            max_peaks: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    pub frequency_hz: f64,
    pub amplitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumReport {
    /// Strongest in-band peaks, ordered by frequency.
    pub peaks: Vec<SpectralPeak>,
    pub resolution_hz: f64,
    pub fft_len: usize,
    pub segment_len: usize,
}

impl SpectrumReport {
    pub fn dominant(&self) -> Option<SpectralPeak> {
        self.peaks
            .iter()
            .copied()
            .max_by(|a, b| a.amplitude.total_cmp(&b.amplitude))
    }
}

/// Detrend, taper, zero-pad and pick the strongest in-band peaks of `segment`.
pub fn spectrum_peaks(segment: &[f64], fs: f64, cfg: &SpectrumConfig) -> Result<SpectrumReport> {
    if segment.len() < 4 {
        return Err(EngineError::InsufficientData {
            needed: 4,
            got: segment.len(),
        });
    }
    if !(fs > 0.0) {
        return Err(EngineError::DegenerateTimebase(format!("sample rate {fs} Hz")));
    }
    let n = segment.len();
    let fft_len = n.next_power_of_two();
    let mean = segment.iter().sum::<f64>() / n as f64;
    let window = hann(n);
    let window_sum: f64 = window.iter().sum();

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(fft_len);
    let mut frame = r2c.make_input_vec();
    for (slot, (x, w)) in frame.iter_mut().zip(segment.iter().zip(&window)) {
        *slot = (x - mean) * w;
    }
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut frame, &mut spectrum)
        .map_err(|e| EngineError::Fft(e.to_string()))?;

    let resolution_hz = fs / fft_len as f64;
    let scale = 2.0 / window_sum.max(f64::EPSILON);
    let magnitude: Vec<f64> = spectrum.iter().map(|c| c.norm() * scale).collect();

    let mut peaks: Vec<SpectralPeak> = (1..magnitude.len().saturating_sub(1))
        .filter(|&k| magnitude[k] > magnitude[k - 1] && magnitude[k] >= magnitude[k + 1])
        .map(|k| SpectralPeak {
            frequency_hz: k as f64 * resolution_hz,
            amplitude: magnitude[k],
        })
        .filter(|p| p.frequency_hz >= cfg.band_low_hz && p.frequency_hz <= cfg.band_high_hz)
        .collect();
    peaks.sort_by(|a, b| b.amplitude.total_cmp(&a.amplitude));
    peaks.truncate(cfg.max_peaks);
    peaks.sort_by(|a, b| a.frequency_hz.total_cmp(&b.frequency_hz));

    Ok(SpectrumReport {
        peaks,
        resolution_hz,
        fft_len,
        segment_len: n,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RingingEstimate {
    pub frequency_hz: f64,
    pub crossings: usize,
    pub duration_s: f64,
}

/// Ringing frequency from sign changes of the detrended segment (two per cycle).
pub fn ringing_from_zero_crossings(segment: &[f64], fs: f64) -> Option<RingingEstimate> {
    if segment.len() < 3 || !(fs > 0.0) {
        return None;
    }
    let mean = segment.iter().sum::<f64>() / segment.len() as f64;
    let crossings = segment
        .windows(2)
        .filter(|w| ((w[0] - mean) < 0.0) != ((w[1] - mean) < 0.0))
        .count();
    if crossings < 2 {
        return None;
    }
    let duration_s = segment.len() as f64 / fs;
    Some(RingingEstimate {
        frequency_hz: (crossings as f64 / 2.0) / duration_s,
        crossings,
        duration_s,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoWindowConfig {
    /// Window length as a multiple of the ringing period.
    pub period_factor: f64,
    pub min_window: usize,
    pub max_window: usize,
}

impl Default for AutoWindowConfig {
    fn default() -> Self {
        Self {
            period_factor: 0.5,
            min_window: 7,
            max_window: 41,
        }
    }
}

/// Smoothing window sized from the ringing period, forced odd and kept in range.
pub fn auto_window(ringing_hz: f64, fs: f64, cfg: &AutoWindowConfig) -> usize {
    let max = if cfg.max_window % 2 == 0 {
        cfg.max_window.saturating_sub(1)
    } else {
        cfg.max_window
    };
    if !(ringing_hz > 0.0) || !(fs > 0.0) {
        return cfg.min_window.max(3) | 1;
    }
    let period_samples = fs / ringing_hz;
    let raw = (period_samples * cfg.period_factor).round().max(0.0) as usize;
    odd_at_least(raw, cfg.min_window).min(max.max(3))
}

fn hann(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size as f64)).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ringing(fs: f64, n: usize, freq: f64, amp: f64, offset: f64) -> Vec<f64> {
        (0..n)
            .map(|i| offset + amp * (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn finds_dominant_ringing_frequency() {
        let fs = 2000.0;
        let mut seg = ringing(fs, 320, 120.0, 3.0, 10.0);
        for (i, v) in seg.iter_mut().enumerate() {
            *v += 1.0 * (2.0 * PI * 40.0 * i as f64 / fs).sin();
        }
        let report = spectrum_peaks(&seg, fs, &SpectrumConfig::default()).unwrap();
        assert_eq!(report.fft_len, 512);
        assert!(report.peaks.len() <= 5);
        let dominant = report.dominant().unwrap();
        assert!((dominant.frequency_hz - 120.0).abs() <= report.resolution_hz);
        assert!(report
            .peaks
            .windows(2)
            .all(|w| w[0].frequency_hz <= w[1].frequency_hz));
        assert!(report.peaks.iter().any(|p| (p.frequency_hz - 40.0).abs() <= report.resolution_hz));
    }

    #[test]
    fn peaks_outside_band_are_dropped() {
        let fs = 2000.0;
        let seg = ringing(fs, 256, 600.0, 1.0, 0.0);
        let report = spectrum_peaks(&seg, fs, &SpectrumConfig::default()).unwrap();
        assert!(report.peaks.iter().all(|p| p.frequency_hz <= 300.0));
        assert!(report.peaks.iter().all(|p| p.amplitude < 0.1));
    }

    #[test]
    fn zero_crossings_track_frequency() {
        let est = ringing_from_zero_crossings(&ringing(1000.0, 160, 50.0, 2.0, 4.0), 1000.0).unwrap();
        assert!((est.frequency_hz - 50.0).abs() < 5.0, "{}", est.frequency_hz);
        assert!(ringing_from_zero_crossings(&[1.0, 1.0, 1.0, 1.0], 1000.0).is_none());
    }

    #[test]
    fn auto_window_is_odd_and_clamped() {
        let cfg = AutoWindowConfig::default();
        // 100 Hz at 2 kHz: 20-sample period, half of it is 10 -> 11.
        assert_eq!(auto_window(100.0, 2000.0, &cfg), 11);
        // Fast ringing hits the lower clamp, slow ringing the upper one.
        assert_eq!(auto_window(900.0, 2000.0, &cfg), 7);
        assert_eq!(auto_window(5.0, 2000.0, &cfg), 41);
        for hz in [13.0, 47.0, 88.0, 150.0, 333.0] {
            let w = auto_window(hz, 10_000.0, &cfg);
            assert_eq!(w % 2, 1);
            assert!((7..=41).contains(&w));
        }
    }

    #[test]
    fn short_segment_is_rejected() {
        assert!(matches!(
            spectrum_peaks(&[1.0, 2.0], 1000.0, &SpectrumConfig::default()),
            Err(EngineError::InsufficientData { .. })
        ));
    }
}
