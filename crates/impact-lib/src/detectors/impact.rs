use crate::{
    error::{EngineError, Result},
    signal::ImpactWindow,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactWindowConfig {
    /// Largest sample must exceed this to count as an impact.
    pub min_peak: f64,
    /// Window extends this far either side of the peak (ms).
    pub half_width_ms: f64,
}

impl Default for ImpactWindowConfig {
    fn default() -> Self {
        Self {
            min_peak: 5.0,
            half_width_ms: 80.0,
        }
    }
}

/// Symmetric window around the largest sample. Used to scope spectral analysis only.
pub fn detect_impact_window(
    time_ms: &[f64],
    accel: &[f64],
    cfg: &ImpactWindowConfig,
) -> Result<ImpactWindow> {
    let n = time_ms.len().min(accel.len());
    let (peak, peak_accel) = accel[..n]
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or(EngineError::NoSignificantPeak {
            threshold: cfg.min_peak,
        })?;
    if peak_accel <= cfg.min_peak {
        return Err(EngineError::NoSignificantPeak {
            threshold: cfg.min_peak,
        });
    }
    let t_peak = time_ms[peak];
    let start = time_ms[..=peak]
        .iter()
        .position(|&t| t >= t_peak - cfg.half_width_ms)
        .unwrap_or(peak);
    let end = peak
        + time_ms[peak..n]
            .iter()
            .rposition(|&t| t <= t_peak + cfg.half_width_ms)
            .unwrap_or(0);
    Ok(ImpactWindow {
        start_idx: start,
        end_idx: end,
        peak_idx: peak,
        start_time_ms: time_ms[start],
        end_time_ms: time_ms[end],
        peak_accel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_symmetric_around_peak() {
        let time: Vec<f64> = (0..1000).map(|i| i as f64 * 0.5).collect();
        let mut accel = vec![0.0; 1000];
        accel[600] = 25.0;
        let w = detect_impact_window(&time, &accel, &ImpactWindowConfig::default()).unwrap();
        assert_eq!(w.peak_idx, 600);
        assert_eq!(w.start_time_ms, 220.0);
        assert_eq!(w.end_time_ms, 380.0);
        assert_eq!(w.len(), 321);
    }

    #[test]
    fn window_clamps_to_record() {
        let time: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let mut accel = vec![0.0; 100];
        accel[10] = 9.0;
        let w = detect_impact_window(&time, &accel, &ImpactWindowConfig::default()).unwrap();
        assert_eq!((w.start_idx, w.end_idx), (0, 90));
    }

    #[test]
    fn small_peaks_are_rejected() {
        let time: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let accel = vec![4.0; 100];
        assert!(detect_impact_window(&time, &accel, &ImpactWindowConfig::default()).is_err());
        assert!(detect_impact_window(&[], &[], &ImpactWindowConfig::default()).is_err());
    }
}
