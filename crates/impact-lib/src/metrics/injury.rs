use super::{
    contact::ContactConfig,
    dri::{compute_dri, DriConfig, DriResult},
    energy::{compute_impact_energy, EnergyConfig, ImpactEnergyResult},
    hic::{hic, HicResult},
    threshold::{time_over_threshold, ThresholdAccounting, ThresholdDuration},
};
use crate::{
    error::{EngineError, Result},
    signal::TimeRange,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub thresholds_g: Vec<f64>,
    pub hic_windows_ms: Vec<f64>,
    pub accounting: ThresholdAccounting,
    pub contact: ContactConfig,
    pub dri: DriConfig,
    pub energy: EnergyConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            thresholds_g: vec![20.0, 38.0],
            hic_windows_ms: vec![15.0, 36.0],
            accounting: ThresholdAccounting::default(),
            contact: ContactConfig::default(),
            dri: DriConfig::default(),
            energy: EnergyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryMetrics {
    pub peak_accel: f64,
    pub peak_time_ms: f64,
    pub window_start_ms: f64,
    pub window_end_ms: f64,
    pub total_duration_ms: f64,
    pub sample_count: usize,
    pub time_over_threshold: Vec<ThresholdDuration>,
    pub hic: Vec<HicResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dri: Option<DriResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<ImpactEnergyResult>,
}

impl InjuryMetrics {
    pub fn hic_for(&self, window_ms: f64) -> Option<&HicResult> {
        self.hic.iter().find(|h| (h.window_ms - window_ms).abs() < 1e-9)
    }

    pub fn time_over(&self, threshold_g: f64) -> Option<f64> {
        self.time_over_threshold
            .iter()
            .find(|d| (d.threshold_g - threshold_g).abs() < 1e-9)
            .map(|d| d.duration_ms)
    }
}

/// All injury metrics for the samples inside `range` (the whole series when `None`).
///
/// `time_ms` and `accel` are the full rebased series: energy integrates from its first sample
/// and the DRI baseline may look back before the range.
pub fn compute_injury_metrics(
    time_ms: &[f64],
    accel: &[f64],
    range: Option<TimeRange>,
    cfg: &MetricsConfig,
) -> Result<InjuryMetrics> {
    let n = time_ms.len().min(accel.len());
    if n == 0 {
        return Err(EngineError::EmptyInput);
    }
    let (time_ms, accel) = (&time_ms[..n], &accel[..n]);
    let (lo, hi) = match range {
        Some(r) => r
            .index_bounds(time_ms)
            .ok_or(EngineError::InsufficientData { needed: 1, got: 0 })?,
        None => (0, n - 1),
    };
    let t = &time_ms[lo..=hi];
    let a = &accel[lo..=hi];

    let (peak_offset, peak_accel) = a
        .iter()
        .copied()
        .enumerate()
        .max_by(|x, y| x.1.total_cmp(&y.1))
        .ok_or(EngineError::EmptyInput)?;

    let time_over_threshold = cfg
        .thresholds_g
        .iter()
        .map(|&threshold_g| ThresholdDuration {
            threshold_g,
            duration_ms: time_over_threshold(t, a, threshold_g, cfg.accounting),
        })
        .collect();

    let magnitude: Vec<f64> = a.iter().map(|v| v.abs()).collect();
    let hic = cfg
        .hic_windows_ms
        .iter()
        .map(|&w| hic(t, &magnitude, w))
        .collect();

    let dri = compute_dri(time_ms, accel, (lo, hi), &cfg.contact, &cfg.dri);
    let energy = compute_impact_energy(time_ms, accel, (lo, hi), &cfg.contact, &cfg.energy);

    Ok(InjuryMetrics {
        peak_accel,
        peak_time_ms: t[peak_offset],
        window_start_ms: t[0],
        window_end_ms: t[t.len() - 1],
        total_duration_ms: t[t.len() - 1] - t[0],
        sample_count: t.len(),
        time_over_threshold,
        hic,
        dri,
        energy,
    })
}
