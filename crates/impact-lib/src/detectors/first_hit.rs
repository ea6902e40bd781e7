use crate::{
    error::{EngineError, Result},
    signal::ImpactWindow,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Tunables for the first-impact detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirstHitConfig {
    /// Longest lead-in used for the baseline (ms).
    pub baseline_ms: f64,
    /// Baseline never covers more than this share of the record.
    pub baseline_fraction: f64,
    /// Absolute floor on the peak deviation from baseline.
    pub min_peak_deviation: f64,
    /// Peak deviation must also exceed this many baseline standard deviations.
    pub sigma_multiplier: f64,
    /// Onset is where deviation falls under this share of the peak amplitude.
    pub onset_fraction: f64,
    /// Extra lead added ahead of the onset (ms).
    pub onset_pad_ms: f64,
    /// Settled means deviation under this share of the peak amplitude...
    pub settle_fraction: f64,
    /// ...for at least this long (ms).
    pub settle_run_ms: f64,
    /// Hard cap on window length measured from the padded onset (ms).
    pub max_hit_ms: f64,
}

impl Default for FirstHitConfig {
    fn default() -> Self {
        Self {
            baseline_ms: 200.0,
            baseline_fraction: 0.1,
            min_peak_deviation: 5.0,
            sigma_multiplier: 4.0,
            onset_fraction: 0.05,
            onset_pad_ms: 10.0,
            settle_fraction: 0.10,
            settle_run_ms: 40.0,
            max_hit_ms: 200.0,
        }
    }
}

/// Detected window plus the baseline statistics that drove it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FirstHit {
    pub window: ImpactWindow,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub threshold: f64,
    /// True when no local maximum qualified and the global maximum was used.
    pub used_global_max: bool,
}

/// Locate the first impact: the first significant peak, the onset ahead of it and the
/// point where the signal settles after it.
pub fn detect_first_hit(time_ms: &[f64], accel: &[f64], cfg: &FirstHitConfig) -> Result<FirstHit> {
    let n = time_ms.len().min(accel.len());
    if n < 3 {
        return Err(EngineError::InsufficientData { needed: 3, got: n });
    }
    let (time_ms, accel) = (&time_ms[..n], &accel[..n]);

    let t0 = time_ms[0];
    let duration = time_ms[n - 1] - t0;
    let span = cfg.baseline_ms.min(cfg.baseline_fraction * duration);
    let baseline_len = time_ms
        .iter()
        .take_while(|&&t| t - t0 <= span)
        .count()
        .max(1);
    let (mean, std) = mean_std(&accel[..baseline_len]);
    let threshold = cfg.min_peak_deviation.max(cfg.sigma_multiplier * std);

    let deviation: Vec<f64> = accel.iter().map(|a| (a - mean).abs()).collect();

    let local = (1..n - 1).find(|&i| {
        deviation[i] > threshold && deviation[i] >= deviation[i - 1] && deviation[i] >= deviation[i + 1]
    });
    let (peak, used_global_max) = match local {
        Some(i) => (i, false),
        None => {
            let (i, d) = deviation
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .ok_or(EngineError::NoSignificantPeak { threshold })?;
            if d <= threshold {
                return Err(EngineError::NoSignificantPeak { threshold });
            }
            (i, true)
        }
    };
    let amplitude = deviation[peak];

    let onset_limit = cfg.onset_fraction * amplitude;
    let onset = (0..peak)
        .rev()
        .find(|&j| deviation[j] < onset_limit)
        .unwrap_or(0);
    let start_time = time_ms[onset] - cfg.onset_pad_ms;
    let start = time_ms[..=onset]
        .iter()
        .position(|&t| t >= start_time)
        .unwrap_or(onset);

    let cap_time = time_ms[start] + cfg.max_hit_ms;
    let cap = time_ms
        .iter()
        .rposition(|&t| t <= cap_time)
        .unwrap_or(n - 1)
        .max(peak);

    let settle_limit = cfg.settle_fraction * amplitude;
    let mut run_start: Option<usize> = None;
    let mut settled = None;
    for k in peak + 1..n {
        if deviation[k] < settle_limit {
            let rs = *run_start.get_or_insert(k);
            if time_ms[k] - time_ms[rs] >= cfg.settle_run_ms {
                settled = Some(rs);
                break;
            }
        } else {
            run_start = None;
        }
    }
    let end = settled.map_or(cap, |s| s.min(cap)).max(peak);

    debug!(
        "first hit: peak {peak} ({:.2}), onset {onset}, window {start}..={end}, baseline {mean:.3}±{std:.3}",
        accel[peak]
    );

    Ok(FirstHit {
        window: ImpactWindow {
            start_idx: start,
            end_idx: end,
            peak_idx: peak,
            start_time_ms: time_ms[start],
            end_time_ms: time_ms[end],
            peak_accel: accel[peak],
        },
        baseline_mean: mean,
        baseline_std: std,
        threshold,
        used_global_max,
    })
}

fn mean_std(data: &[f64]) -> (f64, f64) {
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// 1 kHz record: rest, free fall, half-sine impact, rebound flight, second smaller hit.
    fn two_hit_record() -> (Vec<f64>, Vec<f64>) {
        let mut time = Vec::new();
        let mut accel = Vec::new();
        for i in 0..1200 {
            let t = i as f64;
            let a = match i {
                0..=199 => 0.0,
                200..=499 => -1.0,
                500..=519 => -1.0 + 40.0 * (PI * (t - 500.0) / 20.0).sin(),
                520..=799 => -1.0,
                800..=814 => -1.0 + 12.0 * (PI * (t - 800.0) / 15.0).sin(),
                _ => 0.0,
            };
            time.push(t);
            accel.push(a);
        }
        (time, accel)
    }

    #[test]
    fn finds_first_of_two_hits() {
        let (t, a) = two_hit_record();
        let hit = detect_first_hit(&t, &a, &FirstHitConfig::default()).unwrap();
        let w = hit.window;
        assert!(!hit.used_global_max);
        assert_eq!(w.peak_idx, 510);
        assert!((w.peak_accel - 39.0).abs() < 1e-9);
        // Onset is just after 500 (deviation > 2 g), padded by 10 ms.
        assert!(w.start_idx >= 490 && w.start_idx <= 495, "start {}", w.start_idx);
        // Rebound flight (deviation 1 g) counts as settled right after the pulse.
        assert!(w.end_idx >= 519 && w.end_idx <= 521, "end {}", w.end_idx);
        assert!(w.start_idx <= w.peak_idx && w.peak_idx <= w.end_idx);
        assert_eq!(hit.baseline_mean, 0.0);
        assert_eq!(hit.threshold, 5.0);
    }

    #[test]
    fn noisy_tail_is_capped() {
        let mut time = Vec::new();
        let mut accel = Vec::new();
        for i in 0..1000 {
            time.push(i as f64);
            let a = if i < 300 {
                0.0
            } else if i == 300 {
                30.0
            } else {
                // Never settles: alternates well above 10% of the peak.
                if i % 2 == 0 { 8.0 } else { -8.0 }
            };
            accel.push(a);
        }
        let hit = detect_first_hit(&time, &accel, &FirstHitConfig::default()).unwrap();
        assert_eq!(hit.window.peak_idx, 300);
        assert!(hit.window.duration_ms() <= 200.0 + 1e-9);
    }

    #[test]
    fn flat_record_has_no_peak() {
        let time: Vec<f64> = (0..500).map(|i| i as f64).collect();
        let accel = vec![0.5; 500];
        assert!(matches!(
            detect_first_hit(&time, &accel, &FirstHitConfig::default()),
            Err(EngineError::NoSignificantPeak { .. })
        ));
    }

    #[test]
    fn monotone_ramp_falls_back_to_global_max() {
        let time: Vec<f64> = (0..400).map(|i| i as f64).collect();
        let accel: Vec<f64> = (0..400).map(|i| if i < 300 { 0.0 } else { (i - 300) as f64 * 0.2 }).collect();
        let hit = detect_first_hit(&time, &accel, &FirstHitConfig::default()).unwrap();
        assert!(hit.used_global_max);
        assert_eq!(hit.window.peak_idx, 399);
        assert_eq!(hit.window.end_idx, 399);
    }
}
