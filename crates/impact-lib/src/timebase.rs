//! Sample-rate estimation and uniform resampling.

use crate::error::{EngineError, Result};
use crate::signal::RawSample;
use serde::{Deserialize, Serialize};

/// Number of leading positive deltas averaged by [`estimate_sample_rate_hz`].
const RATE_ESTIMATE_DELTAS: usize = 10;

/// Estimated rate plus the rounded value used for filter design.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRate {
    pub hz: f64,
    pub design_hz: f64,
    pub dt_ms: f64,
}

impl SampleRate {
    pub fn from_dt_ms(dt_ms: f64) -> Self {
        let hz = 1000.0 / dt_ms;
        Self {
            hz,
            design_hz: hz.round().max(1.0),
            dt_ms,
        }
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_ms / 1000.0
    }
}

/// Average of the first ten positive deltas, returned as Hz.
pub fn estimate_sample_rate_hz(samples: &[RawSample]) -> Result<f64> {
    Ok(estimate_sample_rate(samples)?.hz)
}

pub fn estimate_sample_rate(samples: &[RawSample]) -> Result<SampleRate> {
    if samples.len() < 2 {
        return Err(EngineError::InsufficientData {
            needed: 2,
            got: samples.len(),
        });
    }
    let deltas: Vec<f64> = positive_deltas(samples)
        .take(RATE_ESTIMATE_DELTAS)
        .collect();
    if deltas.is_empty() {
        return Err(EngineError::DegenerateTimebase(
            "all timestamps are identical".into(),
        ));
    }
    let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
    if mean <= 0.0 {
        return Err(EngineError::DegenerateTimebase(format!(
            "mean sample spacing {mean} ms"
        )));
    }
    Ok(SampleRate::from_dt_ms(mean))
}

/// Uniform grid produced by [`resample_to_uniform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resampled {
    pub samples: Vec<RawSample>,
    pub rate: SampleRate,
}

/// Put the series on a uniform grid spaced by the median positive delta.
///
/// Duplicate timestamps are averaged before the grid is built. The grid runs from the first to
/// the last timestamp; when the span is not a whole number of steps the last sample is kept as a
/// shorter final step.
pub fn resample_to_uniform(samples: &[RawSample]) -> Result<Resampled> {
    if samples.len() < 2 {
        return Err(EngineError::InsufficientData {
            needed: 2,
            got: samples.len(),
        });
    }
    let merged = merge_duplicate_timestamps(samples);
    if merged.len() < 2 {
        return Err(EngineError::DegenerateTimebase(
            "all timestamps are identical".into(),
        ));
    }
    let dt_ms = median_delta_ms(&merged)?;

    let first = merged[0].time_ms;
    let last = merged[merged.len() - 1].time_ms;
    // Tolerate accumulated float error so an exact multiple still lands on the last tick.
    let ticks = ((last - first) / dt_ms + 1e-9).floor() as usize + 1;

    let mut out = Vec::with_capacity(ticks);
    let mut cursor = 0usize;
    for k in 0..ticks {
        let t = first + k as f64 * dt_ms;
        while cursor + 1 < merged.len() && merged[cursor + 1].time_ms < t {
            cursor += 1;
        }
        out.push(RawSample::new(t, interpolate_at(&merged, cursor, t)));
    }
    let end = merged[merged.len() - 1];
    if out.last().is_some_and(|s| end.time_ms - s.time_ms > 1e-9 * dt_ms) {
        out.push(end);
    }

    Ok(Resampled {
        samples: out,
        rate: SampleRate::from_dt_ms(dt_ms),
    })
}

/// Upper median (`sorted[len / 2]`) of the positive deltas.
pub fn median_delta_ms(samples: &[RawSample]) -> Result<f64> {
    let mut deltas: Vec<f64> = positive_deltas(samples).collect();
    if deltas.is_empty() {
        return Err(EngineError::DegenerateTimebase(
            "no positive sample spacing".into(),
        ));
    }
    deltas.sort_by(f64::total_cmp);
    Ok(deltas[deltas.len() / 2])
}

/// True when every positive delta sits within `tolerance` (relative) of the median.
pub fn is_uniform(samples: &[RawSample], tolerance: f64) -> bool {
    let Ok(median) = median_delta_ms(samples) else {
        return false;
    };
    samples
        .windows(2)
        .all(|w| ((w[1].time_ms - w[0].time_ms) - median).abs() <= tolerance * median)
}

fn positive_deltas(samples: &[RawSample]) -> impl Iterator<Item = f64> + '_ {
    samples
        .windows(2)
        .map(|w| w[1].time_ms - w[0].time_ms)
        .filter(|d| *d > 0.0)
}

fn merge_duplicate_timestamps(samples: &[RawSample]) -> Vec<RawSample> {
    let mut out: Vec<RawSample> = Vec::with_capacity(samples.len());
    let mut run_sum = 0.0;
    let mut run_len = 0usize;
    for sample in samples {
        match out.last_mut() {
            Some(last) if last.time_ms == sample.time_ms => {
                run_sum += sample.accel;
                run_len += 1;
                last.accel = run_sum / run_len as f64;
            }
            _ => {
                out.push(*sample);
                run_sum = sample.accel;
                run_len = 1;
            }
        }
    }
    out
}

fn interpolate_at(samples: &[RawSample], cursor: usize, t: f64) -> f64 {
    let first = samples[0];
    let last = samples[samples.len() - 1];
    if t <= first.time_ms {
        return first.accel;
    }
    if t >= last.time_ms {
        return last.accel;
    }
    let a = samples[cursor];
    let b = samples[(cursor + 1).min(samples.len() - 1)];
    let span = b.time_ms - a.time_ms;
    if span <= 0.0 {
        return a.accel;
    }
    let frac = (t - a.time_ms) / span;
    a.accel + frac * (b.accel - a.accel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(f64, f64)]) -> Vec<RawSample> {
        points.iter().map(|&(t, a)| RawSample::new(t, a)).collect()
    }

    #[test]
    fn estimates_rate_from_leading_deltas() {
        let samples: Vec<RawSample> = (0..50).map(|i| RawSample::new(i as f64 * 0.5, 0.0)).collect();
        let rate = estimate_sample_rate(&samples).unwrap();
        assert!((rate.hz - 2000.0).abs() < 1e-9);
        assert_eq!(rate.design_hz, 2000.0);
    }

    #[test]
    fn rate_keeps_sub_hz_precision_but_rounds_for_design() {
        let samples: Vec<RawSample> = (0..20).map(|i| RawSample::new(i as f64 * 0.3, 0.0)).collect();
        let rate = estimate_sample_rate(&samples).unwrap();
        assert!((rate.hz - 3333.333).abs() < 1e-2);
        assert_eq!(rate.design_hz, 3333.0);
    }

    #[test]
    fn rate_estimate_errors() {
        assert_eq!(
            estimate_sample_rate_hz(&series(&[(0.0, 0.0)])),
            Err(EngineError::InsufficientData { needed: 2, got: 1 })
        );
        assert!(matches!(
            estimate_sample_rate_hz(&series(&[(1.0, 0.0), (1.0, 2.0)])),
            Err(EngineError::DegenerateTimebase(_))
        ));
    }

    #[test]
    fn resample_uses_median_and_keeps_last_sample() {
        let out = resample_to_uniform(&series(&[(0.0, 0.0), (5.0, 5.0), (20.0, 20.0)])).unwrap();
        assert_eq!(out.rate.dt_ms, 15.0);
        let times: Vec<f64> = out.samples.iter().map(|s| s.time_ms).collect();
        assert_eq!(times, vec![0.0, 15.0, 20.0]);
        assert!((out.samples[1].accel - 15.0).abs() < 1e-12);
        assert_eq!(out.samples[2], RawSample::new(20.0, 20.0));
    }

    #[test]
    fn resample_two_points_spans_whole_record() {
        let out = resample_to_uniform(&series(&[(0.0, 0.0), (10.0, 10.0)])).unwrap();
        assert_eq!(out.samples.len(), 2);
        assert_eq!(out.samples[1], RawSample::new(10.0, 10.0));
    }

    #[test]
    fn resample_averages_duplicates() {
        let out = resample_to_uniform(&series(&[
            (0.0, 0.0),
            (1.0, 2.0),
            (1.0, 4.0),
            (2.0, 0.0),
            (3.0, 0.0),
        ]))
        .unwrap();
        assert_eq!(out.rate.dt_ms, 1.0);
        assert_eq!(out.samples.len(), 4);
        assert!((out.samples[1].accel - 3.0).abs() < 1e-12);
    }

    #[test]
    fn resample_interpolates_irregular_spacing() {
        let out = resample_to_uniform(&series(&[
            (0.0, 0.0),
            (1.0, 1.0),
            (2.5, 2.5),
            (3.0, 3.0),
            (4.0, 4.0),
        ]))
        .unwrap();
        assert_eq!(out.rate.dt_ms, 1.0);
        for s in &out.samples {
            assert!((s.accel - s.time_ms).abs() < 1e-12);
        }
    }

    #[test]
    fn uniformity_check() {
        let uniform: Vec<RawSample> = (0..10).map(|i| RawSample::new(i as f64, 0.0)).collect();
        assert!(is_uniform(&uniform, 0.01));
        assert!(!is_uniform(&series(&[(0.0, 0.0), (5.0, 5.0), (20.0, 20.0)]), 0.01));
    }
}
