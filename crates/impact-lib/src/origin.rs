//! Free-fall onset detection and time rebasing.

use crate::{
    error::{EngineError, Result},
    signal::RawSample,
};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// First sample below this value (g) marks free-fall onset.
    pub free_fall_threshold_g: f64,
    /// Baseline kept ahead of the onset (ms).
    pub pre_event_buffer_ms: f64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            free_fall_threshold_g: -0.5,
            pre_event_buffer_ms: 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    /// Index of the first kept sample in the input series.
    pub index: usize,
    /// Time of that sample in the input timebase.
    pub time_ms: f64,
    /// First sample below the free-fall threshold, if any.
    pub crossing_time_ms: Option<f64>,
}

impl Origin {
    pub fn free_fall_detected(&self) -> bool {
        self.crossing_time_ms.is_some()
    }
}

/// Index of the first sample below the free-fall threshold.
pub fn free_fall_onset(samples: &[RawSample], cfg: &OriginConfig) -> Result<usize> {
    samples
        .iter()
        .position(|s| s.accel < cfg.free_fall_threshold_g)
        .ok_or(EngineError::NoFreeFallFound)
}

pub fn detect_origin(samples: &[RawSample], cfg: &OriginConfig) -> Origin {
    let Some(first) = samples.first() else {
        return Origin {
            index: 0,
            time_ms: 0.0,
            crossing_time_ms: None,
        };
    };
    let Ok(onset) = free_fall_onset(samples, cfg) else {
        debug!("no free-fall crossing below {} g; origin left at first sample", cfg.free_fall_threshold_g);
        return Origin {
            index: 0,
            time_ms: first.time_ms,
            crossing_time_ms: None,
        };
    };

    let crossing_ms = samples[onset].time_ms;
    let target = (crossing_ms - cfg.pre_event_buffer_ms).max(first.time_ms);
    let index = samples
        .iter()
        .position(|s| s.time_ms >= target)
        .unwrap_or(0);
    debug!(
        "free fall at {crossing_ms} ms; origin at sample {index} ({} ms)",
        samples[index].time_ms
    );
    Origin {
        index,
        time_ms: samples[index].time_ms,
        crossing_time_ms: Some(crossing_ms),
    }
}

/// Drop samples ahead of the origin and shift time so the first kept sample is t = 0.
pub fn rebase(samples: &[RawSample], origin: &Origin) -> Vec<RawSample> {
    samples
        .iter()
        .skip(origin.index)
        .map(|s| RawSample::new(s.time_ms - origin.time_ms, s.accel))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drop_profile(rest_ms: usize, fall_ms: usize) -> Vec<RawSample> {
        (0..rest_ms + fall_ms)
            .map(|i| {
                let accel = if i < rest_ms { 0.0 } else { -1.0 };
                RawSample::new(1000.0 + i as f64, accel)
            })
            .collect()
    }

    #[test]
    fn keeps_pre_event_buffer() {
        let samples = drop_profile(500, 100);
        let origin = detect_origin(&samples, &OriginConfig::default());
        assert_eq!(free_fall_onset(&samples, &OriginConfig::default()), Ok(500));
        assert_eq!(origin.crossing_time_ms, Some(1500.0));
        assert_eq!(origin.time_ms, 1300.0);
        assert_eq!(origin.index, 300);

        let rebased = rebase(&samples, &origin);
        assert_eq!(rebased[0].time_ms, 0.0);
        assert_eq!(rebased.len(), 300);
        assert_eq!(rebased[200].accel, -1.0);
        assert_eq!(rebased[199].accel, 0.0);
    }

    #[test]
    fn short_lead_in_clamps_to_first_sample() {
        let samples = drop_profile(50, 100);
        let origin = detect_origin(&samples, &OriginConfig::default());
        assert_eq!(origin.index, 0);
        assert_eq!(origin.time_ms, 1000.0);
        assert!(origin.free_fall_detected());
    }

    #[test]
    fn no_free_fall_keeps_everything() {
        let samples: Vec<RawSample> = (0..100).map(|i| RawSample::new(i as f64 + 5.0, 0.2)).collect();
        assert_eq!(
            free_fall_onset(&samples, &OriginConfig::default()),
            Err(EngineError::NoFreeFallFound)
        );
        let origin = detect_origin(&samples, &OriginConfig::default());
        assert!(!origin.free_fall_detected());
        let rebased = rebase(&samples, &origin);
        assert_eq!(rebased.len(), 100);
        assert_eq!(rebased[0].time_ms, 0.0);
        assert_eq!(rebased[99].time_ms, 99.0);
    }
}
