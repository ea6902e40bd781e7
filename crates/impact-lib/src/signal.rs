use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One recorded acceleration sample as handed over by the ingestion layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Timestamp in milliseconds
    pub time_ms: f64,
    /// Acceleration in the channel's native unit (g)
    pub accel: f64,
}

impl RawSample {
    pub fn new(time_ms: f64, accel: f64) -> Self {
        Self { time_ms, accel }
    }
}

/// One tick of the conditioned output. `None` means the series was not computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSample {
    pub time_ms: f64,
    pub accel_raw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel_filtered: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jerk: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub derived: BTreeMap<String, f64>,
}

impl ProcessedSample {
    /// The value metrics should read: filtered when present, raw otherwise.
    pub fn accel(&self) -> f64 {
        self.accel_filtered.unwrap_or(self.accel_raw)
    }
}

/// Contiguous index range into a sample array around a detected peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactWindow {
    pub start_idx: usize,
    pub end_idx: usize,
    pub peak_idx: usize,
    pub start_time_ms: f64,
    pub end_time_ms: f64,
    pub peak_accel: f64,
}

impl ImpactWindow {
    pub fn len(&self) -> usize {
        self.end_idx - self.start_idx + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end_idx < self.start_idx
    }

    pub fn duration_ms(&self) -> f64 {
        self.end_time_ms - self.start_time_ms
    }
}

/// Inclusive time range used to scope metrics (chart zoom).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub min_ms: f64,
    pub max_ms: f64,
}

impl TimeRange {
    pub fn new(min_ms: f64, max_ms: f64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn contains(&self, time_ms: f64) -> bool {
        time_ms >= self.min_ms && time_ms <= self.max_ms
    }

    /// Index bounds of the samples inside this range, if any.
    pub fn index_bounds(&self, times_ms: &[f64]) -> Option<(usize, usize)> {
        let start = times_ms.iter().position(|&t| t >= self.min_ms)?;
        let end = times_ms.iter().rposition(|&t| t <= self.max_ms)?;
        (start <= end).then_some((start, end))
    }
}

/// Reject empty, non-finite or time-reversed input before anything else touches it.
pub fn validate_samples(samples: &[RawSample]) -> Result<()> {
    if samples.is_empty() {
        return Err(EngineError::EmptyInput);
    }
    for (index, sample) in samples.iter().enumerate() {
        if !sample.time_ms.is_finite() || !sample.accel.is_finite() {
            return Err(EngineError::NonFiniteSample { index });
        }
    }
    for (index, pair) in samples.windows(2).enumerate() {
        if pair[1].time_ms < pair[0].time_ms {
            return Err(EngineError::NonMonotonicTime {
                index: index + 1,
                previous_ms: pair[0].time_ms,
                current_ms: pair[1].time_ms,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_reversed_input() {
        assert_eq!(validate_samples(&[]), Err(EngineError::EmptyInput));
        let reversed = [RawSample::new(0.0, 0.0), RawSample::new(2.0, 0.0), RawSample::new(1.0, 0.0)];
        assert!(matches!(
            validate_samples(&reversed),
            Err(EngineError::NonMonotonicTime { index: 2, .. })
        ));
        let nan = [RawSample::new(0.0, f64::NAN)];
        assert_eq!(
            validate_samples(&nan),
            Err(EngineError::NonFiniteSample { index: 0 })
        );
    }

    #[test]
    fn accepts_duplicate_timestamps() {
        let dup = [RawSample::new(0.0, 0.0), RawSample::new(0.0, 1.0), RawSample::new(1.0, 0.0)];
        assert!(validate_samples(&dup).is_ok());
    }

    #[test]
    fn time_range_bounds() {
        let times = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(TimeRange::new(0.5, 3.0).index_bounds(&times), Some((1, 3)));
        assert_eq!(TimeRange::new(10.0, 20.0).index_bounds(&times), None);
    }

    #[test]
    fn processed_sample_prefers_filtered_value() {
        let mut s = ProcessedSample {
            time_ms: 0.0,
            accel_raw: 2.0,
            accel_filtered: None,
            jerk: None,
            derived: BTreeMap::new(),
        };
        assert_eq!(s.accel(), 2.0);
        s.accel_filtered = Some(0.0);
        assert_eq!(s.accel(), 0.0);
    }
}
