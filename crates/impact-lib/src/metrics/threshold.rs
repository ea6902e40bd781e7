use serde::{Deserialize, Serialize};

/// How an interval with one endpoint above the threshold is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdAccounting {
    /// Linear-interpolated share of the interval that lies above.
    #[default]
    Interpolated,
    /// Only intervals with both endpoints above.
    FullIntervalsOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDuration {
    pub threshold_g: f64,
    pub duration_ms: f64,
}

/// Total time (ms) the signal spends above `threshold`.
pub fn time_over_threshold(
    time_ms: &[f64],
    accel: &[f64],
    threshold: f64,
    accounting: ThresholdAccounting,
) -> f64 {
    let n = time_ms.len().min(accel.len());
    let mut total = 0.0;
    for k in 1..n {
        let dt = time_ms[k] - time_ms[k - 1];
        let (a0, a1) = (accel[k - 1], accel[k]);
        match (a0 > threshold, a1 > threshold) {
            (true, true) => total += dt,
            (false, false) => {}
            (true, false) if accounting == ThresholdAccounting::Interpolated => {
                total += dt * (a0 - threshold) / (a0 - a1);
            }
            (false, true) if accounting == ThresholdAccounting::Interpolated => {
                total += dt * (a1 - threshold) / (a1 - a0);
            }
            _ => {}
        }
    }
    total
}
