use serde::{Deserialize, Serialize};

/// HIC for one window length, with the interval that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HicResult {
    pub window_ms: f64,
    pub value: f64,
    pub t1_ms: f64,
    pub t2_ms: f64,
}

impl HicResult {
    fn empty(window_ms: f64) -> Self {
        Self {
            window_ms,
            value: 0.0,
            t1_ms: 0.0,
            t2_ms: 0.0,
        }
    }
}

/// Head Injury Criterion over intervals no longer than `window_ms`.
///
/// `magnitude` is acceleration magnitude in g (callers take `|a|`); time is in ms and the
/// interval length enters the formula in seconds. The mean over `[t1, t2]` is the trapezoidal
/// integral divided by the interval, read from a prefix sum, so the search costs
/// O(n * samples-per-window).
pub fn hic(time_ms: &[f64], magnitude: &[f64], window_ms: f64) -> HicResult {
    let n = time_ms.len().min(magnitude.len());
    if n < 2 || !(window_ms > 0.0) || !window_ms.is_finite() {
        return HicResult::empty(window_ms);
    }

    let mut prefix = Vec::with_capacity(n);
    prefix.push(0.0);
    for k in 1..n {
        let dt = (time_ms[k] - time_ms[k - 1]) / 1000.0;
        prefix.push(prefix[k - 1] + 0.5 * (magnitude[k] + magnitude[k - 1]) * dt);
    }

    let limit = window_ms + 1e-9;
    let mut best = HicResult::empty(window_ms);
    for i in 0..n - 1 {
        for j in i + 1..n {
            let span_ms = time_ms[j] - time_ms[i];
            if span_ms > limit {
                break;
            }
            if span_ms <= 0.0 {
                continue;
            }
            let span_s = span_ms / 1000.0;
            let mean = ((prefix[j] - prefix[i]) / span_s).max(0.0);
            let value = span_s * mean.powf(2.5);
            if value > best.value {
                best = HicResult {
                    window_ms,
                    value,
                    t1_ms: time_ms[i],
                    t2_ms: time_ms[j],
                };
            }
        }
    }
    best
}
