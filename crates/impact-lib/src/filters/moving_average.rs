use super::Filtered;
use crate::error::{EngineError, Result};

/// Centered moving average. Near the edges the window shrinks to the samples that exist.
pub fn moving_average(data: &[f64], window: usize) -> Result<Filtered> {
    if window % 2 == 0 || window < 3 {
        return Err(EngineError::InvalidWindow {
            window,
            reason: "moving average window must be odd and at least 3".into(),
        });
    }
    let n = data.len();
    let half = window / 2;
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &x in data {
        acc += x;
        prefix.push(acc);
    }
    let out = (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(n - 1);
            (prefix[hi + 1] - prefix[lo]) / (hi - lo + 1) as f64
        })
        .collect();
    Ok(Filtered::plain(out))
}
