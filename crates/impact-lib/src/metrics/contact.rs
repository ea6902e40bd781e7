//! Contact-phase selection shared by the DRI and energy calculations.

use serde::{Deserialize, Serialize};

/// Standard gravity in m/s^2.
pub const G0: f64 = 9.80665;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Windows whose peak does not exceed this (g) have no contact phase.
    pub min_peak_g: f64,
    /// Samples below this (g) are treated as free flight.
    pub free_fall_bound_g: f64,
    /// Pre-contact span averaged for the free-fall baseline (ms).
    pub lookback_ms: f64,
    /// Span at each window edge averaged when no free flight brackets the impact (ms).
    pub edge_ms: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            min_peak_g: 5.0,
            free_fall_bound_g: -0.85,
            lookback_ms: 20.0,
            edge_ms: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactRegime {
    /// Free flight found on at least one side of the peak.
    FreeFall,
    /// No free flight in the window; bounds are the window edges.
    PlatePress,
}

/// Indices are into the full series handed to [`find_contact`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactRange {
    pub start_idx: usize,
    pub end_idx: usize,
    pub peak_idx: usize,
    pub peak_accel: f64,
    pub entry_found: bool,
    pub exit_found: bool,
    pub regime: ContactRegime,
    /// Search bounds clamped to the series.
    pub window: (usize, usize),
}

/// Peak of `accel[lo..=hi]` bracketed by the nearest free-flight samples on either side.
pub fn find_contact(
    accel: &[f64],
    (lo, hi): (usize, usize),
    cfg: &ContactConfig,
) -> Option<ContactRange> {
    let hi = hi.min(accel.len().checked_sub(1)?);
    if lo > hi {
        return None;
    }
    let (offset, peak_accel) = accel[lo..=hi]
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))?;
    if peak_accel <= cfg.min_peak_g {
        return None;
    }
    let peak_idx = lo + offset;
    let entry = accel[lo..peak_idx]
        .iter()
        .rposition(|&a| a < cfg.free_fall_bound_g)
        .map(|i| lo + i);
    let exit = accel[peak_idx..=hi]
        .iter()
        .position(|&a| a < cfg.free_fall_bound_g)
        .map(|i| peak_idx + i);
    let regime = if entry.is_none() && exit.is_none() {
        ContactRegime::PlatePress
    } else {
        ContactRegime::FreeFall
    };
    Some(ContactRange {
        start_idx: entry.unwrap_or(lo),
        end_idx: exit.unwrap_or(hi),
        peak_idx,
        peak_accel,
        entry_found: entry.is_some(),
        exit_found: exit.is_some(),
        regime,
        window: (lo, hi),
    })
}

/// Baseline for the contact-phase input: the free-flight level just outside contact, or the
/// window-edge level when the impact is not bracketed by free flight.
pub fn contact_baseline(
    time_ms: &[f64],
    accel: &[f64],
    contact: &ContactRange,
    cfg: &ContactConfig,
) -> f64 {
    if contact.entry_found {
        let anchor = time_ms[contact.start_idx];
        let first = time_ms[..=contact.start_idx]
            .iter()
            .position(|&t| t >= anchor - cfg.lookback_ms)
            .unwrap_or(contact.start_idx);
        return mean(&accel[first..=contact.start_idx]);
    }
    if contact.exit_found {
        let anchor = time_ms[contact.end_idx];
        let last = contact.end_idx
            + time_ms[contact.end_idx..]
                .iter()
                .rposition(|&t| t <= anchor + cfg.lookback_ms)
                .unwrap_or(0);
        return mean(&accel[contact.end_idx..=last]);
    }
    edge_baseline(time_ms, accel, contact.window, cfg.edge_ms)
}

/// Mean of the two edge means of `window`, each spanning `edge_ms`.
pub fn edge_baseline(time_ms: &[f64], accel: &[f64], (lo, hi): (usize, usize), edge_ms: f64) -> f64 {
    let head_end = lo
        + time_ms[lo..=hi]
            .iter()
            .rposition(|&t| t <= time_ms[lo] + edge_ms)
            .unwrap_or(0);
    let tail_start = lo
        + time_ms[lo..=hi]
            .iter()
            .position(|&t| t >= time_ms[hi] - edge_ms)
            .unwrap_or(hi - lo);
    0.5 * (mean(&accel[lo..=head_end]) + mean(&accel[tail_start..=hi]))
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// 1 kHz drop: 200 ms rest at 0 g, free fall at -1 g, a half-sine contact pulse of
    /// `amplitude` over `[500, 520)` ms, then free flight again until 800 ms.
    pub(crate) fn drop_record(amplitude: f64) -> (Vec<f64>, Vec<f64>) {
        let time: Vec<f64> = (0..800).map(|i| i as f64).collect();
        let accel = time
            .iter()
            .map(|&t| {
                if t < 200.0 {
                    0.0
                } else if (500.0..520.0).contains(&t) {
                    -1.0 + amplitude * (PI * (t - 500.0) / 20.0).sin()
                } else {
                    -1.0
                }
            })
            .collect();
        (time, accel)
    }

    #[test]
    fn contact_is_bracketed_by_free_flight() {
        let (time, accel) = drop_record(40.0);
        let c = find_contact(&accel, (0, time.len() - 1), &ContactConfig::default()).unwrap();
        assert_eq!(c.regime, ContactRegime::FreeFall);
        assert_eq!((c.start_idx, c.peak_idx, c.end_idx), (500, 510, 520));
        assert!((c.peak_accel - 39.0).abs() < 1e-9);
    }

    #[test]
    fn free_fall_baseline_uses_lookback() {
        let (time, accel) = drop_record(40.0);
        let cfg = ContactConfig::default();
        let c = find_contact(&accel, (0, time.len() - 1), &cfg).unwrap();
        let b = contact_baseline(&time, &accel, &c, &cfg);
        assert!((b + 1.0).abs() < 1e-12);
    }

    #[test]
    fn press_without_free_flight_uses_edges() {
        let time: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let accel: Vec<f64> = time
            .iter()
            .map(|&t| if (90.0..110.0).contains(&t) { 12.0 } else { 0.5 })
            .collect();
        let cfg = ContactConfig::default();
        let c = find_contact(&accel, (0, 199), &cfg).unwrap();
        assert_eq!(c.regime, ContactRegime::PlatePress);
        assert_eq!((c.start_idx, c.end_idx), (0, 199));
        let b = contact_baseline(&time, &accel, &c, &cfg);
        assert!((b - 0.5).abs() < 1e-12);
    }

    #[test]
    fn window_past_the_end_is_clamped() {
        let time: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let accel: Vec<f64> = time
            .iter()
            .map(|&t| if (90.0..110.0).contains(&t) { 12.0 } else { 0.5 })
            .collect();
        let cfg = ContactConfig::default();
        let c = find_contact(&accel, (0, 250), &cfg).unwrap();
        assert_eq!(c.window, (0, 199));
        assert_eq!(c.end_idx, 199);
        let b = contact_baseline(&time, &accel, &c, &cfg);
        assert!((b - 0.5).abs() < 1e-12);
    }

    #[test]
    fn quiet_window_has_no_contact() {
        let accel = vec![-1.0, 0.0, 4.9, 0.0];
        assert!(find_contact(&accel, (0, 3), &ContactConfig::default()).is_none());
        assert!(find_contact(&[], (0, 0), &ContactConfig::default()).is_none());
    }
}
