use super::contact::{contact_baseline, find_contact, ContactConfig, ContactRegime, G0};
use serde::{Deserialize, Serialize};

/// Lumped spine model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriConfig {
    pub natural_freq_rad_s: f64,
    pub damping_ratio: f64,
}

impl Default for DriConfig {
    fn default() -> Self {
        Self {
            natural_freq_rad_s: 52.9,
            damping_ratio: 0.224,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriResult {
    pub dri: f64,
    pub max_deflection_m: f64,
    pub max_deflection_time_ms: f64,
    pub peak_accel: f64,
    pub peak_time_ms: f64,
    pub start_idx: usize,
    pub end_idx: usize,
    pub start_time_ms: f64,
    pub end_time_ms: f64,
    pub baseline_g: f64,
    pub sample_count: usize,
    pub regime: ContactRegime,
}

/// Dynamic Response Index of the contact phase inside `window` (inclusive sample indices).
///
/// The baseline-corrected acceleration drives `x'' + 2 zeta wn x' + wn^2 x = -a(t)` from rest,
/// integrated with classical RK4 using the sample spacing as step and the linear midpoint of
/// neighbouring samples for the half step. `None` when the window peak is not above the contact
/// threshold or the two series differ in length. A window running past the end is clamped.
pub fn compute_dri(
    time_ms: &[f64],
    accel: &[f64],
    window: (usize, usize),
    contact_cfg: &ContactConfig,
    cfg: &DriConfig,
) -> Option<DriResult> {
    if time_ms.len() != accel.len() {
        return None;
    }
    let contact = find_contact(accel, window, contact_cfg)?;
    let baseline_g = contact_baseline(time_ms, accel, &contact, contact_cfg);
    let (start, end) = (contact.start_idx, contact.end_idx);

    let wn = cfg.natural_freq_rad_s;
    let c = 2.0 * cfg.damping_ratio * wn;
    let k = wn * wn;
    let input = |i: usize| (accel[i] - baseline_g) * G0;
    let deriv = |x: f64, v: f64, a: f64| (v, -a - c * v - k * x);

    let (mut x, mut v) = (0.0_f64, 0.0_f64);
    let mut max_deflection = 0.0_f64;
    let mut max_time = time_ms[start];
    for i in start..end {
        let h = (time_ms[i + 1] - time_ms[i]) / 1000.0;
        let (a0, a1) = (input(i), input(i + 1));
        let am = 0.5 * (a0 + a1);

        let (k1x, k1v) = deriv(x, v, a0);
        let (k2x, k2v) = deriv(x + 0.5 * h * k1x, v + 0.5 * h * k1v, am);
        let (k3x, k3v) = deriv(x + 0.5 * h * k2x, v + 0.5 * h * k2v, am);
        let (k4x, k4v) = deriv(x + h * k3x, v + h * k3v, a1);
        x += h / 6.0 * (k1x + 2.0 * k2x + 2.0 * k3x + k4x);
        v += h / 6.0 * (k1v + 2.0 * k2v + 2.0 * k3v + k4v);

        if x.abs() > max_deflection {
            max_deflection = x.abs();
            max_time = time_ms[i + 1];
        }
    }

    let dri = k * max_deflection / G0;
    log::debug!(
        "dri {dri:.2} over [{:.1}, {:.1}] ms, baseline {baseline_g:.3} g",
        time_ms[start],
        time_ms[end]
    );
    Some(DriResult {
        dri,
        max_deflection_m: max_deflection,
        max_deflection_time_ms: max_time,
        peak_accel: contact.peak_accel,
        peak_time_ms: time_ms[contact.peak_idx],
        start_idx: start,
        end_idx: end,
        start_time_ms: time_ms[start],
        end_time_ms: time_ms[end],
        baseline_g,
        sample_count: end - start + 1,
        regime: contact.regime,
    })
}
