use super::contact::{edge_baseline, find_contact, mean, ContactConfig, ContactRegime, G0};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// First sample below this (g) ends the rest segment.
    pub free_fall_threshold_g: f64,
    /// Impact speeds at or below this (m/s) leave COR undefined.
    pub min_impact_speed_m_s: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            free_fall_threshold_g: -0.5,
            min_impact_speed_m_s: 0.05,
        }
    }
}

/// Energies are per unit mass (J/kg).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactEnergyResult {
    pub impact_speed_m_s: f64,
    pub rebound_speed_m_s: f64,
    pub impact_energy_j_per_kg: f64,
    pub rebound_energy_j_per_kg: f64,
    pub absorbed_energy_j_per_kg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_return_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cor: Option<f64>,
    pub bounce_height_m: f64,
    pub entry_time_ms: f64,
    pub exit_time_ms: f64,
    pub baseline_g: f64,
    pub regime: ContactRegime,
}

/// Velocity budget across the contact phase inside `window`.
///
/// Velocity is the trapezoidal integral of the baseline-corrected acceleration from the first
/// sample, taken as rest (v = 0). The baseline is the rest level before free fall, or the window
/// edges for a press without free flight, where rebound is zero by convention. `None` without a
/// contact phase or when the two series differ in length.
pub fn compute_impact_energy(
    time_ms: &[f64],
    accel: &[f64],
    window: (usize, usize),
    contact_cfg: &ContactConfig,
    cfg: &EnergyConfig,
) -> Option<ImpactEnergyResult> {
    if time_ms.len() != accel.len() {
        return None;
    }
    let contact = find_contact(accel, window, contact_cfg)?;
    let baseline_g = match contact.regime {
        ContactRegime::FreeFall => rest_baseline(accel, cfg.free_fall_threshold_g),
        ContactRegime::PlatePress => {
            edge_baseline(time_ms, accel, contact.window, contact_cfg.edge_ms)
        }
    };

    let velocity = integrate_velocity(time_ms, accel, baseline_g, contact.end_idx);
    let v_entry = velocity[contact.start_idx];
    let v_exit = velocity[contact.end_idx];

    let impact_speed = v_entry.abs();
    let rebound_speed = match contact.regime {
        ContactRegime::FreeFall => v_exit.max(0.0),
        ContactRegime::PlatePress => 0.0,
    };
    let impact_energy = 0.5 * impact_speed * impact_speed;
    let rebound_energy = 0.5 * rebound_speed * rebound_speed;
    let cor = (impact_speed > cfg.min_impact_speed_m_s).then(|| rebound_speed / impact_speed);
    let energy_return_pct =
        (impact_energy > 0.0 && cor.is_some()).then(|| rebound_energy / impact_energy * 100.0);

    Some(ImpactEnergyResult {
        impact_speed_m_s: impact_speed,
        rebound_speed_m_s: rebound_speed,
        impact_energy_j_per_kg: impact_energy,
        rebound_energy_j_per_kg: rebound_energy,
        absorbed_energy_j_per_kg: impact_energy - rebound_energy,
        energy_return_pct,
        cor,
        bounce_height_m: rebound_speed * rebound_speed / (2.0 * G0),
        entry_time_ms: time_ms[contact.start_idx],
        exit_time_ms: time_ms[contact.end_idx],
        baseline_g,
        regime: contact.regime,
    })
}

/// Mean of the samples before the signal first drops below `threshold`; 0 when it starts there.
pub fn rest_baseline(accel: &[f64], threshold: f64) -> f64 {
    let onset = accel
        .iter()
        .position(|&a| a < threshold)
        .unwrap_or(accel.len());
    mean(&accel[..onset])
}

fn integrate_velocity(time_ms: &[f64], accel: &[f64], baseline_g: f64, last: usize) -> Vec<f64> {
    let mut velocity = Vec::with_capacity(last + 1);
    velocity.push(0.0);
    for k in 1..=last {
        let dt = (time_ms[k] - time_ms[k - 1]) / 1000.0;
        let a = 0.5 * (accel[k] + accel[k - 1]) - baseline_g;
        velocity.push(velocity[k - 1] + a * G0 * dt);
    }
    velocity
}
