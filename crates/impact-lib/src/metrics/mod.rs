pub mod contact;
pub mod dri;
pub mod energy;
pub mod hic;
pub mod injury;
pub mod threshold;

pub use contact::{ContactConfig, ContactRegime, G0};
pub use dri::{compute_dri, DriConfig, DriResult};
pub use energy::{compute_impact_energy, EnergyConfig, ImpactEnergyResult};
pub use hic::{hic, HicResult};
pub use injury::{compute_injury_metrics, InjuryMetrics, MetricsConfig};
pub use threshold::{time_over_threshold, ThresholdAccounting, ThresholdDuration};
