pub mod first_hit;
pub mod impact;

pub use first_hit::{detect_first_hit, FirstHit, FirstHitConfig};
pub use impact::{detect_impact_window, ImpactWindowConfig};
