pub mod detectors;
pub mod error;
pub mod filters;
pub mod io;
pub mod metrics;
pub mod origin;
pub mod pipeline;
pub mod plot;
pub mod signal;
pub mod spectral;
pub mod timebase;

pub use detectors::*;
pub use error::{EngineError, Result};
pub use metrics::*;
pub use pipeline::{compute, PipelineConfig, PipelineOutput, ZoomTarget};
pub use signal::*;
