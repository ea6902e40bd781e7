//! Error taxonomy for the drop-test engine.

use thiserror::Error;

/// Typed failures raised by the engine. Each variant names the violated precondition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no samples supplied")]
    EmptyInput,

    #[error("insufficient data: need at least {needed} samples, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("degenerate timebase: {0}")]
    DegenerateTimebase(String),

    #[error("timestamps decrease at sample {index} ({previous_ms} ms -> {current_ms} ms)")]
    NonMonotonicTime {
        index: usize,
        previous_ms: f64,
        current_ms: f64,
    },

    #[error("sample {index} is not finite")]
    NonFiniteSample { index: usize },

    #[error("invalid window {window}: {reason}")]
    InvalidWindow { window: usize, reason: String },

    #[error("band {low_hz:.3}-{high_hz:.3} Hz is empty")]
    InvalidBand { low_hz: f64, high_hz: f64 },

    #[error("filter order {order} outside 1..=8")]
    InvalidOrder { order: usize },

    #[error("cutoff {requested_hz:.3} Hz out of range (Nyquist {nyquist_hz:.3} Hz)")]
    CutoffOutOfRange { requested_hz: f64, nyquist_hz: f64 },

    #[error("no peak above {threshold:.3} found")]
    NoSignificantPeak { threshold: f64 },

    #[error("no free-fall segment found")]
    NoFreeFallFound,

    #[error("fft failed: {0}")]
    Fft(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
