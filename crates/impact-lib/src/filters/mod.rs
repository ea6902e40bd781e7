//! Filter bank. Every filter is a pure `(series, params) -> series` of equal length.

pub mod butterworth;
pub mod cfc;
pub mod moving_average;
pub mod savgol;

use crate::error::Result;
use crate::timebase::SampleRate;
use cfc::CfcClass;
use serde::{Deserialize, Serialize};

/// Filter output plus any numerical-safety changes made to the request.
#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub data: Vec<f64>,
    pub adjustments: Vec<Adjustment>,
}

impl Filtered {
    pub fn plain(data: Vec<f64>) -> Self {
        Self {
            data,
            adjustments: Vec::new(),
        }
    }
}

/// A deviation from the requested parameters, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    CutoffClamped { requested_hz: f64, applied_hz: f64 },
    OrderClamped { requested: usize, applied: usize },
    WindowAdjusted { requested: usize, applied: usize },
    WindowAutoTuned { applied: usize, ringing_hz: f64 },
}

fn default_zero_phase() -> bool {
    true
}

/// Filter kind with its typed parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    ButterworthLowPass {
        cutoff_hz: f64,
        order: usize,
        #[serde(default = "default_zero_phase")]
        zero_phase: bool,
    },
    ButterworthBandStop {
        low_hz: f64,
        high_hz: f64,
        order: usize,
        #[serde(default = "default_zero_phase")]
        zero_phase: bool,
    },
    SavitzkyGolay {
        window: usize,
        poly_order: usize,
    },
    /// First derivative (jerk when fed acceleration), units per second.
    SavitzkyGolayDerivative {
        window: usize,
        poly_order: usize,
    },
    MovingAverage {
        window: usize,
    },
    Cfc {
        class: CfcClass,
    },
}

impl FilterKind {
    pub fn is_differentiating(&self) -> bool {
        matches!(self, FilterKind::SavitzkyGolayDerivative { .. })
    }

    /// Savitzky–Golay kinds take an auto-tuned window; others are returned unchanged.
    pub fn with_window(&self, new_window: usize) -> FilterKind {
        match self {
            FilterKind::SavitzkyGolay { poly_order, .. } => FilterKind::SavitzkyGolay {
                window: new_window,
                poly_order: *poly_order,
            },
            FilterKind::SavitzkyGolayDerivative { poly_order, .. } => {
                FilterKind::SavitzkyGolayDerivative {
                    window: new_window,
                    poly_order: *poly_order,
                }
            }
            other => other.clone(),
        }
    }

    /// Round/clamp the numeric-safety parameters: windows forced odd and up to the minimum,
    /// orders into 1..=8. A polynomial order at or above the window is left alone so that
    /// applying the filter reports it.
    pub fn sanitized(&self) -> (FilterKind, Vec<Adjustment>) {
        let mut adjustments = Vec::new();
        let min_window = if self.is_differentiating() {
            savgol::MIN_DERIVATIVE_WINDOW
        } else {
            3
        };
        let kind = match self {
            FilterKind::SavitzkyGolay { window, poly_order } => FilterKind::SavitzkyGolay {
                window: fix_window(*window, min_window, &mut adjustments),
                poly_order: *poly_order,
            },
            FilterKind::SavitzkyGolayDerivative { window, poly_order } => {
                FilterKind::SavitzkyGolayDerivative {
                    window: fix_window(*window, min_window, &mut adjustments),
                    poly_order: *poly_order,
                }
            }
            FilterKind::MovingAverage { window } => FilterKind::MovingAverage {
                window: fix_window(*window, min_window, &mut adjustments),
            },
            FilterKind::ButterworthLowPass {
                cutoff_hz,
                order,
                zero_phase,
            } => FilterKind::ButterworthLowPass {
                cutoff_hz: *cutoff_hz,
                order: clamp_order(*order, &mut adjustments),
                zero_phase: *zero_phase,
            },
            FilterKind::ButterworthBandStop {
                low_hz,
                high_hz,
                order,
                zero_phase,
            } => FilterKind::ButterworthBandStop {
                low_hz: *low_hz,
                high_hz: *high_hz,
                order: clamp_order(*order, &mut adjustments),
                zero_phase: *zero_phase,
            },
            FilterKind::Cfc { class } => FilterKind::Cfc { class: *class },
        };
        (kind, adjustments)
    }

    /// Run the filter. IIR designs use the rounded design rate; differentiation uses the
    /// exact sample spacing.
    pub fn apply(&self, data: &[f64], rate: &SampleRate) -> Result<Filtered> {
        match *self {
            FilterKind::ButterworthLowPass {
                cutoff_hz,
                order,
                zero_phase,
            } => butterworth::butterworth_lowpass(data, rate.design_hz, cutoff_hz, order, zero_phase),
            FilterKind::ButterworthBandStop {
                low_hz,
                high_hz,
                order,
                zero_phase,
            } => butterworth::butterworth_bandstop(
                data,
                rate.design_hz,
                low_hz,
                high_hz,
                order,
                zero_phase,
            ),
            FilterKind::SavitzkyGolay { window, poly_order } => {
                check_window_fits(window, data.len())?;
                savgol::smooth(data, window, poly_order)
            }
            FilterKind::SavitzkyGolayDerivative { window, poly_order } => {
                check_window_fits(window, data.len())?;
                savgol::differentiate(data, window, poly_order, rate.dt_s())
            }
            FilterKind::MovingAverage { window } => {
                check_window_fits(window, data.len())?;
                moving_average::moving_average(data, window)
            }
            FilterKind::Cfc { class } => cfc::cfc_filter(data, rate.design_hz, class),
        }
    }
}

fn enabled_default() -> bool {
    true
}

/// One configured filter: whether it runs, and what it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: FilterKind,
}

impl FilterDescriptor {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            enabled: true,
            kind,
        }
    }

    pub fn disabled(kind: FilterKind) -> Self {
        Self {
            enabled: false,
            kind,
        }
    }

    /// Sanitize, then apply. Sanitization changes are reported with the design ones.
    pub fn run(&self, data: &[f64], rate: &SampleRate) -> Result<Filtered> {
        let (kind, mut adjustments) = self.kind.sanitized();
        let mut out = kind.apply(data, rate)?;
        adjustments.append(&mut out.adjustments);
        out.adjustments = adjustments;
        Ok(out)
    }
}

/// Smallest odd value that is `>= max(value, min)`.
pub fn odd_at_least(value: usize, min: usize) -> usize {
    let v = value.max(min);
    if v % 2 == 0 {
        v + 1
    } else {
        v
    }
}

fn fix_window(requested: usize, min: usize, adjustments: &mut Vec<Adjustment>) -> usize {
    let applied = odd_at_least(requested, min);
    if applied != requested {
        adjustments.push(Adjustment::WindowAdjusted { requested, applied });
    }
    applied
}

fn clamp_order(requested: usize, adjustments: &mut Vec<Adjustment>) -> usize {
    let applied = requested.clamp(1, butterworth::MAX_ORDER);
    if applied != requested {
        adjustments.push(Adjustment::OrderClamped { requested, applied });
    }
    applied
}

fn check_window_fits(window: usize, len: usize) -> Result<()> {
    if window > len {
        return Err(crate::error::EngineError::InvalidWindow {
            window,
            reason: format!("window longer than the {len}-sample series"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn rate_1khz() -> SampleRate {
        SampleRate::from_dt_ms(1.0)
    }

    #[test]
    fn sanitizing_forces_odd_windows_and_minimums() {
        let (kind, adj) = FilterKind::SavitzkyGolay {
            window: 8,
            poly_order: 2,
        }
        .sanitized();
        assert_eq!(
            kind,
            FilterKind::SavitzkyGolay {
                window: 9,
                poly_order: 2
            }
        );
        assert_eq!(adj, vec![Adjustment::WindowAdjusted { requested: 8, applied: 9 }]);

        let (kind, _) = FilterKind::SavitzkyGolayDerivative {
            window: 3,
            poly_order: 2,
        }
        .sanitized();
        assert_eq!(
            kind,
            FilterKind::SavitzkyGolayDerivative {
                window: 5,
                poly_order: 2
            }
        );

        let (kind, adj) = FilterKind::ButterworthLowPass {
            cutoff_hz: 100.0,
            order: 12,
            zero_phase: true,
        }
        .sanitized();
        assert!(matches!(kind, FilterKind::ButterworthLowPass { order: 8, .. }));
        assert_eq!(adj, vec![Adjustment::OrderClamped { requested: 12, applied: 8 }]);
    }

    #[test]
    fn polynomial_order_is_not_silently_fixed() {
        let descriptor = FilterDescriptor::new(FilterKind::SavitzkyGolay {
            window: 5,
            poly_order: 7,
        });
        assert!(matches!(
            descriptor.run(&[0.0; 32], &rate_1khz()),
            Err(EngineError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn window_longer_than_series_is_rejected() {
        let descriptor = FilterDescriptor::new(FilterKind::MovingAverage { window: 51 });
        assert!(matches!(
            descriptor.run(&[0.0; 10], &rate_1khz()),
            Err(EngineError::InvalidWindow { window: 51, .. })
        ));
    }

    #[test]
    fn descriptor_parses_from_json() {
        let json = r#"{"kind":"butterworth_low_pass","cutoff_hz":100,"order":4}"#;
        let d: FilterDescriptor = serde_json::from_str(json).unwrap();
        assert!(d.enabled);
        assert_eq!(
            d.kind,
            FilterKind::ButterworthLowPass {
                cutoff_hz: 100.0,
                order: 4,
                zero_phase: true
            }
        );
        let cfc: FilterDescriptor =
            serde_json::from_str(r#"{"enabled":false,"kind":"cfc","class":60}"#).unwrap();
        assert!(!cfc.enabled);
        assert_eq!(cfc.kind, FilterKind::Cfc { class: CfcClass::CFC60 });
    }

    #[test]
    fn derivative_runs_on_exact_spacing() {
        let rate = SampleRate::from_dt_ms(0.5);
        let data: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let out = FilterDescriptor::new(FilterKind::SavitzkyGolayDerivative {
            window: 5,
            poly_order: 2,
        })
        .run(&data, &rate)
        .unwrap();
        // One unit per 0.5 ms sample is 2000 units per second.
        assert!((out.data[25] - 2000.0).abs() < 1e-6);
    }
}
