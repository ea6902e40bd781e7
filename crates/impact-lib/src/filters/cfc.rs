//! SAE J211/1 channel frequency class filters.
//!
//! A CFC is the J211 "four-pole phaseless" filter: a second-order Butterworth section
//! designed at `CFC x 2.0775` Hz, run forward and then backward. The combined response is
//! fourth order with no phase shift, and its -3 dB point lands near `CFC x 5/3`.

use super::butterworth::{SosFilter, NYQUIST_MARGIN};
use super::Filtered;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// J211/1 Appendix C design-frequency factor.
pub const CFC_DESIGN_FACTOR: f64 = 2.0775;
/// Order of the single section; two passes give the effective fourth order.
pub const CFC_SECTION_ORDER: usize = 2;
pub const CFC_EFFECTIVE_ORDER: usize = 4;

/// Channel frequency class. The standard classes are 60, 180, 600 and 1000.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CfcClass(pub f64);

impl CfcClass {
    pub const CFC60: CfcClass = CfcClass(60.0);
    pub const CFC180: CfcClass = CfcClass(180.0);
    pub const CFC600: CfcClass = CfcClass(600.0);
    pub const CFC1000: CfcClass = CfcClass(1000.0);

    pub fn design_cutoff_hz(&self) -> f64 {
        self.0 * CFC_DESIGN_FACTOR
    }
}

/// Design the CFC for `fs`. Unlike a plain low-pass, a design frequency above
/// `0.99 x Nyquist` is an error: the class would no longer be what the label claims.
pub fn cfc_design(class: CfcClass, fs: f64) -> Result<SosFilter> {
    let requested_hz = class.design_cutoff_hz();
    let nyquist_hz = fs / 2.0;
    if !(class.0 > 0.0) || requested_hz > NYQUIST_MARGIN * nyquist_hz {
        return Err(EngineError::CutoffOutOfRange {
            requested_hz,
            nyquist_hz,
        });
    }
    SosFilter::lowpass(requested_hz, fs, CFC_SECTION_ORDER)
}

pub fn cfc_filter(data: &[f64], fs: f64, class: CfcClass) -> Result<Filtered> {
    let filter = cfc_design(class, fs)?;
    Ok(Filtered {
        data: filter.apply(data, true),
        adjustments: filter.adjustments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cfc60_at_1khz_is_accepted() {
        let out = cfc_filter(&[0.0, 1.0, 0.0, -1.0, 0.0], 1000.0, CfcClass::CFC60).unwrap();
        assert_eq!(out.data.len(), 5);
        assert!(out.adjustments.is_empty());
    }

    #[test]
    fn class_above_margin_is_rejected() {
        // 600 x 2.0775 = 1246.5 Hz against a 495 Hz limit.
        assert!(matches!(
            cfc_filter(&[0.0; 8], 1000.0, CfcClass::CFC600),
            Err(EngineError::CutoffOutOfRange { .. })
        ));
        // 180 x 2.0775 = 373.95 Hz against a 247.5 Hz limit.
        assert!(matches!(
            cfc_filter(&[0.0; 8], 500.0, CfcClass::CFC180),
            Err(EngineError::CutoffOutOfRange { .. })
        ));
        assert!(cfc_filter(&[0.0; 8], 10_000.0, CfcClass::CFC1000).is_ok());
    }

    #[test]
    fn combined_response_is_near_five_thirds_cfc_at_minus_3db() {
        let fs = 10_000.0;
        let filter = cfc_design(CfcClass::CFC60, fs).unwrap();
        // Two passes square the single-pass magnitude.
        let gain = |f: f64| filter.gain_at(f, fs).powi(2);
        assert!((gain(0.0) - 1.0).abs() < 1e-12);
        let corner = 100.0;
        assert!((gain(corner) - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.02, "{}", gain(corner));
    }
}
