//! End-to-end conditioning: raw samples in, processed series plus metrics out.
//!
//! Every call recomputes everything from the raw input; nothing is cached between runs.

use crate::{
    detectors::{detect_first_hit, detect_impact_window, FirstHit, FirstHitConfig, ImpactWindowConfig},
    error::Result,
    filters::{savgol, Adjustment, FilterDescriptor, FilterKind},
    metrics::{compute_injury_metrics, InjuryMetrics, MetricsConfig},
    origin::{detect_origin, rebase, Origin, OriginConfig},
    signal::{validate_samples, ImpactWindow, ProcessedSample, RawSample, TimeRange},
    spectral::{
        auto_window, ringing_from_zero_crossings, spectrum_peaks, AutoWindowConfig,
        RingingEstimate, SpectrumConfig, SpectrumReport,
    },
    timebase::{estimate_sample_rate, resample_to_uniform, SampleRate},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Series name used for the primary acceleration filter in diagnostics.
pub const ACCEL_SERIES: &str = "accel";
/// Series name used for the jerk filter in diagnostics.
pub const JERK_SERIES: &str = "jerk";

/// Which samples the injury metrics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricWindow {
    #[default]
    FullRange,
    /// The detected first-hit window; falls back to the full range when none is found.
    FirstHit,
    Range {
        min_ms: f64,
        max_ms: f64,
    },
}

/// View requests a host can resolve against a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomTarget {
    FullRange,
    FirstHit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Put the input on a uniform grid before anything else.
    pub resample: bool,
    pub origin: OriginConfig,
    pub accel_filter: Option<FilterDescriptor>,
    /// Differentiates the filtered acceleration (raw when that filter is absent or fails).
    pub jerk_filter: Option<FilterDescriptor>,
    /// Extra named series, each computed from the raw acceleration.
    pub derived: BTreeMap<String, FilterDescriptor>,
    /// Resize Savitzky–Golay windows from the measured ringing frequency.
    pub auto_tune_windows: bool,
    pub auto_window: AutoWindowConfig,
    pub impact_window: ImpactWindowConfig,
    pub spectrum: SpectrumConfig,
    pub first_hit: FirstHitConfig,
    pub metric_window: MetricWindow,
    pub metrics: MetricsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resample: true,
            origin: OriginConfig::default(),
            accel_filter: Some(FilterDescriptor::new(FilterKind::ButterworthLowPass {
                cutoff_hz: 100.0,
                order: 4,
                zero_phase: true,
            })),
            jerk_filter: Some(FilterDescriptor::new(FilterKind::SavitzkyGolayDerivative {
                window: 11,
                poly_order: 2,
            })),
            derived: BTreeMap::new(),
            auto_tune_windows: false,
            auto_window: AutoWindowConfig::default(),
            impact_window: ImpactWindowConfig::default(),
            spectrum: SpectrumConfig::default(),
            first_hit: FirstHitConfig::default(),
            metric_window: MetricWindow::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Series the metrics were computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSource {
    Filtered,
    Raw,
}

/// Everything the run decided on the way, so callers never need the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Rate estimated from the raw timestamps.
    pub input_rate: SampleRate,
    /// Rate of the processed series.
    pub rate: SampleRate,
    pub resampled: bool,
    pub input_len: usize,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_window: Option<ImpactWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrum: Option<SpectrumReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ringing: Option<RingingEstimate>,
    pub adjustments: BTreeMap<String, Vec<Adjustment>>,
    pub filter_failures: BTreeMap<String, String>,
    pub metric_source: MetricSource,
    pub metric_range: TimeRange,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub processed: Vec<ProcessedSample>,
    pub metrics: InjuryMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_hit: Option<FirstHit>,
    pub diagnostics: Diagnostics,
}

impl PipelineOutput {
    /// Time span for a zoom request; `None` when the target was not detected.
    pub fn zoom(&self, target: ZoomTarget) -> Option<TimeRange> {
        match target {
            ZoomTarget::FullRange => {
                let first = self.processed.first()?;
                let last = self.processed.last()?;
                Some(TimeRange::new(first.time_ms, last.time_ms))
            }
            ZoomTarget::FirstHit => self
                .first_hit
                .map(|h| TimeRange::new(h.window.start_time_ms, h.window.end_time_ms)),
        }
    }
}

struct FilterRun<'a> {
    rate: &'a SampleRate,
    tuned_window: Option<(usize, f64)>,
    adjustments: BTreeMap<String, Vec<Adjustment>>,
    failures: BTreeMap<String, String>,
}

impl FilterRun<'_> {
    /// Run one named filter. Failures are recorded and leave the series absent.
    fn run(&mut self, name: &str, descriptor: &FilterDescriptor, data: &[f64]) -> Option<Vec<f64>> {
        if !descriptor.enabled {
            return None;
        }
        let mut tuned = Vec::new();
        let mut descriptor = descriptor.clone();
        if let Some((window, ringing_hz)) = self.tuned_window {
            if matches!(
                descriptor.kind,
                FilterKind::SavitzkyGolay { .. } | FilterKind::SavitzkyGolayDerivative { .. }
            ) {
                let window = if descriptor.kind.is_differentiating() {
                    window.max(savgol::MIN_DERIVATIVE_WINDOW)
                } else {
                    window
                };
                descriptor.kind = descriptor.kind.with_window(window);
                tuned.push(Adjustment::WindowAutoTuned {
                    applied: window,
                    ringing_hz,
                });
            }
        }
        match descriptor.run(data, self.rate) {
            Ok(mut out) => {
                tuned.append(&mut out.adjustments);
                if !tuned.is_empty() {
                    self.adjustments.insert(name.to_string(), tuned);
                }
                Some(out.data)
            }
            Err(err) => {
                warn!("filter {name} failed: {err}");
                self.failures.insert(name.to_string(), err.to_string());
                None
            }
        }
    }
}

/// Run the whole chain over `raw`.
///
/// Input errors and an empty metric range are returned; filter, spectrum and first-hit
/// failures are recorded in the diagnostics and the run carries on without them.
pub fn compute(raw: &[RawSample], cfg: &PipelineConfig) -> Result<PipelineOutput> {
    validate_samples(raw)?;
    let input_rate = estimate_sample_rate(raw)?;
    let mut notes = Vec::new();

    let (uniform, rate) = if cfg.resample {
        let r = resample_to_uniform(raw)?;
        (r.samples, r.rate)
    } else {
        (raw.to_vec(), input_rate)
    };
    debug!(
        "{} samples at {:.1} Hz (design {} Hz), resampled: {}",
        uniform.len(),
        rate.hz,
        rate.design_hz,
        cfg.resample
    );

    let origin = detect_origin(&uniform, &cfg.origin);
    if !origin.free_fall_detected() {
        notes.push(format!(
            "no free fall below {} g; series not trimmed",
            cfg.origin.free_fall_threshold_g
        ));
    }
    let samples = rebase(&uniform, &origin);
    let time: Vec<f64> = samples.iter().map(|s| s.time_ms).collect();
    let raw_accel: Vec<f64> = samples.iter().map(|s| s.accel).collect();

    let impact_window = match detect_impact_window(&time, &raw_accel, &cfg.impact_window) {
        Ok(w) => Some(w),
        Err(err) => {
            notes.push(format!("impact window: {err}"));
            None
        }
    };
    let (spectrum, ringing) = match impact_window {
        Some(w) => {
            let segment = &raw_accel[w.start_idx..=w.end_idx];
            let spectrum = match spectrum_peaks(segment, rate.hz, &cfg.spectrum) {
                Ok(s) => Some(s),
                Err(err) => {
                    notes.push(format!("spectrum: {err}"));
                    None
                }
            };
            (spectrum, ringing_from_zero_crossings(segment, rate.hz))
        }
        None => (None, None),
    };

    let ringing_hz = ringing
        .map(|r| r.frequency_hz)
        .or_else(|| spectrum.as_ref().and_then(|s| s.dominant()).map(|p| p.frequency_hz));
    let tuned_window = match (cfg.auto_tune_windows, ringing_hz) {
        (true, Some(hz)) => Some((auto_window(hz, rate.hz, &cfg.auto_window), hz)),
        (true, None) => {
            notes.push("no ringing estimate; configured windows kept".to_string());
            None
        }
        _ => None,
    };

    let mut bank = FilterRun {
        rate: &rate,
        tuned_window,
        adjustments: BTreeMap::new(),
        failures: BTreeMap::new(),
    };
    let accel_filtered = cfg
        .accel_filter
        .as_ref()
        .and_then(|f| bank.run(ACCEL_SERIES, f, &raw_accel));
    let jerk = cfg.jerk_filter.as_ref().and_then(|f| {
        bank.run(JERK_SERIES, f, accel_filtered.as_deref().unwrap_or(raw_accel.as_slice()))
    });
    let derived: BTreeMap<&str, Vec<f64>> = cfg
        .derived
        .iter()
        .filter_map(|(name, f)| bank.run(name, f, &raw_accel).map(|d| (name.as_str(), d)))
        .collect();

    let (metric_source, source) = match &accel_filtered {
        Some(f) => (MetricSource::Filtered, f.as_slice()),
        None => (MetricSource::Raw, raw_accel.as_slice()),
    };

    let first_hit = match detect_first_hit(&time, source, &cfg.first_hit) {
        Ok(hit) => Some(hit),
        Err(err) => {
            notes.push(format!("first hit: {err}"));
            None
        }
    };

    let full = TimeRange::new(time[0], time[time.len() - 1]);
    let metric_range = match cfg.metric_window {
        MetricWindow::FullRange => full,
        MetricWindow::FirstHit => match first_hit {
            Some(h) => TimeRange::new(h.window.start_time_ms, h.window.end_time_ms),
            None => {
                notes.push("metrics over full range: no first hit".to_string());
                full
            }
        },
        MetricWindow::Range { min_ms, max_ms } => TimeRange::new(min_ms, max_ms),
    };
    let metrics = compute_injury_metrics(&time, source, Some(metric_range), &cfg.metrics)?;

    let processed = samples
        .iter()
        .enumerate()
        .map(|(i, s)| ProcessedSample {
            time_ms: s.time_ms,
            accel_raw: s.accel,
            accel_filtered: accel_filtered.as_ref().map(|f| f[i]),
            jerk: jerk.as_ref().map(|j| j[i]),
            derived: derived
                .iter()
                .map(|(name, d)| (name.to_string(), d[i]))
                .collect(),
        })
        .collect();

    let FilterRun {
        adjustments,
        failures,
        ..
    } = bank;
    Ok(PipelineOutput {
        processed,
        metrics,
        first_hit,
        diagnostics: Diagnostics {
            input_rate,
            rate,
            resampled: cfg.resample,
            input_len: raw.len(),
            origin,
            impact_window,
            spectrum,
            ringing,
            adjustments,
            filter_failures: failures,
            metric_source,
            metric_range,
            notes,
        },
    })
}
