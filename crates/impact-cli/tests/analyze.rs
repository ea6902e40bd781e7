use assert_cmd::cargo::cargo_bin_cmd;
use impact_lib::{
    filters::Adjustment,
    pipeline::{Diagnostics, MetricSource, PipelineOutput},
    FirstHit, InjuryMetrics,
};
use serde::Deserialize;
use std::{error::Error, path::PathBuf};

#[derive(Deserialize)]
struct Summary {
    metrics: InjuryMetrics,
    first_hit: Option<FirstHit>,
    diagnostics: Diagnostics,
}

fn sample_path(relative: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .join(relative)
        .to_string_lossy()
        .to_string()
}

fn analyze(extra: &[&str]) -> Result<Summary, Box<dyn Error>> {
    let drop = sample_path("test_data/drop_1khz.csv");
    let mut cmd = cargo_bin_cmd!("impact");
    cmd.args(["analyze", "--input", &drop]).args(extra);
    let out = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&out)?)
}

#[test]
fn analyze_reports_metrics_for_a_drop() -> Result<(), Box<dyn Error>> {
    let summary = analyze(&[])?;
    let d = &summary.diagnostics;
    assert!((d.rate.hz - 1000.0).abs() < 1e-9);
    assert_eq!(d.origin.crossing_time_ms, Some(600.0));
    assert_eq!(d.origin.time_ms, 400.0);
    assert_eq!(d.metric_source, MetricSource::Filtered);

    let m = &summary.metrics;
    assert_eq!(m.sample_count, 1100);
    assert!(m.peak_accel > 30.0 && m.peak_accel < 46.0, "{}", m.peak_accel);
    assert!((m.peak_time_ms - 507.5).abs() < 3.0);
    assert!(m.hic_for(36.0).unwrap().value >= m.hic_for(15.0).unwrap().value);
    assert!(m.time_over(20.0).unwrap() >= m.time_over(38.0).unwrap());

    let dri = m.dri.expect("dri");
    assert!(dri.dri > 0.0 && dri.dri.is_finite());
    let energy = m.energy.expect("energy");
    assert!(energy.impact_speed_m_s > 2.5 && energy.impact_speed_m_s < 3.4);
    let cor = energy.cor.expect("cor");
    assert!(cor > 0.1 && cor < 0.8, "{cor}");

    let hit = summary.first_hit.expect("first hit");
    assert!(hit.window.start_time_ms <= 500.0);
    assert!(hit.window.end_time_ms >= 508.0);
    Ok(())
}

#[test]
fn config_file_drives_filters_and_window() -> Result<(), Box<dyn Error>> {
    let config = sample_path("test_data/filters.toml");
    let summary = analyze(&["--config", &config])?;
    let d = &summary.diagnostics;
    assert!(d.filter_failures.contains_key("cfc1000"));
    assert!(!d.filter_failures.contains_key("notch"));
    assert_eq!(
        d.adjustments["average"],
        vec![Adjustment::WindowAdjusted {
            requested: 6,
            applied: 7
        }]
    );
    let hit = summary.first_hit.expect("first hit");
    assert_eq!(d.metric_range.min_ms, hit.window.start_time_ms);
    assert_eq!(d.metric_range.max_ms, hit.window.end_time_ms);
    assert_eq!(summary.metrics.window_start_ms, hit.window.start_time_ms);
    Ok(())
}

#[test]
fn explicit_range_scopes_metrics() -> Result<(), Box<dyn Error>> {
    let summary = analyze(&["--min-ms", "450", "--max-ms", "600"])?;
    assert_eq!(summary.metrics.window_start_ms, 450.0);
    assert_eq!(summary.metrics.window_end_ms, 600.0);
    assert_eq!(summary.metrics.sample_count, 151);
    Ok(())
}

#[test]
fn series_flag_includes_processed_samples() -> Result<(), Box<dyn Error>> {
    let drop = sample_path("test_data/drop_1khz.csv");
    let mut cmd = cargo_bin_cmd!("impact");
    cmd.args(["analyze", "--input", &drop, "--window", "full", "--series"]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let full: PipelineOutput = serde_json::from_slice(&out)?;
    assert_eq!(full.processed.len(), 1100);
    assert_eq!(full.processed[0].time_ms, 0.0);
    assert!(full.processed.iter().all(|p| p.jerk.is_some()));
    Ok(())
}

#[test]
fn missing_input_fails_cleanly() {
    let mut cmd = cargo_bin_cmd!("impact");
    cmd.args(["analyze", "--input", "does/not/exist.csv"]);
    let out = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8_lossy(&out).contains("failed to read"));
}
