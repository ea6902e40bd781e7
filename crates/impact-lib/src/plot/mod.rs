use serde::{Deserialize, Serialize};

use crate::signal::{ProcessedSample, TimeRange};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

const RAW_COLOR: Color = Color(0x9E9E9E);
const FILTERED_COLOR: Color = Color(0x1565C0);
const JERK_COLOR: Color = Color(0xC62828);
const SPAN_COLOR: Color = Color(0xFFB300);
const DERIVED_COLORS: [u32; 4] = [0x2E7D32, 0x6A1B9A, 0xEF6C00, 0x00838F];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Shaded x-interval, e.g. the detected first-hit window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub name: String,
    pub range: TimeRange,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Span(Span),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    pub fn lines(&self) -> impl Iterator<Item = &LineSeries> {
        self.series.iter().filter_map(|s| match s {
            Series::Line(line) => Some(line),
            Series::Span(_) => None,
        })
    }

    /// `(x_min, x_max, y_min, y_max)` over all line points, `None` for an empty figure.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.lines().flat_map(|l| l.points.iter());
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

/// Reduce to about `max_points` by keeping the min and max of each bucket, so short impact
/// peaks survive decimation.
pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points || max_points < 2 {
        return points.to_vec();
    }
    let buckets = max_points / 2;
    let bucket_size = points.len() as f64 / buckets as f64;
    let mut result = Vec::with_capacity(buckets * 2);
    for i in 0..buckets {
        let start = (i as f64 * bucket_size).floor() as usize;
        let end = (((i + 1) as f64 * bucket_size).floor() as usize).min(points.len());
        if start >= end {
            continue;
        }
        let bucket = &points[start..end];
        let lo = bucket
            .iter()
            .enumerate()
            .min_by(|a, b| a.1[1].total_cmp(&b.1[1]))
            .map_or(0, |(k, _)| k);
        let hi = bucket
            .iter()
            .enumerate()
            .max_by(|a, b| a.1[1].total_cmp(&b.1[1]))
            .map_or(0, |(k, _)| k);
        let (first, second) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        result.push(bucket[first]);
        if second != first {
            result.push(bucket[second]);
        }
    }
    result
}

fn line(name: &str, points: Vec<[f64; 2]>, max_points: usize, width: f32, color: Color) -> Series {
    Series::Line(LineSeries {
        name: name.into(),
        points: decimate_points(&points, max_points),
        style: Style {
            width,
            dash: None,
            color,
        },
    })
}

/// Acceleration chart: raw, filtered and every derived series, plus an optional highlight.
pub fn figure_from_processed(
    title: &str,
    samples: &[ProcessedSample],
    highlight: Option<TimeRange>,
    max_points: usize,
) -> Figure {
    let mut fig = Figure::new(Some(title.into()));
    fig.x.label = Some("time (ms)".into());
    fig.y.label = Some("acceleration (g)".into());

    let raw = samples.iter().map(|s| [s.time_ms, s.accel_raw]).collect();
    fig.add_series(line("raw", raw, max_points, 1.0, RAW_COLOR));

    let filtered: Vec<[f64; 2]> = samples
        .iter()
        .filter_map(|s| s.accel_filtered.map(|v| [s.time_ms, v]))
        .collect();
    if !filtered.is_empty() {
        fig.add_series(line("filtered", filtered, max_points, 1.6, FILTERED_COLOR));
    }

    let names: Vec<&String> = samples
        .first()
        .map(|s| s.derived.keys().collect())
        .unwrap_or_default();
    for (k, name) in names.into_iter().enumerate() {
        let points = samples
            .iter()
            .filter_map(|s| s.derived.get(name).map(|v| [s.time_ms, *v]))
            .collect();
        let color = Color(DERIVED_COLORS[k % DERIVED_COLORS.len()]);
        fig.add_series(line(name, points, max_points, 1.2, color));
    }

    if let Some(range) = highlight {
        fig.add_series(Series::Span(Span {
            name: "first hit".into(),
            range,
            color: SPAN_COLOR,
        }));
    }
    fig
}

/// Jerk chart; `None` when jerk was not computed.
pub fn jerk_figure(samples: &[ProcessedSample], max_points: usize) -> Option<Figure> {
    let points: Vec<[f64; 2]> = samples
        .iter()
        .filter_map(|s| s.jerk.map(|j| [s.time_ms, j]))
        .collect();
    if points.is_empty() {
        return None;
    }
    let mut fig = Figure::new(Some("Jerk".into()));
    fig.x.label = Some("time (ms)".into());
    fig.y.label = Some("jerk (g/s)".into());
    fig.add_series(line("jerk", points, max_points, 1.4, JERK_COLOR));
    Some(fig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn samples(n: usize) -> Vec<ProcessedSample> {
        (0..n)
            .map(|i| {
                let mut derived = BTreeMap::new();
                derived.insert("smooth".to_string(), 0.5);
                ProcessedSample {
                    time_ms: i as f64,
                    accel_raw: if i == 777 { 50.0 } else { 0.0 },
                    accel_filtered: Some(0.0),
                    jerk: None,
                    derived,
                }
            })
            .collect()
    }

    #[test]
    fn decimation_keeps_the_peak() {
        let points: Vec<[f64; 2]> = samples(5000).iter().map(|s| [s.time_ms, s.accel_raw]).collect();
        let out = decimate_points(&points, 200);
        assert!(out.len() <= 200);
        assert!(out.iter().any(|p| p[1] == 50.0));
        assert!(out.windows(2).all(|w| w[0][0] < w[1][0]));
    }

    #[test]
    fn short_input_is_untouched() {
        let points = vec![[0.0, 1.0], [1.0, 2.0]];
        assert_eq!(decimate_points(&points, 10), points);
    }

    #[test]
    fn processed_figure_has_all_series() {
        let s = samples(100);
        let fig = figure_from_processed("drop", &s, Some(TimeRange::new(10.0, 20.0)), 1000);
        let names: Vec<&str> = fig.lines().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["raw", "filtered", "smooth"]);
        assert!(matches!(fig.series.last(), Some(Series::Span(_))));
        assert_eq!(fig.bounds(), Some((0.0, 99.0, 0.0, 0.5)));
        assert!(jerk_figure(&s, 1000).is_none());
    }

    #[test]
    fn color_splits_into_channels() {
        assert_eq!(Color(0x1565C0).rgb(), (0x15, 0x65, 0xC0));
    }
}
