use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use impact_lib::{
    io::csv as csv_io,
    pipeline::{compute, MetricWindow, PipelineConfig, PipelineOutput, ZoomTarget},
    plot::{figure_from_processed, jerk_figure, Figure, PlotBackend, Series},
    signal::RawSample,
    spectral::auto_window,
    timebase::{estimate_sample_rate, is_uniform, median_delta_ms},
};
use plotters::prelude::*;
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "impact",
    version,
    about = "Drop-test signal conditioning and injury metrics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Window {
    #[value(name = "full")]
    Full,
    #[value(name = "first-hit")]
    FirstHit,
}

#[derive(clap::Args)]
struct InputArgs {
    /// Two-column time_ms/accel file; stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    /// Pipeline configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full chain and print metrics and diagnostics as JSON
    Analyze {
        #[command(flatten)]
        args: InputArgs,
        /// Metric window; overrides the configuration
        #[arg(long, value_enum)]
        window: Option<Window>,
        /// Explicit metric window start (ms, rebased time); needs --max-ms
        #[arg(long, requires = "max_ms")]
        min_ms: Option<f64>,
        #[arg(long, requires = "min_ms")]
        max_ms: Option<f64>,
        /// Include the processed series in the JSON
        #[arg(long)]
        series: bool,
    },
    /// Write the processed series as CSV
    Filter {
        #[command(flatten)]
        args: InputArgs,
        /// Output CSV; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Estimate the sampling rate of the input timestamps
    SampleRate {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Locate the first impact window
    FirstHit {
        #[command(flatten)]
        args: InputArgs,
    },
    /// Ringing spectrum of the impact window
    Spectrum {
        #[command(flatten)]
        args: InputArgs,
    },
    /// Render acceleration (and jerk) charts
    Plot {
        #[command(flatten)]
        args: InputArgs,
        /// Acceleration PNG
        #[arg(long)]
        out: Option<PathBuf>,
        /// Jerk PNG
        #[arg(long)]
        jerk_out: Option<PathBuf>,
        /// Chart-neutral figure as JSON
        #[arg(long)]
        figure_json: Option<PathBuf>,
        #[arg(long, default_value_t = 2000)]
        max_points: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            args,
            window,
            min_ms,
            max_ms,
            series,
        } => cmd_analyze(&args, window, min_ms.zip(max_ms), series)?,
        Commands::Filter { args, out } => cmd_filter(&args, out.as_deref())?,
        Commands::SampleRate { input } => cmd_sample_rate(input.as_deref())?,
        Commands::FirstHit { args } => cmd_first_hit(&args)?,
        Commands::Spectrum { args } => cmd_spectrum(&args)?,
        Commands::Plot {
            args,
            out,
            jerk_out,
            figure_json,
            max_points,
        } => cmd_plot(
            &args,
            out.as_deref(),
            jerk_out.as_deref(),
            figure_json.as_deref(),
            max_points,
        )?,
    }
    Ok(())
}

fn read_samples(input: Option<&Path>) -> Result<Vec<RawSample>> {
    match input {
        Some(path) => csv_io::read_accel_csv(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            csv_io::parse_accel_text(&buf)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn run(args: &InputArgs, cfg: &PipelineConfig) -> Result<PipelineOutput> {
    let samples = read_samples(args.input.as_deref())?;
    Ok(compute(&samples, cfg)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn cmd_analyze(
    args: &InputArgs,
    window: Option<Window>,
    range: Option<(f64, f64)>,
    series: bool,
) -> Result<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    match (window, range) {
        (_, Some((min_ms, max_ms))) => cfg.metric_window = MetricWindow::Range { min_ms, max_ms },
        (Some(Window::Full), None) => cfg.metric_window = MetricWindow::FullRange,
        (Some(Window::FirstHit), None) => cfg.metric_window = MetricWindow::FirstHit,
        (None, None) => {}
    }
    let out = run(args, &cfg)?;
    if series {
        return print_json(&out);
    }

    #[derive(Serialize)]
    struct Summary<'a> {
        metrics: &'a impact_lib::InjuryMetrics,
        #[serde(skip_serializing_if = "Option::is_none")]
        first_hit: Option<&'a impact_lib::FirstHit>,
        diagnostics: &'a impact_lib::pipeline::Diagnostics,
    }
    print_json(&Summary {
        metrics: &out.metrics,
        first_hit: out.first_hit.as_ref(),
        diagnostics: &out.diagnostics,
    })
}

fn cmd_filter(args: &InputArgs, out: Option<&Path>) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let result = run(args, &cfg)?;
    for (name, err) in &result.diagnostics.filter_failures {
        log::warn!("{name}: {err}");
    }
    match out {
        Some(path) => csv_io::write_processed_csv_file(path, &result.processed),
        None => csv_io::write_processed_csv(io::stdout().lock(), &result.processed),
    }
}

fn cmd_sample_rate(input: Option<&Path>) -> Result<()> {
    #[derive(Serialize)]
    struct RateReport {
        samples: usize,
        estimated_hz: f64,
        design_hz: f64,
        mean_dt_ms: f64,
        median_dt_ms: f64,
        uniform: bool,
    }
    let samples = read_samples(input)?;
    let rate = estimate_sample_rate(&samples)?;
    print_json(&RateReport {
        samples: samples.len(),
        estimated_hz: rate.hz,
        design_hz: rate.design_hz,
        mean_dt_ms: rate.dt_ms,
        median_dt_ms: median_delta_ms(&samples)?,
        uniform: is_uniform(&samples, 1e-6),
    })
}

fn cmd_first_hit(args: &InputArgs) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let out = run(args, &cfg)?;
    let Some(hit) = out.first_hit else {
        bail!("no first hit found: {}", out.diagnostics.notes.join("; "));
    };
    print_json(&hit)
}

fn cmd_spectrum(args: &InputArgs) -> Result<()> {
    #[derive(Serialize)]
    struct SpectrumOutput<'a> {
        impact_window: &'a impact_lib::ImpactWindow,
        spectrum: Option<&'a impact_lib::spectral::SpectrumReport>,
        ringing: Option<&'a impact_lib::spectral::RingingEstimate>,
        suggested_window: Option<usize>,
    }
    let cfg = load_config(args.config.as_deref())?;
    let out = run(args, &cfg)?;
    let d = &out.diagnostics;
    let Some(impact_window) = d.impact_window.as_ref() else {
        bail!("no impact window: {}", d.notes.join("; "));
    };
    let ringing_hz = d
        .ringing
        .map(|r| r.frequency_hz)
        .or_else(|| d.spectrum.as_ref().and_then(|s| s.dominant()).map(|p| p.frequency_hz));
    print_json(&SpectrumOutput {
        impact_window,
        spectrum: d.spectrum.as_ref(),
        ringing: d.ringing.as_ref(),
        suggested_window: ringing_hz.map(|hz| auto_window(hz, d.rate.hz, &cfg.auto_window)),
    })
}

fn cmd_plot(
    args: &InputArgs,
    out: Option<&Path>,
    jerk_out: Option<&Path>,
    figure_json: Option<&Path>,
    max_points: usize,
) -> Result<()> {
    if out.is_none() && jerk_out.is_none() && figure_json.is_none() {
        bail!("nothing to write: pass --out, --jerk-out or --figure-json");
    }
    let cfg = load_config(args.config.as_deref())?;
    let result = run(args, &cfg)?;
    let title = args
        .input
        .as_deref()
        .and_then(|p| p.file_stem())
        .map_or_else(|| "Acceleration".to_string(), |s| s.to_string_lossy().into_owned());
    let fig = figure_from_processed(
        &title,
        &result.processed,
        result.zoom(ZoomTarget::FirstHit),
        max_points,
    );
    if let Some(path) = figure_json {
        let text = serde_json::to_string(&fig)?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = out {
        PngBackend::new(path).draw(&fig)?;
    }
    if let Some(path) = jerk_out {
        let Some(jerk) = jerk_figure(&result.processed, max_points) else {
            bail!("jerk was not computed; check the jerk filter configuration");
        };
        PngBackend::new(path).draw(&jerk)?;
    }
    Ok(())
}

struct PngBackend<'a> {
    path: &'a Path,
    size: (u32, u32),
}

impl<'a> PngBackend<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            size: (1000, 560),
        }
    }
}

impl PlotBackend for PngBackend<'_> {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let Some((x_min, mut x_max, mut y_min, mut y_max)) = fig.bounds() else {
            bail!("figure has no data");
        };
        if x_max <= x_min {
            x_max = x_min + 1.0;
        }
        if y_max <= y_min {
            y_min -= 1.0;
            y_max += 1.0;
        }
        let pad = 0.05 * (y_max - y_min);
        let (y_min, y_max) = (y_min - pad, y_max + pad);

        let root = BitMapBackend::new(self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        chart
            .configure_mesh()
            .x_desc(fig.x.label.clone().unwrap_or_default())
            .y_desc(fig.y.label.clone().unwrap_or_default())
            .draw()?;

        for series in &fig.series {
            match series {
                Series::Span(span) => {
                    let (r, g, b) = span.color.rgb();
                    chart.draw_series(std::iter::once(Rectangle::new(
                        [(span.range.min_ms, y_min), (span.range.max_ms, y_max)],
                        RGBColor(r, g, b).mix(0.2).filled(),
                    )))?;
                }
                Series::Line(line) => {
                    let (r, g, b) = line.style.color.rgb();
                    let color = RGBColor(r, g, b);
                    let width = line.style.width.round().max(1.0) as u32;
                    chart
                        .draw_series(LineSeries::new(
                            line.points.iter().map(|p| (p[0], p[1])),
                            color.stroke_width(width),
                        ))?
                        .label(line.name.clone())
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                        });
                }
            }
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    }
}
