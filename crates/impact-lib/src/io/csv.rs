use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::io::Write;
use std::path::Path;

use crate::signal::{ProcessedSample, RawSample};

/// Guess the field separator from the first data line: tab, semicolon, comma, else whitespace
/// (returned as `None`).
pub fn sniff_delimiter(text: &str) -> Option<u8> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))?;
    [b'\t', b';', b',']
        .into_iter()
        .find(|d| line.as_bytes().contains(d))
}

/// Parse two-column `time_ms, accel` text. A non-numeric first row is taken as a header; blank
/// and `#` lines are skipped; extra columns are ignored. Rows are returned sorted by time.
pub fn parse_accel_text(text: &str) -> Result<Vec<RawSample>> {
    let normalized;
    let (body, delimiter) = match sniff_delimiter(text) {
        Some(d) => (text, d),
        None => {
            normalized = text
                .lines()
                .map(|l| l.split_whitespace().collect::<Vec<_>>().join(","))
                .collect::<Vec<_>>()
                .join("\n");
            (normalized.as_str(), b',')
        }
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut out = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.context("reading record")?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map_or(idx + 1, |p| p.line() as usize);
        let fields = (record.get(0), record.get(1));
        let (Some(t), Some(a)) = fields else {
            bail!("line {line}: expected two columns, found {}", record.len());
        };
        match (t.parse::<f64>(), a.parse::<f64>()) {
            (Ok(time_ms), Ok(accel)) => out.push(RawSample::new(time_ms, accel)),
            _ if out.is_empty() && idx == 0 => {
                log::debug!("skipping header row {t:?}, {a:?}");
            }
            (Err(_), _) => bail!("line {line}: time {t:?} is not a number"),
            (_, Err(_)) => bail!("line {line}: acceleration {a:?} is not a number"),
        }
    }
    if out.is_empty() {
        bail!("no numeric samples found");
    }
    out.sort_by(|x, y| x.time_ms.total_cmp(&y.time_ms));
    Ok(out)
}

/// Read a `time_ms, accel` file from disk.
pub fn read_accel_csv(path: &Path) -> Result<Vec<RawSample>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_accel_text(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Write processed samples as CSV. Derived series become extra columns in name order; absent
/// values are empty cells.
pub fn write_processed_csv<W: Write>(writer: W, samples: &[ProcessedSample]) -> Result<()> {
    let derived: Vec<&String> = samples
        .first()
        .map(|s| s.derived.keys().collect())
        .unwrap_or_default();
    let mut out = WriterBuilder::new().from_writer(writer);

    let mut header = vec!["time_ms", "accel_raw", "accel_filtered", "jerk"];
    header.extend(derived.iter().map(|s| s.as_str()));
    out.write_record(&header)?;

    let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for s in samples {
        let mut row = vec![
            s.time_ms.to_string(),
            s.accel_raw.to_string(),
            cell(s.accel_filtered),
            cell(s.jerk),
        ];
        row.extend(derived.iter().map(|name| cell(s.derived.get(*name).copied())));
        out.write_record(&row)?;
    }
    out.flush().context("flushing processed csv")?;
    Ok(())
}

/// Write processed samples to `path`.
pub fn write_processed_csv_file(path: &Path, samples: &[ProcessedSample]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_processed_csv(file, samples)
}
