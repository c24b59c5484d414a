// src/sample/format.rs
//! Text layout of a labeled sample:
//!
//! ```text
//! <flux> <timestamp>      (one line per sample, 6 fractional digits each)
//! result <planet_count>
//! ```
//!
//! The `result` line is always last, so a file without it is incomplete.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use super::{NormalizedPoint, NormalizedSeries};

pub const LABEL_TOKEN: &str = "result";

/// A normalized series together with its supervised label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub points: Vec<NormalizedPoint>,
    pub planet_count: u32,
}

impl LabeledSample {
    pub fn new(series: NormalizedSeries, planet_count: u32) -> Self {
        Self {
            points: series.points,
            planet_count,
        }
    }
}

/// Write `series` followed by the label line to `sink`.
///
/// Non-finite values are refused with `InvalidData` instead of being written
/// as `NaN`/`inf`.
pub fn serialize<W: Write>(
    series: &NormalizedSeries,
    label: u32,
    sink: &mut W,
) -> io::Result<()> {
    write_rows(&series.points, label, sink)
}

pub(crate) fn write_rows<W: Write>(
    points: &[NormalizedPoint],
    label: u32,
    sink: &mut W,
) -> io::Result<()> {
    for (i, p) in points.iter().enumerate() {
        if !p.flux.is_finite() || !p.timestamp.is_finite() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("row {i} is not finite ({} {})", p.flux, p.timestamp),
            ));
        }
        writeln!(sink, "{:.6} {:.6}", p.flux, p.timestamp)?;
    }
    writeln!(sink, "{LABEL_TOKEN} {label}")
}

/// Parse a file produced by [`serialize`].
pub fn read_labeled_sample(path: &Path) -> Result<LabeledSample> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_labeled_sample(io::BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_labeled_sample<R: BufRead>(reader: R) -> Result<LabeledSample> {
    let mut points = Vec::new();
    let mut label = None;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if label.is_some() {
            bail!("line {}: content after the label line", line_no + 1);
        }
        let mut parts = line.split(' ');
        let first = parts.next().unwrap_or_default();
        let second = parts
            .next()
            .ok_or_else(|| anyhow!("line {}: expected two fields", line_no + 1))?;
        if parts.next().is_some() {
            bail!("line {}: expected two fields", line_no + 1);
        }

        if first == LABEL_TOKEN {
            let count: u32 = second
                .parse()
                .with_context(|| format!("line {}: bad label '{second}'", line_no + 1))?;
            label = Some(count);
            continue;
        }

        let flux: f64 = first
            .parse()
            .with_context(|| format!("line {}: bad flux '{first}'", line_no + 1))?;
        let timestamp: f64 = second
            .parse()
            .with_context(|| format!("line {}: bad timestamp '{second}'", line_no + 1))?;
        points.push(NormalizedPoint { flux, timestamp });
    }

    let planet_count =
        label.ok_or_else(|| anyhow!("missing '{LABEL_TOKEN}' line; file is incomplete"))?;
    Ok(LabeledSample {
        points,
        planet_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(rows: &[(f64, f64)]) -> NormalizedSeries {
        NormalizedSeries {
            points: rows
                .iter()
                .map(|&(flux, timestamp)| NormalizedPoint { flux, timestamp })
                .collect(),
            median_flux: 1.0,
        }
    }

    #[test]
    fn exact_layout() {
        let mut out = Vec::new();
        serialize(&series(&[(0.5, 1.0), (1.5, 2.0)]), 3, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0.500000 1.000000\n1.500000 2.000000\nresult 3\n"
        );
    }

    #[test]
    fn empty_series_still_writes_label() {
        let mut out = Vec::new();
        serialize(&series(&[]), 0, &mut out).unwrap();
        assert_eq!(out, b"result 0\n");
    }

    #[test]
    fn six_digits_for_kepler_like_values() {
        let mut out = Vec::new();
        let rows = [(1.0000004, 131.512382), (0.99999951, 131.53282)];
        serialize(&series(&rows), 8, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1.000000 131.512382\n1.000000 131.532820\nresult 8\n"
        );
    }

    #[test]
    fn non_finite_rows_are_refused() {
        let mut out = Vec::new();
        let err = serialize(&series(&[(f64::NAN, 1.0)]), 1, &mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn parse_round_trip_and_incomplete_detection() {
        let text = "0.500000 1.000000\n1.500000 2.000000\nresult 3\n";
        let s = parse_labeled_sample(text.as_bytes()).unwrap();
        assert_eq!(s.planet_count, 3);
        assert_eq!(s.points.len(), 2);

        let truncated = "0.500000 1.000000\n1.500000 2.0";
        let err = parse_labeled_sample(truncated.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("incomplete"));

        let trailing = "result 3\n\n";
        assert!(parse_labeled_sample(trailing.as_bytes()).is_err());
    }
}
