// src/retrieval/decode.rs
//! Light curve payload decoders shared by all providers.
//!
//! Supported layouts:
//! * JSON: `{"time": [...], "flux": [...], "quality": [...]}` or an array of
//!   such products (the first product is used). `null` cells are invalid.
//! * CSV: header row with `time` and `flux` (or `pdcsap_flux` / `sap_flux`),
//!   optional `quality` (or `sap_quality`). Empty or `nan` cells are invalid.

use serde::Deserialize;

use crate::error::RetrievalError;
use crate::retrieval::types::{RawSample, RawSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Csv,
}

impl PayloadFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn from_content_type(ct: &str) -> Option<Self> {
        let ct = ct.to_ascii_lowercase();
        if ct.contains("json") {
            Some(Self::Json)
        } else if ct.contains("csv") {
            Some(Self::Csv)
        } else {
            None
        }
    }

    /// Guess from the first non-whitespace byte.
    pub fn sniff(body: &str) -> Self {
        match body.trim_start().chars().next() {
            Some('{') | Some('[') => Self::Json,
            _ => Self::Csv,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Treat samples with a non-zero quality flag as invalid.
    pub respect_quality: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            respect_quality: true,
        }
    }
}

/// Decode a payload into a time-ascending series.
/// `Ok(None)` means the payload is well-formed but carries no data product.
pub fn decode_payload(
    body: &str,
    format: PayloadFormat,
    opts: DecodeOptions,
) -> Result<Option<RawSeries>, RetrievalError> {
    let series = match format {
        PayloadFormat::Json => decode_json(body, opts)?,
        PayloadFormat::Csv => decode_csv(body, opts)?,
    };
    Ok(series.map(sort_by_time))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct JsonProduct {
    time: Vec<Option<f64>>,
    flux: Vec<Option<f64>>,
    #[serde(default)]
    quality: Option<Vec<Option<i64>>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonPayload {
    Many(Vec<JsonProduct>),
    One(JsonProduct),
}

fn decode_json(body: &str, opts: DecodeOptions) -> Result<Option<RawSeries>, RetrievalError> {
    let payload: JsonPayload = serde_json::from_str(body)
        .map_err(|e| RetrievalError::Malformed(format!("json: {e}")))?;

    let product = match payload {
        JsonPayload::One(p) => p,
        JsonPayload::Many(v) => match v.into_iter().next() {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    if product.time.len() != product.flux.len() {
        return Err(RetrievalError::Malformed(format!(
            "time has {} values but flux has {}",
            product.time.len(),
            product.flux.len()
        )));
    }
    if let Some(q) = &product.quality {
        if q.len() != product.time.len() {
            return Err(RetrievalError::Malformed(format!(
                "quality has {} values but time has {}",
                q.len(),
                product.time.len()
            )));
        }
    }

    let series = product
        .time
        .iter()
        .zip(&product.flux)
        .enumerate()
        .map(|(i, (t, f))| {
            let quality = product.quality.as_ref().map(|q| q[i]);
            to_sample(*t, *f, quality, opts)
        })
        .collect();

    Ok(Some(series))
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

const FLUX_COLUMNS: [&str; 3] = ["flux", "pdcsap_flux", "sap_flux"];
const QUALITY_COLUMNS: [&str; 2] = ["quality", "sap_quality"];

fn decode_csv(body: &str, opts: DecodeOptions) -> Result<Option<RawSeries>, RetrievalError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| RetrievalError::Malformed(format!("csv headers: {e}")))?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();

    let time_idx = column_index(&headers, &["time"])
        .ok_or_else(|| RetrievalError::Malformed("csv missing 'time' column".into()))?;
    let flux_idx = column_index(&headers, &FLUX_COLUMNS)
        .ok_or_else(|| RetrievalError::Malformed("csv missing 'flux' column".into()))?;
    let quality_idx = column_index(&headers, &QUALITY_COLUMNS);

    let mut series = Vec::new();
    for (row_no, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| RetrievalError::Malformed(format!("csv row {row_no}: {e}")))?;
        let t = parse_cell(record.get(time_idx), row_no, "time")?;
        let f = parse_cell(record.get(flux_idx), row_no, "flux")?;
        let q = match quality_idx {
            Some(idx) => Some(parse_cell(record.get(idx), row_no, "quality")?.map(|v| v as i64)),
            None => None,
        };
        series.push(to_sample(t, f, q, opts));
    }

    if series.is_empty() {
        return Ok(None);
    }
    Ok(Some(series))
}

/// First header matching any of `names`, in preference order.
fn column_index(headers: &[String], names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|n| headers.iter().position(|h| h.as_str() == *n))
}

fn parse_cell(cell: Option<&str>, row: usize, col: &str) -> Result<Option<f64>, RetrievalError> {
    let s = cell.unwrap_or("").trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    s.parse::<f64>()
        .map(Some)
        .map_err(|_| RetrievalError::Malformed(format!("row {row}, {col}: '{s}' is not a number")))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_sample(
    time: Option<f64>,
    flux: Option<f64>,
    quality: Option<Option<i64>>,
    opts: DecodeOptions,
) -> RawSample {
    let t = time.unwrap_or(f64::NAN);
    let f = flux.unwrap_or(f64::NAN);
    let quality_ok = match quality {
        Some(q) if opts.respect_quality => q.unwrap_or(0) == 0,
        _ => true,
    };
    RawSample::new(t, f, t.is_finite() && f.is_finite() && quality_ok)
}

/// Stable sort; readings without a finite timestamp are already invalid.
fn sort_by_time(mut series: RawSeries) -> RawSeries {
    series.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    series
}
