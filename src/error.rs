// src/error.rs
//! Per-entry error kinds. One failing catalog entry never aborts the run;
//! the driving loop collects these and reports them by `kind()`.

use std::path::PathBuf;
use thiserror::Error;

/// Why the retrieval adapter could not produce a raw series.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("unknown target '{target}' for mission {mission}")]
    UnknownTarget { target: String, mission: String },

    #[error("mission {mission} has no light curve for '{target}'")]
    NoData { target: String, mission: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed light curve payload: {0}")]
    Malformed(String),
}

/// The normalization base could not be computed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmptySeriesError {
    #[error("no valid samples left after filtering ({dropped} dropped)")]
    NoValidSamples { dropped: usize },

    #[error("median flux {median} is not a usable normalization base")]
    DegenerateMedian { median: f64 },

    #[error("sample {index} is not a finite number after normalization")]
    NonFinite { index: usize },
}

/// Everything that can go wrong for a single catalog entry.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    EmptySeries(#[from] EmptySeriesError),

    #[error("cannot write {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EntryError {
    /// Stable short name used in logs, metrics labels and the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            EntryError::Retrieval(_) => "RetrievalError",
            EntryError::EmptySeries(_) => "EmptySeriesError",
            EntryError::Serialization { .. } => "SerializationError",
        }
    }
}
