// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod retrieval;
pub mod sample;

// ---- Re-exports for stable public API ----
pub use crate::config::{CatalogEntry, DatasetConfig, ProviderConfig};
pub use crate::error::{EmptySeriesError, EntryError, RetrievalError};
pub use crate::pipeline::{run_catalog, verify_outputs, EntryOutcome, EntryStatus, RunReport};
pub use crate::retrieval::{LightCurveProvider, RawSample, RawSeries};
pub use crate::sample::{build, serialize, LabeledSample, NormalizedPoint, NormalizedSeries};
