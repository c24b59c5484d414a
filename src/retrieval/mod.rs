// src/retrieval/mod.rs
pub mod decode;
pub mod providers;
pub mod types;

pub use types::{LightCurveProvider, RawSample, RawSeries};
