// src/retrieval/types.rs
use crate::error::RetrievalError;

/// One instrument reading. `valid = false` marks a reading that must never
/// reach the normalized output or the median.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub timestamp: f64,
    pub flux: f64,
    pub valid: bool,
}

impl RawSample {
    pub fn new(timestamp: f64, flux: f64, valid: bool) -> Self {
        Self {
            timestamp,
            flux,
            valid,
        }
    }
}

/// Time-ascending readings as returned by a provider.
pub type RawSeries = Vec<RawSample>;

#[async_trait::async_trait]
pub trait LightCurveProvider: Send + Sync {
    /// Fetch the light curve of `target` observed by `mission`.
    /// When several data products match, the first one is used.
    async fn fetch(&self, target: &str, mission: &str) -> Result<RawSeries, RetrievalError>;
    fn name(&self) -> &'static str;
}
