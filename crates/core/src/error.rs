//! # Pipeline Error Taxonomy
//!
//! Only three conditions surface to callers of the pipeline. Everything
//! else (rate limits, malformed model output, unreachable pages) is
//! absorbed into attempt records or degraded results along the way.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The caller handed us something unusable (empty name, bad URL,
    /// unknown language code). Raised before any network traffic.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Every model tier failed on every hierarchy pass. Carries the
    /// last error seen per tier so the caller can see what went wrong
    /// at each level.
    #[error("all model tiers exhausted after {restarts} full passes")]
    HierarchyExhausted {
        restarts: u32,
        tier_errors: Vec<(String, String)>,
    },

    /// A probe sub-step failed (fetch, crawl, screenshot). Never fatal
    /// to a pipeline run; the runner logs it and continues with an
    /// inactive probe report.
    #[error("probe failure: {0}")]
    ProbeFailure(String),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn probe_failure(msg: impl Into<String>) -> Self {
        Self::ProbeFailure(msg.into())
    }
}
