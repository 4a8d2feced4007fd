//! Error taxonomy for the evaluation pipeline.
//!
//! Scan-level callers degrade every variant to an exclusion; single-instrument
//! callers surface it so the presentation layer can say why no signal exists.

use crate::data::DataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input: unsorted or duplicate dates, non-positive or
    /// non-finite prices. A caller bug; never retried.
    #[error("invalid price series: {0}")]
    InvalidSeries(String),

    /// Not enough bars for the indicators the active rule set needs.
    #[error("insufficient history: {required} bars required, {available} available")]
    InsufficientHistory { required: usize, available: usize },

    /// Upstream data provider failure.
    #[error("provider fetch failed: {0}")]
    ProviderFetch(DataError),

    /// Non-positive price or undefined volatility given to the risk calculator.
    #[error("invalid risk inputs: {0}")]
    InvalidRiskInputs(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    /// Short machine-friendly label used in scan exclusion reports.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidSeries(_) => "invalid_series",
            CoreError::InsufficientHistory { .. } => "insufficient_history",
            CoreError::ProviderFetch(_) => "provider_fetch",
            CoreError::InvalidRiskInputs(_) => "invalid_risk_inputs",
            CoreError::Config(_) => "config",
        }
    }

    /// Whether a single-instrument fetch should retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::ProviderFetch(e) if e.is_transient())
    }
}

impl From<DataError> for CoreError {
    /// Bars rejected by series validation stay classified as invalid series,
    /// whichever layer caught them.
    fn from(err: DataError) -> Self {
        match err {
            DataError::Validation(msg) => CoreError::InvalidSeries(msg),
            other => CoreError::ProviderFetch(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
