//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over data sources (Yahoo Finance, CSV
//! directory, synthetic walks) so implementations can be swapped and mocked
//! in tests. The cache layer wraps this trait; providers don't know about it.

use crate::domain::{PriceBar, PriceSeries};
use crate::error::CoreError;
use std::sync::Arc;
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} for {symbol}")]
    HttpStatus { status: u16, symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    /// Upstream returned bars that do not form a valid series.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::NetworkUnreachable(_) | DataError::RateLimited { .. } => true,
            DataError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Trait for price history sources.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Daily bars for `symbol` covering roughly the last `lookback_days`
    /// calendar days, validated and date-ascending.
    ///
    /// An empty series is a valid answer; the evaluator reports it as
    /// insufficient history.
    fn history(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries, DataError>;
}

impl<P: PriceProvider + ?Sized> PriceProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn history(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries, DataError> {
        (**self).history(symbol, lookback_days)
    }
}

impl<P: PriceProvider + ?Sized> PriceProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn history(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries, DataError> {
        (**self).history(symbol, lookback_days)
    }
}

/// Sort, dedupe and validate raw provider bars.
pub(crate) fn into_series(symbol: &str, bars: Vec<PriceBar>) -> Result<PriceSeries, DataError> {
    PriceSeries::from_unsorted(symbol, bars).map_err(|e| match e {
        CoreError::InvalidSeries(msg) => DataError::Validation(msg),
        other => DataError::Validation(other.to_string()),
    })
}
