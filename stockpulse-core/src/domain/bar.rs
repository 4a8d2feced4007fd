//! PriceBar: one trading-period observation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar.
///
/// Bars carry no symbol; the owning `PriceSeries` does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Why this bar is unusable, or `None` if it is sane.
    ///
    /// Prices must be finite and strictly positive, and high must not be
    /// below low. Open/close may sit outside [low, high] in vendor data, so
    /// that is tolerated.
    pub fn defect(&self) -> Option<String> {
        if self.is_void() {
            return Some(format!("{}: non-finite price", self.date));
        }
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Some(format!("{}: non-positive price", self.date));
        }
        if self.high < self.low {
            return Some(format!(
                "{}: high {} below low {}",
                self.date, self.high, self.low
            ));
        }
        None
    }

    /// (high - low) / close for this bar.
    pub fn range_pct(&self) -> f64 {
        (self.high - self.low) / self.close
    }
}
