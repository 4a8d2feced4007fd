//! PriceSeries: validated, date-ascending bars for one symbol.

use super::bar::PriceBar;
use crate::error::{CoreError, Result};
use chrono::NaiveDate;
use serde::Serialize;

/// Ordered bar history for a single instrument.
///
/// The only constructor validates the bars, so every `PriceSeries` in
/// circulation has strictly increasing dates and positive finite prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Validate and wrap `bars`.
    ///
    /// An empty series is valid here; the evaluator rejects it later as
    /// insufficient history.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self> {
        let symbol = symbol.into();
        for (i, bar) in bars.iter().enumerate() {
            if let Some(defect) = bar.defect() {
                return Err(CoreError::InvalidSeries(format!("{symbol}: {defect}")));
            }
            if i > 0 && bars[i - 1].date >= bar.date {
                return Err(CoreError::InvalidSeries(format!(
                    "{symbol}: dates not strictly increasing at {} (after {})",
                    bar.date,
                    bars[i - 1].date
                )));
            }
        }
        Ok(Self { symbol, bars })
    }

    /// Sort by date and drop duplicate dates (last one wins) before validating.
    ///
    /// Used by providers whose upstream occasionally repeats or reorders rows.
    pub fn from_unsorted(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Result<Self> {
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(prev) if prev.date == bar.date => *prev = bar,
                _ => deduped.push(bar),
            }
        }
        Self::new(symbol, deduped)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Most recent bar.
    pub fn latest(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Date of the most recent bar.
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Keep only the most recent `n` bars.
    pub fn tail(&self, n: usize) -> PriceSeries {
        let start = self.bars.len().saturating_sub(n);
        PriceSeries {
            symbol: self.symbol.clone(),
            bars: self.bars[start..].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn accepts_ascending_bars() {
        let s = PriceSeries::new("SPY", vec![bar(2, 10.0), bar(3, 11.0)]).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.symbol(), "SPY");
        assert_eq!(s.as_of(), NaiveDate::from_ymd_opt(2024, 1, 3));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let err = PriceSeries::new("SPY", vec![bar(2, 10.0), bar(2, 11.0)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSeries(_)));
    }

    #[test]
    fn rejects_descending_dates() {
        let err = PriceSeries::new("SPY", vec![bar(3, 10.0), bar(2, 11.0)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSeries(_)));
    }

    #[test]
    fn rejects_non_positive_price() {
        let mut b = bar(2, 10.0);
        b.low = -1.0;
        let err = PriceSeries::new("SPY", vec![b]).unwrap_err();
        assert!(err.to_string().contains("non-positive"));
    }

    #[test]
    fn from_unsorted_sorts_and_dedupes() {
        let s =
            PriceSeries::from_unsorted("SPY", vec![bar(4, 12.0), bar(2, 10.0), bar(4, 13.0)])
                .unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.latest().unwrap().close, 13.0);
    }

    #[test]
    fn empty_series_is_valid() {
        let s = PriceSeries::new("SPY", Vec::new()).unwrap();
        assert!(s.is_empty());
        assert!(s.latest().is_none());
    }

    #[test]
    fn tail_keeps_most_recent() {
        let s = PriceSeries::new("SPY", vec![bar(2, 10.0), bar(3, 11.0), bar(4, 12.0)]).unwrap();
        let t = s.tail(2);
        assert_eq!(t.closes(), vec![11.0, 12.0]);
        assert_eq!(s.tail(10).len(), 3);
    }
}
