//! Range percent: rolling mean of (high - low) / close.
//!
//! A cheap volatility gauge used to rank swing candidates. Multiplying by
//! `WEEKLY_RANGE_FACTOR * 100` turns it into a weekly move potential in percent.
//! Lookback: period - 1.

use super::rolling::rolling_mean;
use super::Indicator;
use crate::domain::PriceBar;

/// Converts an average daily range fraction into a rough weekly potential.
pub const WEEKLY_RANGE_FACTOR: f64 = 2.2;

/// Weekly move potential in percent from an average daily range fraction.
pub fn weekly_potential(range_pct: f64) -> f64 {
    range_pct * 100.0 * WEEKLY_RANGE_FACTOR
}

#[derive(Debug, Clone)]
pub struct RangePct {
    period: usize,
    name: String,
}

impl RangePct {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "range period must be >= 1");
        Self {
            period,
            name: format!("range_pct_{period}"),
        }
    }
}

impl Indicator for RangePct {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let ranges: Vec<f64> = bars.iter().map(PriceBar::range_pct).collect();
        rolling_mean(&ranges, self.period)
    }
}
