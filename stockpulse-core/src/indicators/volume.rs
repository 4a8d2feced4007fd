//! Volume indicators: trailing average volume and relative volume (RVOL).
//!
//! AvgVolume: rolling mean of volume over `period` bars, including the current bar.
//! RVOL: volume / AvgVolume; undefined when the average is 0.
//! Lookback: period - 1.

use super::rolling::rolling_mean;
use super::Indicator;
use crate::domain::PriceBar;

fn volumes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume as f64).collect()
}

#[derive(Debug, Clone)]
pub struct AvgVolume {
    period: usize,
    name: String,
}

impl AvgVolume {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "volume period must be >= 1");
        Self {
            period,
            name: format!("avg_volume_{period}"),
        }
    }
}

impl Indicator for AvgVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        rolling_mean(&volumes(bars), self.period)
    }
}

#[derive(Debug, Clone)]
pub struct Rvol {
    period: usize,
    name: String,
}

impl Rvol {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RVOL period must be >= 1");
        Self {
            period,
            name: format!("rvol_{period}"),
        }
    }
}

impl Indicator for Rvol {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let vols = volumes(bars);
        let avg = rolling_mean(&vols, self.period);
        vols.iter()
            .zip(&avg)
            .map(|(&v, &a)| if a > 0.0 { v / a } else { f64::NAN })
            .collect()
    }
}
