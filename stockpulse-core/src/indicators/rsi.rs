//! Relative Strength Index (RSI).
//!
//! Average gain and average loss are simple rolling means of the positive and
//! negative parts of close-to-close deltas over `period` bars.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//!
//! Edge cases: avg_loss == 0 with gains → 100; avg_gain == 0 with losses → 0;
//! a flat window (no gains, no losses) is undefined, not 50 and not 100.

use super::rolling::rolling_mean;
use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let n = bars.len();
        let mut gains = vec![f64::NAN; n];
        let mut losses = vec![f64::NAN; n];
        for i in 1..n {
            let delta = bars[i].close - bars[i - 1].close;
            gains[i] = delta.max(0.0);
            losses[i] = (-delta).max(0.0);
        }

        let avg_gain = rolling_mean(&gains, self.period);
        let avg_loss = rolling_mean(&losses, self.period);

        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(&g, &l)| compute_rsi(g, l))
            .collect()
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    let flat = avg_loss == 0.0 && avg_gain == 0.0;
    if avg_gain.is_nan() || avg_loss.is_nan() || flat {
        f64::NAN
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
