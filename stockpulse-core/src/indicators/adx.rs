//! ADX: Average Directional Index.
//!
//! Steps:
//! 1. +DM / -DM from consecutive highs and lows; a move counts only if it is
//!    positive and larger than the opposite move, otherwise 0
//! 2. ATR = rolling mean of true range
//! 3. +DI = 100 * mean(+DM) / ATR, -DI = 100 * mean(-DM) / ATR
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI), 0 when the denominator is 0
//! 5. ADX = rolling mean of DX
//!
//! All means are simple rolling means over `period`.
//! Lookback: 2 * period - 1.

use super::atr::true_range;
use super::rolling::rolling_mean;
use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

/// +DM and -DM series. Index 0 is undefined.
pub fn directional_movement(bars: &[PriceBar]) -> (Vec<f64>, Vec<f64>) {
    let n = bars.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;

        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    (plus_dm, minus_dm)
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let n = bars.len();
        let (plus_dm, minus_dm) = directional_movement(bars);
        let atr = rolling_mean(&true_range(bars), self.period);
        let mean_plus = rolling_mean(&plus_dm, self.period);
        let mean_minus = rolling_mean(&minus_dm, self.period);

        let mut dx = vec![f64::NAN; n];
        for i in 0..n {
            if atr[i].is_nan() || mean_plus[i].is_nan() || mean_minus[i].is_nan() {
                continue;
            }
            if atr[i] == 0.0 {
                dx[i] = 0.0;
                continue;
            }

            let plus_di = 100.0 * mean_plus[i] / atr[i];
            let minus_di = 100.0 * mean_minus[i] / atr[i];
            let di_sum = plus_di + minus_di;

            dx[i] = if di_sum == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / di_sum
            };
        }

        rolling_mean(&dx, self.period)
    }
}
