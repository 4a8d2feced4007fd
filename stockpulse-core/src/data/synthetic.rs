//! Deterministic synthetic provider.
//!
//! Each symbol gets its own random walk seeded from BLAKE3(master seed, symbol),
//! so the same (seed, symbol, end date, lookback) always yields identical bars
//! regardless of which thread asks first. Used for offline demos, tests and
//! benchmarks.

use super::provider::{into_series, DataError, PriceProvider};
use crate::domain::{PriceBar, PriceSeries};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded random-walk price source.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    master_seed: u64,
    end: NaiveDate,
    /// Mean daily return.
    drift: f64,
    /// Half-width of the uniform daily return shock.
    volatility: f64,
}

impl SyntheticProvider {
    /// Walks ending on `end`, with a mild upward drift.
    pub fn new(master_seed: u64, end: NaiveDate) -> Self {
        Self {
            master_seed,
            end,
            drift: 0.0004,
            volatility: 0.03,
        }
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility.abs();
        self
    }

    /// Per-symbol seed, independent of request order.
    pub fn sub_seed(&self, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(seed)
    }

    /// Generate weekday bars in `(end - lookback_days, end]`.
    pub fn generate(&self, symbol: &str, lookback_days: u32) -> Vec<PriceBar> {
        let mut rng = StdRng::seed_from_u64(self.sub_seed(symbol));
        let mut close: f64 = rng.gen_range(20.0..500.0);
        let start = self.end - Duration::days(i64::from(lookback_days));

        let mut bars = Vec::new();
        let mut date = start;
        while date < self.end {
            date += Duration::days(1);
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            let open = close;
            let shock = rng.gen_range(-self.volatility..=self.volatility);
            close = (open * (1.0 + self.drift + shock)).max(0.01);
            let wick = self.volatility / 2.0;
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..=wick));
            let low = (open.min(close) * (1.0 - rng.gen_range(0.0..=wick))).max(0.005);
            // Roughly one session in ten trades heavy.
            let base: u64 = rng.gen_range(400_000..1_200_000);
            let volume = if rng.gen_bool(0.1) { base * 2 } else { base };
            bars.push(PriceBar {
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        bars
    }
}

impl PriceProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn history(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries, DataError> {
        into_series(symbol, self.generate(symbol, lookback_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SyntheticProvider {
        SyntheticProvider::new(42, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap())
    }

    #[test]
    fn same_symbol_same_bars() {
        let p = provider();
        assert_eq!(p.history("AAA", 100).unwrap(), p.history("AAA", 100).unwrap());
    }

    #[test]
    fn symbols_get_distinct_walks() {
        let p = provider();
        let a = p.history("AAA", 100).unwrap();
        let b = p.history("BBB", 100).unwrap();
        assert_ne!(a.closes(), b.closes());
    }

    #[test]
    fn only_weekdays_within_window() {
        let p = provider();
        let s = p.history("AAA", 28).unwrap();
        assert_eq!(s.len(), 20);
        assert_eq!(s.as_of(), NaiveDate::from_ymd_opt(2024, 6, 28));
        assert!(s
            .bars()
            .iter()
            .all(|b| !matches!(b.date.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn bars_are_valid() {
        let p = provider().with_volatility(0.2);
        let s = p.history("WILD", 800).unwrap();
        assert!(s.bars().iter().all(|b| b.defect().is_none()));
    }

    #[test]
    fn zero_lookback_is_empty() {
        assert!(provider().history("AAA", 0).unwrap().is_empty());
    }
}
