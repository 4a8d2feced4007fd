//! Named indicator series precomputed for one `PriceSeries` snapshot.
//!
//! Built once per snapshot, then queried by bar index. Never mutated: a
//! refreshed series gets a new set.

use super::{
    Adx, Atr, AvgVolume, Bollinger, Ema, Indicator, Macd, MacdLine, RangePct, Rsi, Rvol, Sma,
};
use crate::domain::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// The indicators the evaluator knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndicatorKey {
    Sma50,
    Sma200,
    Ema20,
    Ema50,
    Rsi14,
    Macd,
    MacdSignal,
    MacdHist,
    BbUpper,
    BbMiddle,
    BbLower,
    Atr14,
    Adx14,
    AvgVolume20,
    Rvol20,
    RangePct14,
}

impl IndicatorKey {
    pub const ALL: [IndicatorKey; 16] = [
        IndicatorKey::Sma50,
        IndicatorKey::Sma200,
        IndicatorKey::Ema20,
        IndicatorKey::Ema50,
        IndicatorKey::Rsi14,
        IndicatorKey::Macd,
        IndicatorKey::MacdSignal,
        IndicatorKey::MacdHist,
        IndicatorKey::BbUpper,
        IndicatorKey::BbMiddle,
        IndicatorKey::BbLower,
        IndicatorKey::Atr14,
        IndicatorKey::Adx14,
        IndicatorKey::AvgVolume20,
        IndicatorKey::Rvol20,
        IndicatorKey::RangePct14,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKey::Sma50 => "SMA50",
            IndicatorKey::Sma200 => "SMA200",
            IndicatorKey::Ema20 => "EMA20",
            IndicatorKey::Ema50 => "EMA50",
            IndicatorKey::Rsi14 => "RSI14",
            IndicatorKey::Macd => "MACD",
            IndicatorKey::MacdSignal => "MACD_SIGNAL",
            IndicatorKey::MacdHist => "MACD_HIST",
            IndicatorKey::BbUpper => "BB_UPPER",
            IndicatorKey::BbMiddle => "BB_MIDDLE",
            IndicatorKey::BbLower => "BB_LOWER",
            IndicatorKey::Atr14 => "ATR14",
            IndicatorKey::Adx14 => "ADX14",
            IndicatorKey::AvgVolume20 => "AVG_VOLUME20",
            IndicatorKey::Rvol20 => "RVOL20",
            IndicatorKey::RangePct14 => "RANGE_PCT14",
        }
    }

    /// The concrete indicator behind this key.
    pub fn indicator(&self) -> Box<dyn Indicator> {
        match self {
            IndicatorKey::Sma50 => Box::new(Sma::new(50)),
            IndicatorKey::Sma200 => Box::new(Sma::new(200)),
            IndicatorKey::Ema20 => Box::new(Ema::new(20)),
            IndicatorKey::Ema50 => Box::new(Ema::new(50)),
            IndicatorKey::Rsi14 => Box::new(Rsi::new(14)),
            IndicatorKey::Macd => Box::new(Macd::standard(MacdLine::Macd)),
            IndicatorKey::MacdSignal => Box::new(Macd::standard(MacdLine::Signal)),
            IndicatorKey::MacdHist => Box::new(Macd::standard(MacdLine::Histogram)),
            IndicatorKey::BbUpper => Box::new(Bollinger::upper(20, 2.0)),
            IndicatorKey::BbMiddle => Box::new(Bollinger::middle(20, 2.0)),
            IndicatorKey::BbLower => Box::new(Bollinger::lower(20, 2.0)),
            IndicatorKey::Atr14 => Box::new(Atr::new(14)),
            IndicatorKey::Adx14 => Box::new(Adx::new(14)),
            IndicatorKey::AvgVolume20 => Box::new(AvgVolume::new(20)),
            IndicatorKey::Rvol20 => Box::new(Rvol::new(20)),
            IndicatorKey::RangePct14 => Box::new(RangePct::new(14)),
        }
    }

    /// Index of the first defined value.
    pub fn lookback(&self) -> usize {
        self.indicator().lookback()
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bars needed so that every key is defined on both the latest and the
/// previous bar: max(lookback) + 2. Zero keys need no history.
pub fn required_bars(keys: &[IndicatorKey]) -> usize {
    keys.iter().map(|k| k.lookback() + 2).max().unwrap_or(0)
}

/// Container for precomputed indicator values, aligned with the source series.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    symbol: String,
    as_of: Option<NaiveDate>,
    len: usize,
    series: HashMap<IndicatorKey, Vec<f64>>,
}

impl IndicatorSet {
    /// Compute the given indicators over `prices`.
    pub fn compute(prices: &PriceSeries, keys: &[IndicatorKey]) -> Self {
        let bars = prices.bars();
        let series = keys
            .iter()
            .map(|&key| (key, key.indicator().compute(bars)))
            .collect();
        Self {
            symbol: prices.symbol().to_string(),
            as_of: prices.as_of(),
            len: bars.len(),
            series,
        }
    }

    /// Compute every known indicator.
    pub fn compute_all(prices: &PriceSeries) -> Self {
        Self::compute(prices, &IndicatorKey::ALL)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn as_of(&self) -> Option<NaiveDate> {
        self.as_of
    }

    /// Number of bars in the source series.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Defined value at `bar_index`; `None` during warm-up, out of range, or
    /// when the key was not computed.
    pub fn get(&self, key: IndicatorKey, bar_index: usize) -> Option<f64> {
        self.series
            .get(&key)
            .and_then(|v| v.get(bar_index).copied())
            .filter(|v| !v.is_nan())
    }

    /// Defined value on the most recent bar.
    pub fn latest(&self, key: IndicatorKey) -> Option<f64> {
        self.len.checked_sub(1).and_then(|i| self.get(key, i))
    }

    /// Defined value on the bar before the most recent one.
    pub fn previous(&self, key: IndicatorKey) -> Option<f64> {
        self.len.checked_sub(2).and_then(|i| self.get(key, i))
    }

    /// Full series (NaN during warm-up).
    pub fn series(&self, key: IndicatorKey) -> Option<&[f64]> {
        self.series.get(&key).map(|v| v.as_slice())
    }

    /// Computed keys, in declaration order.
    pub fn keys(&self) -> Vec<IndicatorKey> {
        let mut keys: Vec<_> = self.series.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Latest value of every computed key, by display name.
    pub fn latest_snapshot(&self) -> BTreeMap<&'static str, Option<f64>> {
        self.keys()
            .into_iter()
            .map(|k| (k.as_str(), self.latest(k)))
            .collect()
    }
}
