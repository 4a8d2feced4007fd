//! The rule evaluator.
//!
//! Order of operations for one snapshot:
//! 1. history check (`InsufficientHistory` before any indicator work)
//! 2. SELL overrides; if any fires, scoring is skipped
//! 3. additive scoring over the enabled rules (undefined inputs skip the rule)
//! 4. verdict thresholds, entry/volatility gates, scale reduction

use super::config::{EvaluatorConfig, TrendAverage};
use super::{FiredRule, RuleId, Signal, Verdict};
use crate::domain::{PriceBar, PriceSeries};
use crate::error::{CoreError, Result};
use crate::indicators::range::weekly_potential;
use crate::indicators::{IndicatorKey, IndicatorSet};
use serde::Serialize;

/// A signal plus the secondary metrics downstream consumers need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub signal: Signal,
    /// ATR(14) on the latest bar, for ATR-based risk levels.
    pub atr: Option<f64>,
    /// Weekly range potential in percent, the screener's secondary rank key.
    pub weekly_potential: Option<f64>,
}

/// Stateless evaluator for one configuration. Cheap to share across threads.
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: EvaluatorConfig,
    keys: Vec<IndicatorKey>,
    required_bars: usize,
}

/// Latest and previous indicator values, read once per evaluation.
struct Snapshot<'a> {
    set: &'a IndicatorSet,
    latest: &'a PriceBar,
    previous: &'a PriceBar,
}

impl Snapshot<'_> {
    fn now(&self, key: IndicatorKey) -> Option<f64> {
        self.set.latest(key)
    }

    fn prev(&self, key: IndicatorKey) -> Option<f64> {
        self.set.previous(key)
    }

    fn weekly_potential(&self) -> Option<f64> {
        self.now(IndicatorKey::RangePct14).map(weekly_potential)
    }

    /// Close moved from below EMA20 to above it.
    fn ema20_cross(&self) -> Option<bool> {
        let prev_ema = self.prev(IndicatorKey::Ema20)?;
        let ema = self.now(IndicatorKey::Ema20)?;
        Some(self.previous.close < prev_ema && self.latest.close > ema)
    }
}

impl Evaluator {
    /// Validate `config` and precompute the indicator keys it reads.
    pub fn new(config: EvaluatorConfig) -> Result<Self> {
        config.validate()?;
        let keys = config.required_keys();
        let required_bars = config.required_bars();
        Ok(Self {
            config,
            keys,
            required_bars,
        })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Bars an instrument needs before it can be evaluated.
    pub fn required_bars(&self) -> usize {
        self.required_bars
    }

    /// Indicators this evaluator computes.
    pub fn keys(&self) -> &[IndicatorKey] {
        &self.keys
    }

    /// Evaluate the latest bar of `prices`.
    pub fn evaluate(&self, prices: &PriceSeries) -> Result<Evaluation> {
        let available = prices.len();
        if available < self.required_bars || available < 2 {
            return Err(CoreError::InsufficientHistory {
                required: self.required_bars.max(2),
                available,
            });
        }
        let set = IndicatorSet::compute(prices, &self.keys);
        let bars = prices.bars();
        let snap = Snapshot {
            set: &set,
            latest: &bars[available - 1],
            previous: &bars[available - 2],
        };
        Ok(self.evaluate_snapshot(prices.symbol(), &snap))
    }

    fn evaluate_snapshot(&self, symbol: &str, snap: &Snapshot<'_>) -> Evaluation {
        let overrides = self.sell_overrides(snap);
        let (verdict, score, fired) = if overrides.is_empty() {
            let fired = self.score_rules(snap);
            let score: f64 = fired.iter().map(|f| f.weight).sum();
            (self.buy_verdict(score, &fired, snap), score, fired)
        } else {
            let verdict = if overrides.len() > 1 {
                Verdict::StrongSell
            } else {
                Verdict::Sell
            };
            (verdict, 0.0, overrides)
        };

        Evaluation {
            signal: Signal {
                symbol: symbol.to_string(),
                as_of: snap.latest.date,
                price: snap.latest.close,
                verdict: self.config.scale.apply(verdict),
                score,
                max_score: self.config.weights.total(),
                fired,
                risk: None,
            },
            atr: snap.now(IndicatorKey::Atr14),
            weekly_potential: snap.weekly_potential(),
        }
    }

    fn sell_overrides(&self, snap: &Snapshot<'_>) -> Vec<FiredRule> {
        let mut fired = Vec::new();
        if let (Some(limit), Some(rsi)) = (
            self.config.overrides.rsi_overbought,
            snap.now(IndicatorKey::Rsi14),
        ) {
            if rsi > limit {
                fired.push(override_rule(
                    RuleId::RsiOverbought,
                    format!("RSI Overbought ({rsi:.1})"),
                ));
            }
        }
        if self.config.overrides.death_cross {
            let crossed = crossed(
                snap.prev(IndicatorKey::Sma200),
                snap.prev(IndicatorKey::Sma50),
                snap.now(IndicatorKey::Sma200),
                snap.now(IndicatorKey::Sma50),
            );
            if crossed == Some(true) {
                fired.push(override_rule(RuleId::DeathCross, "Death Cross".into()));
            }
        }
        fired
    }

    fn score_rules(&self, snap: &Snapshot<'_>) -> Vec<FiredRule> {
        let weights = &self.config.weights;
        weights
            .enabled()
            .into_iter()
            .filter_map(|rule| {
                self.check(rule, snap).map(|reason| FiredRule {
                    rule,
                    weight: weights.weight(rule),
                    reason,
                })
            })
            .collect()
    }

    /// Reason text when `rule` fires; `None` when it does not fire or an
    /// input is undefined.
    fn check(&self, rule: RuleId, snap: &Snapshot<'_>) -> Option<String> {
        let t = &self.config.thresholds;
        let close = snap.latest.close;
        match rule {
            RuleId::Trend => {
                let avg = snap.now(self.config.trend_average.key())?;
                let label = match self.config.trend_average {
                    TrendAverage::Sma200 => "SMA200",
                    TrendAverage::Ema50 => "EMA50",
                };
                (close > avg).then(|| format!("Bullish Trend (>{label})"))
            }
            RuleId::RsiHealthy => {
                let rsi = snap.now(IndicatorKey::Rsi14)?;
                (rsi > t.rsi_healthy_low && rsi < t.rsi_healthy_high)
                    .then(|| format!("Healthy RSI ({rsi:.1})"))
            }
            RuleId::RsiOversold => {
                let rsi = snap.now(IndicatorKey::Rsi14)?;
                (rsi < t.rsi_oversold).then(|| format!("Oversold Bounce (RSI {rsi:.1})"))
            }
            RuleId::MacdBullish => {
                let macd = snap.now(IndicatorKey::Macd)?;
                let signal = snap.now(IndicatorKey::MacdSignal)?;
                (macd > signal).then(|| "Positive MACD".to_string())
            }
            RuleId::BelowUpperBand => {
                let upper = snap.now(IndicatorKey::BbUpper)?;
                (close < upper * t.band_extension).then(|| "Below Upper BB".to_string())
            }
            RuleId::VolumeConfirmation => {
                let rvol = snap.now(IndicatorKey::Rvol20)?;
                (rvol > t.rvol).then(|| format!("High Volume ({rvol:.1}x)"))
            }
            RuleId::TrendStrength => {
                let adx = snap.now(IndicatorKey::Adx14)?;
                (adx > t.adx).then(|| format!("Strong Trend (ADX {adx:.0})"))
            }
            RuleId::Ema20Cross => snap
                .ema20_cross()?
                .then(|| "Momentum Crossover (>EMA20)".to_string()),
            // The cross wins; oversold RSI only counts when there is no cross.
            RuleId::MomentumTrigger => match snap.ema20_cross() {
                Some(true) => Some("Momentum Crossover (>EMA20)".to_string()),
                _ => {
                    let rsi = snap.now(IndicatorKey::Rsi14)?;
                    (rsi < t.rsi_oversold).then(|| format!("Oversold Bounce (RSI {rsi:.1})"))
                }
            },
            RuleId::BelowLowerBand => {
                let lower = snap.now(IndicatorKey::BbLower)?;
                (close < lower).then(|| "Below Lower BB (Oversold)".to_string())
            }
            RuleId::GoldenCross => crossed(
                snap.prev(IndicatorKey::Sma50),
                snap.prev(IndicatorKey::Sma200),
                snap.now(IndicatorKey::Sma50),
                snap.now(IndicatorKey::Sma200),
            )?
            .then(|| "Golden Cross".to_string()),
            RuleId::Volatility => {
                let wp = snap.weekly_potential()?;
                (wp > t.volatility_pct).then(|| format!("High Volatility ({wp:.1}% weekly)"))
            }
            RuleId::RsiOverbought | RuleId::DeathCross => None,
        }
    }

    fn buy_verdict(&self, score: f64, fired: &[FiredRule], snap: &Snapshot<'_>) -> Verdict {
        let v = &self.config.verdict;
        let verdict = if score >= v.strong_buy {
            Verdict::StrongBuy
        } else if score >= v.buy {
            Verdict::Buy
        } else {
            Verdict::Hold
        };
        if !verdict.is_buy() {
            return verdict;
        }

        if self.config.require_entry_trigger && !fired.iter().any(|f| f.rule.is_entry_trigger()) {
            tracing::debug!(score, "buy demoted to hold: no entry trigger");
            return Verdict::Hold;
        }
        if let Some(min) = self.config.min_weekly_potential {
            match snap.weekly_potential() {
                Some(wp) if wp > min => {}
                wp => {
                    tracing::debug!(score, ?wp, min, "buy demoted to hold: weekly potential");
                    return Verdict::Hold;
                }
            }
        }
        verdict
    }
}

fn override_rule(rule: RuleId, reason: String) -> FiredRule {
    FiredRule {
        rule,
        weight: 0.0,
        reason,
    }
}

/// `fast` crossed above `slow` between the previous and latest bar.
///
/// `None` when any input is undefined.
fn crossed(
    prev_fast: Option<f64>,
    prev_slow: Option<f64>,
    fast: Option<f64>,
    slow: Option<f64>,
) -> Option<bool> {
    Some(prev_fast? <= prev_slow? && fast? > slow?)
}
