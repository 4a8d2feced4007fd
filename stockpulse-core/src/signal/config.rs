//! Evaluator configuration: rule weights, thresholds, overrides, presets.

use super::{RuleId, Verdict};
use crate::error::{CoreError, Result};
use crate::indicators::set::required_bars;
use crate::indicators::IndicatorKey;
use serde::{Deserialize, Serialize};

/// Named presets accepted by `EvaluatorConfig::from_preset`.
pub const PRESETS: [&str; 3] = ["screener", "swing", "analysis"];

/// Moving average the trend rule compares the close against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendAverage {
    Sma200,
    Ema50,
}

impl TrendAverage {
    pub fn key(&self) -> IndicatorKey {
        match self {
            TrendAverage::Sma200 => IndicatorKey::Sma200,
            TrendAverage::Ema50 => IndicatorKey::Ema50,
        }
    }
}

/// Five-state or reduced three-state verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalScale {
    #[default]
    FiveState,
    ThreeState,
}

impl SignalScale {
    pub fn apply(&self, verdict: Verdict) -> Verdict {
        match (self, verdict) {
            (SignalScale::ThreeState, Verdict::StrongBuy) => Verdict::Buy,
            (SignalScale::ThreeState, Verdict::StrongSell) => Verdict::Sell,
            (_, v) => v,
        }
    }
}

/// Weight of each scoring rule. Zero disables the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleWeights {
    pub trend: f64,
    pub rsi_healthy: f64,
    pub rsi_oversold: f64,
    pub macd_bullish: f64,
    pub below_upper_band: f64,
    pub volume_confirmation: f64,
    pub trend_strength: f64,
    pub ema20_cross: f64,
    pub golden_cross: f64,
    pub volatility: f64,
    /// EMA20 cross or oversold RSI, scored once.
    pub momentum_trigger: f64,
    pub below_lower_band: f64,
}

impl RuleWeights {
    /// All rules disabled.
    pub fn none() -> Self {
        Self {
            trend: 0.0,
            rsi_healthy: 0.0,
            rsi_oversold: 0.0,
            macd_bullish: 0.0,
            below_upper_band: 0.0,
            volume_confirmation: 0.0,
            trend_strength: 0.0,
            ema20_cross: 0.0,
            golden_cross: 0.0,
            volatility: 0.0,
            momentum_trigger: 0.0,
            below_lower_band: 0.0,
        }
    }

    pub fn weight(&self, rule: RuleId) -> f64 {
        match rule {
            RuleId::Trend => self.trend,
            RuleId::RsiHealthy => self.rsi_healthy,
            RuleId::RsiOversold => self.rsi_oversold,
            RuleId::MacdBullish => self.macd_bullish,
            RuleId::BelowUpperBand => self.below_upper_band,
            RuleId::VolumeConfirmation => self.volume_confirmation,
            RuleId::TrendStrength => self.trend_strength,
            RuleId::Ema20Cross => self.ema20_cross,
            RuleId::GoldenCross => self.golden_cross,
            RuleId::Volatility => self.volatility,
            RuleId::MomentumTrigger => self.momentum_trigger,
            RuleId::BelowLowerBand => self.below_lower_band,
            RuleId::RsiOverbought | RuleId::DeathCross => 0.0,
        }
    }

    /// Scoring rules with a positive weight, in evaluation order.
    pub fn enabled(&self) -> Vec<RuleId> {
        RuleId::SCORING
            .into_iter()
            .filter(|r| self.weight(*r) > 0.0)
            .collect()
    }

    pub fn total(&self) -> f64 {
        RuleId::SCORING.iter().map(|r| self.weight(*r)).sum()
    }
}

impl Default for RuleWeights {
    fn default() -> Self {
        EvaluatorConfig::screener().weights
    }
}

/// Numeric thresholds the scoring rules compare against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    /// RSI healthy band, exclusive on both ends.
    pub rsi_healthy_low: f64,
    pub rsi_healthy_high: f64,
    /// RSI below this is an oversold bounce candidate.
    pub rsi_oversold: f64,
    /// Close must sit below upper band times this factor.
    pub band_extension: f64,
    /// RVOL must exceed this.
    pub rvol: f64,
    /// ADX must exceed this.
    pub adx: f64,
    /// Weekly range potential (percent) must exceed this.
    pub volatility_pct: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            rsi_healthy_low: 40.0,
            rsi_healthy_high: 70.0,
            rsi_oversold: 30.0,
            band_extension: 0.98,
            rvol: 1.0,
            adx: 25.0,
            volatility_pct: 4.0,
        }
    }
}

/// Conditions that force SELL before any additive scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SellOverrides {
    /// RSI strictly above this forces SELL. `None` disables the check.
    pub rsi_overbought: Option<f64>,
    /// SMA50 crossing below SMA200 on the latest bar forces SELL.
    pub death_cross: bool,
}

impl Default for SellOverrides {
    fn default() -> Self {
        Self {
            rsi_overbought: Some(75.0),
            death_cross: true,
        }
    }
}

/// Score cut-offs for buy verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdictThresholds {
    pub strong_buy: f64,
    pub buy: f64,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            strong_buy: 4.0,
            buy: 3.0,
        }
    }
}

/// Full evaluator configuration.
///
/// Missing TOML fields fall back to the `screener` preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub trend_average: TrendAverage,
    pub weights: RuleWeights,
    pub thresholds: RuleThresholds,
    pub overrides: SellOverrides,
    pub verdict: VerdictThresholds,
    pub scale: SignalScale,
    /// A buy verdict also needs an entry trigger (EMA20 cross or oversold RSI).
    pub require_entry_trigger: bool,
    /// A buy verdict also needs weekly range potential above this percent.
    pub min_weekly_potential: Option<f64>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self::screener()
    }
}

impl EvaluatorConfig {
    /// Five-factor market screener: trend, healthy RSI, MACD, band room, volume.
    pub fn screener() -> Self {
        Self {
            trend_average: TrendAverage::Sma200,
            weights: RuleWeights {
                trend: 1.0,
                rsi_healthy: 1.0,
                macd_bullish: 1.0,
                below_upper_band: 1.0,
                volume_confirmation: 1.0,
                ..RuleWeights::none()
            },
            thresholds: RuleThresholds::default(),
            overrides: SellOverrides::default(),
            verdict: VerdictThresholds::default(),
            scale: SignalScale::FiveState,
            require_entry_trigger: false,
            min_weekly_potential: None,
        }
    }

    /// Swing scanner: EMA50 trend, a single momentum trigger (EMA20 cross or
    /// oversold RSI), volume surge, ADX strength and range volatility. Buys
    /// need the trigger and room to move.
    pub fn swing() -> Self {
        Self {
            trend_average: TrendAverage::Ema50,
            weights: RuleWeights {
                trend: 1.0,
                volume_confirmation: 1.0,
                trend_strength: 1.0,
                volatility: 1.0,
                momentum_trigger: 1.0,
                ..RuleWeights::none()
            },
            thresholds: RuleThresholds {
                rvol: 1.5,
                ..RuleThresholds::default()
            },
            overrides: SellOverrides::default(),
            verdict: VerdictThresholds::default(),
            scale: SignalScale::FiveState,
            require_entry_trigger: true,
            min_weekly_potential: Some(3.0),
        }
    }

    /// Single-instrument deep dive: SMA200 trend, half a point for a healthy
    /// RSI (30..70), two for oversold, MACD and a close under the lower band.
    /// One point is already a buy.
    pub fn analysis() -> Self {
        Self {
            trend_average: TrendAverage::Sma200,
            weights: RuleWeights {
                trend: 1.0,
                rsi_healthy: 0.5,
                rsi_oversold: 2.0,
                macd_bullish: 1.0,
                below_lower_band: 1.0,
                ..RuleWeights::none()
            },
            thresholds: RuleThresholds {
                rsi_healthy_low: 30.0,
                rsi_healthy_high: 70.0,
                ..RuleThresholds::default()
            },
            overrides: SellOverrides::default(),
            verdict: VerdictThresholds {
                strong_buy: 3.0,
                buy: 1.0,
            },
            scale: SignalScale::FiveState,
            require_entry_trigger: false,
            min_weekly_potential: None,
        }
    }

    pub fn from_preset(name: &str) -> Result<Self> {
        match name {
            "screener" => Ok(Self::screener()),
            "swing" => Ok(Self::swing()),
            "analysis" => Ok(Self::analysis()),
            other => Err(CoreError::Config(format!(
                "unknown preset '{other}' (expected one of: {})",
                PRESETS.join(", ")
            ))),
        }
    }

    /// Reject configurations whose scores or verdicts would be meaningless.
    pub fn validate(&self) -> Result<()> {
        for rule in RuleId::SCORING {
            let w = self.weights.weight(rule);
            if !w.is_finite() || w < 0.0 {
                return Err(CoreError::Config(format!(
                    "weight for {rule:?} must be finite and >= 0, got {w}"
                )));
            }
        }
        if self.weights.enabled().is_empty() {
            return Err(CoreError::Config("no scoring rule has a positive weight".into()));
        }
        let t = &self.thresholds;
        if t.rsi_healthy_low >= t.rsi_healthy_high {
            return Err(CoreError::Config(format!(
                "rsi_healthy_low ({}) must be below rsi_healthy_high ({})",
                t.rsi_healthy_low, t.rsi_healthy_high
            )));
        }
        if !(t.band_extension > 0.0 && t.band_extension <= 1.0) {
            return Err(CoreError::Config(format!(
                "band_extension must be in (0, 1], got {}",
                t.band_extension
            )));
        }
        let v = &self.verdict;
        if !(v.buy > 0.0 && v.strong_buy >= v.buy) {
            return Err(CoreError::Config(format!(
                "verdict thresholds need 0 < buy <= strong_buy, got buy={} strong_buy={}",
                v.buy, v.strong_buy
            )));
        }
        Ok(())
    }

    /// Indicators the active rules, overrides and gates read.
    ///
    /// ATR and range percent are always included: the screener ranks on range
    /// and the risk calculator sizes on ATR.
    pub fn required_keys(&self) -> Vec<IndicatorKey> {
        let mut keys = vec![IndicatorKey::Atr14, IndicatorKey::RangePct14];
        for rule in self.weights.enabled() {
            match rule {
                RuleId::Trend => keys.push(self.trend_average.key()),
                RuleId::RsiHealthy | RuleId::RsiOversold => keys.push(IndicatorKey::Rsi14),
                RuleId::MomentumTrigger => {
                    keys.extend([IndicatorKey::Ema20, IndicatorKey::Rsi14])
                }
                RuleId::BelowLowerBand => keys.push(IndicatorKey::BbLower),
                RuleId::MacdBullish => {
                    keys.extend([IndicatorKey::Macd, IndicatorKey::MacdSignal])
                }
                RuleId::BelowUpperBand => keys.push(IndicatorKey::BbUpper),
                RuleId::VolumeConfirmation => keys.push(IndicatorKey::Rvol20),
                RuleId::TrendStrength => keys.push(IndicatorKey::Adx14),
                RuleId::Ema20Cross => keys.push(IndicatorKey::Ema20),
                RuleId::GoldenCross => keys.extend([IndicatorKey::Sma50, IndicatorKey::Sma200]),
                RuleId::Volatility | RuleId::RsiOverbought | RuleId::DeathCross => {}
            }
        }
        if self.overrides.rsi_overbought.is_some() {
            keys.push(IndicatorKey::Rsi14);
        }
        if self.overrides.death_cross {
            keys.extend([IndicatorKey::Sma50, IndicatorKey::Sma200]);
        }
        keys.sort();
        keys.dedup();
        keys
    }

    /// Minimum bars an instrument needs under this configuration.
    pub fn required_bars(&self) -> usize {
        required_bars(&self.required_keys())
    }

    /// Content hash of this configuration (BLAKE3 over canonical JSON).
    ///
    /// Two scans with the same fingerprint used identical rules.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}
