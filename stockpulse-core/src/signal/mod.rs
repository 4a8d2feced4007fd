//! Signal evaluation: indicator values in, discrete verdict with reasons out.
//!
//! One evaluator covers every scoring variant. Variants are `EvaluatorConfig`
//! presets (rule-weight table plus thresholds), never separate code paths.

pub mod config;
pub mod evaluator;

pub use config::{
    EvaluatorConfig, RuleThresholds, RuleWeights, SellOverrides, SignalScale, TrendAverage,
    VerdictThresholds, PRESETS,
};
pub use evaluator::{Evaluation, Evaluator};

use crate::risk::RiskEnvelope;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete verdict for one instrument at one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::StrongBuy => "STRONG_BUY",
            Verdict::Buy => "BUY",
            Verdict::Hold => "HOLD",
            Verdict::Sell => "SELL",
            Verdict::StrongSell => "STRONG_SELL",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Verdict::StrongBuy | Verdict::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Verdict::Sell | Verdict::StrongSell)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every rule the evaluator knows. The last two are SELL overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    Trend,
    RsiHealthy,
    RsiOversold,
    MacdBullish,
    BelowUpperBand,
    VolumeConfirmation,
    TrendStrength,
    Ema20Cross,
    GoldenCross,
    Volatility,
    MomentumTrigger,
    BelowLowerBand,
    RsiOverbought,
    DeathCross,
}

impl RuleId {
    /// Scoring rules in evaluation order.
    pub const SCORING: [RuleId; 12] = [
        RuleId::Trend,
        RuleId::RsiHealthy,
        RuleId::RsiOversold,
        RuleId::MacdBullish,
        RuleId::BelowUpperBand,
        RuleId::VolumeConfirmation,
        RuleId::TrendStrength,
        RuleId::Ema20Cross,
        RuleId::GoldenCross,
        RuleId::Volatility,
        RuleId::MomentumTrigger,
        RuleId::BelowLowerBand,
    ];

    pub fn is_override(&self) -> bool {
        matches!(self, RuleId::RsiOverbought | RuleId::DeathCross)
    }

    /// Rules that count as an entry trigger for gated presets.
    pub fn is_entry_trigger(&self) -> bool {
        matches!(
            self,
            RuleId::Ema20Cross | RuleId::RsiOversold | RuleId::MomentumTrigger
        )
    }
}

/// One rule that fired, with the weight it contributed and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiredRule {
    pub rule: RuleId,
    pub weight: f64,
    pub reason: String,
}

/// Verdict plus its explanation for one instrument.
///
/// `score` is always the sum of `fired[*].weight`, and `fired` holds exactly
/// one entry per rule that fired. Override rules carry weight 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub price: f64,
    pub verdict: Verdict,
    pub score: f64,
    /// Highest score the active rule table can produce.
    pub max_score: f64,
    pub fired: Vec<FiredRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskEnvelope>,
}

impl Signal {
    pub fn reasons(&self) -> Vec<&str> {
        self.fired.iter().map(|f| f.reason.as_str()).collect()
    }

    /// True when a SELL override produced this verdict.
    pub fn overridden(&self) -> bool {
        self.fired.iter().any(|f| f.rule.is_override())
    }
}
