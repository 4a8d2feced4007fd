//! Position risk calculator: target and stop levels around an entry price.

use crate::error::{CoreError, Result};
use crate::signal::Evaluation;
use serde::{Deserialize, Serialize};

/// How target and stop are derived from the entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RiskPolicy {
    /// target = price * (1 + target_pct), stop = price * (1 - stop_pct)
    FixedPercent { target_pct: f64, stop_pct: f64 },
    /// target = price + k_target * ATR, stop = price - k_stop * ATR
    Atr { k_target: f64, k_stop: f64 },
}

impl Default for RiskPolicy {
    fn default() -> Self {
        RiskPolicy::FixedPercent {
            target_pct: 0.05,
            stop_pct: 0.03,
        }
    }
}

/// Target and stop for one position. Always `stop < entry < target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskEnvelope {
    pub entry: f64,
    pub target: f64,
    pub stop: f64,
    pub policy: RiskPolicy,
}

impl RiskEnvelope {
    /// Reward-to-risk ratio: (target - entry) / (entry - stop).
    pub fn reward_risk(&self) -> f64 {
        (self.target - self.entry) / (self.entry - self.stop)
    }
}

impl RiskPolicy {
    pub fn atr_default() -> Self {
        RiskPolicy::Atr {
            k_target: 2.0,
            k_stop: 1.5,
        }
    }

    /// Whether this policy reads ATR.
    pub fn needs_atr(&self) -> bool {
        matches!(self, RiskPolicy::Atr { .. })
    }

    /// Compute levels for `price`. `atr` is ignored by the fixed policy.
    pub fn compute(&self, price: f64, atr: Option<f64>) -> Result<RiskEnvelope> {
        if !price.is_finite() || price <= 0.0 {
            return Err(invalid(format!("entry price must be positive, got {price}")));
        }
        let (target, stop) = match *self {
            RiskPolicy::FixedPercent {
                target_pct,
                stop_pct,
            } => {
                if !(target_pct.is_finite() && target_pct > 0.0) {
                    return Err(invalid(format!("target_pct must be > 0, got {target_pct}")));
                }
                if !(stop_pct.is_finite() && stop_pct > 0.0 && stop_pct < 1.0) {
                    return Err(invalid(format!("stop_pct must be in (0, 1), got {stop_pct}")));
                }
                (price * (1.0 + target_pct), price * (1.0 - stop_pct))
            }
            RiskPolicy::Atr { k_target, k_stop } => {
                let atr = match atr {
                    Some(a) if a.is_finite() && a > 0.0 => a,
                    other => {
                        return Err(invalid(format!(
                            "ATR must be defined and positive, got {other:?}"
                        )))
                    }
                };
                if !(k_target.is_finite() && k_target > 0.0 && k_stop.is_finite() && k_stop > 0.0)
                {
                    return Err(invalid(format!(
                        "ATR multiples must be > 0, got k_target={k_target} k_stop={k_stop}"
                    )));
                }
                let stop = price - k_stop * atr;
                if stop <= 0.0 {
                    return Err(invalid(format!(
                        "ATR stop {stop:.4} is not positive for price {price}"
                    )));
                }
                (price + k_target * atr, stop)
            }
        };
        Ok(RiskEnvelope {
            entry: price,
            target,
            stop,
            policy: *self,
        })
    }

    /// Attach an envelope to a buy signal in place. Non-buy signals are left
    /// untouched.
    pub fn attach(&self, evaluation: &mut Evaluation) -> Result<()> {
        if !evaluation.signal.verdict.is_buy() {
            return Ok(());
        }
        let envelope = self.compute(evaluation.signal.price, evaluation.atr)?;
        evaluation.signal.risk = Some(envelope);
        Ok(())
    }
}

fn invalid(msg: String) -> CoreError {
    CoreError::InvalidRiskInputs(msg)
}
