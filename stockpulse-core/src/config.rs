//! Scan configuration file.
//!
//! ```toml
//! cache_ttl_secs = 300
//!
//! [evaluator]
//! preset = "swing"
//!
//! [screener]
//! max_workers = 4
//! min_score = 3.0
//!
//! [risk]
//! type = "atr"
//! k_target = 2.0
//! k_stop = 1.5
//! ```
//!
//! A full rule table can replace the preset under `[evaluator.custom]`.

use crate::error::{CoreError, Result};
use crate::lookup::RetryPolicy;
use crate::portfolio::ReviewOptions;
use crate::risk::RiskPolicy;
use crate::screener::ScreenerConfig;
use crate::signal::EvaluatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `[evaluator]`: a preset name or a custom rule table, not both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorSection {
    pub preset: Option<String>,
    pub custom: Option<EvaluatorConfig>,
}

impl EvaluatorSection {
    pub fn resolve(&self) -> Result<EvaluatorConfig> {
        match (&self.preset, &self.custom) {
            (Some(_), Some(_)) => Err(CoreError::Config(
                "[evaluator] sets both `preset` and `custom`; pick one".into(),
            )),
            (_, Some(custom)) => Ok(custom.clone()),
            (Some(name), None) => EvaluatorConfig::from_preset(name),
            (None, None) => Ok(EvaluatorConfig::screener()),
        }
    }
}

/// Everything a scan or lookup needs besides the instruments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// History cache lifetime; 0 disables caching.
    pub cache_ttl_secs: u64,
    pub evaluator: EvaluatorSection,
    pub screener: ScreenerConfig,
    pub risk: RiskPolicy,
    pub retry: RetryPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            evaluator: EvaluatorSection::default(),
            screener: ScreenerConfig::default(),
            risk: RiskPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ScanConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("read config {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: ScanConfig = toml::from_str(content)
            .map_err(|e| CoreError::Config(format!("parse config TOML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(format!("serialize config: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        self.evaluator.resolve()?.validate()?;
        self.screener.validate()?;
        // A positive reference price exercises the policy's own parameter checks.
        self.risk.compute(100.0, Some(1.0))?;
        Ok(())
    }

    /// The evaluator configuration this file selects.
    pub fn evaluator_config(&self) -> Result<EvaluatorConfig> {
        self.evaluator.resolve()
    }

    /// Portfolio reviews share the scan's history window, pool size and retry.
    pub fn review_options(&self) -> ReviewOptions {
        ReviewOptions {
            lookback_days: self.screener.lookback_days,
            retry: self.retry,
            max_workers: self.screener.max_workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::TrendAverage;

    #[test]
    fn empty_file_is_default() {
        let cfg = ScanConfig::from_toml("").unwrap();
        assert_eq!(cfg, ScanConfig::default());
        assert_eq!(cfg.evaluator_config().unwrap(), EvaluatorConfig::screener());
    }

    #[test]
    fn preset_and_sections() {
        let cfg = ScanConfig::from_toml(
            r#"
            cache_ttl_secs = 30

            [evaluator]
            preset = "swing"

            [screener]
            max_workers = 2
            max_results = 10

            [risk]
            type = "atr"
            k_target = 2.0
            k_stop = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.evaluator_config().unwrap(), EvaluatorConfig::swing());
        assert_eq!(cfg.screener.max_workers, 2);
        assert_eq!(cfg.screener.max_results, Some(10));
        assert_eq!(cfg.screener.min_score, 3.0);
        assert_eq!(cfg.risk, RiskPolicy::atr_default());
        assert_eq!(cfg.cache_ttl_secs, 30);

        let review = cfg.review_options();
        assert_eq!(review.max_workers, 2);
        assert_eq!(review.retry, RetryPolicy::default());
    }

    #[test]
    fn custom_table() {
        let cfg = ScanConfig::from_toml(
            r#"
            [evaluator.custom]
            trend_average = "EMA50"

            [evaluator.custom.weights]
            trend = 2.0
            "#,
        )
        .unwrap();
        let ev = cfg.evaluator_config().unwrap();
        assert_eq!(ev.trend_average, TrendAverage::Ema50);
        assert_eq!(ev.weights.trend, 2.0);
    }

    #[test]
    fn preset_and_custom_conflict() {
        let err = ScanConfig::from_toml(
            r#"
            [evaluator]
            preset = "swing"
            [evaluator.custom]
            scale = "three_state"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("pick one"));
    }

    #[test]
    fn unknown_preset_rejected() {
        assert!(ScanConfig::from_toml("[evaluator]\npreset = \"nope\"\n").is_err());
    }

    #[test]
    fn bad_risk_rejected() {
        let err = ScanConfig::from_toml(
            "[risk]\ntype = \"fixed_percent\"\ntarget_pct = 0.05\nstop_pct = 1.5\n",
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRiskInputs(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = ScanConfig::default();
        assert_eq!(ScanConfig::from_toml(&cfg.to_toml().unwrap()).unwrap(), cfg);
    }
}
