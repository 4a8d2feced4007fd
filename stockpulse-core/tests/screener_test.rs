//! Screener behaviour over an in-memory provider.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use stockpulse_core::data::{DataError, PriceProvider, SyntheticProvider};
use stockpulse_core::domain::{Instrument, PriceBar, PriceSeries};
use stockpulse_core::notify::{RecordingSink, Severity};
use stockpulse_core::risk::RiskPolicy;
use stockpulse_core::screener::{ExclusionCause, Screener, ScreenerConfig};
use stockpulse_core::signal::{
    Evaluator, EvaluatorConfig, RuleWeights, SellOverrides, VerdictThresholds,
};

// ── Helpers ──────────────────────────────────────────────────────────

/// Serves fixed series; unknown symbols are not found, `down` symbols are
/// unreachable.
#[derive(Default)]
struct MemoryProvider {
    series: HashMap<String, PriceSeries>,
    down: Vec<String>,
}

impl MemoryProvider {
    fn with(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.symbol().to_string(), series);
        self
    }

    fn with_down(mut self, symbol: &str) -> Self {
        self.down.push(symbol.to_string());
        self
    }
}

impl PriceProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn history(&self, symbol: &str, _lookback_days: u32) -> Result<PriceSeries, DataError> {
        if self.down.iter().any(|s| s == symbol) {
            return Err(DataError::NetworkUnreachable("connection refused".into()));
        }
        self.series
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
    }
}

/// Rising closes from `start` to `2 * start`; high/low one unit around the body.
fn rising(symbol: &str, start: f64, n: usize) -> PriceSeries {
    let base_date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let closes: Vec<f64> = (0..n)
        .map(|i| start + i as f64 * start / 259.0)
        .collect();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect();
    PriceSeries::new(symbol, bars).unwrap()
}

/// Trend-only rule table: any instrument above its SMA200 is a buy.
fn trend_only() -> Evaluator {
    Evaluator::new(EvaluatorConfig {
        weights: RuleWeights {
            trend: 1.0,
            ..RuleWeights::none()
        },
        overrides: SellOverrides {
            rsi_overbought: None,
            death_cross: false,
        },
        verdict: VerdictThresholds {
            strong_buy: 1.0,
            buy: 1.0,
        },
        ..EvaluatorConfig::screener()
    })
    .unwrap()
}

fn config() -> ScreenerConfig {
    ScreenerConfig {
        max_workers: 3,
        min_score: 1.0,
        ..ScreenerConfig::default()
    }
}

fn screener(config: ScreenerConfig) -> Screener {
    Screener::new(trend_only(), RiskPolicy::default(), config).unwrap()
}

fn instruments(symbols: &[&str]) -> Vec<Instrument> {
    symbols.iter().map(|s| Instrument::from_symbol(*s)).collect()
}

fn provider() -> MemoryProvider {
    MemoryProvider::default()
        .with(rising("AAA", 50.0, 260))
        .with(rising("BBB", 100.0, 260))
        .with(rising("SHORT", 80.0, 30))
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn short_history_is_excluded_without_disturbing_ranking() {
    let p = provider();
    let s = screener(config());

    let report = s.scan(&instruments(&["AAA", "SHORT", "BBB"]), &p);
    assert_eq!(report.scanned, 3);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.exclusions.len(), 1);
    assert_eq!(report.exclusions[0].symbol, "SHORT");
    assert_eq!(report.exclusions[0].cause, ExclusionCause::InsufficientHistory);

    let without = s.scan(&instruments(&["BBB", "AAA"]), &p);
    let ranked = |r: &stockpulse_core::screener::ScanReport| -> Vec<String> {
        r.results.iter().map(|x| x.symbol.clone()).collect()
    };
    assert_eq!(ranked(&report), ranked(&without));

    // Same score, so the lower-priced (wider relative range) instrument leads.
    assert_eq!(ranked(&report), vec!["AAA", "BBB"]);
    let wp: Vec<f64> = report
        .results
        .iter()
        .map(|r| r.weekly_potential.unwrap())
        .collect();
    assert!(wp[0] > wp[1]);
}

#[test]
fn duplicate_symbols_scanned_once() {
    let report = screener(config()).scan(&instruments(&["AAA", "AAA", "BBB", "AAA"]), &provider());
    assert_eq!(report.scanned, 2);
    assert_eq!(report.results.len(), 2);
}

#[test]
fn provider_failures_become_exclusions() {
    let p = provider().with_down("BBB");
    let report = screener(config()).scan(&instruments(&["AAA", "BBB", "MISSING"]), &p);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].symbol, "AAA");
    let causes: Vec<(&str, ExclusionCause)> = report
        .exclusions
        .iter()
        .map(|e| (e.symbol.as_str(), e.cause))
        .collect();
    assert_eq!(
        causes,
        vec![
            ("BBB", ExclusionCause::ProviderFetch),
            ("MISSING", ExclusionCause::ProviderFetch),
        ]
    );
    assert!(report.exclusions[1].detail.contains("MISSING"));
}

#[test]
fn zero_timeout_skips_every_instrument() {
    let cfg = ScreenerConfig {
        scan_timeout_secs: 0,
        ..config()
    };
    let report = screener(cfg).scan(&instruments(&["AAA", "BBB"]), &provider());
    assert!(report.results.is_empty());
    assert_eq!(report.exclusions.len(), 2);
    assert!(report
        .exclusions
        .iter()
        .all(|e| e.cause == ExclusionCause::ScanTimedOut));
}

#[test]
fn max_results_caps_ranked_output() {
    let cfg = ScreenerConfig {
        max_results: Some(1),
        ..config()
    };
    let report = screener(cfg).scan(&instruments(&["BBB", "AAA"]), &provider());
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].symbol, "AAA");
}

#[test]
fn min_score_filters_results() {
    let cfg = ScreenerConfig {
        min_score: 2.0,
        ..config()
    };
    let report = screener(cfg).scan(&instruments(&["AAA", "BBB"]), &provider());
    assert!(report.results.is_empty());
    assert_eq!(report.not_qualified, 2);
    assert!(report.exclusions.is_empty());
}

#[test]
fn results_carry_risk_envelope() {
    let report = screener(config()).scan(&instruments(&["AAA"]), &provider());
    let r = &report.results[0];
    let env = r.signal.risk.expect("buy result without risk levels");
    assert_eq!(env.entry, r.price);
    assert!(env.stop < env.entry && env.entry < env.target);
}

#[test]
fn atr_policy_uses_latest_atr() {
    let s = Screener::new(trend_only(), RiskPolicy::atr_default(), config()).unwrap();
    let report = s.scan(&instruments(&["BBB"]), &provider());
    let env = report.results[0].signal.risk.unwrap();
    assert!((env.reward_risk() - 2.0 / 1.5).abs() < 1e-9);
}

#[test]
fn sink_receives_summary() {
    let sink = Arc::new(RecordingSink::new());
    let s = screener(config()).with_sink(sink.clone());

    s.scan(&instruments(&["AAA", "BBB"]), &provider());
    s.scan(&instruments(&["SHORT"]), &provider());

    let seen = sink.notifications();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].severity, Severity::Info);
    assert_eq!(seen[0].message, "Found 2 potential candidates.");
    assert_eq!(seen[1].severity, Severity::Warning);
}

#[test]
fn report_is_independent_of_worker_count() {
    let end = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
    let p = SyntheticProvider::new(21, end).with_volatility(0.035);
    let symbols: Vec<String> = (0..40).map(|i| format!("S{i:02}")).collect();
    let list: Vec<Instrument> = symbols.iter().map(Instrument::from_symbol).collect();

    let scan = |workers: usize| {
        let cfg = ScreenerConfig {
            max_workers: workers,
            ..config()
        };
        let mut report = screener(cfg).scan(&list, &p);
        report.elapsed_ms = 0;
        report
    };
    assert_eq!(scan(1), scan(8));
}

#[test]
fn fingerprint_tracks_evaluator_config() {
    let a = screener(config()).scan(&[], &provider());
    let b = Screener::new(
        Evaluator::new(EvaluatorConfig::swing()).unwrap(),
        RiskPolicy::default(),
        config(),
    )
    .unwrap()
    .scan(&[], &provider());
    assert_eq!(a.scanned, 0);
    assert_ne!(a.config_fingerprint, b.config_fingerprint);
}
