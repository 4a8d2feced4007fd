//! Property tests for indicator and scoring invariants.
//!
//! Uses proptest to verify:
//! 1. SMA is the arithmetic mean of its window
//! 2. RSI stays in [0, 100]; Bollinger bands stay ordered
//! 3. Risk levels always satisfy stop < entry < target
//! 4. Score equals the sum of fired weights, under any weight table

use chrono::NaiveDate;
use proptest::prelude::*;
use stockpulse_core::domain::{PriceBar, PriceSeries};
use stockpulse_core::indicators::{Bollinger, Indicator, Rsi, Sma};
use stockpulse_core::risk::RiskPolicy;
use stockpulse_core::signal::{Evaluator, EvaluatorConfig, RuleWeights, Verdict};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (
        20.0..200.0_f64,
        prop::collection::vec(-0.04..0.04_f64, min_len..max_len),
    )
        .prop_map(|(start, returns)| {
            let mut price = start;
            returns
                .into_iter()
                .map(|r| {
                    price = (price * (1.0 + r)).max(1.0);
                    (price * 100.0).round() / 100.0
                })
                .collect()
        })
}

fn arb_weight() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.25..3.0_f64]
}

fn arb_weights() -> impl Strategy<Value = RuleWeights> {
    prop::collection::vec(arb_weight(), 12).prop_map(|w| RuleWeights {
        trend: w[0].max(0.5),
        rsi_healthy: w[1],
        rsi_oversold: w[2],
        macd_bullish: w[3],
        below_upper_band: w[4],
        volume_confirmation: w[5],
        trend_strength: w[6],
        ema20_cross: w[7],
        golden_cross: w[8],
        volatility: w[9],
        momentum_trigger: w[10],
        below_lower_band: w[11],
    })
}

fn to_bars(closes: &[f64]) -> Vec<PriceBar> {
    let base_date = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: 10_000 + (i as u64 * 7919) % 50_000,
            }
        })
        .collect()
}

// ── 1. SMA definition ────────────────────────────────────────────────

proptest! {
    #[test]
    fn sma_is_window_mean(closes in arb_closes(5, 120), period in 1usize..30) {
        let bars = to_bars(&closes);
        let sma = Sma::new(period).compute(&bars);
        prop_assert_eq!(sma.len(), closes.len());
        for (i, v) in sma.iter().enumerate() {
            if i + 1 < period {
                prop_assert!(v.is_nan());
            } else {
                let mean = closes[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
                prop_assert!((v - mean).abs() < 1e-8 * mean.max(1.0), "bar {}: {} vs {}", i, v, mean);
            }
        }
    }
}

// ── 2. Bounded oscillators and ordered bands ─────────────────────────

proptest! {
    #[test]
    fn rsi_is_bounded(closes in arb_closes(20, 200)) {
        let rsi = Rsi::new(14).compute(&to_bars(&closes));
        for v in rsi.iter().filter(|v| !v.is_nan()) {
            prop_assert!((0.0..=100.0).contains(v), "rsi {} out of range", v);
        }
    }

    #[test]
    fn bollinger_bands_are_ordered(closes in arb_closes(25, 150)) {
        let bars = to_bars(&closes);
        let upper = Bollinger::upper(20, 2.0).compute(&bars);
        let middle = Bollinger::middle(20, 2.0).compute(&bars);
        let lower = Bollinger::lower(20, 2.0).compute(&bars);
        for i in 19..bars.len() {
            prop_assert!(lower[i] <= middle[i] + 1e-9);
            prop_assert!(middle[i] <= upper[i] + 1e-9);
        }
    }
}

// ── 3. Risk ordering ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn fixed_percent_levels_are_ordered(
        price in 0.01..10_000.0_f64,
        target_pct in 0.001..1.0_f64,
        stop_pct in 0.001..0.99_f64,
    ) {
        let env = RiskPolicy::FixedPercent { target_pct, stop_pct }
            .compute(price, None)
            .unwrap();
        prop_assert!(env.stop < env.entry && env.entry < env.target);
        prop_assert!(env.stop > 0.0);
    }

    #[test]
    fn atr_levels_are_ordered_or_rejected(
        price in 0.01..10_000.0_f64,
        atr in 0.0001..500.0_f64,
        k_target in 0.1..5.0_f64,
        k_stop in 0.1..5.0_f64,
    ) {
        match (RiskPolicy::Atr { k_target, k_stop }).compute(price, Some(atr)) {
            Ok(env) => {
                prop_assert!(env.stop > 0.0);
                prop_assert!(env.stop < env.entry && env.entry < env.target);
            }
            // A stop at or below zero is the only reason to refuse valid inputs.
            Err(_) => prop_assert!(price - k_stop * atr <= 0.0),
        }
    }
}

// ── 4. Scoring arithmetic ────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn score_is_sum_of_fired_weights(
        closes in arb_closes(210, 320),
        weights in arb_weights(),
    ) {
        let config = EvaluatorConfig { weights, ..EvaluatorConfig::screener() };
        let evaluator = Evaluator::new(config.clone()).unwrap();
        let series = PriceSeries::new("PROP", to_bars(&closes)).unwrap();
        let signal = evaluator.evaluate(&series).unwrap().signal;

        let sum: f64 = signal.fired.iter().map(|f| f.weight).sum();
        prop_assert!((signal.score - sum).abs() < 1e-12);
        prop_assert!((signal.max_score - config.weights.total()).abs() < 1e-12);

        if !signal.overridden() {
            let expected = if signal.score >= config.verdict.strong_buy {
                Verdict::StrongBuy
            } else if signal.score >= config.verdict.buy {
                Verdict::Buy
            } else {
                Verdict::Hold
            };
            prop_assert_eq!(signal.verdict, expected);
            prop_assert!(signal.fired.iter().all(|f| f.weight > 0.0));
        }
    }
}
