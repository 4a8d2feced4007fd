//! Look-ahead contamination tests for every indicator.
//!
//! Invariant: no indicator value at bar t may depend on bar t+1 or later.
//!
//! Method: compute on a truncated series (bars 0..150) and the full series
//! (bars 0..300). Bars 0..150 must be identical between both runs.

use chrono::NaiveDate;
use stockpulse_core::domain::{PriceBar, PriceSeries};
use stockpulse_core::indicators::*;

/// N bars of deterministic pseudo-random OHLCV data.
fn make_test_bars(n: usize) -> Vec<PriceBar> {
    let base_date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed % 200) as f64 - 100.0) * 0.05;
        price = (price + change).max(10.0);

        let open = price - 0.5;
        let close = price + 0.3;
        bars.push(PriceBar {
            date: base_date + chrono::Duration::days(i as i64),
            open,
            high: open.max(close) + 2.0,
            low: open.min(close) - 2.0,
            close,
            volume: 1000 + (seed % 5000),
        });
    }
    bars
}

fn assert_no_lookahead(indicator: &dyn Indicator, full_bars: &[PriceBar], truncated_len: usize) {
    let truncated = &full_bars[..truncated_len];
    let full_result = indicator.compute(full_bars);
    let truncated_result = indicator.compute(truncated);

    assert_eq!(truncated_result.len(), truncated_len, "{}", indicator.name());
    assert_eq!(full_result.len(), full_bars.len(), "{}", indicator.name());

    for i in 0..truncated_len {
        let t = truncated_result[i];
        let f = full_result[i];
        if t.is_nan() && f.is_nan() {
            continue;
        }
        assert!(
            !t.is_nan() && !f.is_nan(),
            "{}: NaN mismatch at bar {i} (truncated={t}, full={f})",
            indicator.name()
        );
        assert!(
            (t - f).abs() < 1e-10,
            "{}: look-ahead contamination at bar {i}: truncated={t}, full={f}",
            indicator.name()
        );
    }
}

#[test]
fn lookahead_sma() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Sma::new(20), &bars, 150);
    assert_no_lookahead(&Sma::new(50), &bars, 150);
}

#[test]
fn lookahead_ema() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Ema::new(20), &bars, 150);
    assert_no_lookahead(&Ema::new(50), &bars, 150);
}

#[test]
fn lookahead_rsi() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Rsi::new(14), &bars, 150);
    assert_no_lookahead(&Rsi::new(7), &bars, 150);
}

#[test]
fn lookahead_macd() {
    let bars = make_test_bars(300);
    for line in [MacdLine::Macd, MacdLine::Signal, MacdLine::Histogram] {
        assert_no_lookahead(&Macd::standard(line), &bars, 150);
    }
}

#[test]
fn lookahead_bollinger() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Bollinger::upper(20, 2.0), &bars, 150);
    assert_no_lookahead(&Bollinger::middle(20, 2.0), &bars, 150);
    assert_no_lookahead(&Bollinger::lower(20, 2.0), &bars, 150);
}

#[test]
fn lookahead_atr() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Atr::new(14), &bars, 150);
    assert_no_lookahead(&Atr::new(5), &bars, 150);
}

#[test]
fn lookahead_adx() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Adx::new(14), &bars, 150);
    assert_no_lookahead(&Adx::new(7), &bars, 150);
}

#[test]
fn lookahead_volume() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&AvgVolume::new(20), &bars, 150);
    assert_no_lookahead(&Rvol::new(20), &bars, 150);
}

#[test]
fn lookahead_range() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&RangePct::new(14), &bars, 150);
}

/// Every named key through `IndicatorSet`, including SMA200 which needs the
/// longer truncation point to be defined at all.
#[test]
fn lookahead_indicator_set() {
    let bars = make_test_bars(300);
    let full = PriceSeries::new("TEST", bars.clone()).unwrap();
    let truncated = PriceSeries::new("TEST", bars[..250].to_vec()).unwrap();
    let full_set = IndicatorSet::compute_all(&full);
    let trunc_set = IndicatorSet::compute_all(&truncated);

    for key in IndicatorKey::ALL {
        for i in 0..250 {
            let t = trunc_set.get(key, i);
            let f = full_set.get(key, i);
            match (t, f) {
                (None, None) => {}
                (Some(t), Some(f)) => assert!((t - f).abs() < 1e-10, "{key} at {i}: {t} vs {f}"),
                _ => panic!("{key}: definedness mismatch at bar {i}: {t:?} vs {f:?}"),
            }
        }
        assert!(trunc_set.latest(key).is_some(), "{key} undefined after 250 bars");
    }
}
