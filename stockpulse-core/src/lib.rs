//! StockPulse Core: indicators, signal scoring, screening and risk levels.
//!
//! This crate turns daily OHLCV history into explainable trade signals:
//! - Domain types (bars, validated price series, instruments)
//! - Indicator library (SMA, EMA, RSI, MACD, Bollinger, ATR, ADX, RVOL, range)
//! - One configurable rule evaluator with `screener`, `swing` and `analysis` presets
//! - Watchlist screener on a private bounded thread pool
//! - Fixed-percent and ATR risk levels
//! - Price providers (Yahoo, CSV, synthetic) behind an injectable TTL cache
//! - Simulated holdings log and portfolio review

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod lookup;
pub mod notify;
pub mod portfolio;
pub mod risk;
pub mod screener;
pub mod signal;

pub use config::ScanConfig;
pub use error::{CoreError, Result};
