//! Screener: one evaluator applied across a watchlist on a bounded pool.
//!
//! Each instrument is independent: fetch history, evaluate, attach risk
//! levels. A failure for one instrument becomes an exclusion entry and never
//! aborts the scan. Results are ranked by score, then weekly range potential,
//! then symbol, so the output does not depend on which worker finished first.

use crate::data::PriceProvider;
use crate::domain::Instrument;
use crate::error::{CoreError, Result};
use crate::notify::{Notification, NotificationSink, Severity, TracingSink};
use crate::risk::RiskPolicy;
use crate::signal::{Evaluator, Signal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scan-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    /// Size of the private worker pool.
    pub max_workers: usize,
    /// Buy results scoring below this are dropped.
    pub min_score: f64,
    /// Keep only the top N results.
    pub max_results: Option<usize>,
    /// Workers that start after this many seconds skip their instrument.
    pub scan_timeout_secs: u64,
    /// Calendar days of history requested per instrument.
    pub lookback_days: u32,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            max_workers: 6,
            min_score: 3.0,
            max_results: None,
            scan_timeout_secs: 120,
            lookback_days: 400,
        }
    }
}

impl ScreenerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(CoreError::Config("max_workers must be >= 1".into()));
        }
        if self.lookback_days == 0 {
            return Err(CoreError::Config("lookback_days must be >= 1".into()));
        }
        if !self.min_score.is_finite() {
            return Err(CoreError::Config(format!(
                "min_score must be finite, got {}",
                self.min_score
            )));
        }
        Ok(())
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub signal: Signal,
    /// Weekly range potential in percent; the secondary rank key.
    pub weekly_potential: Option<f64>,
}

/// Why an instrument produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionCause {
    InsufficientHistory,
    InvalidSeries,
    ProviderFetch,
    InvalidRiskInputs,
    ScanTimedOut,
}

impl ExclusionCause {
    fn from_error(err: &CoreError) -> Self {
        match err {
            CoreError::InsufficientHistory { .. } => ExclusionCause::InsufficientHistory,
            CoreError::InvalidSeries(_) => ExclusionCause::InvalidSeries,
            CoreError::InvalidRiskInputs(_) => ExclusionCause::InvalidRiskInputs,
            CoreError::ProviderFetch(_) | CoreError::Config(_) => ExclusionCause::ProviderFetch,
        }
    }
}

/// Diagnostic record for an excluded instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exclusion {
    pub symbol: String,
    pub cause: ExclusionCause,
    pub detail: String,
}

/// Ranked results plus everything that was left out and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    /// Fingerprint of the evaluator configuration used.
    pub config_fingerprint: String,
    /// Unique instruments considered.
    pub scanned: usize,
    /// Evaluated but not a qualifying buy.
    pub not_qualified: usize,
    pub results: Vec<ScanResult>,
    pub exclusions: Vec<Exclusion>,
    pub elapsed_ms: u64,
}

enum Outcome {
    Qualified(ScanResult),
    NotQualified,
    Excluded(Exclusion),
}

/// Multi-instrument scanner with its own thread pool.
pub struct Screener {
    evaluator: Evaluator,
    risk: RiskPolicy,
    config: ScreenerConfig,
    pool: rayon::ThreadPool,
    sink: Arc<dyn NotificationSink>,
}

impl Screener {
    pub fn new(evaluator: Evaluator, risk: RiskPolicy, config: ScreenerConfig) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_workers)
            .thread_name(|i| format!("stockpulse-scan-{i}"))
            .build()
            .map_err(|e| CoreError::Config(format!("failed to build scan pool: {e}")))?;
        Ok(Self {
            evaluator,
            risk,
            config,
            pool,
            sink: Arc::new(TracingSink),
        })
    }

    /// Route scan notifications somewhere other than the log.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Scan `instruments`; blocks until every worker has finished.
    pub fn scan<P>(&self, instruments: &[Instrument], provider: &P) -> ScanReport
    where
        P: PriceProvider + ?Sized,
    {
        let started = Instant::now();
        let deadline = started + self.config.scan_timeout();

        let mut seen = HashSet::new();
        let unique: Vec<&Instrument> = instruments
            .iter()
            .filter(|i| seen.insert(i.symbol.as_str()))
            .collect();
        tracing::info!(
            instruments = unique.len(),
            workers = self.config.max_workers,
            provider = provider.name(),
            "scan started"
        );

        let outcomes: Vec<Outcome> = self.pool.install(|| {
            unique
                .par_iter()
                .map(|inst| self.scan_one(inst, provider, deadline))
                .collect()
        });

        let mut results = Vec::new();
        let mut exclusions = Vec::new();
        let mut not_qualified = 0;
        for outcome in outcomes {
            match outcome {
                Outcome::Qualified(r) => results.push(r),
                Outcome::NotQualified => not_qualified += 1,
                Outcome::Excluded(e) => exclusions.push(e),
            }
        }

        results.sort_by(rank);
        if let Some(cap) = self.config.max_results {
            results.truncate(cap);
        }
        exclusions.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            results = results.len(),
            excluded = exclusions.len(),
            not_qualified,
            elapsed_ms,
            "scan complete"
        );
        self.announce(&results);

        ScanReport {
            config_fingerprint: self.evaluator.config().fingerprint(),
            scanned: unique.len(),
            not_qualified,
            results,
            exclusions,
            elapsed_ms,
        }
    }

    fn scan_one<P>(&self, inst: &Instrument, provider: &P, deadline: Instant) -> Outcome
    where
        P: PriceProvider + ?Sized,
    {
        if Instant::now() >= deadline {
            tracing::debug!(symbol = %inst.symbol, "scan deadline passed; skipping");
            return Outcome::Excluded(Exclusion {
                symbol: inst.symbol.clone(),
                cause: ExclusionCause::ScanTimedOut,
                detail: format!(
                    "scan deadline of {}s passed before evaluation",
                    self.config.scan_timeout_secs
                ),
            });
        }

        match self.evaluate_instrument(inst, provider) {
            Ok(Some(result)) => Outcome::Qualified(result),
            Ok(None) => Outcome::NotQualified,
            Err(err) => {
                tracing::debug!(symbol = %inst.symbol, kind = err.kind(), error = %err, "excluded");
                Outcome::Excluded(Exclusion {
                    symbol: inst.symbol.clone(),
                    cause: ExclusionCause::from_error(&err),
                    detail: err.to_string(),
                })
            }
        }
    }

    fn evaluate_instrument<P>(&self, inst: &Instrument, provider: &P) -> Result<Option<ScanResult>>
    where
        P: PriceProvider + ?Sized,
    {
        let prices = provider.history(&inst.symbol, self.config.lookback_days)?;
        let mut eval = self.evaluator.evaluate(&prices)?;
        let signal = &eval.signal;
        if !signal.verdict.is_buy() || signal.score < self.config.min_score {
            return Ok(None);
        }
        self.risk.attach(&mut eval)?;
        Ok(Some(ScanResult {
            symbol: inst.symbol.clone(),
            name: inst.name.clone(),
            price: eval.signal.price,
            weekly_potential: eval.weekly_potential,
            signal: eval.signal,
        }))
    }

    fn announce(&self, results: &[ScanResult]) {
        let n = if results.is_empty() {
            Notification::new(
                Severity::Warning,
                "Scan complete",
                format!(
                    "No instruments met the buy criteria (score >= {}).",
                    self.config.min_score
                ),
            )
        } else {
            Notification::new(
                Severity::Info,
                "Scan complete",
                format!("Found {} potential candidates.", results.len()),
            )
        };
        self.sink.notify(&n);
    }
}

/// Score desc, weekly potential desc (undefined last), symbol asc.
fn rank(a: &ScanResult, b: &ScanResult) -> Ordering {
    let wp = |r: &ScanResult| r.weekly_potential.unwrap_or(f64::NEG_INFINITY);
    b.signal
        .score
        .total_cmp(&a.signal.score)
        .then_with(|| wp(b).total_cmp(&wp(a)))
        .then_with(|| a.symbol.cmp(&b.symbol))
}
