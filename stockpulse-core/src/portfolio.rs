//! Simulated trade log and portfolio review.
//!
//! The log is a flat CSV file (`Ticker,EntryDate,EntryPrice,Quantity,Status,Notes`)
//! so it stays editable in a spreadsheet. Writes go to a temp file and are
//! renamed into place.

use crate::data::PriceProvider;
use crate::error::CoreError;
use crate::lookup::RetryPolicy;
use crate::risk::{RiskEnvelope, RiskPolicy};
use crate::signal::{Evaluator, Verdict};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("holdings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("holdings CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{ticker} is already held as an open position")]
    DuplicateOpen { ticker: String },

    #[error("no open position for {ticker}")]
    NotOpen { ticker: String },

    #[error("invalid holding: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldingStatus {
    Open,
    Closed,
}

/// One row of the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "EntryDate")]
    pub entry_date: NaiveDate,
    #[serde(rename = "EntryPrice")]
    pub entry_price: f64,
    #[serde(rename = "Quantity")]
    pub quantity: f64,
    #[serde(rename = "Status")]
    pub status: HoldingStatus,
    #[serde(rename = "Notes", default)]
    pub notes: String,
}

impl Holding {
    pub fn is_open(&self) -> bool {
        self.status == HoldingStatus::Open
    }

    pub fn cost(&self) -> f64 {
        self.entry_price * self.quantity
    }
}

/// CSV-backed holdings store.
#[derive(Debug, Clone)]
pub struct HoldingsStore {
    path: PathBuf,
}

impl HoldingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows; a missing file is an empty log.
    pub fn load(&self) -> Result<Vec<Holding>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }

    pub fn open_holdings(&self) -> Result<Vec<Holding>, StoreError> {
        Ok(self.load()?.into_iter().filter(Holding::is_open).collect())
    }

    /// Replace the log with `rows`.
    pub fn save(&self, rows: &[Holding]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            if rows.is_empty() {
                writer.write_record([
                    "Ticker",
                    "EntryDate",
                    "EntryPrice",
                    "Quantity",
                    "Status",
                    "Notes",
                ])?;
            }
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Record a simulated buy. Refuses a second open position in `ticker`.
    pub fn open_position(
        &self,
        ticker: &str,
        entry_price: f64,
        quantity: f64,
        entry_date: NaiveDate,
        notes: &str,
    ) -> Result<Holding, StoreError> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(StoreError::Invalid("ticker must not be empty".into()));
        }
        if !(entry_price.is_finite() && entry_price > 0.0) {
            return Err(StoreError::Invalid(format!(
                "entry price must be positive, got {entry_price}"
            )));
        }
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(StoreError::Invalid(format!(
                "quantity must be positive, got {quantity}"
            )));
        }

        let mut rows = self.load()?;
        if rows.iter().any(|h| h.is_open() && h.ticker == ticker) {
            return Err(StoreError::DuplicateOpen { ticker });
        }
        let holding = Holding {
            ticker,
            entry_date,
            entry_price,
            quantity,
            status: HoldingStatus::Open,
            notes: notes.to_string(),
        };
        rows.push(holding.clone());
        self.save(&rows)?;
        tracing::info!(ticker = %holding.ticker, entry_price, quantity, "position opened");
        Ok(holding)
    }

    /// Mark the open position in `ticker` closed.
    pub fn close_position(&self, ticker: &str) -> Result<Holding, StoreError> {
        let ticker = ticker.trim().to_uppercase();
        let mut rows = self.load()?;
        let row = rows
            .iter_mut()
            .find(|h| h.is_open() && h.ticker == ticker)
            .ok_or_else(|| StoreError::NotOpen {
                ticker: ticker.clone(),
            })?;
        row.status = HoldingStatus::Closed;
        let closed = row.clone();
        self.save(&rows)?;
        tracing::info!(ticker = %ticker, "position closed");
        Ok(closed)
    }
}

/// Current state of one open holding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingReview {
    pub holding: Holding,
    /// Latest close; `None` when the price could not be fetched.
    pub price: Option<f64>,
    pub value: Option<f64>,
    pub pnl: Option<f64>,
    pub pnl_pct: Option<f64>,
    /// Current verdict, when the history was long enough to evaluate.
    pub verdict: Option<Verdict>,
    /// Target and stop around the entry price.
    pub risk: Option<RiskEnvelope>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioReview {
    pub rows: Vec<HoldingReview>,
    /// Sum of the values that could be priced.
    pub total_value: f64,
    /// Cost basis of the priced rows, so `total_value - total_cost` is P/L.
    pub total_cost: f64,
    /// Cost basis of rows without a price; not part of P/L.
    pub unpriced_cost: f64,
    /// Tickers whose price could not be fetched.
    pub failed: Vec<String>,
}

impl PortfolioReview {
    /// Unrealized P/L over the priced rows.
    pub fn total_pnl(&self) -> f64 {
        self.total_value - self.total_cost
    }
}

/// How holdings are fetched during a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewOptions {
    pub lookback_days: u32,
    pub retry: RetryPolicy,
    /// Concurrent price fetches.
    pub max_workers: usize,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            lookback_days: 400,
            retry: RetryPolicy::default(),
            max_workers: 6,
        }
    }
}

/// Price, evaluate and size every open holding.
///
/// Fetches run on a private pool of `max_workers` threads and retry transient
/// provider failures. A fetch that still fails marks that row and moves on.
/// Risk levels are anchored on the entry price, not the current price.
pub fn review_holdings<P>(
    holdings: &[Holding],
    provider: &P,
    evaluator: &Evaluator,
    risk: &RiskPolicy,
    options: &ReviewOptions,
) -> Result<PortfolioReview, CoreError>
where
    P: PriceProvider + ?Sized,
{
    if options.max_workers == 0 {
        return Err(CoreError::Config("max_workers must be at least 1".into()));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.max_workers)
        .thread_name(|i| format!("stockpulse-review-{i}"))
        .build()
        .map_err(|e| CoreError::Config(format!("failed to build review pool: {e}")))?;

    let open: Vec<&Holding> = holdings.iter().filter(|h| h.is_open()).collect();
    let rows: Vec<HoldingReview> = pool.install(|| {
        open.par_iter()
            .map(|holding| review_one(holding, provider, evaluator, risk, options))
            .collect()
    });

    let (priced, unpriced): (Vec<&HoldingReview>, Vec<&HoldingReview>) =
        rows.iter().partition(|r| r.price.is_some());
    let failed = unpriced.iter().map(|r| r.holding.ticker.clone()).collect();
    Ok(PortfolioReview {
        total_value: priced.iter().filter_map(|r| r.value).sum(),
        total_cost: priced.iter().map(|r| r.holding.cost()).sum(),
        unpriced_cost: unpriced.iter().map(|r| r.holding.cost()).sum(),
        failed,
        rows,
    })
}

fn review_one<P>(
    holding: &Holding,
    provider: &P,
    evaluator: &Evaluator,
    risk: &RiskPolicy,
    options: &ReviewOptions,
) -> HoldingReview
where
    P: PriceProvider + ?Sized,
{
    let fetched = options.retry.run(&holding.ticker, || {
        provider
            .history(&holding.ticker, options.lookback_days)
            .map_err(CoreError::from)
    });
    let prices = match fetched {
        Ok(prices) => prices,
        Err(err) => {
            tracing::warn!(ticker = %holding.ticker, error = %err, "price fetch failed");
            return HoldingReview {
                holding: holding.clone(),
                price: None,
                value: None,
                pnl: None,
                pnl_pct: None,
                verdict: None,
                risk: risk.compute(holding.entry_price, None).ok(),
                error: Some(err.to_string()),
            };
        }
    };

    let price = prices.latest().map(|b| b.close);
    let (verdict, atr, error) = match evaluator.evaluate(&prices) {
        Ok(e) => (Some(e.signal.verdict), e.atr, None),
        Err(err) => (None, None, Some(err.to_string())),
    };
    let value = price.map(|p| p * holding.quantity);
    HoldingReview {
        holding: holding.clone(),
        price,
        value,
        pnl: value.map(|v| v - holding.cost()),
        pnl_pct: price.map(|p| (p / holding.entry_price - 1.0) * 100.0),
        verdict,
        risk: risk.compute(holding.entry_price, atr).ok(),
        error,
    }
}
