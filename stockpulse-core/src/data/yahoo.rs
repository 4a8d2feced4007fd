//! Yahoo Finance price provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. Handles rate limiting,
//! retries with exponential backoff, response parsing, and the circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. `CsvProvider` is the fallback when Yahoo is unavailable.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{into_series, DataError, PriceProvider};
use crate::domain::{PriceBar, PriceSeries};
use chrono::{Duration as Days, NaiveDate, NaiveTime};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

/// Yahoo Finance price provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

const CHART_API: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: CHART_API.to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// HTTP retries after the first request. Set to 0 when a caller-side
    /// `RetryPolicy` already wraps this provider.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Chart endpoint without the trailing symbol.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether the circuit breaker currently allows requests.
    pub fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }

    /// Chart API URL for a symbol and inclusive date range.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end_ts = (end + Days::days(1)).and_time(NaiveTime::MIN).and_utc().timestamp() - 1;
        format!(
            "{}/{symbol}?period1={start_ts}&period2={end_ts}&interval=1d",
            self.base_url
        )
    }

    /// Parse the chart API response into bars.
    ///
    /// Rows with any missing price are dropped (holidays, halted sessions).
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<PriceBar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // A valid symbol with no trading in range has no timestamps at all.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                continue;
            };

            bars.push(PriceBar {
                date,
                open,
                high,
                low,
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            });
        }

        Ok(bars)
    }

    /// One request; decides whether a failure is worth another try.
    fn attempt(&self, symbol: &str, url: &str) -> Attempt {
        let resp = match self.client.get(url).send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                tracing::warn!(symbol, error = %e, "yahoo request failed");
                return Attempt::Retry(DataError::NetworkUnreachable(e.to_string()));
            }
            Err(e) => return Attempt::Fail(DataError::NetworkUnreachable(e.to_string())),
        };

        match resp.status() {
            // IP ban: stop talking to Yahoo for the cooldown.
            StatusCode::FORBIDDEN => {
                self.circuit_breaker.trip();
                Attempt::Fail(DataError::CircuitBreakerTripped)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                self.circuit_breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                tracing::warn!(symbol, retry_after_secs, "rate limited by yahoo");
                Attempt::Retry(DataError::RateLimited { retry_after_secs })
            }
            StatusCode::UNAUTHORIZED => Attempt::Fail(DataError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            )),
            StatusCode::NOT_FOUND => Attempt::Fail(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }),
            status if !status.is_success() => {
                self.circuit_breaker.record_failure();
                Attempt::Retry(DataError::HttpStatus {
                    status: status.as_u16(),
                    symbol: symbol.to_string(),
                })
            }
            _ => {
                let parsed = resp
                    .json::<ChartResponse>()
                    .map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })
                    .and_then(|chart| Self::parse_response(symbol, chart));
                match parsed {
                    Ok(bars) => {
                        self.circuit_breaker.record_success();
                        Attempt::Done(bars)
                    }
                    Err(err) => Attempt::Fail(err),
                }
            }
        }
    }

    /// Up to `max_retries` extra attempts with exponential backoff.
    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        let url = self.chart_url(symbol, start, end);
        let mut last_error = DataError::Other("no request attempted".into());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(symbol, attempt, ?delay, "retrying yahoo request");
                std::thread::sleep(delay);
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }
            match self.attempt(symbol, &url) {
                Attempt::Done(bars) => return Ok(bars),
                Attempt::Fail(err) => return Err(err),
                Attempt::Retry(err) => last_error = err,
            }
        }

        tracing::warn!(symbol, error = %last_error, "yahoo retries exhausted");
        Err(last_error)
    }
}

/// Result of a single HTTP round trip.
enum Attempt {
    Done(Vec<PriceBar>),
    Retry(DataError),
    Fail(DataError),
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn history(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries, DataError> {
        let end = chrono::Utc::now().date_naive();
        let start = end - Days::days(i64::from(lookback_days));
        tracing::debug!(symbol, %start, %end, "fetching from yahoo");
        let bars = self.fetch_with_retry(symbol, start, end)?;
        into_series(symbol, bars)
    }
}
