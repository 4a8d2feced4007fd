//! Single-instrument lookup with bounded retry.
//!
//! Unlike a scan, the lookup surfaces the typed error so the caller can say
//! exactly why no signal exists. Only transient provider failures are
//! retried; validation and history errors return immediately.

use crate::data::PriceProvider;
use crate::error::{CoreError, Result};
use crate::notify::{Notification, NotificationSink, Severity};
use crate::risk::RiskPolicy;
use crate::signal::{Evaluation, Evaluator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed-backoff retry for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub fn run<T>(&self, label: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(v) => return Ok(v),
                Err(err) if err.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        label,
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "transient failure; retrying"
                    );
                    std::thread::sleep(self.backoff());
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Fetch, evaluate and size one instrument.
///
/// Buy verdicts get a risk envelope. A SELL override emits a warning
/// notification through `sink`.
pub fn lookup_signal<P>(
    symbol: &str,
    provider: &P,
    evaluator: &Evaluator,
    risk: &RiskPolicy,
    lookback_days: u32,
    retry: &RetryPolicy,
    sink: &dyn NotificationSink,
) -> Result<Evaluation>
where
    P: PriceProvider + ?Sized,
{
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(CoreError::Config("symbol must not be empty".into()));
    }

    let prices = retry.run(&symbol, || {
        tracing::debug!(symbol = %symbol, provider = provider.name(), "fetching history");
        provider
            .history(&symbol, lookback_days)
            .map_err(CoreError::from)
    })?;

    let mut eval = evaluator.evaluate(&prices)?;
    risk.attach(&mut eval)?;

    let signal = &eval.signal;
    if signal.overridden() {
        sink.notify(&Notification::new(
            Severity::Warning,
            format!("{} {}", signal.symbol, signal.verdict),
            signal.reasons().join(", "),
        ));
    }
    tracing::info!(
        symbol = %signal.symbol,
        verdict = %signal.verdict,
        score = signal.score,
        "lookup complete"
    );
    Ok(eval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataError;
    use std::cell::Cell;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 0,
        }
    }

    #[test]
    fn retries_transient_then_succeeds() {
        let calls = Cell::new(0);
        let out = fast().run("X", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(DataError::NetworkUnreachable("down".into()).into())
            } else {
                Ok(42)
            }
        });
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let out: Result<()> = fast().run("X", || {
            calls.set(calls.get() + 1);
            Err(DataError::RateLimited {
                retry_after_secs: 1,
            }
            .into())
        });
        assert!(matches!(out, Err(CoreError::ProviderFetch(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let out: Result<()> = fast().run("X", || {
            calls.set(calls.get() + 1);
            Err(CoreError::InsufficientHistory {
                required: 201,
                available: 3,
            })
        });
        assert!(out.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            backoff_ms: 0,
        };
        let calls = Cell::new(0);
        let _: Result<()> = policy.run("X", || {
            calls.set(calls.get() + 1);
            Err(DataError::NetworkUnreachable("down".into()).into())
        });
        assert_eq!(calls.get(), 1);
    }
}
