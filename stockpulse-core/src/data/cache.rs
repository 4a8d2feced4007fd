//! In-memory TTL cache over any `PriceProvider`.
//!
//! Key: (symbol, as-of date, lookback days). The as-of date rolls the key over
//! at midnight, so yesterday's history is never served as today's. Only
//! successful fetches are cached; errors always go back to the provider.

use super::provider::{DataError, PriceProvider};
use crate::domain::PriceSeries;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

type CacheKey = (String, NaiveDate, u32);

#[derive(Debug, Clone)]
struct Entry {
    stored_at: Instant,
    series: PriceSeries,
}

/// Hit/miss counters and current size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Caching wrapper; owned by the caller and injected where a provider is expected.
pub struct CachedProvider<P> {
    inner: P,
    ttl: Duration,
    as_of: Option<NaiveDate>,
    entries: Mutex<HashMap<CacheKey, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: PriceProvider> CachedProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            as_of: None,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Pin the as-of date instead of reading the local clock.
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn today(&self) -> NaiveDate {
        self.as_of
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.lock().len(),
        }
    }

    /// Drop every entry for `symbol`.
    pub fn invalidate(&self, symbol: &str) {
        self.lock().retain(|(s, _, _), _| s != symbol);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Cached fetch keyed on `today` as the as-of date.
    fn history_on(
        &self,
        symbol: &str,
        lookback_days: u32,
        today: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let key = (symbol.to_string(), today, lookback_days);
        {
            let mut entries = self.lock();
            match entries.get(&key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(symbol, lookback_days, "history cache hit");
                    return Ok(entry.series.clone());
                }
                Some(_) => {
                    entries.remove(&key);
                }
                None => {}
            }
        }

        // The lock is not held across the fetch: concurrent misses for the
        // same key may both fetch, and the later insert wins.
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(symbol, lookback_days, provider = self.inner.name(), "history cache miss");
        let series = self.inner.history(symbol, lookback_days)?;
        let mut entries = self.lock();
        // Sweep: expired entries and earlier as-of dates are never hit again.
        entries.retain(|(_, as_of, _), e| *as_of == today && e.stored_at.elapsed() < self.ttl);
        entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                series: series.clone(),
            },
        );
        Ok(series)
    }
}

impl<P: PriceProvider> PriceProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn history(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries, DataError> {
        self.history_on(symbol, lookback_days, self.today())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticProvider;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
        inner: SyntheticProvider,
    }

    impl Counting {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
                inner: SyntheticProvider::new(7, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()),
            }
        }
    }

    impl PriceProvider for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn history(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DataError::NetworkUnreachable("offline".into()));
            }
            self.inner.history(symbol, lookback_days)
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    #[test]
    fn second_request_is_a_hit() {
        let cache = CachedProvider::new(Counting::new(false), Duration::from_secs(60))
            .with_as_of(as_of());
        let a = cache.history("AAA", 90).unwrap();
        let b = cache.history("AAA", 90).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn lookback_is_part_of_the_key() {
        let cache = CachedProvider::new(Counting::new(false), Duration::from_secs(60))
            .with_as_of(as_of());
        cache.history("AAA", 90).unwrap();
        cache.history("AAA", 30).unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expired_entries_are_refetched() {
        let cache = CachedProvider::new(Counting::new(false), Duration::from_millis(5))
            .with_as_of(as_of());
        cache.history("AAA", 90).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        cache.history("AAA", 90).unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = CachedProvider::new(Counting::new(true), Duration::from_secs(60))
            .with_as_of(as_of());
        assert!(cache.history("AAA", 90).is_err());
        assert!(cache.history("AAA", 90).is_err());
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn invalidate_drops_symbol() {
        let cache = CachedProvider::new(Counting::new(false), Duration::from_secs(60))
            .with_as_of(as_of());
        cache.history("AAA", 90).unwrap();
        cache.history("BBB", 90).unwrap();
        cache.invalidate("AAA");
        assert_eq!(cache.stats().entries, 1);
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn insert_sweeps_expired_entries() {
        let cache = CachedProvider::new(Counting::new(false), Duration::ZERO).with_as_of(as_of());
        cache.history("AAA", 90).unwrap();
        cache.history("BBB", 90).unwrap();
        cache.history("CCC", 90).unwrap();
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn insert_sweeps_previous_days() {
        let cache = CachedProvider::new(Counting::new(false), Duration::from_secs(3600));
        let monday = as_of();
        let tuesday = monday.succ_opt().unwrap();
        cache.history_on("AAA", 90, monday).unwrap();
        cache.history_on("BBB", 90, monday).unwrap();
        assert_eq!(cache.stats().entries, 2);

        cache.history_on("AAA", 90, tuesday).unwrap();
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 3);
    }
}
