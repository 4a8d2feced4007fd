//! Price data: provider trait, concrete sources, caching and watchlists.

pub mod cache;
pub mod circuit_breaker;
pub mod csv_provider;
pub mod provider;
pub mod synthetic;
pub mod watchlist;
pub mod yahoo;

pub use cache::{CacheStats, CachedProvider};
pub use circuit_breaker::CircuitBreaker;
pub use csv_provider::CsvProvider;
pub use provider::{DataError, PriceProvider};
pub use synthetic::SyntheticProvider;
pub use watchlist::Watchlist;
pub use yahoo::YahooProvider;
