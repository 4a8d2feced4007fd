//! Domain types for StockPulse

pub mod bar;
pub mod instrument;
pub mod series;

pub use bar::PriceBar;
pub use instrument::Instrument;
pub use series::PriceSeries;
