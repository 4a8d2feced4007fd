//! CSV directory provider: one `{dir}/{SYMBOL}.csv` per instrument.
//!
//! Columns: `Date,Open,High,Low,Close,Volume` (the layout most charting tools
//! and the Yahoo download button export). Extra columns are ignored.
//! The lookback window is measured back from the file's last bar, so static
//! fixtures keep working as the calendar moves on.

use super::provider::{into_series, DataError, PriceProvider};
use crate::domain::{PriceBar, PriceSeries};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    // Some exports write volume as a float ("1234.0").
    #[serde(rename = "Volume")]
    volume: f64,
}

/// Reads price history from a directory of CSV files.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `symbol`.
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    fn read_bars(path: &Path) -> Result<Vec<PriceBar>, DataError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))?;
            bars.push(PriceBar {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: if row.volume.is_finite() && row.volume > 0.0 {
                    row.volume.round() as u64
                } else {
                    0
                },
            });
        }
        Ok(bars)
    }

    /// Write `series` in the layout this provider reads.
    pub fn write(&self, series: &PriceSeries) -> Result<PathBuf, DataError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| DataError::Io(e.to_string()))?;
        let path = self.path_for(series.symbol());
        let mut writer =
            csv::Writer::from_path(&path).map_err(|e| DataError::Csv(e.to_string()))?;
        writer
            .write_record(["Date", "Open", "High", "Low", "Close", "Volume"])
            .map_err(|e| DataError::Csv(e.to_string()))?;
        for bar in series.bars() {
            writer
                .write_record([
                    bar.date.to_string(),
                    bar.open.to_string(),
                    bar.high.to_string(),
                    bar.low.to_string(),
                    bar.close.to_string(),
                    bar.volume.to_string(),
                ])
                .map_err(|e| DataError::Csv(e.to_string()))?;
        }
        writer.flush().map_err(|e| DataError::Io(e.to_string()))?;
        Ok(path)
    }
}

impl PriceProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn history(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let series = into_series(symbol, Self::read_bars(&path)?)?;
        let Some(last) = series.as_of() else {
            return Ok(series);
        };
        let cutoff = last - Duration::days(i64::from(lookback_days));
        let keep = series.bars().iter().filter(|b| b.date > cutoff).count();
        tracing::debug!(symbol, path = %path.display(), bars = keep, "loaded csv history");
        Ok(series.tail(keep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn reads_and_windows_history() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "ABB.ST.csv",
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2024-01-02,10,11,9,10.5,10.5,1000\n\
             2024-01-03,10.5,12,10,11.5,11.5,1200.0\n\
             2024-01-10,11.5,12,11,11.8,11.8,900\n",
        );
        let p = CsvProvider::new(dir.path());
        let all = p.history("ABB.ST", 365).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.bars()[1].volume, 1200);

        let recent = p.history("ABB.ST", 8).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.bars()[0].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn missing_file_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvProvider::new(dir.path()).history("NOPE", 30).unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn invalid_prices_are_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "BAD.csv",
            "Date,Open,High,Low,Close,Volume\n2024-01-02,10,9,11,10,100\n",
        );
        let err = CsvProvider::new(dir.path()).history("BAD", 30).unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
    }

    #[test]
    fn write_then_read_preserves_bars() {
        let dir = tempfile::tempdir().unwrap();
        let p = CsvProvider::new(dir.path());
        let bars = vec![PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            open: 1.5,
            high: 2.0,
            low: 1.25,
            close: 1.75,
            volume: 42,
        }];
        let series = PriceSeries::new("X", bars).unwrap();
        p.write(&series).unwrap();
        assert_eq!(p.history("X", 10).unwrap(), series);
    }

    #[test]
    fn header_only_file_is_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "EMPTY.csv", "Date,Open,High,Low,Close,Volume\n");
        let s = CsvProvider::new(dir.path()).history("EMPTY", 30).unwrap();
        assert!(s.is_empty());
    }
}
