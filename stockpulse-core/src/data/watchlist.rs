//! Watchlists: named instrument lists stored as TOML.
//!
//! ```toml
//! name = "Nordic banks"
//!
//! [[instruments]]
//! symbol = "SEB-A.ST"
//! name = "SEB A"
//! ```

use crate::domain::Instrument;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const OMXS30: [(&str, &str); 30] = [
    ("ABB.ST", "ABB Ltd"),
    ("ALFA.ST", "Alfa Laval"),
    ("ALIV-SDB.ST", "Autoliv SDB"),
    ("ASSA-B.ST", "Assa Abloy B"),
    ("AZN.ST", "AstraZeneca"),
    ("ATCO-A.ST", "Atlas Copco A"),
    ("BOL.ST", "Boliden"),
    ("ERIC-B.ST", "Ericsson B"),
    ("ESSITY-B.ST", "Essity B"),
    ("EVO.ST", "Evolution"),
    ("GETI-B.ST", "Getinge B"),
    ("HEXA-B.ST", "Hexagon B"),
    ("HM-B.ST", "H&M B"),
    ("INVE-B.ST", "Investor B"),
    ("KINV-B.ST", "Kinnevik B"),
    ("NDA-SE.ST", "Nordea Bank"),
    ("SAND.ST", "Sandvik"),
    ("SCA-B.ST", "SCA B"),
    ("SEB-A.ST", "SEB A"),
    ("SHB-A.ST", "Handelsbanken A"),
    ("SINCH.ST", "Sinch"),
    ("SKF-B.ST", "SKF B"),
    ("SWED-A.ST", "Swedbank A"),
    ("SWMA.ST", "Swedish Match"),
    ("TELIA.ST", "Telia Company"),
    ("TRUE-B.ST", "Truecaller B"),
    ("VOLV-B.ST", "Volvo B"),
    ("EQT.ST", "EQT"),
    ("NIBE-B.ST", "NIBE Industrier B"),
    ("SBB-B.ST", "SBB B"),
];

/// A named list of instruments to scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instruments: Vec<Instrument>,
}

impl Watchlist {
    pub fn new(name: impl Into<String>, instruments: Vec<Instrument>) -> Self {
        Self {
            name: name.into(),
            instruments,
        }
    }

    /// Load a watchlist from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("read watchlist {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse a watchlist; symbols are trimmed and uppercased so dedupe sees
    /// `abb.st` and `ABB.ST` as one instrument.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut list: Watchlist = toml::from_str(content)
            .map_err(|e| CoreError::Config(format!("parse watchlist TOML: {e}")))?;
        for inst in &mut list.instruments {
            let symbol = inst.symbol.trim().to_uppercase();
            if symbol.is_empty() {
                return Err(CoreError::Config(format!(
                    "watchlist entry with empty symbol (name '{}')",
                    inst.name
                )));
            }
            inst.symbol = symbol;
        }
        Ok(list)
    }

    /// Build from a comma-separated symbol list ("ABB.ST, VOLV-B.ST").
    pub fn from_symbols(csv: &str) -> Self {
        let instruments = csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Instrument::from_symbol(s.to_uppercase()))
            .collect();
        Self::new("custom", instruments)
    }

    /// The Stockholm large-cap index constituents.
    pub fn omxs30() -> Self {
        Self::new(
            "OMXS30",
            OMXS30
                .iter()
                .map(|(symbol, name)| Instrument::new(*symbol, *name))
                .collect(),
        )
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("serialize watchlist: {e}")))
    }

    /// Remove repeated symbols; the first occurrence wins.
    pub fn deduped(&self) -> Vec<Instrument> {
        let mut seen = HashSet::new();
        self.instruments
            .iter()
            .filter(|i| seen.insert(i.symbol.clone()))
            .cloned()
            .collect()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.instruments.iter().map(|i| i.symbol.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

impl Default for Watchlist {
    fn default() -> Self {
        Self::omxs30()
    }
}
