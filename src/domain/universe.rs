//! Symbol lists and per-symbol loading.
//!
//! Symbols that fail to load or are too short are skipped with a recorded
//! reason; the rest of the universe proceeds.

use std::collections::HashSet;
use std::fmt;

use tracing::{info, warn};

use crate::domain::error::BandtraderError;
use crate::domain::price_series::SharedSeries;
use crate::ports::data_port::PriceSource;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

impl From<UniverseError> for BandtraderError {
    fn from(err: UniverseError) -> Self {
        BandtraderError::ConfigInvalid {
            section: "data".to_string(),
            key: "symbols".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Parse a comma-separated symbol list, upper-casing each symbol.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    LoadFailed(String),
    InsufficientBars { bars: usize, minimum: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LoadFailed(reason) => write!(f, "{reason}"),
            SkipReason::InsufficientBars { bars, minimum } => {
                write!(f, "only {bars} periods, minimum {minimum} required")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct Universe {
    pub series: Vec<SharedSeries>,
    pub skipped: Vec<SkippedSymbol>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.series.len()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.symbol()).collect()
    }
}

/// Load every symbol, skipping those that fail or have fewer than
/// `minimum` periods. Fails only if nothing could be loaded.
pub fn load_universe(
    source: &dyn PriceSource,
    symbols: &[String],
    minimum: usize,
) -> Result<Universe, BandtraderError> {
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for symbol in symbols {
        let loaded = match source.load_series(symbol) {
            Ok(s) => s,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping symbol");
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: SkipReason::LoadFailed(e.to_string()),
                });
                continue;
            }
        };

        if loaded.len() < minimum {
            let reason = SkipReason::InsufficientBars {
                bars: loaded.len(),
                minimum,
            };
            warn!(symbol = %symbol, %reason, "skipping symbol");
            skipped.push(SkippedSymbol {
                symbol: symbol.clone(),
                reason,
            });
            continue;
        }

        info!(symbol = %symbol, periods = loaded.len(), "loaded");
        series.push(loaded.into_shared());
    }

    if series.is_empty() {
        return Err(BandtraderError::NoData {
            symbol: symbols.join(","),
        });
    }

    if !skipped.is_empty() {
        info!(
            loaded = series.len(),
            requested = symbols.len(),
            "universe partially loaded"
        );
    }

    Ok(Universe { series, skipped })
}
