//! CSV file price source.
//!
//! Reads Yahoo-style daily history files named `<SYMBOL>.csv` with the
//! header `Date,Open,High,Low,Close,Adj Close,Volume`. Rows with `null`
//! fields, unparsable dates or degenerate prices are skipped.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::error::BandtraderError;
use crate::domain::price_series::{PriceBar, PriceSeries};
use crate::ports::data_port::PriceSource;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open", deserialize_with = "csv::invalid_option")]
    open: Option<f64>,
    #[serde(rename = "High", deserialize_with = "csv::invalid_option")]
    high: Option<f64>,
    #[serde(rename = "Low", deserialize_with = "csv::invalid_option")]
    low: Option<f64>,
    #[serde(rename = "Close", deserialize_with = "csv::invalid_option")]
    close: Option<f64>,
    #[serde(rename = "Adj Close", deserialize_with = "csv::invalid_option")]
    adj_close: Option<f64>,
}

impl CsvRow {
    fn into_bar(self) -> Option<PriceBar> {
        let date = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()?;
        Some(PriceBar {
            date,
            open: self.open?,
            high: self.high?,
            low: self.low?,
            close: self.close?,
            adj_close: self.adj_close?,
        })
    }
}

pub struct CsvAdapter {
    directory: PathBuf,
}

impl CsvAdapter {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    /// `<SYMBOL>.csv`, falling back to the lower-case file name.
    fn csv_path(&self, symbol: &str) -> PathBuf {
        let exact = self.directory.join(format!("{symbol}.csv"));
        if exact.exists() {
            return exact;
        }
        let lower = self.directory.join(format!("{}.csv", symbol.to_lowercase()));
        if lower.exists() { lower } else { exact }
    }

    fn read_bars(&self, symbol: &str) -> Result<Vec<PriceBar>, BandtraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| BandtraderError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| BandtraderError::DataSource {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            let raw_date = row.date.clone();

            let Some(bar) = row.into_bar() else {
                warn!(symbol, row = line + 1, date = %raw_date, "skipping incomplete row");
                continue;
            };
            if let Some(reason) = bar.degenerate_reason() {
                warn!(symbol, date = %bar.date, reason, "skipping degenerate row");
                continue;
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        debug!(symbol, rows = bars.len(), path = %path.display(), "read price file");
        Ok(bars)
    }
}

impl PriceSource for CsvAdapter {
    fn load_series(&self, symbol: &str) -> Result<PriceSeries, BandtraderError> {
        let bars = self.read_bars(symbol)?;
        PriceSeries::from_bars(symbol, &bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BandtraderError> {
        let entries = fs::read_dir(&self.directory).map_err(|e| BandtraderError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.directory.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BandtraderError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;

            let path = entry.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                symbols.push(stem.to_string_lossy().to_uppercase());
            }
        }

        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}
