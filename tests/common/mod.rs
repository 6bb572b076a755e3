#![allow(dead_code)]

use bandtrader::domain::error::BandtraderError;
pub use bandtrader::domain::price_series::{PriceBar, PriceSeries};
use bandtrader::ports::data_port::PriceSource;
use chrono::NaiveDate;
use std::collections::HashMap;

pub struct MockPriceSource {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PriceSource for MockPriceSource {
    fn load_series(&self, symbol: &str) -> Result<PriceSeries, BandtraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BandtraderError::DataSource {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol).cloned().unwrap_or_default();
        PriceSeries::from_bars(symbol, &bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BandtraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Bars from parallel open/close arrays, one day apart.
pub fn bars_from(start: NaiveDate, open: &[f64], close: &[f64]) -> Vec<PriceBar> {
    open.iter()
        .zip(close)
        .enumerate()
        .map(|(i, (&o, &c))| PriceBar {
            date: start + chrono::Duration::days(i as i64),
            open: o,
            high: o.max(c),
            low: o.min(c),
            close: c,
            adj_close: c,
        })
        .collect()
}

pub fn series_from(symbol: &str, open: &[f64], close: &[f64]) -> PriceSeries {
    PriceSeries::from_bars(symbol, &bars_from(date(2020, 1, 1), open, close)).unwrap()
}

/// Oscillating series with a mild upward drift.
pub fn generate_bars(start_date: &str, count: usize, start_price: f64) -> Vec<PriceBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    (0..count)
        .map(|i| {
            let t = i as f64;
            let open = start_price * (1.0 + 0.08 * (t * 0.15).sin() + 0.001 * t);
            let close = open * (1.0 + 0.01 * (t * 0.7).cos());
            PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) * 1.005,
                low: open.min(close) * 0.995,
                close,
                adj_close: close,
            }
        })
        .collect()
}

pub fn csv_content(bars: &[PriceBar]) -> String {
    let mut out = String::from("Date,Open,High,Low,Close,Adj Close,Volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{},1000\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.adj_close
        ));
    }
    out
}
