//! Daily price records and the immutable per-instrument price series.
//!
//! A [`PriceSeries`] stores one column per field so every component can
//! address period `i` in any column with the same index. Once built it is
//! never mutated; sweeps share it through [`SharedSeries`].

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::error::BandtraderError;

/// Read-only handle shared between concurrent backtests.
pub type SharedSeries = Arc<PriceSeries>;

/// One daily period as delivered by the data source.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
}

impl PriceBar {
    /// Split/dividend adjustment factor: adj_close / close.
    pub fn adjustment_ratio(&self) -> f64 {
        self.adj_close / self.close
    }

    /// Reason this bar can't be used, if any.
    pub fn degenerate_reason(&self) -> Option<&'static str> {
        let fields = [self.open, self.high, self.low, self.close, self.adj_close];
        if fields.iter().any(|v| !v.is_finite()) {
            return Some("non-finite price");
        }
        if self.close <= 0.0 {
            return Some("close price must be positive");
        }
        if self.open <= 0.0 || self.adj_close <= 0.0 {
            return Some("open and adjusted close must be positive");
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    dates: Vec<NaiveDate>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    adj_open: Vec<f64>,
    adj_high: Vec<f64>,
    adj_low: Vec<f64>,
    adj_close: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from bars in ascending date order.
    ///
    /// Adjusted open/high/low are derived from the bar's adjustment ratio.
    /// Bars with degenerate prices or out-of-order dates are rejected.
    pub fn from_bars(symbol: &str, bars: &[PriceBar]) -> Result<Self, BandtraderError> {
        if bars.is_empty() {
            return Err(BandtraderError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let n = bars.len();
        let mut series = PriceSeries {
            symbol: symbol.to_string(),
            dates: Vec::with_capacity(n),
            open: Vec::with_capacity(n),
            high: Vec::with_capacity(n),
            low: Vec::with_capacity(n),
            close: Vec::with_capacity(n),
            adj_open: Vec::with_capacity(n),
            adj_high: Vec::with_capacity(n),
            adj_low: Vec::with_capacity(n),
            adj_close: Vec::with_capacity(n),
        };

        for bar in bars {
            if let Some(reason) = bar.degenerate_reason() {
                return Err(BandtraderError::DegeneratePrice {
                    symbol: symbol.to_string(),
                    date: bar.date,
                    reason: reason.to_string(),
                });
            }
            if let Some(&last) = series.dates.last() {
                if bar.date <= last {
                    return Err(BandtraderError::UnorderedDates {
                        symbol: symbol.to_string(),
                        date: bar.date,
                    });
                }
            }

            let ratio = bar.adjustment_ratio();
            series.dates.push(bar.date);
            series.open.push(bar.open);
            series.high.push(bar.high);
            series.low.push(bar.low);
            series.close.push(bar.close);
            series.adj_open.push(bar.open * ratio);
            series.adj_high.push(bar.high * ratio);
            series.adj_low.push(bar.low * ratio);
            series.adj_close.push(bar.adj_close);
        }

        Ok(series)
    }

    pub fn into_shared(self) -> SharedSeries {
        Arc::new(self)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn open(&self) -> &[f64] {
        &self.open
    }

    pub fn high(&self) -> &[f64] {
        &self.high
    }

    pub fn low(&self) -> &[f64] {
        &self.low
    }

    pub fn close(&self) -> &[f64] {
        &self.close
    }

    pub fn adj_open(&self) -> &[f64] {
        &self.adj_open
    }

    pub fn adj_high(&self) -> &[f64] {
        &self.adj_high
    }

    pub fn adj_low(&self) -> &[f64] {
        &self.adj_low
    }

    pub fn adj_close(&self) -> &[f64] {
        &self.adj_close
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}
