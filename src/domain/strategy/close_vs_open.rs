//! Overnight versus intraday momentum.
//!
//! Splits each day into the overnight leg (close to next open) and the
//! intraday leg (open to close), smooths the cumulative gain of each, and
//! trades on the sum of their relative slopes.

use crate::domain::error::BandtraderError;
use crate::domain::price_series::PriceSeries;
use crate::domain::series_math::{
    differentiate, ema, market_closed_gain, market_open_gain, multiply_slice, multiply_slices,
    reciprocal_slice, sum_slices,
};
use crate::domain::signal::Bands;
use crate::domain::strategy::{Strategy, constant_levels, normalizer};

const SLOPE_SMOOTHING: usize = 30;
const SLOPE_SCALE: f64 = 200.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CloseVsOpen {
    pub length: usize,
    pub split: f64,
    pub allow_shorting: bool,
}

impl CloseVsOpen {
    fn smoothed_slope(&self, gain: &[f64]) -> Result<Vec<f64>, BandtraderError> {
        let normalized = multiply_slice(1.0 / gain[self.length], gain);
        let smoothed = ema(self.length, true, &[&normalized])?;
        let slope = multiply_slices(&[&differentiate(&smoothed), &reciprocal_slice(&smoothed)])?;
        let slope = ema(SLOPE_SMOOTHING, false, &[&slope])?;
        Ok(multiply_slice(SLOPE_SCALE, &slope))
    }
}

impl Strategy for CloseVsOpen {
    fn name(&self) -> &'static str {
        "close_vs_open"
    }

    fn warmup(&self) -> usize {
        self.length
    }

    fn derive_bands(&self, prices: &PriceSeries) -> Result<Bands, BandtraderError> {
        normalizer(prices, self.length)?;
        let closed = market_closed_gain(prices.adj_open(), prices.adj_close())?;
        let opened = market_open_gain(prices.adj_open(), prices.adj_close())?;

        let slope_closed = self.smoothed_slope(&closed)?;
        let slope_opened = self.smoothed_slope(&opened)?;
        let signal = sum_slices(&[&slope_closed, &slope_opened])?;

        Ok(constant_levels(
            Bands::new(signal),
            self.split,
            self.allow_shorting,
        ))
    }
}
