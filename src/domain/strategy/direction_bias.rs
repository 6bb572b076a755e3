//! One-direction day bias.
//!
//! On strong trend days the open sits near one extreme of the range and the
//! close near the other. The body return of such days is averaged into an
//! oscillator.

use crate::domain::error::BandtraderError;
use crate::domain::price_series::PriceSeries;
use crate::domain::series_math::{ma, multiply_slice};
use crate::domain::signal::Bands;
use crate::domain::strategy::{Strategy, constant_levels, normalizer};

/// Combined wick length allowed, as a fraction of the body.
const MAX_END_DIFF: f64 = 0.1;
/// Minimum body size relative to the open.
const MIN_BODY: f64 = 0.01;
const SIGNAL_SCALE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionBias {
    pub length: usize,
    pub split: f64,
    pub allow_shorting: bool,
}

/// Body return of a one-direction day, 0.0 otherwise.
pub fn one_direction_gain(open: f64, high: f64, low: f64, close: f64) -> f64 {
    let body = close - open;
    if (body / open).abs() <= MIN_BODY {
        return 0.0;
    }
    let end_diff_up = (open - low) + (high - close);
    let end_diff_down = (high - open) + (close - low);
    let small_ends =
        (end_diff_up / body).abs() < MAX_END_DIFF || (end_diff_down / body).abs() < MAX_END_DIFF;
    if small_ends { body / open } else { 0.0 }
}

impl Strategy for DirectionBias {
    fn name(&self) -> &'static str {
        "direction_bias"
    }

    fn warmup(&self) -> usize {
        self.length
    }

    fn derive_bands(&self, prices: &PriceSeries) -> Result<Bands, BandtraderError> {
        normalizer(prices, self.length)?;
        let days: Vec<f64> = (0..prices.len())
            .map(|i| {
                one_direction_gain(
                    prices.adj_open()[i],
                    prices.adj_high()[i],
                    prices.adj_low()[i],
                    prices.adj_close()[i],
                )
            })
            .collect();
        let signal = multiply_slice(SIGNAL_SCALE, &ma(self.length, true, &[&days])?);

        Ok(constant_levels(
            Bands::new(signal),
            self.split,
            self.allow_shorting,
        ))
    }
}
