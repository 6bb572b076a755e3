//! Price versus a moving-average band.

use crate::domain::error::BandtraderError;
use crate::domain::price_series::PriceSeries;
use crate::domain::series_math::multiply_slice;
use crate::domain::signal::Bands;
use crate::domain::strategy::{Smoothing, Strategy, normalizer};

/// Signal is the normalized close; levels sit `split` above and below the
/// bias-started MA of open and close. Short levels are the long levels
/// scaled by `short_shift`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaBand {
    pub length: usize,
    pub split: f64,
    pub smoothing: Smoothing,
    pub allow_shorting: bool,
    pub short_shift: f64,
}

impl Strategy for MaBand {
    fn name(&self) -> &'static str {
        "ma_band"
    }

    fn warmup(&self) -> usize {
        self.length
    }

    fn derive_bands(&self, prices: &PriceSeries) -> Result<Bands, BandtraderError> {
        let norm = normalizer(prices, self.length)?;
        let signal = multiply_slice(norm, prices.adj_close());
        let mid = self
            .smoothing
            .apply(self.length, true, &[prices.adj_open(), prices.adj_close()])?;
        let mid = multiply_slice(norm, &mid);

        let long_buy = multiply_slice(1.0 + self.split, &mid);
        let long_sell = multiply_slice(1.0 - self.split, &mid);

        let bands = Bands::new(signal);
        if self.allow_shorting {
            let short_sell = multiply_slice(self.short_shift, &long_sell);
            let short_buy = multiply_slice(self.short_shift, &long_buy);
            Ok(bands
                .with_long(long_buy, long_sell)
                .with_short(short_sell, short_buy))
        } else {
            Ok(bands.with_long(long_buy, long_sell))
        }
    }
}
