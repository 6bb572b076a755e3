//! Fast versus slow moving-average crossover.

use crate::domain::error::BandtraderError;
use crate::domain::price_series::PriceSeries;
use crate::domain::series_math::multiply_slice;
use crate::domain::signal::Bands;
use crate::domain::strategy::{Smoothing, Strategy, normalizer};

#[derive(Debug, Clone, PartialEq)]
pub struct DualMa {
    pub slow: usize,
    pub fast: usize,
    pub smoothing: Smoothing,
    pub allow_shorting: bool,
    /// Pushes the short levels away from the long ones.
    pub short_shift: f64,
}

impl Strategy for DualMa {
    fn name(&self) -> &'static str {
        "dual_ma"
    }

    fn warmup(&self) -> usize {
        self.slow
    }

    fn derive_bands(&self, prices: &PriceSeries) -> Result<Bands, BandtraderError> {
        let norm = normalizer(prices, self.slow)?;
        let open = multiply_slice(norm, prices.adj_open());
        let close = multiply_slice(norm, prices.adj_close());

        let slow = self.smoothing.apply(self.slow, true, &[&open, &close])?;
        let fast = self.smoothing.apply(self.fast, true, &[&open, &close])?;

        let bands = Bands::new(fast).with_long(slow.clone(), slow.clone());
        if self.allow_shorting {
            let short = multiply_slice(self.short_shift, &slow);
            Ok(bands.with_short(short.clone(), short))
        } else {
            Ok(bands)
        }
    }
}
