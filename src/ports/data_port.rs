//! Price data access port trait.

use crate::domain::error::BandtraderError;
use crate::domain::price_series::PriceSeries;

pub trait PriceSource {
    /// Full daily history for `symbol`, already filtered of unusable rows.
    fn load_series(&self, symbol: &str) -> Result<PriceSeries, BandtraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, BandtraderError>;
}
