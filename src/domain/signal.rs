//! Band-crossing signal generator.
//!
//! Turns a smoothed signal and its threshold bands into one
//! [`PositionState`] per period. Rules are evaluated in a fixed priority
//! order against the previous period's state; each rule only applies from
//! the opposite-or-flat state, so long and short can never overlap.

use serde::Serialize;
use tracing::debug;

use crate::domain::error::BandtraderError;
use crate::domain::position::PositionState;
use crate::domain::price_series::PriceSeries;

/// Periods forced flat after any directional trade closes (settlement).
pub const TRADE_GAP: usize = 1;

/// Signal plus the optional threshold levels it is compared against.
///
/// A missing long pair disables long entries; a missing short pair
/// disables short entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Bands {
    pub signal: Vec<f64>,
    pub long_buy: Option<Vec<f64>>,
    pub long_sell: Option<Vec<f64>>,
    pub short_sell: Option<Vec<f64>>,
    pub short_buy: Option<Vec<f64>>,
}

impl Bands {
    pub fn new(signal: Vec<f64>) -> Self {
        Bands {
            signal,
            ..Bands::default()
        }
    }

    pub fn with_long(mut self, buy: Vec<f64>, sell: Vec<f64>) -> Self {
        self.long_buy = Some(buy);
        self.long_sell = Some(sell);
        self
    }

    pub fn with_short(mut self, sell: Vec<f64>, buy: Vec<f64>) -> Self {
        self.short_sell = Some(sell);
        self.short_buy = Some(buy);
        self
    }

    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    /// Every present level must line up with the signal.
    pub fn check_lengths(&self) -> Result<(), BandtraderError> {
        let expected = self.signal.len();
        let levels = [
            &self.long_buy,
            &self.long_sell,
            &self.short_sell,
            &self.short_buy,
        ];
        for level in levels.into_iter().flatten() {
            if level.len() != expected {
                return Err(BandtraderError::LengthMismatch {
                    expected,
                    found: level.len(),
                });
            }
        }
        Ok(())
    }
}

/// Quick re-entry after a sharp up-move while flat.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuyConfig {
    pub enabled: bool,
    pub allowed_rebuys: usize,
    pub consecutive_up_days: usize,
    /// Close the rebuy when the close falls below entry × this fraction.
    pub stop_fraction: f64,
}

impl Default for RebuyConfig {
    fn default() -> Self {
        RebuyConfig {
            enabled: false,
            allowed_rebuys: 3,
            consecutive_up_days: 7,
            stop_fraction: 0.95,
        }
    }
}

/// Rebuy parameters bound to the prices they are evaluated on.
#[derive(Debug, Clone, Copy)]
pub struct Rebuy<'a> {
    pub config: &'a RebuyConfig,
    pub prices: &'a PriceSeries,
}

fn above(level: &Option<Vec<f64>>, i: usize, value: f64) -> bool {
    level.as_ref().is_some_and(|l| value > l[i])
}

fn below(level: &Option<Vec<f64>>, i: usize, value: f64) -> bool {
    level.as_ref().is_some_and(|l| value < l[i])
}

/// Generate the raw position series.
///
/// The first `delay` periods and index 0 are always `Close`. The rebuy rule
/// is active only when `rebuy` is given and its config is enabled.
pub fn generate_positions(
    delay: usize,
    bands: &Bands,
    rebuy: Option<Rebuy<'_>>,
) -> Result<Vec<PositionState>, BandtraderError> {
    bands.check_lengths()?;
    let n = bands.len();
    let rebuy = rebuy.filter(|r| r.config.enabled);
    if let Some(r) = rebuy {
        if r.prices.len() != n {
            return Err(BandtraderError::LengthMismatch {
                expected: n,
                found: r.prices.len(),
            });
        }
    }

    let signal = &bands.signal;
    let mut out = vec![PositionState::Close; n];
    let mut gap = 0usize;
    let mut up_days = 0usize;
    let mut rebuys_used = 0usize;
    let mut rebuy_price = 0.0;

    for i in 1..n {
        if let Some(r) = rebuy {
            let close = r.prices.adj_close();
            if close[i] > close[i - 1] {
                up_days += 1;
            } else {
                up_days = 0;
            }
        }

        if i < delay || gap > 0 {
            out[i] = PositionState::Close;
            gap = gap.saturating_sub(1);
            continue;
        }

        let prev = out[i - 1];
        let value = signal[i];
        let rebuy_stopped = rebuy.is_some_and(|r| {
            prev == PositionState::LongRebuy
                && r.prices.adj_close()[i] < rebuy_price * r.config.stop_fraction
        });
        let rebuy_ready = rebuy.is_some_and(|r| {
            rebuys_used < r.config.allowed_rebuys
                && prev.is_flat()
                && up_days >= r.config.consecutive_up_days
        });

        let next = if prev != PositionState::ShortSell && above(&bands.long_buy, i, value) {
            PositionState::LongBuy
        } else if prev == PositionState::LongBuy && below(&bands.long_sell, i, value) {
            rebuys_used = 0;
            PositionState::Close
        } else if rebuy_stopped {
            PositionState::Close
        } else if !prev.is_long() && below(&bands.short_sell, i, value) {
            PositionState::ShortSell
        } else if prev.is_short() && above(&bands.short_buy, i, value) {
            PositionState::Close
        } else if let (true, Some(r)) = (rebuy_ready, rebuy) {
            rebuys_used += 1;
            rebuy_price = if i + 1 < n {
                r.prices.adj_open()[i + 1]
            } else {
                r.prices.adj_close()[i]
            };
            debug!(period = i, price = rebuy_price, used = rebuys_used, "long rebuy");
            PositionState::LongRebuy
        } else {
            prev
        };

        out[i] = next;
        if next.is_flat() && !prev.is_flat() {
            gap = TRADE_GAP;
        }
    }

    Ok(out)
}
