//! Trailing stop-loss overlay with a re-entry cooldown.

use tracing::debug;

use crate::domain::error::BandtraderError;
use crate::domain::position::{Direction, PositionState};
use crate::domain::price_series::PriceSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct StopLossConfig {
    /// Exit when close / best falls below this (long), or best / close (short).
    pub fraction: f64,
    /// Periods forced flat after a stop triggers.
    pub delay: usize,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        StopLossConfig {
            fraction: 0.9,
            delay: 15,
        }
    }
}

impl StopLossConfig {
    pub fn validate(&self) -> Result<(), BandtraderError> {
        if !(self.fraction > 0.0 && self.fraction <= 1.0) {
            return Err(BandtraderError::invalid_parameter(
                "stop_loss.fraction",
                format!("must be in (0, 1], got {}", self.fraction),
            ));
        }
        Ok(())
    }
}

/// Re-walk `positions`, forcing `Close` on adverse excursion from the best
/// close since entry.
///
/// A trade counts as newly opened whenever the previous *output* period is
/// not in the same direction, so resuming after a cooldown seeds a fresh
/// entry price from the next open (the current close on the final period).
pub fn apply_stop_loss(
    positions: &[PositionState],
    prices: &PriceSeries,
    config: &StopLossConfig,
) -> Result<Vec<PositionState>, BandtraderError> {
    config.validate()?;
    let n = positions.len();
    if prices.len() != n {
        return Err(BandtraderError::LengthMismatch {
            expected: n,
            found: prices.len(),
        });
    }

    let close = prices.adj_close();
    let open = prices.adj_open();
    let mut out = vec![PositionState::Close; n];
    let mut best = 0.0_f64;
    let mut cooldown = 0usize;

    for i in 1..n {
        if cooldown > 0 {
            cooldown -= 1;
            continue;
        }
        let current = positions[i];
        let Some(direction) = current.direction() else {
            continue;
        };

        if out[i - 1].direction() != Some(direction) {
            best = if i + 1 < n { open[i + 1] } else { close[i] };
        } else {
            best = match direction {
                Direction::Long => best.max(close[i]),
                Direction::Short => best.min(close[i]),
            };
        }

        let ratio = close[i] / best;
        let triggered = match direction {
            Direction::Long => ratio < config.fraction,
            Direction::Short => 1.0 / ratio < config.fraction,
        };
        if triggered {
            debug!(
                symbol = prices.symbol(),
                date = %prices.dates()[i],
                %direction,
                best,
                close = close[i],
                "stop loss triggered"
            );
            cooldown = config.delay;
        } else {
            out[i] = current;
        }
    }

    Ok(out)
}
