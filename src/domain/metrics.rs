//! Gain annualization and per-run trade statistics.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::BandtraderError;
use super::price_series::PriceSeries;
use super::trade_gain::{Trade, TradeStatus};

const HOURS_PER_YEAR: f64 = 24.0 * 365.0;

/// Compounded yearly rate equivalent to `total_gain` over `start..end`.
///
/// Years are elapsed hours / (24 × 365), with no leap-year adjustment.
pub fn annualized_gain(
    total_gain: f64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, BandtraderError> {
    let hours = (end - start).num_hours() as f64;
    if hours <= 0.0 {
        return Err(BandtraderError::invalid_parameter(
            "date span",
            format!("end {end} must be after start {start}"),
        ));
    }
    let years = hours / HOURS_PER_YEAR;
    Ok(total_gain.powf(1.0 / years))
}

/// Gain from buying at the open of period `delay` and holding to the last close.
pub fn buy_hold_gain(prices: &PriceSeries, delay: usize) -> Result<f64, BandtraderError> {
    let n = prices.len();
    if delay >= n {
        return Err(BandtraderError::InsufficientData {
            symbol: prices.symbol().to_string(),
            bars: n,
            minimum: delay + 1,
        });
    }
    Ok(prices.adj_close()[n - 1] / prices.adj_open()[delay])
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TradeStats {
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    /// Best and worst single-trade gain ratios (1.0 when there are none).
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
}

impl TradeStats {
    /// Statistics over filled trades (pending entries are ignored) and the
    /// cumulative gain curve.
    pub fn compute(trades: &[Trade], gain_curve: &[f64]) -> Self {
        let mut stats = TradeStats {
            largest_win: 1.0,
            largest_loss: 1.0,
            ..TradeStats::default()
        };

        for trade in trades.iter().filter(|t| t.status != TradeStatus::Pending) {
            if trade.gain > 1.0 {
                stats.trades_won += 1;
                stats.largest_win = stats.largest_win.max(trade.gain);
            } else if trade.gain < 1.0 {
                stats.trades_lost += 1;
                stats.largest_loss = stats.largest_loss.min(trade.gain);
            } else {
                stats.trades_breakeven += 1;
            }
        }

        let total = stats.trades_won + stats.trades_lost + stats.trades_breakeven;
        if total > 0 {
            stats.win_rate = stats.trades_won as f64 / total as f64;
        }

        let (dd, duration) = compute_drawdown(gain_curve);
        stats.max_drawdown = dd;
        stats.max_drawdown_duration = duration;
        stats
    }
}

fn compute_drawdown(curve: &[f64]) -> (f64, usize) {
    let Some(&first) = curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut duration = 0usize;

    for &value in curve {
        if value >= peak {
            peak = value;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}
