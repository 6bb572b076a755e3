//! Single-instrument backtest pipeline.
//!
//! bands → positions → optional stop-loss overlay → trade replay →
//! annualization. Each stage is a pure function of its inputs.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::domain::error::BandtraderError;
use crate::domain::metrics::{TradeStats, annualized_gain, buy_hold_gain};
use crate::domain::position::PositionState;
use crate::domain::price_series::PriceSeries;
use crate::domain::signal::{Bands, Rebuy, RebuyConfig, generate_positions};
use crate::domain::stop_loss::{StopLossConfig, apply_stop_loss};
use crate::domain::strategy::{Strategy, StrategyParams, build_strategy};
use crate::domain::trade_gain::{Trade, simulate_trades};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BacktestConfig {
    pub strategy: StrategyParams,
    /// Warm-up periods; defaults to the strategy's warm-up.
    pub delay: Option<usize>,
    pub stop_loss: Option<StopLossConfig>,
    pub rebuy: Option<RebuyConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeResult {
    pub symbol: String,
    pub strategy: String,
    pub delay: usize,
    /// First tradeable date (after the delay) and last date.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_gain: f64,
    pub annualized_gain: f64,
    pub buy_hold_gain: f64,
    pub buy_hold_annualized: f64,
    pub gain_curve: Vec<f64>,
    pub positions: Vec<PositionState>,
    pub trades: Vec<Trade>,
    pub stats: TradeStats,
    pub trade_log: Vec<String>,
    pub bands: Bands,
}

/// Build the configured strategy and run it over `prices`.
pub fn run_backtest(
    prices: &PriceSeries,
    config: &BacktestConfig,
) -> Result<TradeResult, BandtraderError> {
    let strategy = build_strategy(&config.strategy)?;
    run_strategy(prices, strategy.as_ref(), config)
}

/// Run an already-built strategy; `config.strategy` is ignored.
pub fn run_strategy(
    prices: &PriceSeries,
    strategy: &dyn Strategy,
    config: &BacktestConfig,
) -> Result<TradeResult, BandtraderError> {
    let symbol = prices.symbol();
    let n = prices.len();
    let delay = config.delay.unwrap_or_else(|| strategy.warmup());
    let minimum = delay + 2;
    if n < minimum {
        return Err(BandtraderError::InsufficientData {
            symbol: symbol.to_string(),
            bars: n,
            minimum,
        });
    }

    let bands = strategy.derive_bands(prices)?;
    if bands.len() != n {
        return Err(BandtraderError::LengthMismatch {
            expected: n,
            found: bands.len(),
        });
    }

    let rebuy = config.rebuy.as_ref().map(|c| Rebuy { config: c, prices });
    let mut positions = generate_positions(delay, &bands, rebuy)?;
    if let Some(stop) = &config.stop_loss {
        positions = apply_stop_loss(&positions, prices, stop)?;
    }
    let replay = simulate_trades(delay, &positions, prices)?;

    let dates = prices.dates();
    let start_date = dates[delay];
    let end_date = dates[n - 1];
    let annualized = annualized_gain(replay.total_gain, start_date, end_date)?;
    let buy_hold = buy_hold_gain(prices, delay)?;
    let buy_hold_annualized = annualized_gain(buy_hold, start_date, end_date)?;

    let mut trade_log = Vec::with_capacity(replay.log.len() + 3);
    trade_log.push(format!(
        "first trading day: {}, last trading day: {}",
        dates[0], end_date
    ));
    trade_log.extend(replay.log.iter().map(ToString::to_string));
    trade_log.push(format!(
        "symbol: {symbol}, buy/hold gain (annualized): {buy_hold:5.2} ({buy_hold_annualized:5.2})"
    ));
    trade_log.push(format!(
        "symbol: {symbol}, total gain (annualized):    {:5.2} ({annualized:5.2})",
        replay.total_gain
    ));

    info!(
        symbol,
        strategy = strategy.name(),
        delay,
        total_gain = replay.total_gain,
        annualized_gain = annualized,
        trades = replay.trades.len(),
        "backtest complete"
    );

    let stats = TradeStats::compute(&replay.trades, &replay.gain_curve);
    Ok(TradeResult {
        symbol: symbol.to_string(),
        strategy: strategy.name().to_string(),
        delay,
        start_date,
        end_date,
        total_gain: replay.total_gain,
        annualized_gain: annualized,
        buy_hold_gain: buy_hold,
        buy_hold_annualized,
        gain_curve: replay.gain_curve,
        positions,
        trades: replay.trades,
        stats,
        trade_log,
        bands,
    })
}
