//! Core domain types and logic.

pub mod error;
pub mod price_series;
pub mod series_math;
pub mod position;
pub mod signal;
pub mod stop_loss;
pub mod trade_gain;
pub mod metrics;
pub mod strategy;
pub mod backtest;
pub mod sweep;
pub mod universe;
pub mod config_validation;
