//! Strategy variants.
//!
//! Every variant only derives [`Bands`] from a price series; position
//! generation, the stop-loss overlay and the gain replay are shared.
//! Prices are normalized by the adjusted open at index `ma_length`.

pub mod close_vs_open;
pub mod direction_bias;
pub mod dual_ma;
pub mod ma_band;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::error::BandtraderError;
use crate::domain::price_series::PriceSeries;
use crate::domain::series_math;
use crate::domain::signal::Bands;

pub use close_vs_open::CloseVsOpen;
pub use direction_bias::DirectionBias;
pub use dual_ma::DualMa;
pub use ma_band::MaBand;

pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Periods before the first signal may fire; the default backtest delay.
    fn warmup(&self) -> usize;

    fn derive_bands(&self, prices: &PriceSeries) -> Result<Bands, BandtraderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    MaBand,
    DualMa,
    CloseVsOpen,
    DirectionBias,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::MaBand,
        StrategyKind::DualMa,
        StrategyKind::CloseVsOpen,
        StrategyKind::DirectionBias,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::MaBand => "ma_band",
            StrategyKind::DualMa => "dual_ma",
            StrategyKind::CloseVsOpen => "close_vs_open",
            StrategyKind::DirectionBias => "direction_bias",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = BandtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| {
                BandtraderError::invalid_parameter(
                    "strategy.kind",
                    format!("unknown strategy '{s}'"),
                )
            })
    }
}

/// Moving-average kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Smoothing {
    #[default]
    Simple,
    Exponential,
}

impl Smoothing {
    pub fn apply(
        self,
        length: usize,
        bias_start: bool,
        series: &[&[f64]],
    ) -> Result<Vec<f64>, BandtraderError> {
        match self {
            Smoothing::Simple => series_math::ma(length, bias_start, series),
            Smoothing::Exponential => series_math::ema(length, bias_start, series),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyParams {
    pub kind: StrategyKind,
    /// Primary (slow) window.
    pub ma_length: usize,
    /// Fast window, dual MA only.
    pub ma_length_fast: usize,
    pub ma_split: f64,
    pub smoothing: Smoothing,
    pub allow_shorting: bool,
    pub short_shift: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            kind: StrategyKind::MaBand,
            ma_length: 200,
            ma_length_fast: 50,
            ma_split: 0.05,
            smoothing: Smoothing::Simple,
            allow_shorting: false,
            short_shift: 1.0,
        }
    }
}

impl StrategyParams {
    /// Copy with the swept window length and split replaced.
    pub fn with_grid_point(&self, ma_length: usize, ma_split: f64) -> Self {
        StrategyParams {
            ma_length,
            ma_split,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), BandtraderError> {
        if self.ma_length == 0 {
            return Err(BandtraderError::invalid_parameter(
                "ma_length",
                "must be at least 1",
            ));
        }
        if !(0.0..1.0).contains(&self.ma_split) {
            return Err(BandtraderError::invalid_parameter(
                "ma_split",
                format!("must be in [0, 1), got {}", self.ma_split),
            ));
        }
        if !(self.short_shift.is_finite() && self.short_shift > 0.0) {
            return Err(BandtraderError::invalid_parameter(
                "short_shift",
                format!("must be positive, got {}", self.short_shift),
            ));
        }
        if self.kind == StrategyKind::DualMa
            && (self.ma_length_fast == 0 || self.ma_length_fast >= self.ma_length)
        {
            return Err(BandtraderError::invalid_parameter(
                "ma_length_fast",
                format!(
                    "must be in [1, {}) for dual_ma, got {}",
                    self.ma_length, self.ma_length_fast
                ),
            ));
        }
        Ok(())
    }
}

pub fn build_strategy(params: &StrategyParams) -> Result<Box<dyn Strategy>, BandtraderError> {
    params.validate()?;
    let strategy: Box<dyn Strategy> = match params.kind {
        StrategyKind::MaBand => Box::new(MaBand {
            length: params.ma_length,
            split: params.ma_split,
            smoothing: params.smoothing,
            allow_shorting: params.allow_shorting,
            short_shift: params.short_shift,
        }),
        StrategyKind::DualMa => Box::new(DualMa {
            slow: params.ma_length,
            fast: params.ma_length_fast,
            smoothing: params.smoothing,
            allow_shorting: params.allow_shorting,
            short_shift: params.short_shift,
        }),
        StrategyKind::CloseVsOpen => Box::new(CloseVsOpen {
            length: params.ma_length,
            split: params.ma_split,
            allow_shorting: params.allow_shorting,
        }),
        StrategyKind::DirectionBias => Box::new(DirectionBias {
            length: params.ma_length,
            split: params.ma_split,
            allow_shorting: params.allow_shorting,
        }),
    };
    Ok(strategy)
}

/// Fail with `InsufficientData` unless the window leaves at least two
/// tradeable periods, then return the normalization factor.
pub(crate) fn normalizer(prices: &PriceSeries, length: usize) -> Result<f64, BandtraderError> {
    let minimum = length + 2;
    if prices.len() < minimum {
        return Err(BandtraderError::InsufficientData {
            symbol: prices.symbol().to_string(),
            bars: prices.len(),
            minimum,
        });
    }
    Ok(1.0 / prices.adj_open()[length])
}

/// Constant `±split` levels around zero for oscillator-style signals.
pub(crate) fn constant_levels(bands: Bands, split: f64, allow_shorting: bool) -> Bands {
    let n = bands.len();
    let upper = vec![split; n];
    let lower = vec![-split; n];
    if allow_shorting {
        bands
            .with_long(upper.clone(), lower.clone())
            .with_short(lower, upper)
    } else {
        bands.with_long(upper, lower)
    }
}
