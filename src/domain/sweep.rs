//! Parameter sweep over (window length, band split) combinations.

use rayon::prelude::*;
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};
use tracing::{info, warn};

use crate::domain::backtest::{BacktestConfig, run_backtest};
use crate::domain::error::BandtraderError;
use crate::domain::price_series::SharedSeries;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamGrid {
    pub ma_lengths: Vec<usize>,
    pub ma_splits: Vec<f64>,
}

impl ParamGrid {
    pub fn size(&self) -> usize {
        self.ma_lengths.len() * self.ma_splits.len()
    }

    /// Every (length, split) pair, lengths outermost.
    pub fn points(&self) -> Vec<(usize, f64)> {
        self.ma_lengths
            .iter()
            .flat_map(|&length| self.ma_splits.iter().map(move |&split| (length, split)))
            .collect()
    }

    pub fn validate(&self) -> Result<(), BandtraderError> {
        if self.ma_lengths.is_empty() {
            return Err(BandtraderError::invalid_parameter(
                "sweep.ma_lengths",
                "at least one length is required",
            ));
        }
        if self.ma_splits.is_empty() {
            return Err(BandtraderError::invalid_parameter(
                "sweep.ma_splits",
                "at least one split is required",
            ));
        }
        Ok(())
    }
}

/// Result of one grid point. A failure here never aborts the sweep.
#[derive(Debug)]
pub struct SweepOutcome {
    pub ma_length: usize,
    pub ma_split: f64,
    /// Product of per-symbol annualized gains.
    pub score: Result<f64, BandtraderError>,
}

impl Serialize for SweepOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SweepOutcome", 4)?;
        state.serialize_field("ma_length", &self.ma_length)?;
        state.serialize_field("ma_split", &self.ma_split)?;
        state.serialize_field("score", &self.score.as_ref().ok())?;
        state.serialize_field(
            "error",
            &self.score.as_ref().err().map(ToString::to_string),
        )?;
        state.end()
    }
}

#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub symbols: Vec<String>,
    pub outcomes: Vec<SweepOutcome>,
}

impl SweepReport {
    /// Highest-scoring successful combination.
    pub fn best(&self) -> Option<&SweepOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.score, Ok(s) if s.is_finite()))
            .max_by(|a, b| {
                let a = a.score.as_ref().copied().unwrap_or(f64::NEG_INFINITY);
                let b = b.score.as_ref().copied().unwrap_or(f64::NEG_INFINITY);
                a.total_cmp(&b)
            })
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.score.is_err()).count()
    }
}

/// Score one configuration across every series.
pub fn evaluate(universe: &[SharedSeries], config: &BacktestConfig) -> Result<f64, BandtraderError> {
    let mut score = 1.0;
    for series in universe {
        score *= run_backtest(series, config)?.annualized_gain;
    }
    Ok(score)
}

/// Evaluate every grid point over the universe, in parallel when asked.
///
/// Outcomes keep grid order regardless of `parallel`.
pub fn run_sweep(
    universe: &[SharedSeries],
    base: &BacktestConfig,
    grid: &ParamGrid,
    parallel: bool,
) -> Result<SweepReport, BandtraderError> {
    grid.validate()?;
    if universe.is_empty() {
        return Err(BandtraderError::invalid_parameter(
            "universe",
            "no symbols to sweep",
        ));
    }

    let points = grid.points();
    info!(
        combinations = points.len(),
        symbols = universe.len(),
        parallel,
        "starting sweep"
    );

    let run_point = |&(ma_length, ma_split): &(usize, f64)| {
        let config = BacktestConfig {
            strategy: base.strategy.with_grid_point(ma_length, ma_split),
            ..base.clone()
        };
        let score = evaluate(universe, &config);
        if let Err(e) = &score {
            warn!(ma_length, ma_split, error = %e, "sweep combination failed");
        }
        SweepOutcome {
            ma_length,
            ma_split,
            score,
        }
    };

    let outcomes: Vec<SweepOutcome> = if parallel {
        points.par_iter().map(run_point).collect()
    } else {
        points.iter().map(run_point).collect()
    };

    Ok(SweepReport {
        symbols: universe.iter().map(|s| s.symbol().to_string()).collect(),
        outcomes,
    })
}
