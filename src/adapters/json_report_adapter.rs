//! JSON report adapter implementing ReportPort.
//!
//! Backtest results and sweep reports are written as pretty-printed JSON
//! documents, one file per call.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::backtest::TradeResult;
use crate::domain::error::BandtraderError;
use crate::domain::sweep::SweepReport;
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct BacktestDocument<'a> {
    generator: &'static str,
    symbols: Vec<&'a str>,
    results: &'a [TradeResult],
}

#[derive(Serialize)]
struct SweepDocument<'a> {
    generator: &'static str,
    best: Option<BestCombination>,
    failures: usize,
    #[serde(flatten)]
    report: &'a SweepReport,
}

#[derive(Serialize)]
struct BestCombination {
    ma_length: usize,
    ma_split: f64,
    score: f64,
}

const GENERATOR: &str = concat!("bandtrader ", env!("CARGO_PKG_VERSION"));

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_document<T: Serialize>(doc: &T, output_path: &str) -> Result<(), BandtraderError> {
        let json = serde_json::to_string_pretty(doc).map_err(|e| BandtraderError::Report {
            reason: format!("failed to serialize report: {e}"),
        })?;

        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BandtraderError::Report {
                reason: format!("failed to create {}: {e}", parent.display()),
            })?;
        }
        fs::write(path, json).map_err(|e| BandtraderError::Report {
            reason: format!("failed to write {}: {e}", path.display()),
        })?;

        info!(path = %path.display(), "report written");
        Ok(())
    }
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for JsonReportAdapter {
    fn write_results(
        &self,
        results: &[TradeResult],
        output_path: &str,
    ) -> Result<(), BandtraderError> {
        let doc = BacktestDocument {
            generator: GENERATOR,
            symbols: results.iter().map(|r| r.symbol.as_str()).collect(),
            results,
        };
        Self::write_document(&doc, output_path)
    }

    fn write_sweep(&self, report: &SweepReport, output_path: &str) -> Result<(), BandtraderError> {
        let best = report.best().and_then(|o| {
            o.score.as_ref().ok().map(|&score| BestCombination {
                ma_length: o.ma_length,
                ma_split: o.ma_split,
                score,
            })
        });
        let doc = SweepDocument {
            generator: GENERATOR,
            best,
            failures: report.failures(),
            report,
        };
        Self::write_document(&doc, output_path)
    }
}
