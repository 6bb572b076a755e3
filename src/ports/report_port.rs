//! Report generation port trait.

use crate::domain::backtest::TradeResult;
use crate::domain::error::BandtraderError;
use crate::domain::sweep::SweepReport;

/// Port for writing backtest and sweep reports.
pub trait ReportPort {
    fn write_results(
        &self,
        results: &[TradeResult],
        output_path: &str,
    ) -> Result<(), BandtraderError>;

    fn write_sweep(&self, report: &SweepReport, output_path: &str) -> Result<(), BandtraderError>;
}
