//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{BacktestConfig, TradeResult, run_backtest};
use crate::domain::config_validation::{
    read_bool, read_list, read_value, validate_config, validate_sweep_config,
};
use crate::domain::error::BandtraderError;
use crate::domain::signal::RebuyConfig;
use crate::domain::stop_loss::StopLossConfig;
use crate::domain::strategy::{Smoothing, StrategyKind, StrategyParams, build_strategy};
use crate::domain::sweep::{ParamGrid, SweepReport, run_sweep};
use crate::domain::universe::{Universe, load_universe, parse_symbols};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceSource;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "bandtrader", about = "Band-crossing signal backtester")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `bandtrader=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest every configured symbol
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated symbols, replacing [data] symbols
        #[arg(long)]
        symbols: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the (ma_length, ma_split) parameter grid
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in the data directory
    Symbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            symbols,
            output,
        } => run_backtests(&config, symbols.as_deref(), output.as_ref()),
        Command::Sweep { config, output } => run_parameter_sweep(&config, output.as_ref()),
        Command::Validate { config } => run_validate(&config),
        Command::Symbols { config } => run_symbols(&config),
    }
}

const DEFAULT_LOG_FILTER: &str = "bandtrader=info";

/// Filter from `--log-level`, else `RUST_LOG`, else `bandtrader=info`.
/// An unparsable filter falls back to the default.
pub fn log_filter(log_level: Option<&str>) -> EnvFilter {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    };
    filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn fail(err: &BandtraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

pub fn build_strategy_params(config: &dyn ConfigPort) -> Result<StrategyParams, BandtraderError> {
    let defaults = StrategyParams::default();
    let kind = match config.get_string("strategy", "kind") {
        Some(raw) if !raw.trim().is_empty() => raw.parse::<StrategyKind>()?,
        _ => defaults.kind,
    };
    let smoothing = if read_bool(config, "strategy", "ema")?.unwrap_or(false) {
        Smoothing::Exponential
    } else {
        Smoothing::Simple
    };

    Ok(StrategyParams {
        kind,
        ma_length: read_value(config, "strategy", "ma_length")?.unwrap_or(defaults.ma_length),
        ma_length_fast: read_value(config, "strategy", "ma_length_fast")?
            .unwrap_or(defaults.ma_length_fast),
        ma_split: read_value(config, "strategy", "ma_split")?.unwrap_or(defaults.ma_split),
        smoothing,
        allow_shorting: read_bool(config, "strategy", "allow_shorting")?
            .unwrap_or(defaults.allow_shorting),
        short_shift: read_value(config, "strategy", "short_shift")?
            .unwrap_or(defaults.short_shift),
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, BandtraderError> {
    let strategy = build_strategy_params(config)?;
    let delay = read_value::<usize>(config, "strategy", "delay")?;

    let stop_loss = if read_bool(config, "stop_loss", "enabled")?.unwrap_or(false) {
        let defaults = StopLossConfig::default();
        let stop = StopLossConfig {
            fraction: read_value(config, "stop_loss", "fraction")?.unwrap_or(defaults.fraction),
            delay: read_value(config, "stop_loss", "delay")?.unwrap_or(defaults.delay),
        };
        stop.validate()?;
        Some(stop)
    } else {
        None
    };

    let rebuy = if read_bool(config, "rebuy", "enabled")?.unwrap_or(false) {
        let defaults = RebuyConfig::default();
        Some(RebuyConfig {
            enabled: true,
            allowed_rebuys: read_value(config, "rebuy", "allowed")?
                .unwrap_or(defaults.allowed_rebuys),
            consecutive_up_days: read_value(config, "rebuy", "consecutive_up_days")?
                .unwrap_or(defaults.consecutive_up_days),
            stop_fraction: read_value(config, "rebuy", "stop")?.unwrap_or(defaults.stop_fraction),
        })
    } else {
        None
    };

    Ok(BacktestConfig {
        strategy,
        delay,
        stop_loss,
        rebuy,
    })
}

pub fn build_param_grid(config: &dyn ConfigPort) -> Result<ParamGrid, BandtraderError> {
    let grid = ParamGrid {
        ma_lengths: read_list(config, "sweep", "ma_lengths")?.unwrap_or_default(),
        ma_splits: read_list(config, "sweep", "ma_splits")?.unwrap_or_default(),
    };
    grid.validate()?;
    Ok(grid)
}

/// Symbols from the override if given, else `[data] symbols`.
pub fn resolve_symbols(
    symbols_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, BandtraderError> {
    let raw = match symbols_override {
        Some(s) => s.to_string(),
        None => config
            .get_string("data", "symbols")
            .ok_or_else(|| BandtraderError::ConfigMissing {
                section: "data".into(),
                key: "symbols".into(),
            })?,
    };
    Ok(parse_symbols(&raw)?)
}

fn data_source(config: &dyn ConfigPort) -> Result<CsvAdapter, BandtraderError> {
    let directory = config
        .get_string("data", "directory")
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| BandtraderError::ConfigMissing {
            section: "data".into(),
            key: "directory".into(),
        })?;
    Ok(CsvAdapter::new(PathBuf::from(directory.trim())))
}

fn run_backtests(
    config_path: &PathBuf,
    symbols_override: Option<&str>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&adapter) {
        return fail(&e);
    }

    // Stage 2: Build backtest config and resolve symbols
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let symbols = match resolve_symbols(symbols_override, &adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let source = match data_source(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let report = JsonReportAdapter::new();
    run_backtest_pipeline(&source, &report, &bt_config, &symbols, output_path)
}

/// Load the universe, backtest every symbol, print logs and a summary, and
/// optionally write a report.
pub fn run_backtest_pipeline(
    source: &dyn PriceSource,
    report: &dyn ReportPort,
    bt_config: &BacktestConfig,
    symbols: &[String],
    output_path: Option<&PathBuf>,
) -> ExitCode {
    let minimum = match minimum_periods(bt_config) {
        Ok(m) => m,
        Err(e) => return fail(&e),
    };

    // Stage 3: Load price series
    eprintln!("Loading {} symbols...", symbols.len());
    let universe = match load_universe(source, symbols, minimum) {
        Ok(u) => u,
        Err(e) => return fail(&e),
    };
    print_skipped(&universe);

    // Stage 4: Backtest each symbol
    eprintln!(
        "Running {} on {} symbols",
        bt_config.strategy.kind,
        universe.count()
    );
    let mut results: Vec<TradeResult> = Vec::with_capacity(universe.count());
    for series in &universe.series {
        match run_backtest(series, bt_config) {
            Ok(result) => {
                for line in &result.trade_log {
                    println!("{line}");
                }
                println!();
                results.push(result);
            }
            Err(e) => eprintln!("warning: skipping {} ({})", series.symbol(), e),
        }
    }

    if results.is_empty() {
        eprintln!("error: no symbol could be backtested");
        return ExitCode::from(5);
    }

    // Stage 5: Summary
    print_summary(&results);

    // Stage 6: Report
    if let Some(output) = output_path {
        if let Err(e) = report.write_results(&results, &output.display().to_string()) {
            return fail(&e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }

    ExitCode::SUCCESS
}

/// Fewest periods a symbol needs for this configuration.
fn minimum_periods(bt_config: &BacktestConfig) -> Result<usize, BandtraderError> {
    let delay = match bt_config.delay {
        Some(d) => d,
        None => build_strategy(&bt_config.strategy)?.warmup(),
    };
    Ok(delay.max(bt_config.strategy.ma_length) + 2)
}

fn print_skipped(universe: &Universe) {
    for skipped in &universe.skipped {
        eprintln!("warning: skipping {} ({})", skipped.symbol, skipped.reason);
    }
}

fn print_summary(results: &[TradeResult]) {
    println!("=== Summary ===");
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>10} {:>7} {:>7} {:>8}",
        "symbol", "gain", "annual", "buy/hold", "bh annual", "trades", "win %", "max dd"
    );
    for r in results {
        println!(
            "{:<8} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>7} {:>6.1}% {:>7.1}%",
            r.symbol,
            r.total_gain,
            r.annualized_gain,
            r.buy_hold_gain,
            r.buy_hold_annualized,
            r.trades.len(),
            r.stats.win_rate * 100.0,
            r.stats.max_drawdown * 100.0,
        );
    }
    let combined: f64 = results.iter().map(|r| r.annualized_gain).product();
    println!("combined annualized gain: {combined:.4}");
}

fn run_parameter_sweep(config_path: &PathBuf, output_path: Option<&PathBuf>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&adapter).and_then(|()| validate_sweep_config(&adapter)) {
        return fail(&e);
    }

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let grid = match build_param_grid(&adapter) {
        Ok(g) => g,
        Err(e) => return fail(&e),
    };
    let parallel = match read_bool(&adapter, "sweep", "parallel") {
        Ok(p) => p.unwrap_or(true),
        Err(e) => return fail(&e),
    };
    let symbols = match resolve_symbols(None, &adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let source = match data_source(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let report = JsonReportAdapter::new();
    run_sweep_pipeline(
        &source,
        &report,
        &bt_config,
        &grid,
        parallel,
        &symbols,
        output_path,
    )
}

pub fn run_sweep_pipeline(
    source: &dyn PriceSource,
    report: &dyn ReportPort,
    base: &BacktestConfig,
    grid: &ParamGrid,
    parallel: bool,
    symbols: &[String],
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Symbols must support at least the shortest swept window.
    let shortest = grid.ma_lengths.iter().copied().min().unwrap_or(0);
    let minimum = base.delay.unwrap_or(shortest).max(shortest) + 2;

    eprintln!("Loading {} symbols...", symbols.len());
    let universe = match load_universe(source, symbols, minimum) {
        Ok(u) => u,
        Err(e) => return fail(&e),
    };
    print_skipped(&universe);

    eprintln!(
        "Sweeping {} combinations over {} symbols",
        grid.size(),
        universe.count()
    );
    let sweep = match run_sweep(&universe.series, base, grid, parallel) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    print_sweep(&sweep);

    if let Some(output) = output_path {
        if let Err(e) = report.write_sweep(&sweep, &output.display().to_string()) {
            return fail(&e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }

    match sweep.best() {
        Some(_) => ExitCode::SUCCESS,
        None => {
            eprintln!("error: every combination failed");
            ExitCode::from(5)
        }
    }
}

fn print_sweep(sweep: &SweepReport) {
    println!("{:>10} {:>9} {:>12}", "ma_length", "ma_split", "score");
    for outcome in &sweep.outcomes {
        match &outcome.score {
            Ok(score) => println!(
                "{:>10} {:>9.4} {:>12.4}",
                outcome.ma_length, outcome.ma_split, score
            ),
            Err(e) => println!(
                "{:>10} {:>9.4} {:>12}  ({e})",
                outcome.ma_length, outcome.ma_split, "failed"
            ),
        }
    }

    if let Some(best) = sweep.best() {
        if let Ok(score) = &best.score {
            println!(
                "\nbest: ma_length = {}, ma_split = {}, score = {score:.4}",
                best.ma_length, best.ma_split
            );
        }
    }
    if sweep.failures() > 0 {
        eprintln!("{} combinations failed", sweep.failures());
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        return fail(&e);
    }
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let strategy = match build_strategy(&bt_config.strategy) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    eprintln!("\nStrategy: {}", strategy.name());
    eprintln!("  ma_length: {}", bt_config.strategy.ma_length);
    if bt_config.strategy.kind == StrategyKind::DualMa {
        eprintln!("  ma_length_fast: {}", bt_config.strategy.ma_length_fast);
    }
    eprintln!("  ma_split: {}", bt_config.strategy.ma_split);
    eprintln!(
        "  delay: {}",
        bt_config.delay.unwrap_or_else(|| strategy.warmup())
    );
    if let Some(stop) = &bt_config.stop_loss {
        eprintln!("  stop loss: fraction {}, delay {}", stop.fraction, stop.delay);
    }
    if let Some(rebuy) = &bt_config.rebuy {
        eprintln!(
            "  rebuy: {} allowed, {} up days, stop {}",
            rebuy.allowed_rebuys, rebuy.consecutive_up_days, rebuy.stop_fraction
        );
    }

    if adapter.has_section("sweep") {
        if let Err(e) = validate_sweep_config(&adapter) {
            return fail(&e);
        }
        eprintln!("  sweep: valid");
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_symbols(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let source = match data_source(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let symbols = match source.list_symbols() {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}
