//! Integration tests for the signal pipeline.
//!
//! Tests cover:
//! - Moving-average blending and head filling
//! - Fill prices always come from the next open
//! - Long and short never touch without an intervening close
//! - Stop-loss cooldown length regardless of the raw positions
//! - Rebuy-then-stop and trade-gain round-trip scenarios
//! - Annualization over one, thirteen and half a year
//! - Every strategy variant end to end, universe loading and sweeps

mod common;

use approx::assert_relative_eq;
use bandtrader::domain::backtest::{BacktestConfig, run_backtest};
use bandtrader::domain::error::BandtraderError;
use bandtrader::domain::metrics::annualized_gain;
use bandtrader::domain::position::PositionState;
use bandtrader::domain::series_math::{ema, ma};
use bandtrader::domain::signal::{Bands, Rebuy, RebuyConfig, generate_positions};
use bandtrader::domain::stop_loss::{StopLossConfig, apply_stop_loss};
use bandtrader::domain::strategy::{Smoothing, StrategyKind, StrategyParams};
use bandtrader::domain::sweep::{ParamGrid, run_sweep};
use bandtrader::domain::trade_gain::{TradeStatus, simulate_trades};
use bandtrader::domain::universe::{SkipReason, load_universe};
use common::*;
use proptest::prelude::*;

use PositionState::{Close as C, LongBuy as L, LongRebuy as R, ShortSell as S};

/// True if a long period is directly followed by a short one or vice versa.
fn has_direct_flip(positions: &[PositionState]) -> bool {
    positions
        .windows(2)
        .any(|w| (w[0].is_long() && w[1].is_short()) || (w[0].is_short() && w[1].is_long()))
}

mod series_math_properties {
    use super::*;

    #[test]
    fn ma_of_identical_series_is_symmetric() {
        let x = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0];
        let out = ma(2, false, &[&x, &x]).unwrap();
        assert_eq!(out, vec![5.0, 15.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0]);

        let biased = ma(2, true, &[&x, &x]).unwrap();
        assert_eq!(biased, vec![25.0, 25.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0]);
    }

    #[test]
    fn ema_head_takes_value_at_length() {
        let x: Vec<f64> = (1..=12).map(f64::from).collect();
        let out = ema(4, true, &[&x]).unwrap();
        for v in &out[..4] {
            assert_relative_eq!(*v, out[4]);
        }
    }

    #[test]
    fn unequal_inputs_fail_without_output() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 2.0];
        assert!(matches!(
            ma(2, false, &[&a, &b]),
            Err(BandtraderError::LengthMismatch { .. })
        ));
        assert!(matches!(
            ema(2, false, &[&a, &b]),
            Err(BandtraderError::LengthMismatch { .. })
        ));
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn rebuy_then_stop() {
        let close = [1.2, 1.2, 0.9, 0.91, 0.92, 0.8, 0.8, 0.8];
        let open = [1.2, 1.2, 0.9, 0.91, 0.92, 0.92, 0.8, 0.8];
        let prices = series_from("RBY", &open, &close);
        let bands = Bands::new(close.to_vec()).with_long(vec![1.1; 8], vec![1.0; 8]);
        let config = RebuyConfig {
            enabled: true,
            allowed_rebuys: 1,
            consecutive_up_days: 2,
            stop_fraction: 0.95,
        };

        let positions = generate_positions(
            0,
            &bands,
            Some(Rebuy {
                config: &config,
                prices: &prices,
            }),
        )
        .unwrap();

        let values: Vec<i8> = positions.iter().map(|p| p.value()).collect();
        assert_eq!(values, vec![0, 1, 0, 0, 2, 0, 0, 0]);
        assert_eq!(positions, vec![C, L, C, C, R, C, C, C]);
    }

    #[test]
    fn trade_gain_round_trip() {
        let close = [1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let open = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0];
        let prices = series_from("RTP", &open, &close);
        let positions = [C, C, C, L, L, L, C, C];

        let replay = simulate_trades(2, &positions, &prices).unwrap();

        assert_eq!(replay.gain_curve, vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_relative_eq!(replay.total_gain, 2.0, epsilon = 1e-12);
        assert_eq!(format!("{:.2}", replay.total_gain), "2.00");
        assert_eq!(replay.trades.len(), 1);
        assert_eq!(replay.trades[0].entry_price, 1.0);
        assert_eq!(replay.trades[0].exit_price, Some(2.0));
    }

    #[test]
    fn annualization_round_trip() {
        let one = annualized_gain(1.1, date(2021, 1, 1), date(2022, 1, 1)).unwrap();
        assert_relative_eq!(one, 1.10, epsilon = 0.005);

        let thirteen = annualized_gain(1.1, date(2008, 1, 1), date(2021, 1, 1)).unwrap();
        assert_relative_eq!(thirteen, 1.01, epsilon = 0.005);

        let half = annualized_gain(1.1, date(2021, 1, 1), date(2021, 7, 2)).unwrap();
        assert_relative_eq!(half, 1.21, epsilon = 0.005);
    }

    #[test]
    fn annualization_rejects_empty_span() {
        assert!(matches!(
            annualized_gain(1.1, date(2021, 1, 1), date(2021, 1, 1)),
            Err(BandtraderError::InvalidParameter { .. })
        ));
    }
}

fn arb_state() -> impl Strategy<Value = PositionState> {
    prop_oneof![Just(S), Just(C), Just(L), Just(R)]
}

fn arb_prices(n: usize) -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (
        prop::collection::vec(1.0..100.0_f64, n),
        prop::collection::vec(1.0..100.0_f64, n),
    )
}

proptest! {
    /// Every filled entry uses the open after the decision period; only an
    /// entry decided on the final period uses that period's close.
    #[test]
    fn entries_fill_at_next_open(
        (positions, (open, close)) in (3usize..40).prop_flat_map(|n| {
            (prop::collection::vec(arb_state(), n), arb_prices(n))
        }),
        delay in 0usize..3,
    ) {
        let prices = series_from("LAG", &open, &close);
        let replay = simulate_trades(delay, &positions, &prices).unwrap();
        let last = prices.len() - 1;

        for trade in &replay.trades {
            let i = prices.dates().iter().position(|d| *d == trade.entry_date).unwrap();
            if trade.status == TradeStatus::Pending {
                prop_assert_eq!(i, last);
                prop_assert_eq!(trade.entry_price, prices.adj_close()[i]);
            } else {
                prop_assert!(i < last);
                prop_assert_eq!(trade.entry_price, prices.adj_open()[i + 1]);
            }
        }
    }

    /// Long and short are always separated by at least one `Close`, before
    /// and after the stop-loss overlay.
    #[test]
    fn long_and_short_never_touch(
        (signal, buy, sell, short_sell, short_buy) in (4usize..60).prop_flat_map(|n| {
            (
                prop::collection::vec(-2.0..2.0_f64, n),
                prop::collection::vec(-1.0..1.0_f64, n),
                prop::collection::vec(-1.0..1.0_f64, n),
                prop::collection::vec(-1.0..1.0_f64, n),
                prop::collection::vec(-1.0..1.0_f64, n),
            )
        }),
        delay in 0usize..4,
    ) {
        let n = signal.len();
        let bands = Bands::new(signal)
            .with_long(buy, sell)
            .with_short(short_sell, short_buy);
        let positions = generate_positions(delay, &bands, None).unwrap();

        prop_assert_eq!(positions.len(), n);
        prop_assert!(positions[..delay.max(1).min(n)].iter().all(|p| p.is_flat()));
        prop_assert!(!has_direct_flip(&positions));

        let px: Vec<f64> = (0..n).map(|i| 10.0 + (i as f64 * 0.9).sin()).collect();
        let prices = series_from("MX", &px, &px);
        let stopped = apply_stop_loss(&positions, &prices, &StopLossConfig::default()).unwrap();
        prop_assert!(!has_direct_flip(&stopped));
    }

    /// A stop forces `Close` on the trigger period and exactly `delay`
    /// periods after it, whatever the raw positions say, then resumes.
    #[test]
    fn stop_loss_cooldown_is_exact(
        (n, stop_delay, k) in (12usize..40, 0usize..6).prop_flat_map(|(n, d)| {
            (Just(n), Just(d), 3usize..(n - d - 1))
        }),
        drop in 0.5..0.85_f64,
        noise in prop::collection::vec(arb_state(), 6),
    ) {
        let close: Vec<f64> = (0..n).map(|i| if i < k { 10.0 } else { 10.0 * drop }).collect();
        let prices = series_from("STP", &close, &close);

        let mut raw = vec![L; n];
        raw[0] = C;
        for (j, state) in noise.iter().take(stop_delay).enumerate() {
            raw[k + 1 + j] = *state;
        }
        let config = StopLossConfig { fraction: 0.9, delay: stop_delay };

        let out = apply_stop_loss(&raw, &prices, &config).unwrap();

        prop_assert!(out[1..k].iter().all(|p| *p == L));
        prop_assert!(out[k..=k + stop_delay].iter().all(|p| *p == C));
        prop_assert!(out[k + stop_delay + 1..].iter().all(|p| *p == L));
    }
}

mod strategies_end_to_end {
    use super::*;

    fn params(kind: StrategyKind) -> StrategyParams {
        StrategyParams {
            kind,
            ma_length: 40,
            ma_length_fast: 10,
            ma_split: 0.01,
            allow_shorting: true,
            short_shift: 0.98,
            smoothing: Smoothing::Simple,
        }
    }

    #[test]
    fn every_variant_runs_the_full_pipeline() {
        let prices = PriceSeries::from_bars("E2E", &generate_bars("2019-01-01", 400, 50.0)).unwrap();

        for kind in StrategyKind::ALL {
            let config = BacktestConfig {
                strategy: params(kind),
                stop_loss: Some(StopLossConfig::default()),
                ..BacktestConfig::default()
            };
            let result = run_backtest(&prices, &config).unwrap();

            assert_eq!(result.strategy, kind.as_str());
            assert_eq!(result.delay, 40);
            assert_eq!(result.positions.len(), 400);
            assert_eq!(result.gain_curve.len(), 400);
            assert!(result.positions[..40].iter().all(|p| p.is_flat()), "{kind}");
            assert!(result.gain_curve[..=40].iter().all(|g| *g == 1.0), "{kind}");
            assert!(result.total_gain.is_finite() && result.total_gain > 0.0, "{kind}");
            assert!(result.annualized_gain.is_finite(), "{kind}");
            assert!(!has_direct_flip(&result.positions), "{kind}");
            assert_eq!(result.start_date, date(2019, 2, 10));
        }
    }

    #[test]
    fn exponential_smoothing_changes_bands() {
        let prices = PriceSeries::from_bars("EMA", &generate_bars("2019-01-01", 200, 50.0)).unwrap();
        let simple = run_backtest(&prices, &BacktestConfig {
            strategy: params(StrategyKind::MaBand),
            ..BacktestConfig::default()
        })
        .unwrap();
        let exponential = run_backtest(&prices, &BacktestConfig {
            strategy: StrategyParams {
                smoothing: Smoothing::Exponential,
                ..params(StrategyKind::MaBand)
            },
            ..BacktestConfig::default()
        })
        .unwrap();

        assert_ne!(simple.bands.long_buy, exponential.bands.long_buy);
        assert_eq!(simple.bands.signal, exponential.bands.signal);
    }

    #[test]
    fn window_longer_than_series_is_insufficient_data() {
        let prices = PriceSeries::from_bars("SHORT", &generate_bars("2019-01-01", 30, 50.0)).unwrap();
        let err = run_backtest(&prices, &BacktestConfig {
            strategy: params(StrategyKind::MaBand),
            ..BacktestConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, BandtraderError::InsufficientData { .. }));
    }

    #[test]
    fn results_are_deterministic() {
        let prices = PriceSeries::from_bars("DET", &generate_bars("2019-01-01", 150, 20.0)).unwrap();
        let config = BacktestConfig {
            strategy: params(StrategyKind::CloseVsOpen),
            ..BacktestConfig::default()
        };
        let a = run_backtest(&prices, &config).unwrap();
        let b = run_backtest(&prices, &config).unwrap();
        assert_eq!(a.gain_curve, b.gain_curve);
        assert_eq!(a.positions, b.positions);
        assert_eq!(a.trade_log, b.trade_log);
    }
}

mod universe_and_sweep {
    use super::*;

    fn source() -> MockPriceSource {
        MockPriceSource::new()
            .with_bars("AAA", generate_bars("2020-01-01", 250, 30.0))
            .with_bars("BBB", generate_bars("2020-01-01", 250, 80.0))
            .with_bars("TINY", generate_bars("2020-01-01", 10, 5.0))
            .with_error("BAD", "connection refused")
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partial_universe_proceeds() {
        let universe = load_universe(&source(), &symbols(&["AAA", "BAD", "TINY", "BBB"]), 30).unwrap();

        assert_eq!(universe.symbols(), vec!["AAA", "BBB"]);
        assert_eq!(universe.skipped.len(), 2);
        assert_eq!(universe.skipped[0].symbol, "BAD");
        assert!(matches!(&universe.skipped[0].reason, SkipReason::LoadFailed(r) if r.contains("connection refused")));
        assert_eq!(
            universe.skipped[1].reason,
            SkipReason::InsufficientBars { bars: 10, minimum: 30 }
        );
    }

    #[test]
    fn sweep_scores_are_products_of_annualized_gains() {
        let universe = load_universe(&source(), &symbols(&["AAA", "BBB"]), 30).unwrap();
        let base = BacktestConfig::default();
        let grid = ParamGrid {
            ma_lengths: vec![10, 20],
            ma_splits: vec![0.0, 0.02],
        };

        let report = run_sweep(&universe.series, &base, &grid, true).unwrap();
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.symbols, vec!["AAA", "BBB"]);

        let first = &report.outcomes[0];
        let config = BacktestConfig {
            strategy: base.strategy.with_grid_point(first.ma_length, first.ma_split),
            ..base.clone()
        };
        let expected: f64 = universe
            .series
            .iter()
            .map(|s| run_backtest(s, &config).unwrap().annualized_gain)
            .product();
        assert_relative_eq!(*first.score.as_ref().unwrap(), expected, epsilon = 1e-12);
        assert!(report.best().is_some());
    }

    #[test]
    fn one_failing_combination_is_attributed() {
        let universe = load_universe(&source(), &symbols(&["AAA"]), 30).unwrap();
        let grid = ParamGrid {
            ma_lengths: vec![20, 1000],
            ma_splits: vec![0.01],
        };

        let report = run_sweep(&universe.series, &BacktestConfig::default(), &grid, true).unwrap();
        assert!(report.outcomes[0].score.is_ok());
        assert_eq!(report.outcomes[1].ma_length, 1000);
        assert!(report.outcomes[1].score.is_err());
        assert_eq!(report.failures(), 1);
        assert_eq!(report.best().map(|o| o.ma_length), Some(20));
    }
}
