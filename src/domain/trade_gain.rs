//! Replay of a finalized position series against prices.
//!
//! Fills always happen at the next period's open: a position decided on
//! period `i` enters (or exits) at `adj_open[i + 1]`. On the final period
//! there is no next open, so the close is used and the fill is flagged as
//! pending.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::domain::error::BandtraderError;
use crate::domain::position::{Direction, PositionState};
use crate::domain::price_series::PriceSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    LongBuy,
    LongSell,
    ShortSell,
    ShortBuy,
}

impl TradeAction {
    pub fn entry(direction: Direction) -> Self {
        match direction {
            Direction::Long => TradeAction::LongBuy,
            Direction::Short => TradeAction::ShortSell,
        }
    }

    pub fn exit(direction: Direction) -> Self {
        match direction {
            Direction::Long => TradeAction::LongSell,
            Direction::Short => TradeAction::ShortBuy,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::LongBuy => write!(f, "long buy"),
            TradeAction::LongSell => write!(f, "long sell"),
            TradeAction::ShortSell => write!(f, "short sell"),
            TradeAction::ShortBuy => write!(f, "short buy"),
        }
    }
}

/// How a logged fill relates to the end of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatus {
    Filled,
    /// Decided on the final period; executes at the next session's open.
    Tomorrow,
    /// Mark-to-close of a trade still live at the final period.
    StillOpen,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeLogEntry {
    pub symbol: String,
    pub date: NaiveDate,
    pub action: TradeAction,
    pub price: f64,
    pub gain: Option<f64>,
    pub status: FillStatus,
}

impl fmt::Display for TradeLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "symbol: {}, date: {}, ", self.symbol, self.date)?;
        match self.status {
            FillStatus::Tomorrow => write!(f, "**** {} TOMORROW ****", self.action)?,
            _ => write!(f, "{}", self.action)?,
        }
        write!(f, " price: {:8.2}", self.price)?;
        if let Some(gain) = self.gain {
            write!(f, ", gain: {gain:8.2}")?;
        }
        if self.status == FillStatus::StillOpen {
            write!(f, " (TRADE STILL OPEN)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Closed,
    /// Still held at the final period; gain is marked to the last close.
    Open,
    /// Entry decided on the final period; not yet filled.
    Pending,
}

/// One round trip. Dates are decision dates; fills are at the next open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub direction: Direction,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub gain: f64,
    pub status: TradeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeReplay {
    pub total_gain: f64,
    pub gain_curve: Vec<f64>,
    pub trades: Vec<Trade>,
    pub log: Vec<TradeLogEntry>,
}

struct Held {
    direction: Direction,
    date: NaiveDate,
    price: f64,
}

fn oriented(direction: Direction, ratio: f64) -> f64 {
    match direction {
        Direction::Long => ratio,
        Direction::Short => 1.0 / ratio,
    }
}

/// Replay `positions` over `prices` starting at period `delay`.
///
/// The gain curve is 1.0 up to `delay` and then compounds the close-to-close
/// move of every held period; an exit also applies the close-to-next-open
/// settlement move. `total_gain` is the product of per-trade fill-to-fill
/// gains, with a trade still open at the end marked to the final close.
/// A direct long/short flip is replayed as an exit followed by an entry.
pub fn simulate_trades(
    delay: usize,
    positions: &[PositionState],
    prices: &PriceSeries,
) -> Result<TradeReplay, BandtraderError> {
    let n = prices.len();
    if positions.len() != n {
        return Err(BandtraderError::LengthMismatch {
            expected: n,
            found: positions.len(),
        });
    }
    if delay >= n {
        return Err(BandtraderError::InsufficientData {
            symbol: prices.symbol().to_string(),
            bars: n,
            minimum: delay + 1,
        });
    }

    let symbol = prices.symbol();
    let dates = prices.dates();
    let open = prices.adj_open();
    let close = prices.adj_close();
    let last = n - 1;

    let mut curve = vec![1.0; n];
    let mut total = 1.0;
    let mut trades = Vec::new();
    let mut log = Vec::new();
    let mut held: Option<Held> = None;

    for i in delay.max(1)..n {
        let mut value = curve[i - 1];
        let target = positions[i].direction();
        let point = close[i] / close[i - 1];

        if let Some(trade) = held.take() {
            if target == Some(trade.direction) {
                value *= oriented(trade.direction, point);
                if i == last {
                    let gain = oriented(trade.direction, close[i] / trade.price);
                    total *= gain;
                    log.push(TradeLogEntry {
                        symbol: symbol.to_string(),
                        date: dates[i],
                        action: TradeAction::exit(trade.direction),
                        price: close[i],
                        gain: Some(gain),
                        status: FillStatus::StillOpen,
                    });
                    trades.push(Trade {
                        direction: trade.direction,
                        entry_date: trade.date,
                        entry_price: trade.price,
                        exit_date: None,
                        exit_price: None,
                        gain,
                        status: TradeStatus::Open,
                    });
                }
                held = Some(trade);
            } else {
                let (price, settle, status) = if i < last {
                    (open[i + 1], open[i + 1] / close[i], FillStatus::Filled)
                } else {
                    (close[i], 1.0, FillStatus::Tomorrow)
                };
                value *= oriented(trade.direction, point * settle);
                let gain = oriented(trade.direction, price / trade.price);
                total *= gain;
                debug!(symbol, date = %dates[i], direction = %trade.direction, price, gain, "trade closed");
                log.push(TradeLogEntry {
                    symbol: symbol.to_string(),
                    date: dates[i],
                    action: TradeAction::exit(trade.direction),
                    price,
                    gain: Some(gain),
                    status,
                });
                trades.push(Trade {
                    direction: trade.direction,
                    entry_date: trade.date,
                    entry_price: trade.price,
                    exit_date: Some(dates[i]),
                    exit_price: Some(price),
                    gain,
                    status: TradeStatus::Closed,
                });
            }
        }

        if held.is_none() {
            if let Some(direction) = target {
                let (price, status) = if i < last {
                    (open[i + 1], FillStatus::Filled)
                } else {
                    (close[i], FillStatus::Tomorrow)
                };
                debug!(symbol, date = %dates[i], %direction, price, "trade opened");
                log.push(TradeLogEntry {
                    symbol: symbol.to_string(),
                    date: dates[i],
                    action: TradeAction::entry(direction),
                    price,
                    gain: None,
                    status,
                });
                if i == last {
                    trades.push(Trade {
                        direction,
                        entry_date: dates[i],
                        entry_price: price,
                        exit_date: None,
                        exit_price: None,
                        gain: 1.0,
                        status: TradeStatus::Pending,
                    });
                } else {
                    held = Some(Held {
                        direction,
                        date: dates[i],
                        price,
                    });
                }
            }
        }

        curve[i] = value;
    }

    Ok(TradeReplay {
        total_gain: total,
        gain_curve: curve,
        trades,
        log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_series::PriceBar;
    use approx::assert_relative_eq;
    use PositionState::{Close as C, LongBuy as L, ShortSell as S};

    fn series(open: &[f64], close: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
        let bars: Vec<PriceBar> = open
            .iter()
            .zip(close)
            .enumerate()
            .map(|(i, (&o, &c))| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: o,
                high: o.max(c),
                low: o.min(c),
                close: c,
                adj_close: c,
            })
            .collect();
        PriceSeries::from_bars("GAIN", &bars).unwrap()
    }

    fn assert_curve(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert_relative_eq!(*a, *e, epsilon = 1e-9);
        }
    }

    const CLOSE: [f64; 8] = [1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
    const OPEN: [f64; 8] = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0];

    #[test]
    fn long_round_trip() {
        let prices = series(&OPEN, &CLOSE);
        let positions = [C, C, C, L, L, L, C, C];

        let replay = simulate_trades(2, &positions, &prices).unwrap();
        assert_curve(&replay.gain_curve, &[1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_relative_eq!(replay.total_gain, 2.0, epsilon = 1e-12);
        assert_eq!(replay.trades.len(), 1);
        assert_eq!(replay.trades[0].status, TradeStatus::Closed);
        assert_relative_eq!(replay.trades[0].entry_price, 1.0);
        assert_eq!(replay.trades[0].exit_price, Some(2.0));
    }

    #[test]
    fn exit_on_final_period_fills_at_close() {
        let prices = series(&OPEN, &CLOSE);
        let positions = [C, C, C, C, L, L, L, C];

        let replay = simulate_trades(2, &positions, &prices).unwrap();
        assert_relative_eq!(replay.total_gain, 2.0, epsilon = 1e-12);
        let exit = replay.log.last().unwrap();
        assert_eq!(exit.action, TradeAction::LongSell);
        assert_eq!(exit.status, FillStatus::Tomorrow);
        assert!(exit.to_string().contains("TOMORROW"));
    }

    #[test]
    fn open_trade_is_marked_to_final_close() {
        let prices = series(&OPEN, &CLOSE);
        let positions = [C, C, C, C, C, L, L, L];

        let replay = simulate_trades(2, &positions, &prices).unwrap();
        assert_curve(&replay.gain_curve, &[1.0; 8]);
        assert_relative_eq!(replay.total_gain, 1.0, epsilon = 1e-12);
        assert_eq!(replay.trades[0].status, TradeStatus::Open);
        assert!(replay.log.last().unwrap().to_string().ends_with("(TRADE STILL OPEN)"));
    }

    #[test]
    fn entry_fills_at_next_open_not_signal_close() {
        let open = [10.0, 10.0, 15.0, 20.0, 20.0];
        let close = [10.0, 20.0, 20.0, 20.0, 20.0];
        let prices = series(&open, &close);

        let replay = simulate_trades(0, &[C, L, L, C, C], &prices).unwrap();
        let trade = &replay.trades[0];
        assert_relative_eq!(trade.entry_price, 15.0);
        assert_relative_eq!(trade.gain, 20.0 / 15.0, epsilon = 1e-12);
    }

    #[test]
    fn short_round_trip() {
        let open = [10.0, 10.0, 10.0, 8.0, 8.0];
        let close = [10.0, 10.0, 8.0, 8.0, 8.0];
        let prices = series(&open, &close);

        let replay = simulate_trades(0, &[C, S, S, C, C], &prices).unwrap();
        assert_curve(&replay.gain_curve, &[1.0, 1.0, 1.25, 1.25, 1.25]);
        assert_relative_eq!(replay.total_gain, 1.25, epsilon = 1e-12);
        assert_eq!(replay.log[0].action, TradeAction::ShortSell);
        assert_eq!(replay.log[1].action, TradeAction::ShortBuy);
    }

    #[test]
    fn direct_flip_is_exit_then_entry() {
        let px = [10.0, 10.0, 11.0, 11.0, 10.0, 10.0, 10.0];
        let prices = series(&px, &px);

        let replay = simulate_trades(0, &[C, L, L, S, S, C, C], &prices).unwrap();
        assert_eq!(replay.trades.len(), 2);
        assert_eq!(replay.trades[0].direction, Direction::Long);
        assert_eq!(replay.trades[1].direction, Direction::Short);
        assert_relative_eq!(replay.trades[1].entry_price, 10.0);
        assert_relative_eq!(replay.total_gain, 10.0 / 11.0, epsilon = 1e-12);
        assert_relative_eq!(replay.gain_curve[6], 1.1, epsilon = 1e-12);
    }

    #[test]
    fn entry_on_final_period_is_pending() {
        let prices = series(&OPEN, &CLOSE);
        let replay = simulate_trades(0, &[C, C, C, C, C, C, C, S], &prices).unwrap();
        assert_relative_eq!(replay.total_gain, 1.0);
        assert_eq!(replay.trades[0].status, TradeStatus::Pending);
        assert_eq!(replay.log[0].status, FillStatus::Tomorrow);
    }

    #[test]
    fn log_line_format() {
        let entry = TradeLogEntry {
            symbol: "SPY".into(),
            date: NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(),
            action: TradeAction::LongSell,
            price: 123.456,
            gain: Some(1.0512),
            status: FillStatus::Filled,
        };
        assert_eq!(
            entry.to_string(),
            "symbol: SPY, date: 2024-02-05, long sell price:   123.46, gain:     1.05"
        );
    }

    #[test]
    fn rejects_length_mismatch() {
        let prices = series(&OPEN, &CLOSE);
        assert!(matches!(
            simulate_trades(0, &[C, L], &prices),
            Err(BandtraderError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn rejects_delay_past_end() {
        let prices = series(&OPEN, &CLOSE);
        assert!(matches!(
            simulate_trades(8, &[C; 8], &prices),
            Err(BandtraderError::InsufficientData { .. })
        ));
    }
}
