//! Walk-forward position simulator over a classified trend frame.
//!
//! A change into UP opens a long and a change into DOWN opens a short,
//! closing any opposite position first. Exactly one position is open at a
//! time. Entries whose signal bar falls outside the configured range are
//! suppressed; a position still open when the range ends is closed on the
//! last in-range bar. A run may finish with one position open.

use chrono::NaiveDateTime;
use std::str::FromStr;

use super::error::HulltrendError;
use super::execution::{ExecutionConfig, enter_position, exit_position};
use super::portfolio::Portfolio;
use super::position::{Direction, ExitReason, Position};
use super::trend::{FAST_OFFSET, TrendFrame, TrendState};

/// Where a signal on bar `t` is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillPolicy {
    /// At the close of bar `t`.
    #[default]
    SameBarClose,
    /// At the open of bar `t + 1`; dropped if there is no such bar.
    NextBarOpen,
}

impl FromStr for FillPolicy {
    type Err = HulltrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "same-bar" | "same-bar-close" => Ok(FillPolicy::SameBarClose),
            "next-bar-open" => Ok(FillPolicy::NextBarOpen),
            other => Err(HulltrendError::ConfigInvalid {
                section: "backtest".into(),
                key: "fill_policy".into(),
                reason: format!("unknown fill policy '{other}' (expected same-bar or next-bar-open)"),
            }),
        }
    }
}

/// When an open position is closed besides range end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Only an opposite classification closes (and reverses) the position.
    #[default]
    Reverse,
    /// Also go flat when the fast line turns against the position over its
    /// two-bar offset; re-enter when the classification agrees again.
    FastLineExit,
}

impl FromStr for ExitPolicy {
    type Err = HulltrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "reverse" => Ok(ExitPolicy::Reverse),
            "fast-line" | "fast-line-exit" => Ok(ExitPolicy::FastLineExit),
            other => Err(HulltrendError::ConfigInvalid {
                section: "backtest".into(),
                key: "exit_policy".into(),
                reason: format!("unknown exit policy '{other}' (expected reverse or fast-line)"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub initial_capital: f64,
    pub position_size_pct: f64,
    pub commission_pct: f64,
    pub fill_policy: FillPolicy,
    pub exit_policy: ExitPolicy,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            start: None,
            end: None,
            initial_capital: 100_000.0,
            position_size_pct: 100.0,
            commission_pct: 0.0,
            fill_policy: FillPolicy::SameBarClose,
            exit_policy: ExitPolicy::Reverse,
        }
    }
}

impl BacktestConfig {
    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            position_size_pct: self.position_size_pct,
            commission_pct: self.commission_pct,
        }
    }

    pub fn in_range(&self, time: NaiveDateTime) -> bool {
        self.start.is_none_or(|s| time >= s) && self.end.is_none_or(|e| time <= e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Order {
    Exit(ExitReason),
    Enter(Direction),
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
}

impl BacktestResult {
    pub fn open_position(&self) -> Option<&Position> {
        self.portfolio.position.as_ref()
    }
}

pub fn run_backtest(frame: &TrendFrame, config: &BacktestConfig) -> BacktestResult {
    let exec = config.execution();
    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut previous: Option<TrendState> = None;
    let mut pending: Vec<Order> = Vec::new();
    let n = frame.len();

    for t in 0..n {
        let time = frame.timestamps[t];

        for order in pending.drain(..) {
            fill(&mut portfolio, order, frame.opens[t], time, &exec);
        }

        let orders = decide(frame, t, previous, &portfolio, config);
        if let Some(state) = frame.states[t] {
            previous = Some(state);
        }

        match config.fill_policy {
            FillPolicy::SameBarClose => {
                for order in orders {
                    fill(&mut portfolio, order, frame.closes[t], time, &exec);
                }
            }
            FillPolicy::NextBarOpen => pending = orders,
        }

        let range_ends_here = config
            .end
            .is_some_and(|end| time <= end && t + 1 < n && frame.timestamps[t + 1] > end);
        if range_ends_here {
            pending.clear();
            exit_position(
                &mut portfolio,
                frame.closes[t],
                time,
                ExitReason::RangeEnd,
                &exec,
            );
        }

        portfolio.record_equity(time);
    }

    tracing::debug!(
        bars = n,
        opened = portfolio.opened,
        closed = portfolio.closed_trades.len(),
        equity = portfolio.equity,
        "backtest finished"
    );

    BacktestResult { portfolio }
}

/// Orders triggered by bar `t`, given the position as it stands.
fn decide(
    frame: &TrendFrame,
    t: usize,
    previous: Option<TrendState>,
    portfolio: &Portfolio,
    config: &BacktestConfig,
) -> Vec<Order> {
    let held = portfolio.position.as_ref().map(|p| p.direction);
    let mut orders = Vec::new();

    match frame.states[t] {
        Some(state) => {
            let target = Direction::from(state);
            let wants_entry = match config.exit_policy {
                ExitPolicy::Reverse => previous != Some(state),
                ExitPolicy::FastLineExit => held != Some(target),
            };
            if !wants_entry {
                return orders;
            }
            if held.is_some_and(|d| d != target) {
                orders.push(Order::Exit(ExitReason::Reversal));
            }
            if held != Some(target) && config.in_range(frame.timestamps[t]) {
                orders.push(Order::Enter(target));
            }
        }
        None if config.exit_policy == ExitPolicy::FastLineExit => {
            let against = match held {
                Some(Direction::Long) => frame.hull.falling(t, FAST_OFFSET),
                Some(Direction::Short) => frame.hull.rising(t, FAST_OFFSET),
                _ => false,
            };
            if against {
                orders.push(Order::Exit(ExitReason::FastLineExit));
            }
        }
        None => {}
    }

    orders
}

fn fill(
    portfolio: &mut Portfolio,
    order: Order,
    price: f64,
    time: NaiveDateTime,
    exec: &ExecutionConfig,
) {
    match order {
        Order::Exit(reason) => {
            exit_position(portfolio, price, time, reason, exec);
        }
        Order::Enter(direction) => {
            enter_position(portfolio, direction, price, time, exec);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::Line;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, TimeDelta};

    const UP: Option<TrendState> = Some(TrendState::Up);
    const DOWN: Option<TrendState> = Some(TrendState::Down);

    fn day(d: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + TimeDelta::days(d)
    }

    fn frame(states: &[Option<TrendState>], closes: &[f64]) -> TrendFrame {
        TrendFrame {
            timestamps: (0..states.len() as i64).map(day).collect(),
            opens: closes.iter().map(|c| c - 1.0).collect(),
            closes: closes.to_vec(),
            hull: Line::from_values(closes),
            trend: Line::default(),
            states: states.to_vec(),
        }
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            initial_capital: 1_000.0,
            ..Default::default()
        }
    }

    #[test]
    fn fill_policy_parse() {
        assert_eq!("same-bar".parse::<FillPolicy>().unwrap(), FillPolicy::SameBarClose);
        assert_eq!("next_bar_open".parse::<FillPolicy>().unwrap(), FillPolicy::NextBarOpen);
        assert!("midpoint".parse::<FillPolicy>().is_err());
    }

    #[test]
    fn exit_policy_parse() {
        assert_eq!("reverse".parse::<ExitPolicy>().unwrap(), ExitPolicy::Reverse);
        assert_eq!("fast_line".parse::<ExitPolicy>().unwrap(), ExitPolicy::FastLineExit);
        assert!("trailing".parse::<ExitPolicy>().is_err());
    }

    #[test]
    fn long_then_reverse_short() {
        let f = frame(&[None, UP, UP, DOWN, DOWN], &[10.0, 10.0, 12.0, 15.0, 12.0]);
        let result = run_backtest(&f, &config());
        let trades = &result.portfolio.closed_trades;

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].direction, Direction::Long);
        assert_relative_eq!(trades[0].entry_price, 10.0);
        assert_relative_eq!(trades[0].exit_price, 15.0);
        assert_relative_eq!(trades[0].pnl, 500.0);

        let open = result.open_position().unwrap();
        assert_eq!(open.direction, Direction::Short);
        assert_eq!(open.entry_time, day(3));
        assert_eq!(result.portfolio.opened, 2);
    }

    #[test]
    fn hold_bars_do_not_trade() {
        let f = frame(&[UP, None, UP, None], &[10.0, 11.0, 12.0, 13.0]);
        let result = run_backtest(&f, &config());
        assert_eq!(result.portfolio.opened, 1);
        assert!(result.portfolio.closed_trades.is_empty());
    }

    #[test]
    fn next_bar_open_fills() {
        let f = frame(&[UP, UP, DOWN, DOWN], &[10.0, 12.0, 14.0, 13.0]);
        let cfg = BacktestConfig {
            fill_policy: FillPolicy::NextBarOpen,
            ..config()
        };
        let result = run_backtest(&f, &cfg);
        let trade = &result.portfolio.closed_trades[0];
        // opens are close - 1
        assert_relative_eq!(trade.entry_price, 11.0);
        assert_eq!(trade.entry_time, day(1));
        assert_relative_eq!(trade.exit_price, 12.0);
        assert_eq!(trade.exit_time, day(3));
    }

    #[test]
    fn next_bar_open_drops_signal_on_last_bar() {
        let f = frame(&[None, UP], &[10.0, 11.0]);
        let cfg = BacktestConfig {
            fill_policy: FillPolicy::NextBarOpen,
            ..config()
        };
        let result = run_backtest(&f, &cfg);
        assert_eq!(result.portfolio.opened, 0);
    }

    #[test]
    fn entries_outside_range_are_suppressed() {
        let f = frame(&[UP, DOWN, UP, DOWN], &[10.0, 11.0, 12.0, 13.0]);
        let cfg = BacktestConfig {
            start: Some(day(2)),
            ..config()
        };
        let result = run_backtest(&f, &cfg);
        assert_eq!(result.portfolio.opened, 2);
        assert_eq!(result.portfolio.closed_trades[0].entry_time, day(2));
    }

    #[test]
    fn range_end_closes_open_position() {
        let f = frame(&[UP, UP, UP, DOWN, UP], &[10.0, 11.0, 12.0, 13.0, 14.0]);
        let cfg = BacktestConfig {
            end: Some(day(1)),
            ..config()
        };
        let result = run_backtest(&f, &cfg);
        assert!(result.open_position().is_none());
        assert_eq!(result.portfolio.opened, 1);
        let trade = &result.portfolio.closed_trades[0];
        assert_eq!(trade.exit_reason, ExitReason::RangeEnd);
        assert_eq!(trade.exit_time, day(1));
        assert_relative_eq!(trade.exit_price, 11.0);
    }

    #[test]
    fn equity_only_moves_on_close() {
        let f = frame(
            &[UP, UP, DOWN, DOWN, UP, UP],
            &[10.0, 20.0, 15.0, 30.0, 12.0, 50.0],
        );
        let cfg = BacktestConfig {
            commission_pct: 0.1,
            position_size_pct: 50.0,
            ..config()
        };
        let result = run_backtest(&f, &cfg);
        let portfolio = &result.portfolio;
        let close_times: Vec<_> = portfolio.closed_trades.iter().map(|t| t.exit_time).collect();

        let mut last = cfg.initial_capital;
        for point in &portfolio.equity_curve {
            if point.equity != last {
                assert!(close_times.contains(&point.timestamp));
                last = point.equity;
            }
        }
        assert_eq!(
            portfolio.opened,
            portfolio.closed_trades.len() + usize::from(portfolio.position.is_some())
        );
    }

    #[test]
    fn fast_line_exit_goes_flat_and_reenters() {
        // hull mirrors closes: bar 3 falls below bar 1, bar 5 agrees again
        let f = frame(
            &[None, None, UP, None, None, UP],
            &[10.0, 11.0, 12.0, 10.5, 11.0, 13.0],
        );
        let cfg = BacktestConfig {
            exit_policy: ExitPolicy::FastLineExit,
            ..config()
        };
        let result = run_backtest(&f, &cfg);
        let trades = &result.portfolio.closed_trades;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::FastLineExit);
        assert_eq!(trades[0].exit_time, day(3));
        assert_eq!(result.open_position().unwrap().entry_time, day(5));
    }

    #[test]
    fn reverse_policy_ignores_fast_line() {
        let f = frame(
            &[None, None, UP, None, None, UP],
            &[10.0, 11.0, 12.0, 10.5, 11.0, 13.0],
        );
        let result = run_backtest(&f, &config());
        assert!(result.portfolio.closed_trades.is_empty());
        assert_eq!(result.portfolio.opened, 1);
    }
}
