//! Fill simulation for the backtester.
//!
//! Positions are sized as a percentage of realized equity with fractional
//! quantities, and pay a percentage commission on entry and exit notional.

use chrono::NaiveDateTime;

use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Direction, ExitReason, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Share of current equity committed per entry, in percent.
    pub position_size_pct: f64,
    /// Commission on notional, in percent, charged on entry and on exit.
    pub commission_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            position_size_pct: 100.0,
            commission_pct: 0.0,
        }
    }
}

/// notional * pct / 100
pub fn calculate_commission(notional: f64, config: &ExecutionConfig) -> f64 {
    notional * config.commission_pct / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: f64,
        execution_price: f64,
        commission: f64,
    },
    AlreadyOpen,
    InsufficientCapital,
}

/// Open a position of `direction` at `price`.
///
/// The entry commission is carried on the position and realized with the
/// exit, so equity only moves when a trade closes.
pub fn enter_position(
    portfolio: &mut Portfolio,
    direction: Direction,
    price: f64,
    time: NaiveDateTime,
    config: &ExecutionConfig,
) -> EntryResult {
    if portfolio.has_position() || direction == Direction::Flat {
        return EntryResult::AlreadyOpen;
    }

    let notional = portfolio.equity * config.position_size_pct / 100.0;
    if notional <= 0.0 || price <= 0.0 {
        return EntryResult::InsufficientCapital;
    }

    let quantity = notional / price;
    let commission = calculate_commission(notional, config);

    portfolio.open(Position {
        direction,
        quantity,
        entry_price: price,
        entry_time: time,
        entry_commission: commission,
    });

    EntryResult::Entered {
        quantity,
        execution_price: price,
        commission,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub exit_price: f64,
    pub exit_commission: f64,
    pub pnl: f64,
}

/// Close the open position at `price`; `None` when flat.
pub fn exit_position(
    portfolio: &mut Portfolio,
    price: f64,
    time: NaiveDateTime,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<ExitResult> {
    let position = portfolio.take_position()?;

    let exit_commission = calculate_commission(position.notional(price), config);
    let pnl = position.unrealized_pnl(price) - position.entry_commission - exit_commission;

    portfolio.record_trade(ClosedTrade {
        direction: position.direction,
        quantity: position.quantity,
        entry_price: position.entry_price,
        exit_price: price,
        entry_time: position.entry_time,
        exit_time: time,
        pnl,
        exit_reason: reason,
    });

    Some(ExitResult {
        exit_price: price,
        exit_commission,
        pnl,
    })
}
