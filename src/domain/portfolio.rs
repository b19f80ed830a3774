//! Account state and equity tracking for a single-instrument simulation.

use chrono::NaiveDateTime;

use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Realized equity, at most one open position, and the trade log.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub equity: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub opened: usize,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            equity: initial_capital,
            initial_capital,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            opened: 0,
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn open(&mut self, position: Position) {
        self.position = Some(position);
        self.opened += 1;
    }

    pub fn take_position(&mut self) -> Option<Position> {
        self.position.take()
    }

    /// Book a closed trade; the only place realized equity moves.
    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.equity += trade.pnl;
        self.closed_trades.push(trade);
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime) {
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity: self.equity,
        });
    }

    /// Realized equity plus the open position marked at `price`.
    pub fn mark_to_market(&self, price: f64) -> f64 {
        self.equity
            + self
                .position
                .as_ref()
                .map(|p| p.unrealized_pnl(price))
                .unwrap_or(0.0)
    }
}
