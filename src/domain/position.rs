//! Pair position, its lifecycle state, and closed trades.

use chrono::NaiveDateTime;
use std::fmt;

use super::signal::Direction;

/// An open pair position. Both legs carry the same notional.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Direction,
    pub entry_timestamp: NaiveDateTime,
    pub entry_ratio: f64,
    pub entry_z: f64,
    pub notional_per_leg: f64,
    pub entry_cost: f64,
}

impl Position {
    /// Mark-to-market P&L of the spread at `ratio`, before costs.
    pub fn gross_pnl(&self, ratio: f64) -> f64 {
        self.direction.sign() * self.notional_per_leg * (ratio - self.entry_ratio)
            / self.entry_ratio
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Open(Position),
}

impl PositionState {
    pub fn kind(&self) -> StateKind {
        match self {
            PositionState::Flat => StateKind::NoPosition,
            PositionState::Open(_) => StateKind::Open,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionState::Flat => None,
            PositionState::Open(position) => Some(position),
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        self.position().map(|p| p.direction)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, PositionState::Open(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    NoPosition,
    Open,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StateKind::NoPosition => "NO_POSITION",
            StateKind::Open => "OPEN",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Exit,
    StopLoss,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::Exit => "EXIT",
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::EndOfData => "END_OF_DATA",
        }
    }

    pub fn parse(value: &str) -> Option<ExitReason> {
        match value.trim().to_uppercase().as_str() {
            "EXIT" => Some(ExitReason::Exit),
            "STOP_LOSS" => Some(ExitReason::StopLoss),
            "END_OF_DATA" => Some(ExitReason::EndOfData),
            _ => None,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed round trip. `net_pnl = gross_pnl - total_cost`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_timestamp: NaiveDateTime,
    pub exit_timestamp: NaiveDateTime,
    pub direction: Direction,
    pub entry_ratio: f64,
    pub exit_ratio: f64,
    pub entry_z: f64,
    pub exit_z: f64,
    pub notional_per_leg: f64,
    pub gross_pnl: f64,
    pub total_cost: f64,
    pub net_pnl: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    /// Net P&L as a percentage of the capital committed to both legs.
    pub fn pnl_pct(&self) -> f64 {
        let committed = 2.0 * self.notional_per_leg;
        if committed > 0.0 {
            self.net_pnl / committed * 100.0
        } else {
            0.0
        }
    }

    pub fn duration_hours(&self) -> f64 {
        (self.exit_timestamp - self.entry_timestamp).num_seconds() as f64 / 3600.0
    }

    pub fn is_win(&self) -> bool {
        self.net_pnl > 0.0
    }
}

/// A change of position state produced by one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Opened(Position),
    Closed(Trade),
}

impl Transition {
    pub fn from(&self) -> StateKind {
        match self {
            Transition::Opened(_) => StateKind::NoPosition,
            Transition::Closed(_) => StateKind::Open,
        }
    }

    pub fn to(&self) -> StateKind {
        match self {
            Transition::Opened(_) => StateKind::Open,
            Transition::Closed(_) => StateKind::NoPosition,
        }
    }
}
