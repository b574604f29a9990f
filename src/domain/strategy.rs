//! Strategy parameters shared by the backtest and live paths.

use super::cost::DEFAULT_FEE_RATE;
use super::error::PairtraderError;
use super::rolling::DEFAULT_WINDOW_SIZE;
use super::signal::Thresholds;

pub const DEFAULT_POSITION_FRACTION: f64 = 0.5;
pub const DEFAULT_MIN_CONFIDENCE: u8 = 70;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub thresholds: Thresholds,
    pub window_size: usize,
    pub fee_rate: f64,
    /// Fraction of capital committed to a position, split evenly across legs.
    pub position_fraction: f64,
    /// Advisory confidence must be strictly greater than this to approve.
    pub min_confidence: u8,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            thresholds: Thresholds::default(),
            window_size: DEFAULT_WINDOW_SIZE,
            fee_rate: DEFAULT_FEE_RATE,
            position_fraction: DEFAULT_POSITION_FRACTION,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), PairtraderError> {
        self.thresholds.validate()?;
        if self.window_size < 2 {
            return Err(PairtraderError::invalid(
                "strategy",
                "window_size",
                "window_size must be at least 2",
            ));
        }
        if !self.fee_rate.is_finite() || self.fee_rate <= 0.0 || self.fee_rate >= 1.0 {
            return Err(PairtraderError::invalid(
                "strategy",
                "fee_rate",
                "fee_rate must be in (0, 1)",
            ));
        }
        if !self.position_fraction.is_finite()
            || self.position_fraction <= 0.0
            || self.position_fraction > 1.0
        {
            return Err(PairtraderError::invalid(
                "strategy",
                "position_fraction",
                "position_fraction must be in (0, 1]",
            ));
        }
        if self.min_confidence > 100 {
            return Err(PairtraderError::invalid(
                "advisory",
                "min_confidence",
                "min_confidence must be between 0 and 100",
            ));
        }
        Ok(())
    }

    /// Notional for each leg when `capital` is available.
    pub fn notional_per_leg(&self, capital: f64) -> f64 {
        capital * self.position_fraction / 2.0
    }
}
