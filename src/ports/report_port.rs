//! Backtest report port.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PairtraderError;
use std::path::Path;

/// Port for writing backtest artifacts.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), PairtraderError>;
}
