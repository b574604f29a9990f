//! CSV file adapter: paired price input and backtest report output.
//!
//! Input files live at `<base>/<A>_<B>.csv` with the header
//! `timestamp,price_a,price_b`. Output is `trades.csv`, `equity.csv` and
//! `summary.csv` in the requested directory.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PairtraderError;
use crate::domain::observation::{PricePoint, format_timestamp, parse_timestamp};
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;
use chrono::{Duration, NaiveDateTime};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument_a: &str, instrument_b: &str) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", instrument_a, instrument_b))
    }
}

fn market_error(reason: impl Into<String>) -> PairtraderError {
    PairtraderError::MarketData {
        reason: reason.into(),
    }
}

fn parse_price(value: Option<&str>, column: &str, line: u64) -> Result<f64, PairtraderError> {
    let raw = value.ok_or_else(|| market_error(format!("line {}: missing {} column", line, column)))?;
    let price: f64 = raw
        .trim()
        .parse()
        .map_err(|e| market_error(format!("line {}: invalid {} value: {}", line, column, e)))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(market_error(format!(
            "line {}: {} must be positive, got {}",
            line, column, price
        )));
    }
    Ok(price)
}

impl MarketDataPort for CsvAdapter {
    /// The file is taken at its own cadence; `interval` is not resampled.
    fn get_paired_series(
        &self,
        instrument_a: &str,
        instrument_b: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        _interval: Duration,
    ) -> Result<Vec<PricePoint>, PairtraderError> {
        let path = self.csv_path(instrument_a, instrument_b);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PairtraderError::NoData {
                    instrument_a: instrument_a.to_string(),
                    instrument_b: instrument_b.to_string(),
                });
            }
            Err(e) => {
                return Err(market_error(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut points: Vec<PricePoint> = Vec::new();
        let mut previous: Option<NaiveDateTime> = None;

        for result in rdr.records() {
            let record = result.map_err(|e| market_error(format!("CSV parse error: {}", e)))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let ts_str = record
                .get(0)
                .ok_or_else(|| market_error(format!("line {}: missing timestamp column", line)))?;
            let timestamp = parse_timestamp(ts_str).ok_or_else(|| {
                market_error(format!("line {}: invalid timestamp '{}'", line, ts_str))
            })?;

            if let Some(prev) = previous {
                if timestamp <= prev {
                    return Err(PairtraderError::OutOfOrderData {
                        previous: prev,
                        current: timestamp,
                    });
                }
            }
            previous = Some(timestamp);

            if timestamp < start || timestamp > end {
                continue;
            }

            points.push(PricePoint {
                timestamp,
                price_a: parse_price(record.get(1), "price_a", line)?,
                price_b: parse_price(record.get(2), "price_b", line)?,
            });
        }

        debug!(
            file = %path.display(),
            points = points.len(),
            "loaded paired series"
        );
        Ok(points)
    }
}

fn report_error(path: &Path, e: impl std::fmt::Display) -> PairtraderError {
    PairtraderError::Io(std::io::Error::other(format!(
        "failed to write {}: {}",
        path.display(),
        e
    )))
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

impl CsvAdapter {
    fn write_trades(&self, result: &BacktestResult, path: &Path) -> Result<(), PairtraderError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| report_error(path, e))?;
        wtr.write_record([
            "entry_timestamp",
            "exit_timestamp",
            "direction",
            "entry_ratio",
            "exit_ratio",
            "entry_z",
            "exit_z",
            "notional_per_leg",
            "gross_pnl",
            "total_cost",
            "net_pnl",
            "pnl_pct",
            "duration_hours",
            "exit_reason",
        ])
        .map_err(|e| report_error(path, e))?;
        for t in &result.trades {
            wtr.write_record([
                format_timestamp(t.entry_timestamp),
                format_timestamp(t.exit_timestamp),
                t.direction.to_string(),
                format!("{:.8}", t.entry_ratio),
                format!("{:.8}", t.exit_ratio),
                format!("{:.6}", t.entry_z),
                format!("{:.6}", t.exit_z),
                format!("{:.2}", t.notional_per_leg),
                format!("{:.6}", t.gross_pnl),
                format!("{:.6}", t.total_cost),
                format!("{:.6}", t.net_pnl),
                format!("{:.4}", t.pnl_pct()),
                format!("{:.2}", t.duration_hours()),
                t.exit_reason.to_string(),
            ])
            .map_err(|e| report_error(path, e))?;
        }
        wtr.flush().map_err(|e| report_error(path, e))?;
        Ok(())
    }

    fn write_equity(&self, result: &BacktestResult, path: &Path) -> Result<(), PairtraderError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| report_error(path, e))?;
        wtr.write_record(["timestamp", "ratio", "mean", "stddev", "z", "equity"])
            .map_err(|e| report_error(path, e))?;
        for (sample, point) in result.samples.iter().zip(&result.equity_curve) {
            wtr.write_record([
                format_timestamp(point.timestamp),
                format!("{:.8}", sample.ratio),
                format!("{:.8}", sample.mean),
                format!("{:.8}", sample.stddev),
                optional(sample.z),
                format!("{:.6}", point.equity),
            ])
            .map_err(|e| report_error(path, e))?;
        }
        wtr.flush().map_err(|e| report_error(path, e))?;
        Ok(())
    }

    fn write_summary(&self, result: &BacktestResult, path: &Path) -> Result<(), PairtraderError> {
        let s = &result.summary;
        let rows: [(&str, String); 16] = [
            ("initial_capital", format!("{:.2}", result.initial_capital)),
            ("final_equity", format!("{:.6}", s.final_equity)),
            ("total_return_pct", format!("{:.4}", s.total_return_pct)),
            ("max_drawdown", format!("{:.6}", s.max_drawdown)),
            ("total_trades", s.total_trades.to_string()),
            ("trades_won", s.trades_won.to_string()),
            ("trades_lost", s.trades_lost.to_string()),
            ("win_rate", format!("{:.4}", s.win_rate)),
            ("total_cost", format!("{:.6}", s.total_cost)),
            ("total_net_pnl", format!("{:.6}", s.total_net_pnl)),
            ("profit_factor", format!("{:.4}", s.profit_factor)),
            ("largest_win", format!("{:.6}", s.largest_win)),
            ("largest_loss", format!("{:.6}", s.largest_loss)),
            ("avg_trade_duration_hours", format!("{:.2}", s.avg_trade_duration_hours)),
            ("stop_losses", s.stop_losses.to_string()),
            ("forced_closes", s.forced_closes.to_string()),
        ];
        let mut wtr = csv::Writer::from_path(path).map_err(|e| report_error(path, e))?;
        wtr.write_record(["metric", "value"])
            .map_err(|e| report_error(path, e))?;
        for (name, value) in rows {
            wtr.write_record([name, value.as_str()])
                .map_err(|e| report_error(path, e))?;
        }
        wtr.flush().map_err(|e| report_error(path, e))?;
        Ok(())
    }
}

impl ReportPort for CsvAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), PairtraderError> {
        fs::create_dir_all(output_dir)?;
        self.write_trades(result, &output_dir.join("trades.csv"))?;
        self.write_equity(result, &output_dir.join("equity.csv"))?;
        self.write_summary(result, &output_dir.join("summary.csv"))?;
        info!(dir = %output_dir.display(), trades = result.trades.len(), "reports written");
        Ok(())
    }
}
