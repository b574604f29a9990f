//! Configuration loading and validation.
//!
//! Every run reads its settings through these functions, so an invalid
//! configuration is rejected before any data is fetched or evaluated.

use chrono::{Duration, NaiveDateTime};
use std::time::Duration as StdDuration;

use crate::domain::advisory::AdvisoryMode;
use crate::domain::backtest::BacktestConfig;
use crate::domain::error::PairtraderError;
use crate::domain::live::LiveConfig;
use crate::domain::observation::{PairSpec, parse_timestamp};
use crate::domain::signal::Thresholds;
use crate::domain::strategy::StrategyConfig;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INTERVAL_MINUTES: i64 = 60;
pub const DEFAULT_ADVISORY_TIMEOUT_MS: u64 = 30_000;

/// Everything a backtest run needs besides the data itself.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub pair: PairSpec,
    pub config: BacktestConfig,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvisorySettings {
    pub mode: AdvisoryMode,
    pub timeout: StdDuration,
}

pub fn load_strategy(config: &dyn ConfigPort) -> Result<StrategyConfig, PairtraderError> {
    let defaults = StrategyConfig::default();
    let strategy = StrategyConfig {
        thresholds: Thresholds {
            entry: read_f64(config, "strategy", "entry_threshold", defaults.thresholds.entry)?,
            exit: read_f64(config, "strategy", "exit_threshold", defaults.thresholds.exit)?,
            stop_loss: read_f64(
                config,
                "strategy",
                "stop_loss_threshold",
                defaults.thresholds.stop_loss,
            )?,
        },
        window_size: read_usize(config, "strategy", "window_size", defaults.window_size)?,
        fee_rate: read_f64(config, "strategy", "fee_rate", defaults.fee_rate)?,
        position_fraction: read_f64(
            config,
            "strategy",
            "position_fraction",
            defaults.position_fraction,
        )?,
        min_confidence: read_confidence(config, defaults.min_confidence)?,
    };
    strategy.validate()?;
    Ok(strategy)
}

pub fn load_pair(config: &dyn ConfigPort) -> Result<PairSpec, PairtraderError> {
    let instrument_a = read_required(config, "strategy", "instrument_a")?;
    let instrument_b = read_required(config, "strategy", "instrument_b")?;
    if instrument_a == instrument_b {
        return Err(PairtraderError::invalid(
            "strategy",
            "instrument_b",
            "instrument_b must differ from instrument_a",
        ));
    }
    let minutes = read_usize(
        config,
        "strategy",
        "interval_minutes",
        DEFAULT_INTERVAL_MINUTES as usize,
    )?;
    if minutes == 0 {
        return Err(PairtraderError::invalid(
            "strategy",
            "interval_minutes",
            "interval_minutes must be at least 1",
        ));
    }
    Ok(PairSpec {
        instrument_a,
        instrument_b,
        interval: Duration::minutes(minutes as i64),
    })
}

pub fn load_advisory(config: &dyn ConfigPort) -> Result<AdvisorySettings, PairtraderError> {
    let raw = read_required(config, "advisory", "mode")?;
    let mode = AdvisoryMode::parse(&raw).ok_or_else(|| {
        PairtraderError::invalid(
            "advisory",
            "mode",
            format!("unknown mode '{}', expected always_approve or always_pass", raw),
        )
    })?;
    let timeout_ms = read_usize(
        config,
        "advisory",
        "timeout_ms",
        DEFAULT_ADVISORY_TIMEOUT_MS as usize,
    )?;
    if timeout_ms == 0 {
        return Err(PairtraderError::invalid(
            "advisory",
            "timeout_ms",
            "timeout_ms must be positive",
        ));
    }
    Ok(AdvisorySettings {
        mode,
        timeout: StdDuration::from_millis(timeout_ms as u64),
    })
}

pub fn load_backtest(config: &dyn ConfigPort) -> Result<BacktestSettings, PairtraderError> {
    let pair = load_pair(config)?;
    let strategy = load_strategy(config)?;
    let initial_capital = match config.get_string("backtest", "initial_capital") {
        Some(_) => read_f64(config, "backtest", "initial_capital", 0.0)?,
        None => return Err(PairtraderError::missing("backtest", "initial_capital")),
    };
    let backtest = BacktestConfig {
        initial_capital,
        strategy,
    };
    backtest.validate()?;

    let start = read_timestamp(config, "backtest", "start")?.unwrap_or(NaiveDateTime::MIN);
    let end = read_timestamp(config, "backtest", "end")?.unwrap_or(NaiveDateTime::MAX);
    if start >= end {
        return Err(PairtraderError::invalid(
            "backtest",
            "start",
            "start must be before end",
        ));
    }

    Ok(BacktestSettings {
        pair,
        config: backtest,
        start,
        end,
        data_dir: non_empty(config.get_string("backtest", "data_dir")),
    })
}

pub fn load_live(config: &dyn ConfigPort) -> Result<LiveConfig, PairtraderError> {
    let pair = load_pair(config)?;
    let strategy = load_strategy(config)?;
    let capital = match config.get_string("live", "capital") {
        Some(_) => read_f64(config, "live", "capital", 0.0)?,
        None => return Err(PairtraderError::missing("live", "capital")),
    };
    if !capital.is_finite() || capital <= 0.0 {
        return Err(PairtraderError::invalid(
            "live",
            "capital",
            "capital must be positive",
        ));
    }
    Ok(LiveConfig {
        pair,
        strategy,
        capital,
    })
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), PairtraderError> {
    load_backtest(config)?;
    load_advisory(config)?;
    Ok(())
}

pub fn validate_live_config(config: &dyn ConfigPort) -> Result<(), PairtraderError> {
    load_live(config)?;
    load_advisory(config)?;
    match non_empty(config.get_string("sqlite", "path")) {
        Some(_) => Ok(()),
        None => Err(PairtraderError::missing("sqlite", "path")),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn read_required(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, PairtraderError> {
    non_empty(config.get_string(section, key))
        .map(|s| s.trim().to_string())
        .ok_or_else(|| PairtraderError::missing(section, key))
}

fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, PairtraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
            PairtraderError::invalid(section, key, format!("'{}' is not a number", raw))
        }),
    }
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, PairtraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
            PairtraderError::invalid(
                section,
                key,
                format!("'{}' is not a non-negative integer", raw),
            )
        }),
    }
}

fn read_confidence(config: &dyn ConfigPort, default: u8) -> Result<u8, PairtraderError> {
    let value = read_usize(config, "advisory", "min_confidence", default as usize)?;
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| {
            PairtraderError::invalid(
                "advisory",
                "min_confidence",
                "min_confidence must be between 0 and 100",
            )
        })
}

fn read_timestamp(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDateTime>, PairtraderError> {
    match non_empty(config.get_string(section, key)) {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw).map(Some).ok_or_else(|| {
            PairtraderError::invalid(
                section,
                key,
                format!("invalid {} format, expected YYYY-MM-DD [HH:MM:SS]", key),
            )
        }),
    }
}
