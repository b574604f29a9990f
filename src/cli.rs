//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::advisory_stub::gate_for;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestResult};
use crate::domain::config_validation::{
    load_advisory, load_backtest, validate_backtest_config, validate_live_config,
};
use crate::domain::error::PairtraderError;
use crate::domain::observation::to_ratio_series;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "pairtrader", about = "Z-score pair-trade signal engine and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay historical paired prices and report the results
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for trades.csv, equity.csv and summary.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory holding <A>_<B>.csv price files
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Run one live evaluation against the stored position
    Step {
        #[arg(short, long)]
        config: PathBuf,
        /// Evaluation time (YYYY-MM-DD HH:MM:SS, UTC); defaults to now
        #[arg(long)]
        now: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            data_dir,
        } => run_backtest(&config, output.as_deref(), data_dir.as_deref()),
        Command::Step { config, now } => run_step(&config, now.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: PairtraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

fn run_backtest(config_path: &Path, output: Option<&Path>, data_dir: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let settings = match load_backtest(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let advisory = match load_advisory(&adapter) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };

    let data_dir = data_dir
        .map(Path::to_path_buf)
        .or_else(|| settings.data_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let pair = &settings.pair;
    eprintln!(
        "Loading {}/{} from {}",
        pair.instrument_a,
        pair.instrument_b,
        data_dir.display()
    );
    let data_port = CsvAdapter::new(data_dir);
    let points = match data_port.get_paired_series(
        &pair.instrument_a,
        &pair.instrument_b,
        settings.start,
        settings.end,
        pair.interval,
    ) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    if points.is_empty() {
        return fail(PairtraderError::NoData {
            instrument_a: pair.instrument_a.clone(),
            instrument_b: pair.instrument_b.clone(),
        });
    }
    eprintln!("  {} observations", points.len());

    // The backtest calls its stub gate directly to stay deterministic.
    let gate = gate_for(advisory.mode);
    let series = to_ratio_series(&points);
    let result = match backtest_engine::run(&series, &settings.config, gate.as_ref()) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_summary(&result);

    let output = output
        .map(Path::to_path_buf)
        .or_else(|| {
            adapter
                .get_string("output", "dir")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
        });
    if let Some(dir) = output {
        if let Err(e) = data_port.write(&result, &dir) {
            return fail(e);
        }
        eprintln!("\nReports written to: {}", dir.display());
    }

    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult) {
    let s = &result.summary;
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Initial Capital:  {:.2}", result.initial_capital);
    eprintln!("Final Equity:     {:.2}", s.final_equity);
    eprintln!("Total Return:     {:.2}%", s.total_return_pct);
    eprintln!("Max Drawdown:     -{:.2}%", s.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", s.total_trades);
    eprintln!("Win Rate:         {:.1}%", s.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", s.profit_factor);
    eprintln!("Total Cost:       {:.2}", s.total_cost);
    eprintln!("Stop Losses:      {}", s.stop_losses);
    eprintln!("Forced Closes:    {}", s.forced_closes);
    eprintln!("Avg Duration:     {:.1}h", s.avg_trade_duration_hours);
}

#[cfg(feature = "sqlite")]
fn run_step(config_path: &Path, now: Option<&str>) -> ExitCode {
    use crate::adapters::advisory_stub::TimeoutGate;
    use crate::adapters::log_notifier::LogNotifier;
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    use crate::domain::config_validation::load_live;
    use crate::domain::live::{LivePorts, run_once};
    use crate::domain::observation::{format_timestamp, parse_timestamp};

    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_live_config(&adapter) {
        return fail(e);
    }
    let live = match load_live(&adapter) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };
    let advisory = match load_advisory(&adapter) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };

    let now = match now {
        Some(raw) => match parse_timestamp(raw) {
            Some(ts) => ts,
            None => {
                eprintln!("error: invalid --now '{raw}', expected YYYY-MM-DD HH:MM:SS");
                return ExitCode::from(2);
            }
        },
        None => chrono::Utc::now().naive_utc(),
    };

    let store = match SqliteAdapter::from_config(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    if let Err(e) = store.initialize_schema() {
        return fail(e);
    }

    let data_dir = adapter
        .get_string("live", "data_dir")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| ".".to_string());
    let data_port = CsvAdapter::new(PathBuf::from(data_dir));
    let gate = TimeoutGate::new(gate_for(advisory.mode), advisory.timeout);
    let ports = LivePorts {
        data: &data_port,
        gate: &gate,
        store: &store,
        notifier: &LogNotifier,
    };

    match run_once(now, &live, &ports) {
        Ok(outcome) => {
            println!(
                "{} ratio={:.8} z={} signal={} state={}",
                format_timestamp(outcome.sample.timestamp),
                outcome.sample.ratio,
                outcome
                    .sample
                    .z
                    .map(|z| format!("{:.4}", z))
                    .unwrap_or_else(|| "n/a".to_string()),
                outcome.signal,
                outcome.state.kind()
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

#[cfg(not(feature = "sqlite"))]
fn run_step(_config_path: &Path, _now: Option<&str>) -> ExitCode {
    eprintln!("error: sqlite feature is required for step");
    ExitCode::from(1)
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let has_backtest = adapter.get_string("backtest", "initial_capital").is_some();
    let has_live = adapter.get_string("live", "capital").is_some();
    if !has_backtest && !has_live {
        return fail(PairtraderError::missing("backtest", "initial_capital"));
    }

    if has_backtest {
        if let Err(e) = validate_backtest_config(&adapter) {
            return fail(e);
        }
        eprintln!("  [backtest] ok");
    }
    if has_live {
        if let Err(e) = validate_live_config(&adapter) {
            return fail(e);
        }
        eprintln!("  [live] ok");
    }

    eprintln!("Config validated successfully");
    ExitCode::SUCCESS
}
