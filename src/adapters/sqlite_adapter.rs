//! SQLite position store.
//!
//! The live position is a single row (`id = 1`). `update_position` opens an
//! IMMEDIATE transaction before reading that row and keeps it open until the
//! new state and any closed trade are written, so a second writer blocks for
//! up to `busy_timeout_ms` and then fails with `Storage`. Trades and monitor
//! samples are append-only.

use crate::domain::error::PairtraderError;
use crate::domain::live::MonitorRecord;
use crate::domain::observation::{format_timestamp, parse_timestamp};
use crate::domain::position::{ExitReason, Position, PositionState, StateKind, Trade};
use crate::domain::signal::Direction;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::PositionStore;
use crate::ports::store_port::PositionWrite;
use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::time::Duration;
use tracing::debug;

const DEFAULT_POOL_SIZE: i64 = 4;
const DEFAULT_BUSY_TIMEOUT_MS: i64 = 5_000;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn storage_error(e: impl std::fmt::Display) -> PairtraderError {
    PairtraderError::Storage {
        reason: e.to_string(),
    }
}

fn conversion_error(column: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        reason.into(),
    )
}

fn read_timestamp(value: &str, column: usize) -> Result<NaiveDateTime, rusqlite::Error> {
    parse_timestamp(value)
        .ok_or_else(|| conversion_error(column, format!("invalid timestamp '{}'", value)))
}

fn read_direction(value: &str, column: usize) -> Result<Direction, rusqlite::Error> {
    Direction::parse(value)
        .ok_or_else(|| conversion_error(column, format!("invalid direction '{}'", value)))
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PairtraderError> {
        let db_path = config
            .get_string("sqlite", "path")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| PairtraderError::missing("sqlite", "path"))?;

        let pool_size = u32::try_from(config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE))
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                PairtraderError::invalid("sqlite", "pool_size", "pool_size must be a positive u32")
            })?;
        let busy_timeout_ms = u64::try_from(config.get_int(
            "sqlite",
            "busy_timeout_ms",
            DEFAULT_BUSY_TIMEOUT_MS,
        ))
        .map_err(|_| {
            PairtraderError::invalid(
                "sqlite",
                "busy_timeout_ms",
                "busy_timeout_ms must not be negative",
            )
        })?;
        let busy_timeout = Duration::from_millis(busy_timeout_ms);

        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(move |conn| conn.busy_timeout(busy_timeout));
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(storage_error)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, PairtraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(storage_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PairtraderError> {
        self.pool.get().map_err(storage_error)
    }

    pub fn initialize_schema(&self) -> Result<(), PairtraderError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS position_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                state TEXT NOT NULL,
                direction TEXT,
                entry_timestamp TEXT,
                entry_ratio REAL,
                entry_z REAL,
                notional_per_leg REAL,
                entry_cost REAL
            );
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_timestamp TEXT NOT NULL,
                exit_timestamp TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_ratio REAL NOT NULL,
                exit_ratio REAL NOT NULL,
                entry_z REAL NOT NULL,
                exit_z REAL NOT NULL,
                notional_per_leg REAL NOT NULL,
                gross_pnl REAL NOT NULL,
                total_cost REAL NOT NULL,
                net_pnl REAL NOT NULL,
                exit_reason TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS monitor (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                price_a REAL NOT NULL,
                price_b REAL NOT NULL,
                ratio REAL NOT NULL,
                mean REAL NOT NULL,
                stddev REAL NOT NULL,
                z REAL,
                signal TEXT NOT NULL,
                state TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_exit ON trades(exit_timestamp);
            CREATE INDEX IF NOT EXISTS idx_monitor_timestamp ON monitor(timestamp);",
        )
        .map_err(storage_error)?;
        Ok(())
    }

    /// Most recent trades first.
    pub fn query_trades(&self, limit: usize) -> Result<Vec<Trade>, PairtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT entry_timestamp, exit_timestamp, direction, entry_ratio, exit_ratio,
                        entry_z, exit_z, notional_per_leg, gross_pnl, total_cost, net_pnl,
                        exit_reason
                 FROM trades ORDER BY id DESC LIMIT ?1",
            )
            .map_err(storage_error)?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let entry: String = row.get(0)?;
                let exit: String = row.get(1)?;
                let direction: String = row.get(2)?;
                let reason: String = row.get(11)?;
                Ok(Trade {
                    entry_timestamp: read_timestamp(&entry, 0)?,
                    exit_timestamp: read_timestamp(&exit, 1)?,
                    direction: read_direction(&direction, 2)?,
                    entry_ratio: row.get(3)?,
                    exit_ratio: row.get(4)?,
                    entry_z: row.get(5)?,
                    exit_z: row.get(6)?,
                    notional_per_leg: row.get(7)?,
                    gross_pnl: row.get(8)?,
                    total_cost: row.get(9)?,
                    net_pnl: row.get(10)?,
                    exit_reason: ExitReason::parse(&reason).ok_or_else(|| {
                        conversion_error(11, format!("invalid exit reason '{}'", reason))
                    })?,
                })
            })
            .map_err(storage_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(storage_error)
    }

    pub fn monitor_count(&self) -> Result<usize, PairtraderError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM monitor", [], |row| row.get(0))
            .map_err(storage_error)?;
        Ok(count as usize)
    }
}

fn read_position(conn: &Connection) -> Result<PositionState, PairtraderError> {
    let row = conn
        .query_row(
            "SELECT state, direction, entry_timestamp, entry_ratio, entry_z,
                    notional_per_leg, entry_cost
             FROM position_state WHERE id = 1",
            [],
            |row| {
                let state: String = row.get(0)?;
                if state != StateKind::Open.to_string() {
                    return Ok(PositionState::Flat);
                }
                let direction: String = row.get(1)?;
                let entry: String = row.get(2)?;
                Ok(PositionState::Open(Position {
                    direction: read_direction(&direction, 1)?,
                    entry_timestamp: read_timestamp(&entry, 2)?,
                    entry_ratio: row.get(3)?,
                    entry_z: row.get(4)?,
                    notional_per_leg: row.get(5)?,
                    entry_cost: row.get(6)?,
                }))
            },
        )
        .optional()
        .map_err(storage_error)?;
    Ok(row.unwrap_or_default())
}

fn write_position(conn: &Connection, state: &PositionState) -> Result<(), PairtraderError> {
    let position = state.position();
    conn.execute(
        "INSERT OR REPLACE INTO position_state
            (id, state, direction, entry_timestamp, entry_ratio, entry_z,
             notional_per_leg, entry_cost)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            state.kind().to_string(),
            position.map(|p| p.direction.to_string()),
            position.map(|p| format_timestamp(p.entry_timestamp)),
            position.map(|p| p.entry_ratio),
            position.map(|p| p.entry_z),
            position.map(|p| p.notional_per_leg),
            position.map(|p| p.entry_cost),
        ],
    )
    .map_err(storage_error)?;
    Ok(())
}

fn insert_trade(conn: &Connection, trade: &Trade) -> Result<(), PairtraderError> {
    conn.execute(
        "INSERT INTO trades
            (entry_timestamp, exit_timestamp, direction, entry_ratio, exit_ratio,
             entry_z, exit_z, notional_per_leg, gross_pnl, total_cost, net_pnl,
             exit_reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            format_timestamp(trade.entry_timestamp),
            format_timestamp(trade.exit_timestamp),
            trade.direction.to_string(),
            trade.entry_ratio,
            trade.exit_ratio,
            trade.entry_z,
            trade.exit_z,
            trade.notional_per_leg,
            trade.gross_pnl,
            trade.total_cost,
            trade.net_pnl,
            trade.exit_reason.to_string(),
        ],
    )
    .map_err(storage_error)?;
    Ok(())
}

impl PositionStore for SqliteAdapter {
    fn load_position(&self) -> Result<PositionState, PairtraderError> {
        read_position(&*self.conn()?)
    }

    fn update_position(
        &self,
        update: &mut dyn FnMut(PositionState) -> Result<PositionWrite, PairtraderError>,
    ) -> Result<(), PairtraderError> {
        let mut conn = self.conn()?;
        // Dropping `tx` without commit rolls back and releases the lock.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_error)?;

        let write = update(read_position(&tx)?)?;
        if write.is_empty() {
            return Ok(());
        }
        if let Some(state) = &write.state {
            write_position(&tx, state)?;
        }
        if let Some(trade) = &write.trade {
            insert_trade(&tx, trade)?;
        }
        tx.commit().map_err(storage_error)?;

        debug!(
            state = ?write.state.as_ref().map(PositionState::kind),
            trade = write.trade.is_some(),
            "position updated"
        );
        Ok(())
    }

    fn append_monitor_sample(&self, record: &MonitorRecord) -> Result<(), PairtraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO monitor
                (timestamp, price_a, price_b, ratio, mean, stddev, z, signal, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                format_timestamp(record.timestamp),
                record.price_a,
                record.price_b,
                record.ratio,
                record.mean,
                record.stddev,
                record.z,
                record.signal.to_string(),
                record.state.to_string(),
            ],
        )
        .map_err(storage_error)?;
        Ok(())
    }
}
