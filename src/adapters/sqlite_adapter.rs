//! SQLite bar store.
//!
//! Daily bars live in one database behind a connection pool. Intraday bars
//! are kept in one database file per code and year at
//! `<intraday_dir>/<code>/<code>-<year>.db`, opened read-only on demand.
//! All prices are stored as integer minor units.

use crate::domain::error::TailtraderError;
use crate::domain::ohlcv::{DailyBar, IntradayBar};
use crate::domain::price::Price;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags, params};
use std::fs;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DAILY_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS daily (
        code TEXT NOT NULL,
        date TEXT NOT NULL,
        open INTEGER NOT NULL,
        high INTEGER NOT NULL,
        low INTEGER NOT NULL,
        close INTEGER NOT NULL,
        volume INTEGER NOT NULL,
        turnover REAL NOT NULL,
        shares INTEGER NOT NULL,
        PRIMARY KEY (code, date)
    );
    CREATE INDEX IF NOT EXISTS idx_daily_date ON daily(date);";

const INTRADAY_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS intraday (
        time TEXT PRIMARY KEY,
        open INTEGER NOT NULL,
        high INTEGER NOT NULL,
        low INTEGER NOT NULL,
        close INTEGER NOT NULL,
        volume INTEGER NOT NULL
    );";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
    intraday_dir: PathBuf,
}

fn pool_err(e: r2d2::Error) -> TailtraderError {
    TailtraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> TailtraderError {
    TailtraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(column: usize, e: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

impl SqliteAdapter {
    /// `[data] daily_db` is the daily database, `[data] path` the intraday
    /// directory, `[data] pool_size` the connection pool size (default 4).
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TailtraderError> {
        let missing = |key: &str| TailtraderError::ConfigMissing {
            section: "data".into(),
            key: key.into(),
        };
        let daily_db = config
            .get_string("data", "daily_db")
            .ok_or_else(|| missing("daily_db"))?;
        let intraday_dir = config.get_string("data", "path").ok_or_else(|| missing("path"))?;
        let pool_size = config.get_usize("data", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&daily_db);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        tracing::debug!(
            daily_db = %daily_db,
            intraday_dir = %intraday_dir,
            pool_size,
            "opened sqlite store"
        );
        Ok(Self {
            pool,
            intraday_dir: PathBuf::from(intraday_dir),
        })
    }

    pub fn in_memory(intraday_dir: PathBuf) -> Result<Self, TailtraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        Ok(Self { pool, intraday_dir })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TailtraderError> {
        self.pool.get().map_err(pool_err)
    }

    fn intraday_path(&self, code: &str, year: i32) -> PathBuf {
        self.intraday_dir
            .join(code)
            .join(format!("{code}-{year}.db"))
    }

    pub fn initialize_schema(&self) -> Result<(), TailtraderError> {
        self.conn()?.execute_batch(DAILY_SCHEMA).map_err(query_err)
    }

    pub fn insert_daily_bars(&self, code: &str, bars: &[DailyBar]) -> Result<(), TailtraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO daily
                 (code, date, open, high, low, close, volume, turnover, shares)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    code,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open.minor(),
                    bar.high.minor(),
                    bar.low.minor(),
                    bar.close.minor(),
                    bar.volume,
                    bar.turnover,
                    bar.shares
                ],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    /// Create or extend the partition file for `code` and `year`.
    pub fn write_intraday_year(
        &self,
        code: &str,
        year: i32,
        bars: &[IntradayBar],
    ) -> Result<(), TailtraderError> {
        let path = self.intraday_path(code, year);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(&path).map_err(query_err)?;
        conn.execute_batch(INTRADAY_SCHEMA).map_err(query_err)?;

        let tx = conn.transaction().map_err(query_err)?;
        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO intraday (time, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    bar.time.format(TIME_FORMAT).to_string(),
                    bar.open.minor(),
                    bar.high.minor(),
                    bar.low.minor(),
                    bar.close.minor(),
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }
}

fn read_intraday(path: &Path) -> Result<Vec<IntradayBar>, TailtraderError> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(query_err)?;
    let mut stmt = conn
        .prepare("SELECT time, open, high, low, close, volume FROM intraday ORDER BY time ASC")
        .map_err(query_err)?;

    let rows = stmt
        .query_map([], |row| {
            let time_str: String = row.get(0)?;
            let time = NaiveDateTime::parse_from_str(&time_str, TIME_FORMAT)
                .map_err(|e| conversion_err(0, e))?;
            Ok(IntradayBar {
                time,
                open: Price(row.get(1)?),
                high: Price(row.get(2)?),
                low: Price(row.get(3)?),
                close: Price(row.get(4)?),
                volume: row.get(5)?,
            })
        })
        .map_err(query_err)?;

    rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
}

impl DataPort for SqliteAdapter {
    fn fetch_daily_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, TailtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume, turnover, shares
                 FROM daily
                 WHERE code = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    code,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let date_str: String = row.get(0)?;
                    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                        .map_err(|e| conversion_err(0, e))?;
                    Ok(DailyBar {
                        date,
                        open: Price(row.get(1)?),
                        high: Price(row.get(2)?),
                        low: Price(row.get(3)?),
                        close: Price(row.get(4)?),
                        volume: row.get(5)?,
                        turnover: row.get(6)?,
                        shares: row.get(7)?,
                    })
                },
            )
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn fetch_intraday_year(
        &self,
        code: &str,
        year: i32,
    ) -> Result<Option<Vec<IntradayBar>>, TailtraderError> {
        let path = self.intraday_path(code, year);
        if !path.exists() {
            return Ok(None);
        }
        read_intraday(&path).map(Some)
    }

    fn list_codes(&self) -> Result<Vec<String>, TailtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT code FROM daily ORDER BY code")
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}
