//! CSV bar store.
//!
//! Layout under the root directory:
//! - `daily/<code>.csv`: `date,open,high,low,close,volume,turnover,shares`
//! - `intraday/<code>/<code>-<year>.csv`: `time,open,high,low,close,volume`
//!
//! Prices are decimal strings and are parsed exactly into minor units.

use crate::domain::error::TailtraderError;
use crate::domain::ohlcv::{DailyBar, IntradayBar};
use crate::domain::price::Price;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const INTRADAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvAdapter {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct DailyRow {
    date: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: i64,
    turnover: f64,
    shares: i64,
}

#[derive(Debug, Deserialize)]
struct IntradayRow {
    time: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: i64,
}

impl CsvAdapter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn daily_dir(&self) -> PathBuf {
        self.root.join("daily")
    }

    fn daily_path(&self, code: &str) -> PathBuf {
        self.daily_dir().join(format!("{code}.csv"))
    }

    fn intraday_path(&self, code: &str, year: i32) -> PathBuf {
        self.root
            .join("intraday")
            .join(code)
            .join(format!("{code}-{year}.csv"))
    }
}

fn parse_error(path: &Path, reason: impl std::fmt::Display) -> TailtraderError {
    TailtraderError::Database {
        reason: format!("{}: {}", path.display(), reason),
    }
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, TailtraderError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| parse_error(path, e))?;
    rdr.deserialize()
        .map(|row| row.map_err(|e| parse_error(path, e)))
        .collect()
}

impl DataPort for CsvAdapter {
    fn fetch_daily_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, TailtraderError> {
        let path = self.daily_path(code);
        if !path.exists() {
            return Err(TailtraderError::DataUnavailable {
                code: code.to_string(),
                reason: format!("{} not found", path.display()),
            });
        }

        let mut bars = Vec::new();
        for row in read_rows::<DailyRow>(&path)? {
            let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d")
                .map_err(|e| parse_error(&path, format!("invalid date '{}': {e}", row.date)))?;
            if date < start_date || date > end_date {
                continue;
            }
            bars.push(DailyBar {
                date,
                open: Price::parse_decimal(&row.open)?,
                high: Price::parse_decimal(&row.high)?,
                low: Price::parse_decimal(&row.low)?,
                close: Price::parse_decimal(&row.close)?,
                volume: row.volume,
                turnover: row.turnover,
                shares: row.shares,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
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

        let mut bars = Vec::new();
        for row in read_rows::<IntradayRow>(&path)? {
            let time = NaiveDateTime::parse_from_str(row.time.trim(), INTRADAY_TIME_FORMAT)
                .map_err(|e| parse_error(&path, format!("invalid time '{}': {e}", row.time)))?;
            bars.push(IntradayBar {
                time,
                open: Price::parse_decimal(&row.open)?,
                high: Price::parse_decimal(&row.high)?,
                low: Price::parse_decimal(&row.low)?,
                close: Price::parse_decimal(&row.close)?,
                volume: row.volume,
            });
        }

        bars.sort_by_key(|b| b.time);
        Ok(Some(bars))
    }

    fn list_codes(&self) -> Result<Vec<String>, TailtraderError> {
        let dir = self.daily_dir();
        let entries = fs::read_dir(&dir).map_err(|e| TailtraderError::Database {
            reason: format!("failed to read directory {}: {}", dir.display(), e),
        })?;

        let mut codes = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                codes.push(stem.to_string());
            }
        }

        codes.sort();
        Ok(codes)
    }
}

/// Write a daily series in the layout read by [`CsvAdapter`].
pub fn write_daily_csv(root: &Path, code: &str, bars: &[DailyBar]) -> Result<(), TailtraderError> {
    let dir = root.join("daily");
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{code}.csv"));
    let mut wtr = csv::Writer::from_path(&path).map_err(|e| parse_error(&path, e))?;
    wtr.write_record(["date", "open", "high", "low", "close", "volume", "turnover", "shares"])
        .map_err(|e| parse_error(&path, e))?;
    for bar in bars {
        wtr.write_record([
            bar.date.format("%Y-%m-%d").to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
            bar.turnover.to_string(),
            bar.shares.to_string(),
        ])
        .map_err(|e| parse_error(&path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write one year partition of intraday bars in the layout read by [`CsvAdapter`].
pub fn write_intraday_csv(
    root: &Path,
    code: &str,
    year: i32,
    bars: &[IntradayBar],
) -> Result<(), TailtraderError> {
    let dir = root.join("intraday").join(code);
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{code}-{year}.csv"));
    let mut wtr = csv::Writer::from_path(&path).map_err(|e| parse_error(&path, e))?;
    wtr.write_record(["time", "open", "high", "low", "close", "volume"])
        .map_err(|e| parse_error(&path, e))?;
    for bar in bars {
        wtr.write_record([
            bar.time.format(INTRADAY_TIME_FORMAT).to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])
        .map_err(|e| parse_error(&path, e))?;
    }
    wtr.flush()?;
    Ok(())
}
