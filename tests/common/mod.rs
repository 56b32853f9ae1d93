#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tailtrader::domain::backtest::{BacktestConfig, BacktestContext};
use tailtrader::domain::error::TailtraderError;
use tailtrader::domain::execution::{ExecutionConfig, ExecutionPricer};
pub use tailtrader::domain::ohlcv::{DailyBar, IntradayBar};
pub use tailtrader::domain::price::Price;
use tailtrader::domain::strategy::{Strategy, ThresholdFilter};
use tailtrader::ports::data_port::DataPort;

pub struct MockDataPort {
    pub daily: HashMap<String, Vec<DailyBar>>,
    pub intraday: HashMap<(String, i32), Vec<IntradayBar>>,
    pub errors: HashMap<String, String>,
    pub intraday_errors: HashSet<(String, i32)>,
    pub panics: HashSet<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            daily: HashMap::new(),
            intraday: HashMap::new(),
            errors: HashMap::new(),
            intraday_errors: HashSet::new(),
            panics: HashSet::new(),
        }
    }

    pub fn with_daily(mut self, code: &str, bars: Vec<DailyBar>) -> Self {
        self.daily.insert(code.to_string(), bars);
        self
    }

    /// Partitions `bars` by calendar year.
    pub fn with_intraday(mut self, code: &str, bars: Vec<IntradayBar>) -> Self {
        for bar in bars {
            self.intraday
                .entry((code.to_string(), bar.time.year()))
                .or_default()
                .push(bar);
        }
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn with_panic(mut self, code: &str) -> Self {
        self.panics.insert(code.to_string());
        self
    }

    pub fn with_intraday_error(mut self, code: &str, year: i32) -> Self {
        self.intraday_errors.insert((code.to_string(), year));
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_daily_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, TailtraderError> {
        if self.panics.contains(code) {
            panic!("daily reader crashed on {code}");
        }
        if let Some(reason) = self.errors.get(code) {
            return Err(TailtraderError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .daily
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_intraday_year(
        &self,
        code: &str,
        year: i32,
    ) -> Result<Option<Vec<IntradayBar>>, TailtraderError> {
        if self.intraday_errors.contains(&(code.to_string(), year)) {
            return Err(TailtraderError::DataUnavailable {
                code: code.to_string(),
                reason: format!("partition {year} is corrupt"),
            });
        }
        Ok(self.intraday.get(&(code.to_string(), year)).cloned())
    }

    fn list_codes(&self) -> Result<Vec<String>, TailtraderError> {
        let mut codes: Vec<String> = self
            .daily
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        codes.sort();
        codes.dedup();
        Ok(codes)
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn at(d: &str, hm: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{d} {hm}:00"), "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn px(value: f64) -> Price {
    Price((value * 1000.0).round() as i64)
}

/// A flat daily bar at `close` with the given turnover percentage.
pub fn daily_bar(d: &str, close: f64, turnover: f64) -> DailyBar {
    DailyBar {
        date: date(d),
        open: px(close),
        high: px(close),
        low: px(close),
        close: px(close),
        volume: 100_000,
        turnover,
        shares: 1_000_000_000,
    }
}

pub fn minute_bar(d: &str, hm: &str, price: f64) -> IntradayBar {
    IntradayBar {
        time: at(d, hm),
        open: px(price),
        high: px(price),
        low: px(price),
        close: px(price),
        volume: 1_000,
    }
}

/// A flat session with bars at the morning sell trigger and the afternoon
/// buy trigger.
pub fn session(d: &str, price: f64) -> Vec<IntradayBar> {
    vec![
        minute_bar(d, "09:31", price),
        minute_bar(d, "10:00", price),
        minute_bar(d, "14:50", price),
        minute_bar(d, "15:00", price),
    ]
}

pub fn flat_market(days: &[(&str, f64, f64)]) -> (Vec<DailyBar>, Vec<IntradayBar>) {
    let daily = days
        .iter()
        .map(|(d, close, turnover)| daily_bar(d, *close, *turnover))
        .collect();
    let intraday = days
        .iter()
        .flat_map(|(d, close, _)| session(d, *close))
        .collect();
    (daily, intraday)
}

pub fn make_context(port: MockDataPort, strategy: Strategy) -> BacktestContext {
    BacktestContext {
        data: Arc::new(port),
        strategy,
        pricer: ExecutionPricer::new(ExecutionConfig::default()),
        config: BacktestConfig {
            start_date: date("2023-01-01"),
            end_date: date("2024-12-31"),
            workers: 4,
        },
    }
}

pub fn threshold_strategy() -> Strategy {
    Strategy::Threshold(ThresholdFilter::default())
}
