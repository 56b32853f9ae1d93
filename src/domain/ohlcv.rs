//! Daily and intraday bar representations.

use crate::domain::price::Price;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: i64,
    /// Percentage of free float traded on the day.
    pub turnover: f64,
    /// Total outstanding shares.
    pub shares: i64,
}

impl DailyBar {
    /// shares * open, in minor units.
    pub fn market_cap(&self) -> i128 {
        self.shares as i128 * self.open.minor() as i128
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntradayBar {
    pub time: NaiveDateTime,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: i64,
}

impl IntradayBar {
    pub fn date(&self) -> NaiveDate {
        self.time.date()
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.time.time()
    }
}
