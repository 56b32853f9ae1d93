//! Bar repository port.

use crate::domain::error::TailtraderError;
use crate::domain::ohlcv::{DailyBar, IntradayBar};
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily bars in `[start_date, end_date]`, ascending by date.
    fn fetch_daily_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, TailtraderError>;

    /// All intraday bars stored for one calendar year, or `None` when no
    /// partition exists for that year.
    fn fetch_intraday_year(
        &self,
        code: &str,
        year: i32,
    ) -> Result<Option<Vec<IntradayBar>>, TailtraderError>;

    fn list_codes(&self) -> Result<Vec<String>, TailtraderError>;
}
