//! Per-instrument working set with a per-day intraday index.

use crate::domain::ohlcv::{DailyBar, IntradayBar};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct CodeData {
    pub code: String,
    pub daily: Vec<DailyBar>,
    pub intraday: Vec<IntradayBar>,
    pub date_index: HashMap<NaiveDate, Range<usize>>,
}

impl CodeData {
    /// `intraday` must already be sorted by timestamp.
    pub fn new(code: String, daily: Vec<DailyBar>, intraday: Vec<IntradayBar>) -> Self {
        let mut date_index: HashMap<NaiveDate, Range<usize>> = HashMap::new();
        let mut start = 0;
        for i in 1..=intraday.len() {
            if i == intraday.len() || intraday[i].date() != intraday[start].date() {
                date_index.insert(intraday[start].date(), start..i);
                start = i;
            }
        }
        Self {
            code,
            daily,
            intraday,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.daily.len()
    }

    /// The intraday bars of one calendar day, if any were fetched.
    pub fn intraday_for(&self, date: NaiveDate) -> Option<&[IntradayBar]> {
        self.date_index
            .get(&date)
            .map(|range| &self.intraday[range.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::Price;

    fn minute(date: &str, hms: (u32, u32, u32)) -> IntradayBar {
        IntradayBar {
            time: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .unwrap()
                .and_hms_opt(hms.0, hms.1, hms.2)
                .unwrap(),
            open: Price(1_000),
            high: Price(1_010),
            low: Price(990),
            close: Price(1_000),
            volume: 100,
        }
    }

    fn day(date: &str) -> DailyBar {
        DailyBar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: Price(1_000),
            high: Price(1_100),
            low: Price(900),
            close: Price(1_050),
            volume: 1_000,
            turnover: 3.0,
            shares: 1_000,
        }
    }

    #[test]
    fn index_groups_consecutive_days() {
        let intraday = vec![
            minute("2024-01-02", (9, 31, 0)),
            minute("2024-01-02", (9, 32, 0)),
            minute("2024-01-03", (9, 31, 0)),
            minute("2024-01-05", (9, 31, 0)),
            minute("2024-01-05", (14, 50, 0)),
        ];
        let cd = CodeData::new("sh600000".into(), vec![], intraday);

        assert_eq!(cd.date_index.len(), 3);
        let d = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(cd.intraday_for(d("2024-01-02")).unwrap().len(), 2);
        assert_eq!(cd.intraday_for(d("2024-01-03")).unwrap().len(), 1);
        assert_eq!(cd.intraday_for(d("2024-01-05")).unwrap().len(), 2);
        assert!(cd.intraday_for(d("2024-01-04")).is_none());
    }

    #[test]
    fn empty_intraday_has_no_days() {
        let cd = CodeData::new("sh600000".into(), vec![day("2024-01-02")], vec![]);
        assert!(cd.date_index.is_empty());
        assert_eq!(cd.bar_count(), 1);
    }
}
