//! Intraday trend filter layered on the turnover band.
//!
//! After the turnover check it requires, in order:
//! 1. market cap (shares * today's open) inside `[min_market_cap, max_market_cap]`
//! 2. the first bar at or after `cutoff_time` trading within
//!    `max_high_deviation_bp` of the day's high
//! 3. at least `min_above_ma_bp` of the last `lookback` closes at or above
//!    their trailing `ma_period` average
//! 4. a slow rise over the same window: first-to-last change inside
//!    `[min_rise_bp, max_rise_bp]` and a higher average at the end of the
//!    window than at its start
//!
//! Ratios are held in basis points and checked by cross-multiplication.

use super::threshold::ThresholdFilter;
use super::{Decision, EntryRule};
use crate::domain::ohlcv::{DailyBar, IntradayBar};
use crate::domain::price::Price;
use crate::domain::rolling::{at_or_above_average, moving_sums};
use chrono::NaiveTime;

const BP: i128 = 10_000;

/// Which windows the slow-rise check inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendWindow {
    /// Only the `lookback` bars ending at the latest bar.
    Latest,
    /// Every full window of the day; all of them must rise.
    Sliding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendFilter {
    pub threshold: ThresholdFilter,
    /// Minor units.
    pub min_market_cap: i128,
    /// Minor units.
    pub max_market_cap: i128,
    pub cutoff_time: NaiveTime,
    pub max_high_deviation_bp: i64,
    pub ma_period: usize,
    pub lookback: usize,
    pub min_above_ma_bp: i64,
    pub min_rise_bp: i64,
    pub max_rise_bp: i64,
    pub window: TrendWindow,
}

impl Default for TrendFilter {
    fn default() -> Self {
        Self {
            threshold: ThresholdFilter::default(),
            min_market_cap: 0,
            max_market_cap: i128::MAX,
            cutoff_time: NaiveTime::from_hms_opt(14, 40, 0).unwrap_or_default(),
            max_high_deviation_bp: 1_000,
            ma_period: 20,
            lookback: 20,
            min_above_ma_bp: 8_000,
            min_rise_bp: 30,
            max_rise_bp: 300,
            window: TrendWindow::Latest,
        }
    }
}

impl TrendFilter {
    /// Intraday bars needed for every sample in the window to have a full
    /// trailing average.
    pub fn required_bars(&self) -> usize {
        (self.lookback + self.ma_period).saturating_sub(1).max(1)
    }

    fn check(&self, daily: &[DailyBar], intraday: &[IntradayBar]) -> Result<(), Decision> {
        self.threshold.check(daily, intraday)?;
        let today = &daily[daily.len() - 1];

        let cap = today.market_cap();
        if cap < self.min_market_cap || cap > self.max_market_cap {
            return Err(Decision::Pass);
        }

        if !self.near_day_high(today, intraday) {
            return Err(Decision::Pass);
        }

        Decision::require(intraday.len(), self.required_bars())?;
        if self.lookback == 0 || self.ma_period == 0 {
            return Err(Decision::Pass);
        }

        let closes: Vec<Price> = intraday.iter().map(|bar| bar.close).collect();
        let sums = moving_sums(&closes, self.ma_period);
        let latest_start = closes.len() - self.lookback;

        let above = count_at_or_above(&closes, &sums, self.ma_period, latest_start, self.lookback);
        if (above as i128) * BP < self.min_above_ma_bp as i128 * self.lookback as i128 {
            return Err(Decision::Pass);
        }

        let rising = match self.window {
            TrendWindow::Latest => self.slow_rise(&closes, &sums, latest_start),
            TrendWindow::Sliding => (self.ma_period - 1..=latest_start)
                .all(|start| self.slow_rise(&closes, &sums, start)),
        };
        if !rising {
            return Err(Decision::Pass);
        }
        Ok(())
    }

    fn near_day_high(&self, today: &DailyBar, intraday: &[IntradayBar]) -> bool {
        let Some(bar) = intraday
            .iter()
            .find(|bar| bar.time_of_day() >= self.cutoff_time)
        else {
            return false;
        };
        let day_high = today.high.minor() as i128;
        if day_high <= 0 {
            return false;
        }
        let deviation = (today.high - bar.high).abs().minor() as i128;
        deviation * BP <= self.max_high_deviation_bp as i128 * day_high
    }

    fn slow_rise(&self, closes: &[Price], sums: &[Option<i64>], start: usize) -> bool {
        let end = start + self.lookback - 1;
        let first = closes[start].minor() as i128;
        if first <= 0 {
            return false;
        }
        let change = (closes[end] - closes[start]).minor() as i128;
        if change * BP < self.min_rise_bp as i128 * first
            || change * BP > self.max_rise_bp as i128 * first
        {
            return false;
        }
        match (sums[start], sums[end]) {
            (Some(at_start), Some(at_end)) => at_start < at_end,
            _ => false,
        }
    }
}

impl EntryRule for TrendFilter {
    fn evaluate(&self, daily: &[DailyBar], intraday: &[IntradayBar]) -> Decision {
        match self.check(daily, intraday) {
            Ok(()) => Decision::Enter,
            Err(decision) => decision,
        }
    }
}

fn count_at_or_above(
    closes: &[Price],
    sums: &[Option<i64>],
    period: usize,
    start: usize,
    len: usize,
) -> usize {
    (start..start + len)
        .filter(|&i| matches!(sums[i], Some(sum) if at_or_above_average(closes[i], sum, period)))
        .count()
}
