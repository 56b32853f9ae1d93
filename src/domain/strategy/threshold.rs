//! Turnover-band filter.

use super::{Decision, EntryRule};
use crate::domain::ohlcv::{DailyBar, IntradayBar};

/// Enters when the latest day's turnover lies within an inclusive band.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdFilter {
    pub min_turnover_pct: f64,
    pub max_turnover_pct: f64,
}

impl Default for ThresholdFilter {
    fn default() -> Self {
        Self {
            min_turnover_pct: 2.0,
            max_turnover_pct: 5.0,
        }
    }
}

impl ThresholdFilter {
    pub(crate) fn check(&self, daily: &[DailyBar], intraday: &[IntradayBar]) -> Result<(), Decision> {
        Decision::require(daily.len(), 1)?;
        Decision::require(intraday.len(), 1)?;

        let today = &daily[daily.len() - 1];
        if today.turnover < self.min_turnover_pct || today.turnover > self.max_turnover_pct {
            return Err(Decision::Pass);
        }
        Ok(())
    }
}

impl EntryRule for ThresholdFilter {
    fn evaluate(&self, daily: &[DailyBar], intraday: &[IntradayBar]) -> Decision {
        match self.check(daily, intraday) {
            Ok(()) => Decision::Enter,
            Err(decision) => decision,
        }
    }
}
