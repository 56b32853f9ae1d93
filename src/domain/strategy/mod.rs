//! Entry rules and the configurable strategy that selects one of them.
//!
//! Every rule implements [`EntryRule`]: a pure evaluation of the daily
//! history up to and including the decision day plus that day's intraday
//! bars. Rules never mutate their inputs and hold no per-run state, so one
//! value is shared by all workers.

pub mod threshold;
pub mod trend;
pub mod volume_breakout;

use crate::domain::ohlcv::{DailyBar, IntradayBar};

pub use threshold::ThresholdFilter;
pub use trend::{TrendFilter, TrendWindow};
pub use volume_breakout::VolumeBreakout;

/// Outcome of evaluating an entry rule on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Enter,
    Pass,
    /// The rule needs `minimum` bars and only `bars` were available.
    InsufficientHistory { bars: usize, minimum: usize },
}

impl Decision {
    pub fn fires(self) -> bool {
        matches!(self, Decision::Enter)
    }

    pub(crate) fn require(bars: usize, minimum: usize) -> Result<(), Decision> {
        if bars < minimum {
            Err(Decision::InsufficientHistory { bars, minimum })
        } else {
            Ok(())
        }
    }
}

pub trait EntryRule: Send + Sync {
    fn evaluate(&self, daily: &[DailyBar], intraday: &[IntradayBar]) -> Decision;

    fn signal(&self, daily: &[DailyBar], intraday: &[IntradayBar]) -> bool {
        self.evaluate(daily, intraday).fires()
    }
}

/// The rule set chosen by configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Threshold(ThresholdFilter),
    Trend(TrendFilter),
    VolumeBreakout(VolumeBreakout),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Threshold(_) => "threshold",
            Strategy::Trend(_) => "trend",
            Strategy::VolumeBreakout(_) => "volume_breakout",
        }
    }
}

impl EntryRule for Strategy {
    fn evaluate(&self, daily: &[DailyBar], intraday: &[IntradayBar]) -> Decision {
        match self {
            Strategy::Threshold(rule) => rule.evaluate(daily, intraday),
            Strategy::Trend(rule) => rule.evaluate(daily, intraday),
            Strategy::VolumeBreakout(rule) => rule.evaluate(daily, intraday),
        }
    }
}
