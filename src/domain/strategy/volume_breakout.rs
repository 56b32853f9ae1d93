//! Daily volume-breakout rule.
//!
//! Evaluated at the latest bar `i`; all four conditions must hold and the
//! first failure ends the evaluation:
//! - volume surge: `V[i] >= volume_ratio * V[i-1]`
//! - new local high: `C[i] > C[i-1]`, `H[i] > C[i]`, `H[i] == HHV(H, high_window)`
//! - compressed base: `LLV(L, base_window) >= base_floor * HHV(H, base_window)`,
//!   both over the window ending at `i-1`
//! - support holds: `LLV(L, support_short) > LLV(L, support_long)`

use super::{Decision, EntryRule};
use crate::domain::ohlcv::{DailyBar, IntradayBar};
use crate::domain::price::Price;
use crate::domain::rolling::{highest, lowest};

const BP: i128 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeBreakout {
    pub volume_ratio_bp: i64,
    pub high_window: usize,
    pub base_window: usize,
    pub base_floor_bp: i64,
    pub support_short: usize,
    pub support_long: usize,
}

impl Default for VolumeBreakout {
    fn default() -> Self {
        Self {
            volume_ratio_bp: 29_000,
            high_window: 6,
            base_window: 10,
            base_floor_bp: 8_000,
            support_short: 5,
            support_long: 20,
        }
    }
}

impl VolumeBreakout {
    pub fn min_history(&self) -> usize {
        [
            self.support_long,
            self.support_short,
            self.base_window + 1,
            self.high_window,
            2,
        ]
        .into_iter()
        .max()
        .unwrap_or(2)
    }

    pub fn volume_surge(&self, daily: &[DailyBar], i: usize) -> bool {
        if i == 0 || i >= daily.len() {
            return false;
        }
        let reference = daily[i - 1].volume as i128;
        if reference <= 0 {
            return false;
        }
        daily[i].volume as i128 * BP >= self.volume_ratio_bp as i128 * reference
    }

    pub fn new_local_high(&self, daily: &[DailyBar], i: usize) -> bool {
        if i == 0 || i >= daily.len() {
            return false;
        }
        let today = &daily[i];
        if today.close <= daily[i - 1].close || today.high <= today.close {
            return false;
        }
        let highs = column(daily, |bar| bar.high);
        let window = self.high_window.min(i + 1);
        highest(&highs, i, window) == Some(today.high)
    }

    pub fn compressed_base(&self, daily: &[DailyBar], i: usize) -> bool {
        if i == 0 || i >= daily.len() {
            return false;
        }
        let highs = column(daily, |bar| bar.high);
        let lows = column(daily, |bar| bar.low);
        match (
            lowest(&lows, i - 1, self.base_window),
            highest(&highs, i - 1, self.base_window),
        ) {
            (Some(floor), Some(ceiling)) => {
                floor.minor() as i128 * BP >= self.base_floor_bp as i128 * ceiling.minor() as i128
            }
            _ => false,
        }
    }

    pub fn holds_support(&self, daily: &[DailyBar], i: usize) -> bool {
        let lows = column(daily, |bar| bar.low);
        match (
            lowest(&lows, i, self.support_short),
            lowest(&lows, i, self.support_long),
        ) {
            (Some(recent), Some(deeper)) => recent > deeper,
            _ => false,
        }
    }
}

impl EntryRule for VolumeBreakout {
    fn evaluate(&self, daily: &[DailyBar], _intraday: &[IntradayBar]) -> Decision {
        if let Err(decision) = Decision::require(daily.len(), self.min_history()) {
            return decision;
        }
        let i = daily.len() - 1;
        let fires = self.volume_surge(daily, i)
            && self.new_local_high(daily, i)
            && self.compressed_base(daily, i)
            && self.holds_support(daily, i);
        if fires { Decision::Enter } else { Decision::Pass }
    }
}

fn column(daily: &[DailyBar], field: impl Fn(&DailyBar) -> Price) -> Vec<Price> {
    daily.iter().map(field).collect()
}
