//! Rolling-window helpers shared by the strategy rules.
//!
//! Window sums stay in integer minor units; a moving average is compared by
//! cross-multiplying with the window length instead of dividing.

use crate::domain::price::Price;
use std::collections::VecDeque;

/// Trailing sum over the last `period` values, updated in O(1) per push.
#[derive(Debug, Clone)]
pub struct RollingSum {
    period: usize,
    window: VecDeque<i64>,
    sum: i64,
}

impl RollingSum {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            sum: 0,
        }
    }

    pub fn push(&mut self, value: i64) {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.period > 0 && self.window.len() == self.period
    }

    pub fn sum(&self) -> i64 {
        self.sum
    }
}

/// Trailing moving-average sums of `closes`, one per index; `None` until the
/// window is full.
pub fn moving_sums(closes: &[Price], period: usize) -> Vec<Option<i64>> {
    let mut rolling = RollingSum::new(period);
    closes
        .iter()
        .map(|close| {
            rolling.push(close.minor());
            rolling.is_full().then(|| rolling.sum())
        })
        .collect()
}

/// `value >= sum / period`, without dividing.
pub fn at_or_above_average(value: Price, sum: i64, period: usize) -> bool {
    value.minor() as i128 * period as i128 >= sum as i128
}

/// Highest value over the `n` entries ending at `end` (inclusive).
pub fn highest(values: &[Price], end: usize, n: usize) -> Option<Price> {
    window(values, end, n).and_then(|w| w.iter().copied().max())
}

/// Lowest value over the `n` entries ending at `end` (inclusive).
pub fn lowest(values: &[Price], end: usize, n: usize) -> Option<Price> {
    window(values, end, n).and_then(|w| w.iter().copied().min())
}

fn window(values: &[Price], end: usize, n: usize) -> Option<&[Price]> {
    if n == 0 || end >= values.len() || end + 1 < n {
        return None;
    }
    Some(&values[end + 1 - n..=end])
}
