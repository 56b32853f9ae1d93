//! Simulated round-trip trades.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::execution::Fill;
use super::price::Price;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trade {
    pub code: String,
    pub entry_time: NaiveDateTime,
    pub entry_price: Price,
    pub exit_time: NaiveDateTime,
    pub exit_price: Price,
}

impl Trade {
    /// Pair an entry and exit fill. `None` if the exit precedes the entry.
    pub fn from_fills(code: &str, entry: Fill, exit: Fill) -> Option<Self> {
        if exit.time < entry.time {
            return None;
        }
        Some(Self {
            code: code.to_string(),
            entry_time: entry.time,
            entry_price: entry.price,
            exit_time: exit.time,
            exit_price: exit.price,
        })
    }

    pub fn profit(&self) -> Price {
        self.exit_price - self.entry_price
    }
}
