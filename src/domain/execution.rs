//! Fill simulation: turns an entry or exit decision into a timestamped price.
//!
//! Buys fill at the high of the first intraday bar at or after `buy_time`
//! plus one tick; sells at the low of the first bar at or after `sell_time`
//! minus one tick. Without such a bar the daily high (buy) or low (sell) is
//! used. The `RunningLow` sell policy instead tracks the lowest low seen up
//! to `sell_time`.

use chrono::{NaiveDateTime, NaiveTime};

use super::ohlcv::{DailyBar, IntradayBar};
use super::price::Price;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellPolicy {
    /// Trigger bar's low minus a tick, else the daily low.
    Trigger,
    /// The trigger bar's low if that exact time is seen, else the running
    /// minimum low before it.
    RunningLow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub buy_time: NaiveTime,
    pub sell_time: NaiveTime,
    pub tick: Price,
    pub sell_policy: SellPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            buy_time: NaiveTime::from_hms_opt(14, 50, 0).unwrap_or_default(),
            sell_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
            tick: Price::TICK,
            sell_policy: SellPolicy::Trigger,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub time: NaiveDateTime,
    pub price: Price,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPricer {
    config: ExecutionConfig,
}

impl ExecutionPricer {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn price(&self, side: Side, daily: &DailyBar, intraday: &[IntradayBar]) -> Fill {
        match side {
            Side::Buy => self.entry(daily, intraday),
            Side::Sell => self.exit(daily, intraday),
        }
    }

    pub fn entry(&self, daily: &DailyBar, intraday: &[IntradayBar]) -> Fill {
        match first_at_or_after(intraday, self.config.buy_time) {
            Some(bar) => Fill {
                time: bar.time,
                price: bar.high + self.config.tick,
            },
            None => Fill {
                time: daily.date.and_time(self.config.buy_time),
                price: daily.high,
            },
        }
    }

    pub fn exit(&self, daily: &DailyBar, intraday: &[IntradayBar]) -> Fill {
        match self.config.sell_policy {
            SellPolicy::Trigger => match first_at_or_after(intraday, self.config.sell_time) {
                Some(bar) => Fill {
                    time: bar.time,
                    price: bar.low - self.config.tick,
                },
                None => self.daily_low(daily),
            },
            SellPolicy::RunningLow => self.running_low(daily, intraday),
        }
    }

    fn running_low(&self, daily: &DailyBar, intraday: &[IntradayBar]) -> Fill {
        let mut worst: Option<Fill> = None;
        for bar in intraday {
            let at = bar.time_of_day();
            if at > self.config.sell_time {
                break;
            }
            if at == self.config.sell_time {
                return Fill {
                    time: bar.time,
                    price: bar.low,
                };
            }
            if worst.is_none_or(|w| bar.low < w.price) {
                worst = Some(Fill {
                    time: bar.time,
                    price: bar.low,
                });
            }
        }
        worst.unwrap_or_else(|| self.daily_low(daily))
    }

    fn daily_low(&self, daily: &DailyBar) -> Fill {
        Fill {
            time: daily.date.and_time(self.config.sell_time),
            price: daily.low,
        }
    }
}

fn first_at_or_after(intraday: &[IntradayBar], trigger: NaiveTime) -> Option<&IntradayBar> {
    intraday.iter().find(|bar| bar.time_of_day() >= trigger)
}
