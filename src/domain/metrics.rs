//! Performance statistics over a collection of simulated trades.

use super::price::Price;
use super::trade::Trade;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub win_rate: f64,
    pub total_profit: Price,
    /// Mean profit per trade in minor units.
    pub average_profit: f64,
    pub max_profit: Option<Price>,
    pub max_loss: Option<Price>,
    pub gross_profit: Price,
    pub gross_loss: Price,
    /// `f64::INFINITY` when there are gains and no losses.
    #[serde(serialize_with = "serialize_profit_factor")]
    pub profit_factor: f64,
    pub max_drawdown: Price,
    pub equity_curve: Vec<Price>,
}

impl PerformanceReport {
    pub fn compute(trades: &[Trade]) -> Self {
        let sorted = sort_chronologically(trades);
        let equity_curve = build_equity_curve(&sorted);
        let max_drawdown = max_drawdown(&equity_curve);

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut breakeven_trades = 0usize;
        let mut gross_profit = Price::ZERO;
        let mut gross_loss = Price::ZERO;
        let mut max_profit: Option<Price> = None;
        let mut max_loss: Option<Price> = None;

        for trade in &sorted {
            let profit = trade.profit();
            if profit.is_positive() {
                winning_trades += 1;
                gross_profit += profit;
            } else {
                if profit < Price::ZERO {
                    losing_trades += 1;
                } else {
                    breakeven_trades += 1;
                }
                gross_loss += profit.abs();
            }
            max_profit = Some(max_profit.map_or(profit, |m| m.max(profit)));
            max_loss = Some(max_loss.map_or(profit, |m| m.min(profit)));
        }

        let total_trades = sorted.len();
        let total_profit: Price = sorted.iter().map(Trade::profit).sum();

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let average_profit = if total_trades > 0 {
            total_profit.minor() as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if gross_loss != Price::ZERO {
            gross_profit.minor() as f64 / gross_loss.minor() as f64
        } else if gross_profit.is_positive() {
            f64::INFINITY
        } else {
            0.0
        };

        PerformanceReport {
            total_trades,
            winning_trades,
            losing_trades,
            breakeven_trades,
            win_rate,
            total_profit,
            average_profit,
            max_profit,
            max_loss,
            gross_profit,
            gross_loss,
            profit_factor,
            max_drawdown,
            equity_curve,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_trades == 0
    }

    pub fn profit_factor_is_unbounded(&self) -> bool {
        self.profit_factor.is_infinite()
    }
}

/// JSON has no infinity; the unbounded factor is written as `null`.
fn serialize_profit_factor<S: serde::Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        s.serialize_f64(*value)
    } else {
        s.serialize_none()
    }
}

/// Stable sort by entry time; equal timestamps keep their input order.
pub fn sort_chronologically(trades: &[Trade]) -> Vec<Trade> {
    let mut sorted = trades.to_vec();
    sorted.sort_by_key(|t| t.entry_time);
    sorted
}

/// Cumulative profit, starting at zero, one sample per trade in the given order.
pub fn build_equity_curve(trades: &[Trade]) -> Vec<Price> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut equity = Price::ZERO;
    curve.push(equity);
    for trade in trades {
        equity += trade.profit();
        curve.push(equity);
    }
    curve
}

/// Largest peak-to-trough decline over the curve, in minor units.
pub fn max_drawdown(curve: &[Price]) -> Price {
    let mut peak: Option<Price> = None;
    let mut worst = Price::ZERO;
    for &equity in curve {
        let top = peak.map_or(equity, |p| p.max(equity));
        peak = Some(top);
        let drawdown = top - equity;
        if drawdown > worst {
            worst = drawdown;
        }
    }
    worst
}

/// Per-instrument summary line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeResult {
    pub code: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub win_rate: f64,
    pub total_profit: Price,
}

impl CodeResult {
    /// One entry per code that traded, sorted by code.
    pub fn compute_per_code(trades: &[Trade]) -> Vec<CodeResult> {
        let mut by_code: BTreeMap<&str, (usize, usize, Price)> = BTreeMap::new();
        for trade in trades {
            let entry = by_code.entry(trade.code.as_str()).or_insert((0, 0, Price::ZERO));
            let profit = trade.profit();
            entry.0 += 1;
            if profit.is_positive() {
                entry.1 += 1;
            }
            entry.2 += profit;
        }

        by_code
            .into_iter()
            .map(|(code, (total, wins, profit))| CodeResult {
                code: code.to_string(),
                total_trades: total,
                winning_trades: wins,
                win_rate: wins as f64 / total as f64,
                total_profit: profit,
            })
            .collect()
    }
}
