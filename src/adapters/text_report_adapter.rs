//! Plain-text console report.
//!
//! Money figures are per lot: a price difference in currency units times
//! `lot_size` shares.

use crate::domain::backtest::CodeState;
use crate::domain::error::TailtraderError;
use crate::domain::metrics::CodeResult;
use crate::domain::price::{MINOR_UNITS_PER_UNIT, Price};
use crate::ports::report_port::{ReportContext, ReportPort};
use std::fmt::Write;

pub const DEFAULT_LOT_SIZE: u32 = 100;

pub struct TextReportAdapter {
    lot_size: u32,
}

impl Default for TextReportAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_LOT_SIZE)
    }
}

impl TextReportAdapter {
    pub fn new(lot_size: u32) -> Self {
        Self {
            lot_size: lot_size.max(1),
        }
    }

    fn per_lot(&self, value: Price) -> String {
        format!("{:.2}", value.to_decimal() * f64::from(self.lot_size))
    }

    fn per_lot_minor(&self, minor: f64) -> String {
        let units = minor / MINOR_UNITS_PER_UNIT as f64;
        format!("{:.2}", units * f64::from(self.lot_size))
    }
}

impl ReportPort for TextReportAdapter {
    fn render(&self, ctx: &ReportContext<'_>) -> Result<String, TailtraderError> {
        render_text(self, ctx).map_err(|e| TailtraderError::Report {
            reason: e.to_string(),
        })
    }
}

fn render_text(
    adapter: &TextReportAdapter,
    ctx: &ReportContext<'_>,
) -> Result<String, std::fmt::Error> {
    let r = ctx.report;
    let mut out = String::new();

    writeln!(out, "==================== Backtest Report ====================")?;
    writeln!(out, "Strategy:        {}", ctx.strategy_name)?;
    writeln!(out, "Period:          {} to {}", ctx.start_date, ctx.end_date)?;
    writeln!(out, "Lot size:        {}", adapter.lot_size)?;
    writeln!(out, "Total trades:    {}", r.total_trades)?;

    if r.is_empty() {
        writeln!(out, "No trades.")?;
    } else {
        writeln!(
            out,
            "Win rate:        {:.2}% ({} won, {} lost, {} flat)",
            r.win_rate * 100.0,
            r.winning_trades,
            r.losing_trades,
            r.breakeven_trades
        )?;
        writeln!(out, "Total profit:    {} / lot", adapter.per_lot(r.total_profit))?;
        writeln!(out, "Average profit:  {} / lot", adapter.per_lot_minor(r.average_profit))?;
        if let Some(best) = r.max_profit {
            writeln!(out, "Best trade:      {} / lot", adapter.per_lot(best))?;
        }
        if let Some(worst) = r.max_loss {
            writeln!(out, "Worst trade:     {} / lot", adapter.per_lot(worst))?;
        }
        if r.profit_factor_is_unbounded() {
            writeln!(out, "Profit factor:   unbounded (no losses)")?;
        } else {
            writeln!(out, "Profit factor:   {:.2}", r.profit_factor)?;
        }
        writeln!(out, "Max drawdown:    {} / lot", adapter.per_lot(r.max_drawdown))?;
    }

    if !ctx.code_results.is_empty() {
        writeln!(out)?;
        render_code_table(&mut out, adapter, ctx.code_results)?;
    }

    let skipped: Vec<(&str, &str)> = ctx
        .outcomes
        .iter()
        .filter_map(|o| match &o.state {
            CodeState::Skipped { reason } => Some((o.code.as_str(), reason.as_str())),
            _ => None,
        })
        .collect();
    if !skipped.is_empty() {
        writeln!(out)?;
        writeln!(out, "Skipped codes ({}):", skipped.len())?;
        for (code, reason) in skipped {
            writeln!(out, "  {code}: {reason}")?;
        }
    }

    writeln!(out, "=========================================================")?;
    Ok(out)
}

fn render_code_table(
    out: &mut String,
    adapter: &TextReportAdapter,
    code_results: &[CodeResult],
) -> std::fmt::Result {
    writeln!(out, "{:<12} {:>7} {:>9} {:>14}", "Code", "Trades", "Win rate", "Profit/lot")?;
    for cr in code_results {
        writeln!(
            out,
            "{:<12} {:>7} {:>8.1}% {:>14}",
            cr.code,
            cr.total_trades,
            cr.win_rate * 100.0,
            adapter.per_lot(cr.total_profit)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::CodeOutcome;
    use crate::domain::metrics::PerformanceReport;
    use crate::domain::trade::Trade;
    use chrono::NaiveDate;

    fn trade(day: u32, entry: i64, exit: i64) -> Trade {
        let d = NaiveDate::from_ymd_opt(2024, 4, day).unwrap();
        Trade {
            code: "sh600000".into(),
            entry_time: d.and_hms_opt(14, 50, 0).unwrap(),
            entry_price: Price(entry),
            exit_time: d.succ_opt().unwrap().and_hms_opt(10, 0, 0).unwrap(),
            exit_price: Price(exit),
        }
    }

    fn render(trades: &[Trade], outcomes: &[CodeOutcome]) -> String {
        let report = PerformanceReport::compute(trades);
        let code_results = CodeResult::compute_per_code(trades);
        let ctx = ReportContext {
            strategy_name: "threshold",
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            report: &report,
            code_results: &code_results,
            outcomes,
            trades,
        };
        TextReportAdapter::default().render(&ctx).unwrap()
    }

    #[test]
    fn figures_are_scaled_per_lot() {
        let trades = vec![trade(1, 100_000, 105_000), trade(2, 105_000, 102_000)];
        let text = render(&trades, &[]);

        assert!(text.contains("Total trades:    2"));
        assert!(text.contains("Win rate:        50.00%"));
        assert!(text.contains("Total profit:    200.00 / lot"));
        assert!(text.contains("Average profit:  100.00 / lot"));
        assert!(text.contains("Best trade:      500.00 / lot"));
        assert!(text.contains("Worst trade:     -300.00 / lot"));
        assert!(text.contains("Profit factor:   1.67"));
        assert!(text.contains("Max drawdown:    300.00 / lot"));
        assert!(text.contains("sh600000"));
    }

    #[test]
    fn empty_run_reports_no_trades() {
        let outcomes = vec![CodeOutcome {
            code: "sz000001".into(),
            state: CodeState::Skipped {
                reason: "no data for sz000001".into(),
            },
        }];
        let text = render(&[], &outcomes);
        assert!(text.contains("Total trades:    0"));
        assert!(text.contains("No trades."));
        assert!(!text.contains("Profit factor"));
        assert!(text.contains("Skipped codes (1):"));
        assert!(text.contains("  sz000001: no data for sz000001"));
    }

    #[test]
    fn unbounded_profit_factor_is_labelled() {
        let text = render(&[trade(3, 10_000, 10_500)], &[]);
        assert!(text.contains("Profit factor:   unbounded (no losses)"));
    }
}
