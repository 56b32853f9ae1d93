//! JSON report carrying every raw figure of a run.
//!
//! Prices are integer minor units, exactly as computed.

use crate::domain::backtest::CodeOutcome;
use crate::domain::error::TailtraderError;
use crate::domain::metrics::{CodeResult, PerformanceReport, sort_chronologically};
use crate::domain::price::MINOR_UNITS_PER_UNIT;
use crate::domain::trade::Trade;
use crate::ports::report_port::{ReportContext, ReportPort};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Default)]
pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    strategy: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    minor_units_per_unit: i64,
    summary: &'a PerformanceReport,
    codes: &'a [CodeResult],
    outcomes: &'a [CodeOutcome],
    trades: Vec<Trade>,
}

impl ReportPort for JsonReportAdapter {
    fn render(&self, ctx: &ReportContext<'_>) -> Result<String, TailtraderError> {
        let doc = JsonReport {
            strategy: ctx.strategy_name,
            start_date: ctx.start_date,
            end_date: ctx.end_date,
            minor_units_per_unit: MINOR_UNITS_PER_UNIT,
            summary: ctx.report,
            codes: ctx.code_results,
            outcomes: ctx.outcomes,
            trades: sort_chronologically(ctx.trades),
        };
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&doc)
        } else {
            serde_json::to_string(&doc)
        };
        rendered.map_err(|e| TailtraderError::Report {
            reason: e.to_string(),
        })
    }
}
