//! Report rendering port.

use crate::domain::backtest::CodeOutcome;
use crate::domain::error::TailtraderError;
use crate::domain::metrics::{CodeResult, PerformanceReport};
use crate::domain::trade::Trade;
use chrono::NaiveDate;

/// Everything a renderer may show about one completed run.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub strategy_name: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub report: &'a PerformanceReport,
    pub code_results: &'a [CodeResult],
    pub outcomes: &'a [CodeOutcome],
    pub trades: &'a [Trade],
}

pub trait ReportPort {
    fn render(&self, context: &ReportContext<'_>) -> Result<String, TailtraderError>;
}
