//! Backtest orchestration.
//!
//! Codes are processed on a dedicated worker pool. Each worker fetches one
//! instrument's bars, walks its daily history and materializes a trade for
//! every day the strategy enters on, pricing the entry from that day's
//! intraday bars and the exit from the next day's. A failure for one code
//! marks it skipped; it never aborts the run.

use super::code_data::CodeData;
use super::error::TailtraderError;
use super::execution::{ExecutionPricer, Side};
use super::ohlcv::{DailyBar, IntradayBar};
use super::strategy::{EntryRule, Strategy};
use super::trade::Trade;
use crate::ports::data_port::DataPort;
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub workers: usize,
}

impl BacktestConfig {
    pub const DEFAULT_WORKERS: usize = 10;

    pub fn validate(&self) -> Result<(), TailtraderError> {
        if self.start_date > self.end_date {
            return Err(TailtraderError::config_invalid(
                "backtest",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
        if self.workers == 0 {
            return Err(TailtraderError::config_invalid(
                "backtest",
                "workers",
                "workers must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Per-code lifecycle: `Pending -> Fetching -> Evaluating -> Done`, or
/// `Skipped` when the bars cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CodeState {
    Pending,
    Fetching,
    Evaluating,
    Done { trades: usize },
    Skipped { reason: String },
}

impl CodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CodeState::Done { .. } | CodeState::Skipped { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeOutcome {
    pub code: String,
    #[serde(flatten)]
    pub state: CodeState,
}

#[derive(Debug, Clone, Default)]
pub struct BacktestResult {
    /// In worker completion order; the analyzer re-sorts them.
    pub trades: Vec<Trade>,
    /// One per requested code, in request order.
    pub outcomes: Vec<CodeOutcome>,
}

impl BacktestResult {
    pub fn skipped(&self) -> impl Iterator<Item = &CodeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, CodeState::Skipped { .. }))
    }

    pub fn done_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, CodeState::Done { .. }))
            .count()
    }
}

/// Collaborators for one backtester, built before the first run.
#[derive(Clone)]
pub struct BacktestContext {
    pub data: Arc<dyn DataPort + Send + Sync>,
    pub strategy: Strategy,
    pub pricer: ExecutionPricer,
    pub config: BacktestConfig,
}

pub struct Backtester {
    context: BacktestContext,
    pool: rayon::ThreadPool,
}

impl Backtester {
    pub fn new(context: BacktestContext) -> Result<Self, TailtraderError> {
        context.config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(context.config.workers)
            .thread_name(|i| format!("tailtrader-worker-{i}"))
            .build()
            .map_err(|e| TailtraderError::config_invalid("backtest", "workers", e.to_string()))?;
        Ok(Self { context, pool })
    }

    pub fn context(&self) -> &BacktestContext {
        &self.context
    }

    pub fn run(&self, codes: &[String]) -> BacktestResult {
        let config = &self.context.config;
        tracing::info!(
            codes = codes.len(),
            workers = config.workers,
            strategy = self.context.strategy.name(),
            start = %config.start_date,
            end = %config.end_date,
            "starting backtest"
        );

        let trades: Mutex<Vec<Trade>> = Mutex::new(Vec::new());
        let outcomes: Vec<CodeOutcome> = self.pool.install(|| {
            codes
                .par_iter()
                .map(|code| CodeOutcome {
                    code: code.clone(),
                    state: self.run_code(code, &trades),
                })
                .collect()
        });

        let trades = trades.into_inner().unwrap_or_else(|e| e.into_inner());
        let result = BacktestResult { trades, outcomes };
        tracing::info!(
            trades = result.trades.len(),
            done = result.done_count(),
            skipped = result.skipped().count(),
            "backtest finished"
        );
        result
    }

    fn run_code(&self, code: &str, trades: &Mutex<Vec<Trade>>) -> CodeState {
        tracing::debug!(code, state = ?CodeState::Pending, "code state");
        match panic::catch_unwind(AssertUnwindSafe(|| self.process_code(code, trades))) {
            Ok(state) => state,
            Err(payload) => {
                let reason = panic_reason(code, payload.as_ref());
                tracing::error!(code, %reason, "worker panicked");
                CodeState::Skipped { reason }
            }
        }
    }

    fn process_code(&self, code: &str, trades: &Mutex<Vec<Trade>>) -> CodeState {
        tracing::debug!(code, state = ?CodeState::Fetching, "code state");
        let data = match self.load(code) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(code, error = %e, "skipping code");
                return CodeState::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        tracing::debug!(code, state = ?CodeState::Evaluating, bars = data.bar_count(), "code state");
        let produced = evaluate_code(&self.context.strategy, &self.context.pricer, &data);
        let count = produced.len();
        lock(trades).extend(produced);

        let state = CodeState::Done { trades: count };
        tracing::debug!(code, state = ?state, "code state");
        state
    }

    fn load(&self, code: &str) -> Result<CodeData, TailtraderError> {
        let config = &self.context.config;
        let daily = self
            .context
            .data
            .fetch_daily_bars(code, config.start_date, config.end_date)?;
        if daily.is_empty() {
            return Err(TailtraderError::NoData {
                code: code.to_string(),
            });
        }
        check_daily_order(code, &daily)?;
        let intraday = fetch_intraday_bars(
            self.context.data.as_ref(),
            code,
            config.start_date,
            config.end_date,
        );
        Ok(CodeData::new(code.to_string(), daily, intraday))
    }

    /// Codes whose strategy enters on `date`, in input order. History runs
    /// from the configured start date up to and including `date`.
    pub fn screen(&self, codes: &[String], date: NaiveDate) -> Vec<String> {
        let start = self.context.config.start_date.min(date);
        tracing::info!(codes = codes.len(), %date, "screening");

        self.pool.install(|| {
            codes
                .par_iter()
                .filter(|code| self.screen_code(code, start, date))
                .cloned()
                .collect()
        })
    }

    fn screen_code(&self, code: &str, start: NaiveDate, date: NaiveDate) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| self.screen_one(code, start, date))) {
            Ok(picked) => picked,
            Err(payload) => {
                let reason = panic_reason(code, payload.as_ref());
                tracing::error!(code, %reason, "worker panicked");
                false
            }
        }
    }

    fn screen_one(&self, code: &str, start: NaiveDate, date: NaiveDate) -> bool {
        let daily = match self
            .context
            .data
            .fetch_daily_bars(code, start, date)
            .and_then(|daily| check_daily_order(code, &daily).map(|()| daily))
        {
            Ok(daily) => daily,
            Err(e) => {
                tracing::warn!(code, error = %e, "skipping code");
                return false;
            }
        };
        if daily.last().map(|bar| bar.date) != Some(date) {
            tracing::debug!(code, %date, "no daily bar on screening date");
            return false;
        }
        let intraday = fetch_intraday_bars(self.context.data.as_ref(), code, date, date);
        let decision = self.context.strategy.evaluate(&daily, &intraday);
        tracing::debug!(code, ?decision, "screened");
        decision.fires()
    }
}

/// Daily bars must be strictly increasing by date.
fn check_daily_order(code: &str, daily: &[DailyBar]) -> Result<(), TailtraderError> {
    match daily.windows(2).find(|pair| pair[0].date >= pair[1].date) {
        Some(pair) => Err(TailtraderError::DataUnavailable {
            code: code.to_string(),
            reason: format!("daily bars out of order at {}", pair[1].date),
        }),
        None => Ok(()),
    }
}

fn panic_reason(code: &str, payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("worker panicked on {code}: {message}")
}

/// Every trade the strategy produces over one instrument's history.
///
/// Day `i` is considered only when intraday bars exist for both day `i` and
/// day `i + 1`; the last daily bar has no following day and is never
/// considered.
pub fn evaluate_code(
    strategy: &dyn EntryRule,
    pricer: &ExecutionPricer,
    data: &CodeData,
) -> Vec<Trade> {
    let mut trades = Vec::new();
    for (i, pair) in data.daily.windows(2).enumerate() {
        let (today, next) = (&pair[0], &pair[1]);
        let (Some(today_bars), Some(next_bars)) =
            (data.intraday_for(today.date), data.intraday_for(next.date))
        else {
            continue;
        };

        if !strategy.signal(&data.daily[..=i], today_bars) {
            continue;
        }

        let entry = pricer.price(Side::Buy, today, today_bars);
        let exit = pricer.price(Side::Sell, next, next_bars);
        match Trade::from_fills(&data.code, entry, exit) {
            Some(trade) => trades.push(trade),
            None => tracing::warn!(
                code = %data.code,
                entry = %entry.time,
                exit = %exit.time,
                "dropping trade with exit before entry"
            ),
        }
    }
    trades
}

/// Intraday bars for `[start, end]`, fetched one year partition at a time in
/// parallel and merged in timestamp order. A missing or failing partition
/// contributes no bars.
pub fn fetch_intraday_bars(
    data: &(dyn DataPort + Send + Sync),
    code: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<IntradayBar> {
    if start > end {
        return Vec::new();
    }
    let merged: Mutex<Vec<IntradayBar>> = Mutex::new(Vec::new());

    (start.year()..=end.year())
        .into_par_iter()
        .for_each(|year| match data.fetch_intraday_year(code, year) {
            Ok(Some(bars)) => {
                let in_range: Vec<IntradayBar> = bars
                    .into_iter()
                    .filter(|bar| bar.time.year() == year)
                    .filter(|bar| (start..=end).contains(&bar.date()))
                    .collect();
                lock(&merged).extend(in_range);
            }
            Ok(None) => tracing::debug!(code, year, "no intraday partition"),
            Err(e) => tracing::warn!(code, year, error = %e, "intraday partition unavailable"),
        });

    let mut bars = merged.into_inner().unwrap_or_else(|e| e.into_inner());
    bars.sort_by_key(|bar| bar.time);
    bars
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
