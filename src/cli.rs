//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::text_report_adapter::{DEFAULT_LOT_SIZE, TextReportAdapter};
use crate::domain::backtest::{BacktestConfig, BacktestContext, Backtester};
use crate::domain::config_validation::{
    parse_date, parse_number, parse_time, strategy_kind, validate_all,
};
use crate::domain::error::TailtraderError;
use crate::domain::execution::{ExecutionConfig, ExecutionPricer, SellPolicy};
use crate::domain::metrics::{CodeResult, PerformanceReport};
use crate::domain::price::{MINOR_UNITS_PER_UNIT, Price, pct_to_bp};
use crate::domain::strategy::{Strategy, ThresholdFilter, TrendFilter, TrendWindow, VolumeBreakout};
use crate::domain::universe::{load_universe, parse_codes};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::{ReportContext, ReportPort};

#[derive(Parser, Debug)]
#[command(
    name = "tailtrader",
    about = "Backtest daily entry rules with intraday execution prices"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over the configured universe
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated codes, overriding the configured universe
        #[arg(long)]
        code: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,
        #[arg(long)]
        dry_run: bool,
    },
    /// List codes whose strategy enters on a given date
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        code: Option<String>,
    },
    /// List the codes available in the configured data source
    ListCodes {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            code,
            output,
            format,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, code.as_deref())
            } else {
                run_backtest(&config, code.as_deref(), output.as_deref(), format)
            }
        }
        Command::Screen { config, date, code } => run_screen(&config, date, code.as_deref()),
        Command::ListCodes { config } => run_list_codes(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: TailtraderError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

fn load_validated(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    validate_all(&adapter).map_err(fail)?;
    Ok(adapter)
}

fn run_backtest(
    config_path: &Path,
    code_override: Option<&str>,
    output_path: Option<&Path>,
    format_override: Option<ReportFormat>,
) -> ExitCode {
    let adapter = match load_validated(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let rendered = match execute_backtest(&adapter, code_override, format_override) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    match output_path {
        Some(path) => match fs::write(path, &rendered) {
            Ok(()) => {
                eprintln!("Report written to: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(e.into()),
        },
        None => {
            print!("{rendered}");
            ExitCode::SUCCESS
        }
    }
}

/// Build every collaborator from `config`, run the backtest and render the
/// report. Configuration problems fail before any bar is fetched.
pub fn execute_backtest(
    config: &dyn ConfigPort,
    code_override: Option<&str>,
    format_override: Option<ReportFormat>,
) -> Result<String, TailtraderError> {
    let context = build_context(config)?;
    let codes = resolve_codes(code_override, config, context.data.as_ref())?;
    let format = match format_override {
        Some(f) => f,
        None => report_format(config)?,
    };
    let backtester = Backtester::new(context)?;
    run_backtest_pipeline(&backtester, &codes, format, lot_size(config))
}

pub fn run_backtest_pipeline(
    backtester: &Backtester,
    codes: &[String],
    format: ReportFormat,
    lot_size: u32,
) -> Result<String, TailtraderError> {
    let context = backtester.context();
    eprintln!(
        "Running {} backtest: {} codes, {} to {}, {} workers",
        context.strategy.name(),
        codes.len(),
        context.config.start_date,
        context.config.end_date,
        context.config.workers,
    );

    let result = backtester.run(codes);
    eprintln!(
        "Finished: {} trades from {} codes ({} skipped)",
        result.trades.len(),
        result.done_count(),
        result.skipped().count(),
    );

    let report = PerformanceReport::compute(&result.trades);
    let code_results = CodeResult::compute_per_code(&result.trades);
    let ctx = ReportContext {
        strategy_name: context.strategy.name(),
        start_date: context.config.start_date,
        end_date: context.config.end_date,
        report: &report,
        code_results: &code_results,
        outcomes: &result.outcomes,
        trades: &result.trades,
    };

    let renderer: Box<dyn ReportPort> = match format {
        ReportFormat::Text => Box::new(TextReportAdapter::new(lot_size)),
        ReportFormat::Json => Box::new(JsonReportAdapter::new(true)),
    };
    renderer.render(&ctx)
}

pub fn run_dry_run(config_path: &Path, code_override: Option<&str>) -> ExitCode {
    let adapter = match load_validated(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    eprintln!("Config validated successfully");

    let plan = build_context(&adapter).and_then(|context| {
        let codes = resolve_codes(code_override, &adapter, context.data.as_ref())?;
        Ok((context, codes))
    });
    let (context, codes) = match plan {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let exec = context.pricer.config();
    eprintln!("\nStrategy: {}", context.strategy.name());
    eprintln!("  {:?}", context.strategy);
    eprintln!("\nExecution:");
    eprintln!(
        "  buy at {} (+{}), sell at {} (-{}), policy {:?}",
        exec.buy_time, exec.tick, exec.sell_time, exec.tick, exec.sell_policy
    );
    eprintln!("\nBacktest:");
    eprintln!(
        "  {} to {}, {} workers",
        context.config.start_date, context.config.end_date, context.config.workers
    );
    eprintln!("\nUniverse: {} codes", codes.len());
    for code in codes.iter().take(20) {
        eprintln!("  {code}");
    }
    if codes.len() > 20 {
        eprintln!("  ... and {} more", codes.len() - 20);
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_screen(config_path: &Path, date: NaiveDate, code_override: Option<&str>) -> ExitCode {
    let adapter = match load_validated(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let screened = build_context(&adapter).and_then(|context| {
        let codes = resolve_codes(code_override, &adapter, context.data.as_ref())?;
        eprintln!("Screening {} codes on {}", codes.len(), date);
        let backtester = Backtester::new(context)?;
        Ok(backtester.screen(&codes, date))
    });

    match screened {
        Ok(picked) => {
            for code in &picked {
                println!("{code}");
            }
            eprintln!("{} codes selected", picked.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_list_codes(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let codes = match build_data_port(&adapter).and_then(|port| port.list_codes()) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    if codes.is_empty() {
        eprintln!("No codes found");
    } else {
        for code in &codes {
            println!("{code}");
        }
        eprintln!("{} codes found", codes.len());
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_validated(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match build_context(&adapter) {
        Ok(context) => {
            eprintln!("Strategy:  {}", context.strategy.name());
            eprintln!("Sell:      {:?}", context.pricer.config().sell_policy);
            eprintln!(
                "Period:    {} to {}",
                context.config.start_date, context.config.end_date
            );
            eprintln!("Configuration is valid");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

pub fn build_context(config: &dyn ConfigPort) -> Result<BacktestContext, TailtraderError> {
    Ok(BacktestContext {
        data: build_data_port(config)?,
        strategy: build_strategy(config)?,
        pricer: ExecutionPricer::new(build_execution_config(config)?),
        config: build_backtest_config(config)?,
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, TailtraderError> {
    let backtest = BacktestConfig {
        start_date: parse_date(config, "backtest", "start_date")?,
        end_date: parse_date(config, "backtest", "end_date")?,
        workers: parse_number(config, "backtest", "workers")?
            .unwrap_or(BacktestConfig::DEFAULT_WORKERS),
    };
    backtest.validate()?;
    Ok(backtest)
}

pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, TailtraderError> {
    let threshold = build_threshold(config)?;
    match strategy_kind(config)?.as_str() {
        "trend" => build_trend(config, threshold).map(Strategy::Trend),
        "volume_breakout" => build_volume_breakout(config).map(Strategy::VolumeBreakout),
        _ => Ok(Strategy::Threshold(threshold)),
    }
}

fn strategy_number<T: std::str::FromStr>(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<T>, TailtraderError> {
    parse_number(config, "strategy", key)
}

fn build_threshold(config: &dyn ConfigPort) -> Result<ThresholdFilter, TailtraderError> {
    let defaults = ThresholdFilter::default();
    Ok(ThresholdFilter {
        min_turnover_pct: strategy_number(config, "min_turnover_pct")?
            .unwrap_or(defaults.min_turnover_pct),
        max_turnover_pct: strategy_number(config, "max_turnover_pct")?
            .unwrap_or(defaults.max_turnover_pct),
    })
}

fn market_cap_minor(units: f64) -> i128 {
    (units * MINOR_UNITS_PER_UNIT as f64).round() as i128
}

fn pct_bp(config: &dyn ConfigPort, key: &str, default: i64) -> Result<i64, TailtraderError> {
    Ok(strategy_number::<f64>(config, key)?.map_or(default, pct_to_bp))
}

fn build_trend(
    config: &dyn ConfigPort,
    threshold: ThresholdFilter,
) -> Result<TrendFilter, TailtraderError> {
    let defaults = TrendFilter::default();
    let window = match config.get_string("strategy", "trend_window").as_deref() {
        None | Some("latest") => TrendWindow::Latest,
        Some("sliding") => TrendWindow::Sliding,
        Some(other) => {
            return Err(TailtraderError::config_invalid(
                "strategy",
                "trend_window",
                format!("unknown window '{other}'"),
            ));
        }
    };

    Ok(TrendFilter {
        threshold,
        min_market_cap: strategy_number::<f64>(config, "min_market_cap")?
            .map_or(defaults.min_market_cap, market_cap_minor),
        max_market_cap: strategy_number::<f64>(config, "max_market_cap")?
            .map_or(defaults.max_market_cap, market_cap_minor),
        cutoff_time: parse_time(config, "strategy", "cutoff_time")?
            .unwrap_or(defaults.cutoff_time),
        max_high_deviation_bp: pct_bp(
            config,
            "max_high_deviation_pct",
            defaults.max_high_deviation_bp,
        )?,
        ma_period: strategy_number(config, "ma_period")?.unwrap_or(defaults.ma_period),
        lookback: strategy_number(config, "lookback")?.unwrap_or(defaults.lookback),
        min_above_ma_bp: pct_bp(config, "min_above_ma_pct", defaults.min_above_ma_bp)?,
        min_rise_bp: pct_bp(config, "min_rise_pct", defaults.min_rise_bp)?,
        max_rise_bp: pct_bp(config, "max_rise_pct", defaults.max_rise_bp)?,
        window,
    })
}

fn build_volume_breakout(config: &dyn ConfigPort) -> Result<VolumeBreakout, TailtraderError> {
    let defaults = VolumeBreakout::default();
    Ok(VolumeBreakout {
        volume_ratio_bp: strategy_number::<f64>(config, "volume_ratio")?
            .map_or(defaults.volume_ratio_bp, |ratio| (ratio * 10_000.0).round() as i64),
        high_window: strategy_number(config, "high_window")?.unwrap_or(defaults.high_window),
        base_window: strategy_number(config, "base_window")?.unwrap_or(defaults.base_window),
        base_floor_bp: pct_bp(config, "base_floor_pct", defaults.base_floor_bp)?,
        support_short: strategy_number(config, "support_short")?
            .unwrap_or(defaults.support_short),
        support_long: strategy_number(config, "support_long")?.unwrap_or(defaults.support_long),
    })
}

pub fn build_execution_config(config: &dyn ConfigPort) -> Result<ExecutionConfig, TailtraderError> {
    let defaults = ExecutionConfig::default();
    let tick = match config.get_string("execution", "tick") {
        Some(raw) => Price::parse_decimal(&raw)
            .map_err(|e| TailtraderError::config_invalid("execution", "tick", e.to_string()))?,
        None => defaults.tick,
    };
    let sell_policy = match config.get_string("execution", "sell_policy").as_deref() {
        None | Some("trigger") => SellPolicy::Trigger,
        Some("running_low") => SellPolicy::RunningLow,
        Some(other) => {
            return Err(TailtraderError::config_invalid(
                "execution",
                "sell_policy",
                format!("unknown policy '{other}'"),
            ));
        }
    };

    Ok(ExecutionConfig {
        buy_time: parse_time(config, "execution", "buy_time")?.unwrap_or(defaults.buy_time),
        sell_time: parse_time(config, "execution", "sell_time")?.unwrap_or(defaults.sell_time),
        tick,
        sell_policy,
    })
}

pub fn build_data_port(
    config: &dyn ConfigPort,
) -> Result<Arc<dyn DataPort + Send + Sync>, TailtraderError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.as_str() {
        "csv" => {
            let path = config
                .get_string("data", "path")
                .ok_or_else(|| TailtraderError::ConfigMissing {
                    section: "data".into(),
                    key: "path".into(),
                })?;
            Ok(Arc::new(CsvAdapter::new(PathBuf::from(path))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            Ok(Arc::new(SqliteAdapter::from_config(config)?))
        }
        other => Err(TailtraderError::config_invalid(
            "data",
            "source",
            format!("unsupported source '{other}'"),
        )),
    }
}

/// The codes to run: the `--code` override, else `[backtest] codes`, else
/// the data source's catalog narrowed by `[backtest] code_prefixes`.
pub fn resolve_codes(
    code_override: Option<&str>,
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
) -> Result<Vec<String>, TailtraderError> {
    if let Some(codes) = code_override {
        return Ok(parse_codes(codes)?);
    }
    if let Some(codes) = config.get_string("backtest", "codes") {
        return Ok(parse_codes(&codes)?);
    }

    let prefixes: Vec<String> = config
        .get_string("backtest", "code_prefixes")
        .map(|raw| {
            raw.split(',')
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();
    Ok(load_universe(data_port, &prefixes)?.codes)
}

pub fn report_format(config: &dyn ConfigPort) -> Result<ReportFormat, TailtraderError> {
    match config.get_string("report", "format").as_deref() {
        None | Some("text") => Ok(ReportFormat::Text),
        Some("json") => Ok(ReportFormat::Json),
        Some(other) => Err(TailtraderError::config_invalid(
            "report",
            "format",
            format!("unknown format '{other}'"),
        )),
    }
}

pub fn lot_size(config: &dyn ConfigPort) -> u32 {
    u32::try_from(config.get_usize("report", "lot_size", DEFAULT_LOT_SIZE as usize))
        .unwrap_or(DEFAULT_LOT_SIZE)
}
