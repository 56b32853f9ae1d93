//! Configuration validation.
//!
//! Every section is checked before any data is touched, so a bad value is
//! reported against its `[section] key` instead of surfacing mid-run.

use crate::domain::error::TailtraderError;
use crate::domain::price::Price;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, NaiveTime};
use std::str::FromStr;

pub const STRATEGY_KINDS: &[&str] = &["threshold", "trend", "volume_breakout"];

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), TailtraderError> {
    validate_data_config(config)?;
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_execution_config(config)?;
    validate_report_config(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TailtraderError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.as_str() {
        "csv" => {}
        "sqlite" => {
            require_string(config, "data", "daily_db")?;
        }
        other => {
            return Err(TailtraderError::config_invalid(
                "data",
                "source",
                format!("unknown source '{other}', expected csv or sqlite"),
            ));
        }
    }
    require_string(config, "data", "path")?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TailtraderError> {
    let start_date = parse_date(config, "backtest", "start_date")?;
    let end_date = parse_date(config, "backtest", "end_date")?;
    if start_date > end_date {
        return Err(TailtraderError::config_invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }

    if let Some(workers) = parse_number::<usize>(config, "backtest", "workers")? {
        if workers == 0 {
            return Err(TailtraderError::config_invalid(
                "backtest",
                "workers",
                "workers must be at least 1",
            ));
        }
    }

    if let Some(codes) = config.get_string("backtest", "codes") {
        parse_codes(&codes)
            .map_err(|e| TailtraderError::config_invalid("backtest", "codes", e.to_string()))?;
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TailtraderError> {
    let kind = strategy_kind(config)?;
    validate_turnover_band(config)?;
    match kind.as_str() {
        "trend" => validate_trend(config),
        "volume_breakout" => validate_volume_breakout(config),
        _ => Ok(()),
    }
}

pub fn validate_execution_config(config: &dyn ConfigPort) -> Result<(), TailtraderError> {
    parse_time(config, "execution", "buy_time")?;
    parse_time(config, "execution", "sell_time")?;
    if let Some(tick) = config.get_string("execution", "tick") {
        let tick = Price::parse_decimal(&tick)
            .map_err(|e| TailtraderError::config_invalid("execution", "tick", e.to_string()))?;
        if tick < Price::ZERO {
            return Err(TailtraderError::config_invalid(
                "execution",
                "tick",
                "tick must be non-negative",
            ));
        }
    }
    if let Some(policy) = config.get_string("execution", "sell_policy") {
        if !matches!(policy.as_str(), "trigger" | "running_low") {
            return Err(TailtraderError::config_invalid(
                "execution",
                "sell_policy",
                format!("unknown policy '{policy}', expected trigger or running_low"),
            ));
        }
    }
    Ok(())
}

pub fn validate_report_config(config: &dyn ConfigPort) -> Result<(), TailtraderError> {
    if let Some(format) = config.get_string("report", "format") {
        if !matches!(format.as_str(), "text" | "json") {
            return Err(TailtraderError::config_invalid(
                "report",
                "format",
                format!("unknown format '{format}', expected text or json"),
            ));
        }
    }
    if parse_number::<i64>(config, "report", "lot_size")?.is_some_and(|lot| lot < 1) {
        return Err(TailtraderError::config_invalid(
            "report",
            "lot_size",
            "lot_size must be at least 1",
        ));
    }
    Ok(())
}

/// The configured strategy kind, defaulting to `threshold`.
pub fn strategy_kind(config: &dyn ConfigPort) -> Result<String, TailtraderError> {
    let kind = config
        .get_string("strategy", "kind")
        .unwrap_or_else(|| "threshold".to_string());
    if !STRATEGY_KINDS.contains(&kind.as_str()) {
        return Err(TailtraderError::config_invalid(
            "strategy",
            "kind",
            format!("unknown kind '{kind}', expected one of {}", STRATEGY_KINDS.join(", ")),
        ));
    }
    Ok(kind)
}

fn validate_turnover_band(config: &dyn ConfigPort) -> Result<(), TailtraderError> {
    let min = parse_number::<f64>(config, "strategy", "min_turnover_pct")?.unwrap_or(2.0);
    let max = parse_number::<f64>(config, "strategy", "max_turnover_pct")?.unwrap_or(5.0);
    if min < 0.0 {
        return Err(TailtraderError::config_invalid(
            "strategy",
            "min_turnover_pct",
            "min_turnover_pct must be non-negative",
        ));
    }
    if min > max {
        return Err(TailtraderError::config_invalid(
            "strategy",
            "max_turnover_pct",
            "max_turnover_pct must not be below min_turnover_pct",
        ));
    }
    Ok(())
}

fn validate_trend(config: &dyn ConfigPort) -> Result<(), TailtraderError> {
    parse_time(config, "strategy", "cutoff_time")?;
    for key in ["ma_period", "lookback"] {
        require_positive(config, "strategy", key)?;
    }
    for key in ["max_high_deviation_pct", "min_above_ma_pct"] {
        if let Some(value) = parse_number::<f64>(config, "strategy", key)? {
            if !(0.0..=100.0).contains(&value) {
                return Err(TailtraderError::config_invalid(
                    "strategy",
                    key,
                    format!("{key} must be between 0 and 100"),
                ));
            }
        }
    }
    let min_rise = parse_number::<f64>(config, "strategy", "min_rise_pct")?.unwrap_or(0.3);
    let max_rise = parse_number::<f64>(config, "strategy", "max_rise_pct")?.unwrap_or(3.0);
    if min_rise > max_rise {
        return Err(TailtraderError::config_invalid(
            "strategy",
            "max_rise_pct",
            "max_rise_pct must not be below min_rise_pct",
        ));
    }
    let min_cap = parse_number::<f64>(config, "strategy", "min_market_cap")?.unwrap_or(0.0);
    if let Some(max_cap) = parse_number::<f64>(config, "strategy", "max_market_cap")? {
        if max_cap < min_cap {
            return Err(TailtraderError::config_invalid(
                "strategy",
                "max_market_cap",
                "max_market_cap must not be below min_market_cap",
            ));
        }
    }
    if let Some(window) = config.get_string("strategy", "trend_window") {
        if !matches!(window.as_str(), "latest" | "sliding") {
            return Err(TailtraderError::config_invalid(
                "strategy",
                "trend_window",
                format!("unknown window '{window}', expected latest or sliding"),
            ));
        }
    }
    Ok(())
}

fn validate_volume_breakout(config: &dyn ConfigPort) -> Result<(), TailtraderError> {
    if parse_number::<f64>(config, "strategy", "volume_ratio")?.is_some_and(|r| r <= 0.0) {
        return Err(TailtraderError::config_invalid(
            "strategy",
            "volume_ratio",
            "volume_ratio must be positive",
        ));
    }
    for key in ["high_window", "base_window", "support_short", "support_long"] {
        require_positive(config, "strategy", key)?;
    }
    if let Some(floor) = parse_number::<f64>(config, "strategy", "base_floor_pct")? {
        if !(0.0..=100.0).contains(&floor) {
            return Err(TailtraderError::config_invalid(
                "strategy",
                "base_floor_pct",
                "base_floor_pct must be between 0 and 100",
            ));
        }
    }
    Ok(())
}

fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, TailtraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(TailtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn require_positive(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TailtraderError> {
    if parse_number::<usize>(config, section, key)? == Some(0) {
        return Err(TailtraderError::config_invalid(
            section,
            key,
            format!("{key} must be at least 1"),
        ));
    }
    Ok(())
}

/// Parse an optional numeric value; present but malformed is an error.
pub fn parse_number<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, TailtraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            TailtraderError::config_invalid(section, key, format!("'{raw}' is not a valid number"))
        }),
    }
}

/// Required `YYYY-MM-DD` date.
pub fn parse_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, TailtraderError> {
    let raw = require_string(config, section, key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        TailtraderError::config_invalid(
            section,
            key,
            format!("invalid {key} format, expected YYYY-MM-DD"),
        )
    })
}

/// Optional `HH:MM[:SS]` time of day.
pub fn parse_time(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveTime>, TailtraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map(Some)
        .map_err(|_| {
            TailtraderError::config_invalid(
                section,
                key,
                format!("invalid {key} format, expected HH:MM:SS"),
            )
        })
}
