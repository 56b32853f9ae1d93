//! Core domain types and logic.

pub mod backtest;
pub mod code_data;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod ohlcv;
pub mod price;
pub mod rolling;
pub mod strategy;
pub mod trade;
pub mod universe;
