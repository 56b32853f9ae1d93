//! Domain error types.

use crate::domain::price::PriceParseError;
use crate::domain::universe::UniverseError;

/// Top-level error type for tailtrader.
#[derive(Debug, thiserror::Error)]
pub enum TailtraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("data unavailable for {code}: {reason}")]
    DataUnavailable { code: String, reason: String },

    #[error(transparent)]
    InvalidPrice(#[from] PriceParseError),

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TailtraderError {
    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TailtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TailtraderError> for std::process::ExitCode {
    fn from(err: &TailtraderError) -> Self {
        let code: u8 = match err {
            TailtraderError::Io(_) | TailtraderError::Report { .. } => 1,
            TailtraderError::ConfigParse { .. }
            | TailtraderError::ConfigMissing { .. }
            | TailtraderError::ConfigInvalid { .. } => 2,
            TailtraderError::Database { .. } | TailtraderError::DatabaseQuery { .. } => 3,
            TailtraderError::InvalidPrice(_) => 4,
            TailtraderError::NoData { .. }
            | TailtraderError::DataUnavailable { .. }
            | TailtraderError::Universe(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
