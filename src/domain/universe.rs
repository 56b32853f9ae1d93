//! Instrument universe: explicit code lists or the data source's catalog
//! narrowed by code prefix.

use crate::domain::error::TailtraderError;
use crate::ports::data_port::DataPort;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub codes: Vec<String>,
}

impl Universe {
    pub fn new(codes: Vec<String>) -> Result<Self, UniverseError> {
        if codes.is_empty() {
            return Err(UniverseError::Empty);
        }
        Ok(Self { codes })
    }

    pub fn count(&self) -> usize {
        self.codes.len()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    #[error("universe is empty")]
    Empty,
}

/// Parse a comma-separated code list. Codes are lower-cased (`SH600000` and
/// `sh600000` name the same instrument).
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_lowercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Keep codes starting with any of `prefixes`; an empty prefix list keeps all.
pub fn filter_by_prefixes(codes: Vec<String>, prefixes: &[String]) -> Vec<String> {
    if prefixes.is_empty() {
        return codes;
    }
    codes
        .into_iter()
        .filter(|code| prefixes.iter().any(|p| code.starts_with(p.as_str())))
        .collect()
}

/// Build the universe from the data source's catalog.
pub fn load_universe(
    data_port: &dyn DataPort,
    prefixes: &[String],
) -> Result<Universe, TailtraderError> {
    let listed = data_port.list_codes()?;
    let total = listed.len();
    let codes = filter_by_prefixes(listed, prefixes);
    tracing::info!(total, selected = codes.len(), "loaded universe");
    Ok(Universe::new(codes)?)
}
