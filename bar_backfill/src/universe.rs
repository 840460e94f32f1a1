//! Symbol universe: a CSV file with a `Symbol` column, or a comma list.

use std::path::Path;

use indexmap::IndexSet;
use thiserror::Error;

pub const SYMBOL_COLUMN: &str = "Symbol";

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("failed to read universe file: {0}")]
    Csv(#[from] csv::Error),

    #[error("universe file has no `{SYMBOL_COLUMN}` column")]
    MissingColumn,
}

/// Reads symbols from the `Symbol` column of a CSV file.
///
/// Values are trimmed and upper-cased; blanks are skipped and duplicates
/// dropped, keeping first-seen order.
pub fn load_symbols(path: &Path) -> Result<Vec<String>, UniverseError> {
    let mut reader = csv::Reader::from_path(path)?;
    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(SYMBOL_COLUMN))
        .ok_or(UniverseError::MissingColumn)?;

    let mut raw = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(column) {
            raw.push(value.to_string());
        }
    }
    Ok(dedup(raw))
}

/// Splits a `--symbols A,B,C` argument with the same cleanup as [`load_symbols`].
pub fn parse_symbol_list(list: &str) -> Vec<String> {
    dedup(list.split(',').map(str::to_string))
}

fn dedup(symbols: impl IntoIterator<Item = String>) -> Vec<String> {
    symbols
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}
