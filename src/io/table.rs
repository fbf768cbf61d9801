//! Loose CSV access for hand-edited inputs (raw prices, event lists).
//!
//! Headers are matched case-insensitively with any UTF-8 BOM stripped;
//! values are trimmed. Generated artifacts use strict serde rows instead.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::error::{AppError, DataError};

pub struct Table {
    reader: csv::Reader<File>,
    columns: HashMap<String, usize>,
}

impl Table {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path).map_err(|e| AppError::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let headers = reader.headers().map_err(|e| AppError::csv(path, e))?.clone();
        Ok(Self {
            reader,
            columns: build_header_map(&headers),
        })
    }

    /// Column index for `name`, or a `DataError` naming the missing column.
    pub fn require(&self, name: &str) -> Result<usize, DataError> {
        self.columns
            .get(&normalize_header_name(name))
            .copied()
            .ok_or_else(|| DataError::new("missing required column").at_line(1).in_column(name))
    }

    pub fn optional(&self, name: &str) -> Option<usize> {
        self.columns.get(&normalize_header_name(name)).copied()
    }

    /// Read the next row into `row` and return its 1-based line.
    ///
    /// `Ok(None)` at end of input; an unreadable row is a `DataError` at its
    /// line (`last_line + 1` when the reader cannot tell).
    pub fn next_row(&mut self, row: &mut StringRecord, last_line: usize) -> Result<Option<usize>, DataError> {
        match self.reader.read_record(row) {
            Ok(true) => Ok(Some(row.position().map_or(last_line + 1, |p| p.line() as usize))),
            Ok(false) => Ok(None),
            Err(e) => {
                let at = e.position().map_or(last_line + 1, |p| p.line() as usize);
                Err(DataError::new(format!("unreadable CSV row: {e}")).at_line(at))
            }
        }
    }
}

/// Trimmed field, empty string when the row is short.
pub fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).map(str::trim).unwrap_or("")
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_ignore_case_and_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "\u{feff}DATE, price \n2020-01-01,1\n").unwrap();

        let table = Table::open(&path).unwrap();
        assert_eq!(table.require("Date").unwrap(), 0);
        assert_eq!(table.require("Price").unwrap(), 1);
        assert!(table.optional("Category").is_none());
        let err = table.require("Category").unwrap_err();
        assert_eq!(err.column.as_deref(), Some("Category"));
    }
}
