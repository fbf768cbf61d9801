//! `processed_data.csv`: `Date,Price,Log_Return`.
//!
//! The first row has an empty `Log_Return`; every later row carries the return
//! into that date.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{PriceObservation, ReturnObservation};
use crate::error::{AppError, DataError};
use crate::io::atomic::write_atomic;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Log_Return")]
    pub log_return: Option<f64>,
}

/// Join prices with their returns (returns are dated by the later price).
pub fn processed_rows(prices: &[PriceObservation], returns: &[ReturnObservation]) -> Vec<ProcessedRow> {
    prices
        .iter()
        .enumerate()
        .map(|(i, p)| ProcessedRow {
            date: p.date,
            price: p.price,
            log_return: i.checked_sub(1).and_then(|j| returns.get(j)).map(|r| r.log_return),
        })
        .collect()
}

pub fn write_processed(path: &Path, prices: &[PriceObservation], returns: &[ReturnObservation]) -> Result<usize, AppError> {
    let rows = processed_rows(prices, returns);
    write_atomic(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        for row in &rows {
            writer.serialize(row).map_err(|e| AppError::csv(path, e))?;
        }
        writer.flush().map_err(|e| AppError::io(path, e))
    })?;
    Ok(rows.len())
}

/// Load and re-validate a processed series.
pub fn read_processed(path: &Path) -> Result<(Vec<PriceObservation>, Vec<ReturnObservation>), AppError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| AppError::csv(path, e))?;
    let mut prices: Vec<PriceObservation> = Vec::new();
    let mut returns = Vec::new();

    for result in reader.deserialize::<ProcessedRow>() {
        let row = result.map_err(|e| row_error(&e))?;
        let line = prices.len() + 2;

        if !(row.price.is_finite() && row.price > 0.0) {
            return Err(DataError::new(format!("price {} is not positive", row.price))
                .at_line(line)
                .in_column("Price")
                .into());
        }
        if let Some(prev) = prices.last() {
            if row.date <= prev.date {
                return Err(DataError::new(format!("date {} is not after {}", row.date, prev.date))
                    .at_line(line)
                    .in_column("Date")
                    .into());
            }
            let log_return = row.log_return.filter(|r| r.is_finite()).ok_or_else(|| {
                DataError::new("missing or non-finite log return")
                    .at_line(line)
                    .in_column("Log_Return")
            })?;
            returns.push(ReturnObservation {
                date: row.date,
                log_return,
            });
        }
        prices.push(PriceObservation {
            date: row.date,
            price: row.price,
        });
    }

    if prices.len() < crate::preprocess::MIN_PRICES {
        return Err(DataError::new(format!("processed series has {} prices", prices.len())).into());
    }
    Ok((prices, returns))
}

/// Map a row-level CSV/serde failure to a `DataError` with its line.
pub(crate) fn row_error(e: &csv::Error) -> AppError {
    let mut err = DataError::new(format!("malformed row: {e}"));
    if let Some(pos) = e.position() {
        err = err.at_line(pos.line() as usize);
    }
    if let csv::ErrorKind::Deserialize { err: de, .. } = e.kind() {
        if let Some(field) = de.field() {
            err = err.in_column(format!("#{}", field + 1));
        }
    }
    err.into()
}
