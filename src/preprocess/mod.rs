//! Raw price cleaning and log-return computation.
//!
//! Turns unsorted, possibly dirty `(date, price)` rows into:
//!
//! - a strictly date-ordered `PriceObservation` series (one per date)
//! - the matching `ReturnObservation` series (length `N - 1`)
//!
//! Policy:
//! - rows with an unparseable date or a missing / non-numeric / non-finite /
//!   non-positive price are dropped and reported (line + reason)
//! - exact-date collisions keep the first occurrence in input order
//! - no interpolation or sign fixing; bad rows never reach the return series

use std::fmt;

use chrono::NaiveDate;

use crate::domain::{PriceObservation, ReturnObservation};
use crate::error::DataError;

pub mod summary;

pub use summary::*;

/// Fewest clean prices that still yield a return series.
pub const MIN_PRICES: usize = 2;

/// One unparsed input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line in the source file (header is line 1).
    pub line: usize,
    pub date: String,
    pub price: String,
}

impl RawRecord {
    /// Re-encode a clean observation so preprocessing can be applied to its own output.
    pub fn from_observation(line: usize, obs: &PriceObservation) -> Self {
        Self {
            line,
            date: obs.date.format("%Y-%m-%d").to_string(),
            price: obs.price.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    InvalidDate(String),
    MissingPrice,
    NonNumericPrice(String),
    NonFinitePrice,
    NonPositivePrice(f64),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::InvalidDate(s) => write!(f, "invalid date '{s}'"),
            DropReason::MissingPrice => f.write_str("missing price"),
            DropReason::NonNumericPrice(s) => write!(f, "non-numeric price '{s}'"),
            DropReason::NonFinitePrice => f.write_str("non-finite price"),
            DropReason::NonPositivePrice(v) => write!(f, "non-positive price {v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRow {
    pub line: usize,
    pub reason: DropReason,
}

/// Preprocessing output: clean series plus an account of what was removed.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub prices: Vec<PriceObservation>,
    pub returns: Vec<ReturnObservation>,
    pub dropped: Vec<DroppedRow>,
    /// Later rows discarded because an earlier row had the same date.
    pub duplicates: usize,
    pub rows_read: usize,
}

/// Clean raw rows and derive log-returns.
pub fn preprocess(records: &[RawRecord]) -> Result<Preprocessed, DataError> {
    let mut dropped = Vec::new();
    let mut parsed: Vec<(usize, PriceObservation)> = Vec::with_capacity(records.len());

    for (pos, record) in records.iter().enumerate() {
        match parse_record(record) {
            Ok(obs) => parsed.push((pos, obs)),
            Err(reason) => dropped.push(DroppedRow {
                line: record.line,
                reason,
            }),
        }
    }

    // Stable on input position so the first occurrence of a date wins.
    parsed.sort_by_key(|(pos, obs)| (obs.date, *pos));

    let before = parsed.len();
    parsed.dedup_by_key(|(_, obs)| obs.date);
    let duplicates = before - parsed.len();

    let prices: Vec<PriceObservation> = parsed.into_iter().map(|(_, obs)| obs).collect();
    if prices.len() < MIN_PRICES {
        return Err(DataError::new(format!(
            "Need at least {MIN_PRICES} valid prices after cleaning, got {} ({} of {} rows dropped).",
            prices.len(),
            dropped.len(),
            records.len()
        )));
    }

    let returns = log_returns(&prices);
    if let Some(bad) = returns.iter().find(|r| !r.log_return.is_finite()) {
        return Err(DataError::new(format!("Non-finite log-return on {}.", bad.date)));
    }

    Ok(Preprocessed {
        prices,
        returns,
        dropped,
        duplicates,
        rows_read: records.len(),
    })
}

/// `ln(p_t / p_{t-1})` for consecutive observations, dated on the later one.
pub fn log_returns(prices: &[PriceObservation]) -> Vec<ReturnObservation> {
    prices
        .windows(2)
        .map(|w| ReturnObservation {
            date: w[1].date,
            log_return: (w[1].price / w[0].price).ln(),
        })
        .collect()
}

fn parse_record(record: &RawRecord) -> Result<PriceObservation, DropReason> {
    let date = parse_date(&record.date).ok_or_else(|| DropReason::InvalidDate(record.date.trim().to_string()))?;
    let price = parse_price(&record.price)?;
    Ok(PriceObservation { date, price })
}

fn parse_price(raw: &str) -> Result<f64, DropReason> {
    let s = raw.trim();
    if s.is_empty() || s == "." || s.eq_ignore_ascii_case("na") || s.eq_ignore_ascii_case("null") {
        return Err(DropReason::MissingPrice);
    }
    let v = s
        .parse::<f64>()
        .map_err(|_| DropReason::NonNumericPrice(s.to_string()))?;
    if !v.is_finite() {
        return Err(DropReason::NonFinitePrice);
    }
    if v <= 0.0 {
        return Err(DropReason::NonPositivePrice(v));
    }
    Ok(v)
}

/// Parse the date spellings seen in Brent price exports.
///
/// Accepted: `20-May-87`, `Apr 22, 2020`, `2020-04-22`, `04/22/2020`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    const FMTS: [&str; 4] = ["%d-%b-%y", "%b %d, %Y", "%Y-%m-%d", "%m/%d/%Y"];
    let s = s.trim();
    FMTS.iter().find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
