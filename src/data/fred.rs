//! FRED API integration for the Brent spot price series.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::AppError;

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
/// Daily series since 1987 fits well inside one page.
const OBS_LIMIT: usize = 100_000;

/// Europe Brent spot price FOB, USD per barrel, daily.
pub const SERIES_BRENT: &str = "DCOILBRENTEU";

/// One FRED observation; `price` is `None` where FRED reports a gap (`.`).
#[derive(Debug, Clone, PartialEq)]
pub struct FredObservation {
    pub date: NaiveDate,
    pub price: Option<f64>,
}

impl FredObservation {
    /// `(date, price)` text as written to the raw CSV; gaps become empty.
    pub fn to_raw(&self) -> (String, String) {
        (
            self.date.format("%Y-%m-%d").to_string(),
            self.price.map(|p| p.to_string()).unwrap_or_default(),
        )
    }
}

pub struct FredClient {
    client: Client,
    api_key: String,
}

impl FredClient {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("FRED_API_KEY")
            .map_err(|_| AppError::Config("missing FRED_API_KEY in environment (.env).".into()))?;
        Ok(Self {
            client: Client::new(),
            api_key,
        })
    }

    /// Fetch the full series in ascending date order, optionally bounded.
    pub fn fetch_series(
        &self,
        series_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<FredObservation>, AppError> {
        let mut req = self.client.get(BASE_URL).query(&[
            ("series_id", series_id),
            ("api_key", &self.api_key),
            ("file_type", "json"),
            ("sort_order", "asc"),
            ("limit", &OBS_LIMIT.to_string()),
        ]);
        if let Some(date) = start {
            req = req.query(&[("observation_start", &date.to_string())]);
        }
        if let Some(date) = end {
            req = req.query(&[("observation_end", &date.to_string())]);
        }

        info!(series_id, "requesting FRED observations");
        let resp = req
            .send()
            .map_err(|e| AppError::Fetch(format!("FRED request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Fetch(format!(
                "FRED request failed with status {}.",
                resp.status()
            )));
        }

        let body: ObservationsResponse = resp
            .json()
            .map_err(|e| AppError::Fetch(format!("failed to parse FRED response: {e}")))?;

        let out = parse_observations(body)?;
        if out.is_empty() {
            return Err(AppError::Fetch(format!("no observations returned for series {series_id}.")));
        }
        debug!(
            series_id,
            observations = out.len(),
            gaps = out.iter().filter(|o| o.price.is_none()).count(),
            "FRED series received"
        );
        Ok(out)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

fn parse_observations(body: ObservationsResponse) -> Result<Vec<FredObservation>, AppError> {
    body.observations
        .into_iter()
        .map(|obs| {
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d")
                .map_err(|e| AppError::Fetch(format!("invalid FRED date '{}': {e}", obs.date)))?;
            Ok(FredObservation {
                date,
                price: parse_value(&obs.value),
            })
        })
        .collect()
}

fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed == "." || trimmed.is_empty() {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_become_gaps() {
        let body: ObservationsResponse = serde_json::from_str(
            r#"{"observations":[
                {"realtime_start":"2024-01-01","date":"1987-05-20","value":"18.63"},
                {"date":"1987-05-25","value":"."},
                {"date":"1987-05-26","value":"18.60"}
            ]}"#,
        )
        .unwrap();
        let obs = parse_observations(body).unwrap();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].price, Some(18.63));
        assert_eq!(obs[1].price, None);
        assert_eq!(obs[1].to_raw(), ("1987-05-25".to_string(), String::new()));
        assert_eq!(obs[2].to_raw().1, "18.6");
    }

    #[test]
    fn bad_date_is_a_fetch_error() {
        let body: ObservationsResponse =
            serde_json::from_str(r#"{"observations":[{"date":"20/05/1987","value":"1"}]}"#).unwrap();
        let err = parse_observations(body).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
