//! `event_impacts.csv`: one row per matched event, ordered by event date.
//!
//! Column names are shared with the dashboard payload.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{EventCategory, EventImpact};
use crate::error::AppError;
use crate::io::atomic::write_atomic;
use crate::io::processed::row_error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventImpactRow {
    #[serde(rename = "Event")]
    pub event: String,
    #[serde(rename = "Event_Date")]
    pub event_date: NaiveDate,
    #[serde(rename = "Category")]
    pub category: EventCategory,
    #[serde(rename = "Change_Point")]
    pub change_point: NaiveDate,
    #[serde(rename = "Days_Difference")]
    pub days_difference: i64,
    #[serde(rename = "Pre_Event_Price")]
    pub pre_event_price: f64,
    #[serde(rename = "Post_Event_Price")]
    pub post_event_price: f64,
    #[serde(rename = "Price_Change_Pct")]
    pub price_change_pct: f64,
    #[serde(rename = "Pre_Event_Volatility")]
    pub pre_event_volatility: f64,
    #[serde(rename = "Post_Event_Volatility")]
    pub post_event_volatility: f64,
    #[serde(rename = "Volatility_Change_Pct")]
    pub volatility_change_pct: f64,
    #[serde(rename = "CP_Price_Change_Pct")]
    pub cp_price_change_pct: Option<f64>,
    #[serde(rename = "CP_Volatility_Change_Pct")]
    pub cp_volatility_change_pct: Option<f64>,
}

impl From<&EventImpact> for EventImpactRow {
    fn from(i: &EventImpact) -> Self {
        Self {
            event: i.event.name.clone(),
            event_date: i.event.event_date,
            category: i.event.category,
            change_point: i.change_point_date,
            days_difference: i.days_difference,
            pre_event_price: i.pre_event_price,
            post_event_price: i.post_event_price,
            price_change_pct: i.price_change_pct,
            pre_event_volatility: i.pre_event_volatility,
            post_event_volatility: i.post_event_volatility,
            volatility_change_pct: i.volatility_change_pct,
            cp_price_change_pct: i.change_point_window.map(|w| w.price_change_pct),
            cp_volatility_change_pct: i.change_point_window.map(|w| w.volatility_change_pct),
        }
    }
}

const HEADER: [&str; 13] = [
    "Event",
    "Event_Date",
    "Category",
    "Change_Point",
    "Days_Difference",
    "Pre_Event_Price",
    "Post_Event_Price",
    "Price_Change_Pct",
    "Pre_Event_Volatility",
    "Post_Event_Volatility",
    "Volatility_Change_Pct",
    "CP_Price_Change_Pct",
    "CP_Volatility_Change_Pct",
];

pub fn write_impacts(path: &Path, impacts: &[EventImpact]) -> Result<(), AppError> {
    write_atomic(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        if impacts.is_empty() {
            writer.write_record(HEADER).map_err(|e| AppError::csv(path, e))?;
        }
        for impact in impacts {
            writer
                .serialize(EventImpactRow::from(impact))
                .map_err(|e| AppError::csv(path, e))?;
        }
        writer.flush().map_err(|e| AppError::io(path, e))
    })
}

pub fn read_impacts(path: &Path) -> Result<Vec<EventImpactRow>, AppError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| AppError::csv(path, e))?;
    reader
        .deserialize::<EventImpactRow>()
        .map(|r| r.map_err(|e| row_error(&e)))
        .collect()
}
