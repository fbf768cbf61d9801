//! Curated event list (`Event,Date[,Category]`).

use std::collections::HashSet;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Event, EventCategory};
use crate::error::{AppError, DataError};
use crate::io::table::{Table, field};
use crate::preprocess::parse_date;

/// Load events, rejecting bad dates, unknown categories and duplicate names.
///
/// A missing `Category` column (or empty cell) means `other`.
pub fn read_events(path: &Path) -> Result<Vec<Event>, AppError> {
    let mut table = Table::open(path)?;
    let name_col = table.require("Event")?;
    let date_col = table.require("Date")?;
    let category_col = table.optional("Category");

    let mut events = Vec::new();
    let mut row = StringRecord::new();
    let mut line = 1usize;
    while let Some(at) = table.next_row(&mut row, line)? {
        line = at;

        let name = field(&row, name_col);
        if name.is_empty() {
            return Err(DataError::new("empty event name").at_line(line).in_column("Event").into());
        }
        let raw_date = field(&row, date_col);
        let event_date = parse_date(raw_date).ok_or_else(|| {
            DataError::new(format!("invalid date '{raw_date}'"))
                .at_line(line)
                .in_column("Date")
        })?;
        let category = match category_col.map(|c| field(&row, c)).filter(|s| !s.is_empty()) {
            None => EventCategory::Other,
            Some(s) => s
                .parse()
                .map_err(|msg: String| DataError::new(msg).at_line(line).in_column("Category"))?,
        };

        events.push(Event {
            name: name.to_string(),
            event_date,
            category,
        });
    }

    ensure_unique_names(&events)?;
    Ok(events)
}

pub fn ensure_unique_names(events: &[Event]) -> Result<(), DataError> {
    let mut seen = HashSet::new();
    for e in events {
        if !seen.insert(e.name.as_str()) {
            return Err(DataError::new(format!("duplicate event name '{}'", e.name)).in_column("Event"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn write(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_events_with_and_without_category() {
        let (_dir, path) = write("Event,Date,Category\nCOVID-19 declared pandemic,2020-03-11,pandemic\nOPEC+ cut,2020-04-12,\n");
        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].category, EventCategory::Pandemic);
        assert_eq!(events[1].category, EventCategory::Other);
        assert_eq!(events[1].event_date, NaiveDate::from_ymd_opt(2020, 4, 12).unwrap());
    }

    #[test]
    fn two_column_file_is_accepted() {
        let (_dir, path) = write("Event,Date\nGulf War,1990-08-02\n");
        let events = read_events(&path).unwrap();
        assert_eq!(events[0].category, EventCategory::Other);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (_dir, path) = write("Event,Date\nA,2020-01-01\nA,2021-01-01\n");
        let err = read_events(&path).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn bad_category_reports_line() {
        let (_dir, path) = write("Event,Date,Category\nA,2020-01-01,weather\n");
        let err = read_events(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn unreadable_row_is_data_error_with_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        std::fs::write(&path, b"Event,Date\nGulf War,1990-08-02\nBad \xff name,2020-01-01\n").unwrap();
        let err = read_events(&path).unwrap_err();
        assert!(matches!(err, AppError::Data(_)), "{err}");
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("line 3"), "{err}");
    }
}
