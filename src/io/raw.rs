//! Raw `Date,Price` input as downloaded or hand-maintained.

use std::path::Path;

use csv::StringRecord;

use crate::error::AppError;
use crate::io::atomic::write_atomic;
use crate::io::table::{Table, field};
use crate::preprocess::RawRecord;

/// Read every data row as unparsed text; cleaning happens in `preprocess`.
pub fn read_raw_prices(path: &Path) -> Result<Vec<RawRecord>, AppError> {
    let mut table = Table::open(path)?;
    let date_col = table.require("Date")?;
    let price_col = table.require("Price")?;

    let mut records = Vec::new();
    let mut row = StringRecord::new();
    let mut line = 1usize;
    while let Some(at) = table.next_row(&mut row, line)? {
        line = at;
        records.push(RawRecord {
            line,
            date: field(&row, date_col).to_string(),
            price: field(&row, price_col).to_string(),
        });
    }
    Ok(records)
}

/// Write `(date, price)` text pairs verbatim; an empty price marks a gap.
pub fn write_raw_prices(path: &Path, rows: &[(String, String)]) -> Result<(), AppError> {
    write_atomic(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        writer.write_record(["Date", "Price"]).map_err(|e| AppError::csv(path, e))?;
        for (date, price) in rows {
            writer.write_record([date, price]).map_err(|e| AppError::csv(path, e))?;
        }
        writer.flush().map_err(|e| AppError::io(path, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_loose_raw_file_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brent_prices.csv");
        std::fs::write(&path, "\u{feff}date,PRICE\n20-May-87,18.63\n21-May-87,\n\"Apr 22, 2020\", 13.77 \n").unwrap();

        let rows = read_raw_prices(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].price, "");
        assert_eq!(rows[2].date, "Apr 22, 2020");
        assert_eq!(rows[2].price, "13.77");
        assert_eq!(rows[2].line, 4);
    }

    #[test]
    fn missing_price_column_names_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "Date,Close\n2020-01-01,1\n").unwrap();
        let err = read_raw_prices(&path).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("Price"));
    }

    #[test]
    fn written_raw_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brent_prices.csv");
        let rows = vec![
            ("2020-01-02".to_string(), "66.25".to_string()),
            ("2020-01-03".to_string(), String::new()),
        ];
        write_raw_prices(&path, &rows).unwrap();
        let back = read_raw_prices(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].price, "66.25");
        assert_eq!(back[1].price, "");
    }
}
