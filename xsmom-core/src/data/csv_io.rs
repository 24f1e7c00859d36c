//! Wide price CSV: `timestamp,ASSET1,ASSET2,...`, one price per cell.
//!
//! Empty cells are missing quotes. Rows are turned into quotes and resampled,
//! so an hourly export can be read straight into a 12-hour table.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::provider::Quote;
use super::resample::{resample_with_universe, ResampleOutcome};
use crate::domain::PriceTable;
use crate::error::DataError;

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Output format used by [`write_price_csv`].
pub const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a timestamp cell.
///
/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS`, a bare date (midnight), or epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = s.parse().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc());
    }
    None
}

/// Read a wide price CSV from disk and resample it.
pub fn read_price_csv(path: impl AsRef<Path>, period_hours: u32) -> Result<ResampleOutcome, DataError> {
    let file = File::open(path.as_ref())?;
    read_price_csv_from(file, period_hours)
}

/// Read a wide price CSV from any reader and resample it.
pub fn read_price_csv_from<R: Read>(reader: R, period_hours: u32) -> Result<ResampleOutcome, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(DataError::Csv(
            "expected a timestamp column followed by at least one asset column".into(),
        ));
    }
    let assets: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut quotes = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let raw_ts = record.get(0).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
            DataError::Csv(format!("line {line}: unparseable timestamp '{raw_ts}'"))
        })?;
        for (asset, cell) in assets.iter().zip(record.iter().skip(1)) {
            if cell.is_empty() {
                continue;
            }
            let price: f64 = cell.parse().map_err(|_| {
                DataError::Csv(format!("line {line}: bad price '{cell}' for {asset}"))
            })?;
            quotes.push(Quote {
                timestamp,
                asset: asset.clone(),
                price,
            });
        }
    }

    resample_with_universe(&quotes, &assets, period_hours)
}

/// Write a table as wide CSV (header `timestamp,<assets>`).
pub fn write_price_csv<W: Write>(table: &PriceTable, writer: W) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(table.width() + 1);
    header.push("timestamp".to_string());
    header.extend(table.assets().iter().cloned());
    wtr.write_record(&header)?;

    for (ts, row) in table.panel().iter() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(ts.format(WRITE_FORMAT).to_string());
        record.extend(row.iter().map(|p| p.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a table to a CSV file, creating or truncating it.
pub fn write_price_csv_file(table: &PriceTable, path: impl AsRef<Path>) -> Result<(), DataError> {
    let file = File::create(path.as_ref())?;
    write_price_csv(table, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-05-01 12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("1714564800000"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-01"),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn hourly_csv_resamples_to_twelve_hours() {
        let mut csv = String::from("timestamp,BTCUSDT,ETHUSDT\n");
        for h in 0..24 {
            csv.push_str(&format!("2024-01-01 {h:02}:00:00,{},{}\n", 100 + h, 50 + h));
        }
        let out = read_price_csv_from(csv.as_bytes(), 12).unwrap();
        assert_eq!(out.table.len(), 2);
        assert_eq!(out.table.assets(), &["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
        assert_eq!(out.table.row(0).unwrap(), &[111.0, 61.0]);
        assert_eq!(out.table.row(1).unwrap(), &[123.0, 73.0]);
    }

    #[test]
    fn empty_cells_are_missing_quotes() {
        let csv = "timestamp,A,B\n\
                   2024-01-01 00:00:00,1.0,2.0\n\
                   2024-01-01 12:00:00,1.5,\n\
                   2024-01-02 00:00:00,2.0,3.0\n";
        let out = read_price_csv_from(csv.as_bytes(), 12).unwrap();
        assert_eq!(out.dropped_buckets, 1);
        assert_eq!(out.table.len(), 2);
    }

    #[test]
    fn bad_cells_report_line() {
        let csv = "timestamp,A\n2024-01-01 00:00:00,abc\n";
        match read_price_csv_from(csv.as_bytes(), 12) {
            Err(DataError::Csv(msg)) => assert!(msg.contains("line 2")),
            other => panic!("expected CSV error, got {other:?}"),
        }
        let csv = "timestamp\n2024-01-01 00:00:00\n";
        assert!(read_price_csv_from(csv.as_bytes(), 12).is_err());
    }

    #[test]
    fn written_csv_reads_back() {
        let csv = "timestamp,A,B\n\
                   2024-01-01 00:00:00,1.25,2.0\n\
                   2024-01-01 12:00:00,1.5,2.125\n";
        let table = read_price_csv_from(csv.as_bytes(), 12).unwrap().table;

        let mut buf = Vec::new();
        write_price_csv(&table, &mut buf).unwrap();
        let back = read_price_csv_from(buf.as_slice(), 12).unwrap().table;
        assert_eq!(back, table);
    }
}
