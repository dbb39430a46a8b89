use chrono::NaiveDate;
use csv::StringRecord;

use crate::constants::{COL_ACCOUNTS_LAST_MADE_UP, COL_INCORPORATION_DATE, COL_RETURNS_LAST_MADE_UP};

// Snapshot exports have used both of these over the years.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Derive the "valid as of" date for a row: the chronologically latest of
/// the candidate date fields that parse. Unparsable or empty candidates are
/// ignored; when none parse the record simply carries no valid_at.
pub fn select_valid_at(record: &StringRecord) -> Option<NaiveDate> {
    [
        COL_INCORPORATION_DATE,
        COL_RETURNS_LAST_MADE_UP,
        COL_ACCOUNTS_LAST_MADE_UP,
    ]
    .iter()
    .filter_map(|&col| record.get(col).and_then(parse_date))
    .max()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}
