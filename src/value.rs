//! Typed cell values and permissive coercion.
//!
//! Coercion is total by design: a cell that cannot be parsed into its
//! column's semantic type becomes null instead of an error, matching how
//! upstream spreadsheet exports degrade. The literal strings `"nan"` and
//! `"None"` are artifacts of numeric/object conversions in common tabular
//! tooling and normalize to null for text columns.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Numeric(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Numeric(n) => n.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Calendar-date portion, for `date(column) = ?` style conditions.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    // Datetime-shaped input in a date column keeps its calendar date.
    parse_datetime_only(value).map(|dt| dt.date())
}

pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    if let Some(parsed) = parse_datetime_only(value) {
        return Some(parsed);
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn parse_datetime_only(value: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    None
}

/// Coerces one raw cell into `ty`. Returns `None` for empty cells, the
/// `"nan"`/`"None"` null artifacts, and anything unparseable.
pub fn coerce_value(raw: &str, ty: ColumnType) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match ty {
        ColumnType::Text => {
            if trimmed == "nan" || trimmed == "None" {
                None
            } else {
                Some(Value::Text(raw.to_string()))
            }
        }
        ColumnType::Numeric => trimmed.parse::<Decimal>().ok().map(Value::Numeric),
        ColumnType::Date => parse_date(trimmed).map(Value::Date),
        ColumnType::DateTime => parse_datetime(trimmed).map(Value::DateTime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_date("2024-05-06"), Some(expected));
        assert_eq!(parse_date("06/05/2024"), Some(expected));
        assert_eq!(parse_date("2024/05/06"), Some(expected));
        assert_eq!(parse_date("06-05-2024"), Some(expected));
        assert_eq!(parse_date("2024-05-06 12:00:00"), Some(expected));
        assert_eq!(parse_date("never"), None);
    }

    #[test]
    fn parse_datetime_accepts_bare_dates_as_midnight() {
        let midnight = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("2024-05-06"), Some(midnight));
        assert_eq!(
            parse_datetime("2024-05-06T14:30:00"),
            NaiveDate::from_ymd_opt(2024, 5, 6)
                .unwrap()
                .and_hms_opt(14, 30, 0)
        );
    }

    #[test]
    fn coerce_value_nulls_empty_and_artifacts() {
        assert_eq!(coerce_value("", ColumnType::Text), None);
        assert_eq!(coerce_value("   ", ColumnType::Numeric), None);
        assert_eq!(coerce_value("nan", ColumnType::Text), None);
        assert_eq!(coerce_value("None", ColumnType::Text), None);
        // Only the exact artifacts normalize; other text passes through.
        assert_eq!(
            coerce_value("NaN Industries", ColumnType::Text),
            Some(Value::Text("NaN Industries".to_string()))
        );
    }

    #[test]
    fn coerce_value_degrades_to_null_instead_of_erroring() {
        assert_eq!(coerce_value("not a number", ColumnType::Numeric), None);
        assert_eq!(coerce_value("someday", ColumnType::Date), None);
        assert_eq!(
            coerce_value("1234.50", ColumnType::Numeric),
            Some(Value::Numeric("1234.50".parse().unwrap()))
        );
    }

    #[test]
    fn display_round_trips_date_formatting() {
        let value = Value::Date(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        assert_eq!(value.to_string(), "2025-01-31");
        assert_eq!(value.as_date(), NaiveDate::from_ymd_opt(2025, 1, 31));
    }
}
