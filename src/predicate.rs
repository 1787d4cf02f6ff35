//! Compiles a structured filter request into a store-agnostic predicate.
//!
//! A predicate is an ordered list of conditions, each carrying its bound
//! parameter out-of-band from any query text, so a store driver binds values
//! safely regardless of backend. Conditions combine with AND only; the one
//! deliberate exception is the dual-key search, which when both terms are
//! supplied emits a single combined condition requiring both substrings to
//! match. Compiling a predicate never fails; an empty request compiles to an
//! empty predicate that matches every row.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::{
    schema::{CanonicalSchema, INGESTION_TIMESTAMP_COLUMN, SOURCE_FILENAME_COLUMN},
    value::{Value, coerce_value},
};

/// Window used by the "recent uploads" quick filter.
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// An advanced per-column filter value: exact equality or substring match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterValue {
    Exact(String),
    Contains(String),
}

/// All fields independently optional; the default request matches every row.
#[derive(Debug, Clone, Default)]
pub struct FilterRequest {
    /// Terms bound positionally to the family's two primary-key columns.
    pub key_terms: (Option<String>, Option<String>),
    pub expired_only: bool,
    pub recent_only: bool,
    /// Ordered advanced filters, column name to value.
    pub column_filters: Vec<(String, FilterValue)>,
    pub source_contains: Option<String>,
    pub ingested_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
}

impl FilterRequest {
    pub fn is_empty(&self) -> bool {
        self.key_terms.0.is_none()
            && self.key_terms.1.is_none()
            && !self.expired_only
            && !self.recent_only
            && self.column_filters.is_empty()
            && self.source_contains.is_none()
            && self.ingested_on.is_none()
            && self.expires_on.is_none()
    }
}

/// Parses advanced-filter arguments of the form `column=value` (exact) or
/// `column~value` (contains). The first `=` or `~` splits the expression, so
/// column names may contain spaces.
pub fn parse_column_filters(filters: &[String]) -> anyhow::Result<Vec<(String, FilterValue)>> {
    filters.iter().map(|f| parse_column_filter(f)).collect()
}

fn parse_column_filter(filter: &str) -> anyhow::Result<(String, FilterValue)> {
    let trimmed = filter.trim();
    let split = trimmed
        .char_indices()
        .find(|(_, c)| *c == '=' || *c == '~');
    match split {
        Some((idx, sep)) => {
            let column = trimmed[..idx].trim();
            let value = trimmed[idx + sep.len_utf8()..].trim();
            if column.is_empty() {
                anyhow::bail!("Filter '{trimmed}' is missing a column name");
            }
            let filter_value = if sep == '~' {
                FilterValue::Contains(value.to_string())
            } else {
                FilterValue::Exact(value.to_string())
            };
            Ok((column.to_string(), filter_value))
        }
        None => anyhow::bail!(
            "Filter '{trimmed}' must use 'column=value' (exact) or 'column~value' (contains)"
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConditionOp {
    /// Case-insensitive substring match on the value's display form.
    Contains(String),
    Equals(Value),
    /// Calendar-date comparison: column's date portion strictly before.
    DateBefore(NaiveDate),
    /// Timestamp strictly after the bound instant.
    After(NaiveDateTime),
    /// Calendar-date portion equals the bound date.
    OnDate(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    Single {
        column: String,
        op: ConditionOp,
    },
    /// Dual-key search with both terms supplied: both substrings must match.
    BothContain {
        first: (String, String),
        second: (String, String),
    },
}

impl Condition {
    fn contains(column: &str, needle: &str) -> Self {
        Condition::Single {
            column: column.to_string(),
            op: ConditionOp::Contains(needle.to_string()),
        }
    }

    /// Template form with the parameter elided, for logging and reports.
    pub fn template(&self) -> String {
        match self {
            Condition::Single { column, op } => match op {
                ConditionOp::Contains(_) => format!("\"{column}\" CONTAINS ?"),
                ConditionOp::Equals(_) => format!("\"{column}\" = ?"),
                ConditionOp::DateBefore(_) => format!("date(\"{column}\") < ?"),
                ConditionOp::After(_) => format!("\"{column}\" > ?"),
                ConditionOp::OnDate(_) => format!("date(\"{column}\") = ?"),
            },
            Condition::BothContain { first, second } => format!(
                "(\"{}\" CONTAINS ? AND \"{}\" CONTAINS ?)",
                first.0, second.0
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Predicate {
    pub conditions: Vec<Condition>,
}

impl Predicate {
    pub fn matches_all_rows(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn describe(&self) -> String {
        if self.conditions.is_empty() {
            "<all rows>".to_string()
        } else {
            self.conditions
                .iter()
                .map(Condition::template)
                .collect::<Vec<_>>()
                .join(" AND ")
        }
    }
}

fn non_empty(term: &Option<String>) -> Option<&str> {
    term.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

/// Builds the predicate for `request` against one family's schema.
///
/// `now` is the instant quick-filter cutoffs are computed from; callers pass
/// the current time, tests pass a fixed one.
pub fn build_predicate(
    request: &FilterRequest,
    schema: &CanonicalSchema,
    primary_keys: (&str, &str),
    expiry_column: &str,
    now: NaiveDateTime,
) -> Predicate {
    let mut conditions = Vec::new();

    match (non_empty(&request.key_terms.0), non_empty(&request.key_terms.1)) {
        (Some(first), Some(second)) => conditions.push(Condition::BothContain {
            first: (primary_keys.0.to_string(), first.to_string()),
            second: (primary_keys.1.to_string(), second.to_string()),
        }),
        (Some(first), None) => conditions.push(Condition::contains(primary_keys.0, first)),
        (None, Some(second)) => conditions.push(Condition::contains(primary_keys.1, second)),
        (None, None) => {}
    }

    if request.expired_only {
        conditions.push(Condition::Single {
            column: expiry_column.to_string(),
            op: ConditionOp::DateBefore(now.date()),
        });
    }

    if request.recent_only {
        conditions.push(Condition::Single {
            column: INGESTION_TIMESTAMP_COLUMN.to_string(),
            op: ConditionOp::After(now - Duration::days(RECENT_WINDOW_DAYS)),
        });
    }

    for (column, filter) in &request.column_filters {
        let op = match filter {
            FilterValue::Contains(needle) => ConditionOp::Contains(needle.clone()),
            FilterValue::Exact(raw) => {
                // A value that does not fit the column's type still compiles;
                // it simply matches nothing when executed.
                let typed = schema
                    .column_type(column)
                    .and_then(|ty| coerce_value(raw, ty))
                    .unwrap_or_else(|| Value::Text(raw.clone()));
                ConditionOp::Equals(typed)
            }
        };
        conditions.push(Condition::Single {
            column: column.clone(),
            op,
        });
    }

    if let Some(source) = non_empty(&request.source_contains) {
        conditions.push(Condition::contains(SOURCE_FILENAME_COLUMN, source));
    }

    if let Some(date) = request.ingested_on {
        conditions.push(Condition::Single {
            column: INGESTION_TIMESTAMP_COLUMN.to_string(),
            op: ConditionOp::OnDate(date),
        });
    }

    if let Some(date) = request.expires_on {
        conditions.push(Condition::Single {
            column: expiry_column.to_string(),
            op: ConditionOp::OnDate(date),
        });
    }

    Predicate { conditions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Family, expiry_column_for, primary_keys_for, schema_for};
    use chrono::NaiveDate;

    fn build(request: &FilterRequest, family: Family) -> Predicate {
        let schema = schema_for(family);
        let now = NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        build_predicate(
            request,
            &schema,
            primary_keys_for(family),
            expiry_column_for(family),
            now,
        )
    }

    #[test]
    fn empty_request_compiles_to_match_all() {
        let predicate = build(&FilterRequest::default(), Family::StateLicence);
        assert!(predicate.matches_all_rows());
        assert_eq!(predicate.describe(), "<all rows>");
    }

    #[test]
    fn single_key_term_adds_one_contains_condition() {
        let request = FilterRequest {
            key_terms: (Some("R-10".to_string()), None),
            ..Default::default()
        };
        let predicate = build(&request, Family::StateLicence);
        assert_eq!(
            predicate.conditions,
            vec![Condition::contains("REF ID", "R-10")]
        );
    }

    #[test]
    fn second_key_term_binds_to_second_column() {
        let request = FilterRequest {
            key_terms: (None, Some("LIC-7".to_string())),
            ..Default::default()
        };
        let predicate = build(&request, Family::StateLicence);
        assert_eq!(
            predicate.conditions,
            vec![Condition::contains("LICENSE", "LIC-7")]
        );
    }

    #[test]
    fn both_key_terms_combine_into_a_conjunction() {
        let request = FilterRequest {
            key_terms: (Some("R-10".to_string()), Some("LIC-7".to_string())),
            ..Default::default()
        };
        let predicate = build(&request, Family::StateLicence);
        assert_eq!(
            predicate.conditions,
            vec![Condition::BothContain {
                first: ("REF ID".to_string(), "R-10".to_string()),
                second: ("LICENSE".to_string(), "LIC-7".to_string()),
            }]
        );
    }

    #[test]
    fn blank_key_terms_add_no_conditions() {
        let request = FilterRequest {
            key_terms: (Some("   ".to_string()), Some(String::new())),
            ..Default::default()
        };
        assert!(build(&request, Family::Registration).matches_all_rows());
    }

    #[test]
    fn quick_filters_use_the_supplied_instant() {
        let request = FilterRequest {
            expired_only: true,
            recent_only: true,
            ..Default::default()
        };
        let predicate = build(&request, Family::Registration);
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let cutoff = today.and_hms_opt(12, 0, 0).unwrap() - Duration::days(7);
        assert_eq!(
            predicate.conditions,
            vec![
                Condition::Single {
                    column: "expiryDate".to_string(),
                    op: ConditionOp::DateBefore(today),
                },
                Condition::Single {
                    column: INGESTION_TIMESTAMP_COLUMN.to_string(),
                    op: ConditionOp::After(cutoff),
                },
            ]
        );
    }

    #[test]
    fn advanced_exact_filter_coerces_by_column_type() {
        let request = FilterRequest {
            column_filters: vec![
                ("AMOUNT".to_string(), FilterValue::Exact("100".to_string())),
                ("STATE".to_string(), FilterValue::Contains("Guj".to_string())),
            ],
            ..Default::default()
        };
        let predicate = build(&request, Family::StateLicence);
        assert_eq!(
            predicate.conditions[0],
            Condition::Single {
                column: "AMOUNT".to_string(),
                op: ConditionOp::Equals(Value::Numeric("100".parse().unwrap())),
            }
        );
        assert_eq!(
            predicate.conditions[1],
            Condition::Single {
                column: "STATE".to_string(),
                op: ConditionOp::Contains("Guj".to_string()),
            }
        );
    }

    #[test]
    fn malformed_exact_filter_still_compiles() {
        let request = FilterRequest {
            column_filters: vec![(
                "AMOUNT".to_string(),
                FilterValue::Exact("not numeric".to_string()),
            )],
            ..Default::default()
        };
        let predicate = build(&request, Family::StateLicence);
        assert_eq!(predicate.len(), 1);
        assert_eq!(
            predicate.conditions[0],
            Condition::Single {
                column: "AMOUNT".to_string(),
                op: ConditionOp::Equals(Value::Text("not numeric".to_string())),
            }
        );
    }

    #[test]
    fn date_filters_target_the_calendar_date_portion() {
        let day = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let request = FilterRequest {
            source_contains: Some("batch_7".to_string()),
            ingested_on: Some(day),
            expires_on: Some(day),
            ..Default::default()
        };
        let predicate = build(&request, Family::Registration);
        assert_eq!(
            predicate.conditions,
            vec![
                Condition::contains(SOURCE_FILENAME_COLUMN, "batch_7"),
                Condition::Single {
                    column: INGESTION_TIMESTAMP_COLUMN.to_string(),
                    op: ConditionOp::OnDate(day),
                },
                Condition::Single {
                    column: "expiryDate".to_string(),
                    op: ConditionOp::OnDate(day),
                },
            ]
        );
    }

    #[test]
    fn column_filter_arguments_parse_exact_and_contains() {
        let parsed = parse_column_filters(&[
            "STATE=Kerala".to_string(),
            "FBO NAME~acme".to_string(),
        ])
        .unwrap();
        assert_eq!(
            parsed,
            vec![
                ("STATE".to_string(), FilterValue::Exact("Kerala".to_string())),
                (
                    "FBO NAME".to_string(),
                    FilterValue::Contains("acme".to_string())
                ),
            ]
        );
        assert!(parse_column_filters(&["no separator".to_string()]).is_err());
        assert!(parse_column_filters(&["=orphan".to_string()]).is_err());
    }

    #[test]
    fn building_twice_yields_an_equivalent_predicate() {
        let request = FilterRequest {
            key_terms: (Some("R".to_string()), Some("L".to_string())),
            expired_only: true,
            column_filters: vec![(
                "stateName".to_string(),
                FilterValue::Exact("Kerala".to_string()),
            )],
            source_contains: Some("q1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            build(&request, Family::Registration),
            build(&request, Family::Registration)
        );
    }
}
