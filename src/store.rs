//! The tabular store capability and its in-memory implementation.
//!
//! The core is agnostic to the backing engine; [`TabularStore`] carries the
//! four operations it needs (append, predicate query, stats, clear). Rows are
//! only ever appended or wiped whole-table, never updated in place.
//! [`MemoryStore`] evaluates predicates row-by-row and persists itself as a
//! JSON document, which is plenty for a single-operator workload.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    coerce::CanonicalRow,
    predicate::{Condition, ConditionOp, Predicate},
    schema::{CanonicalSchema, Family, schema_for},
    value::Value,
};

/// Result sets are capped to bound response size.
pub const QUERY_ROW_LIMIT: usize = 5000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("column '{column}' does not exist in {family}")]
    UnknownColumn { family: Family, column: String },
    #[error("row has {got} value(s), {family} expects {expected}")]
    RowShape {
        family: Family,
        expected: usize,
        got: usize,
    },
    #[error("reading store file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing store file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait TabularStore {
    fn append(&mut self, family: Family, rows: Vec<CanonicalRow>) -> Result<(), StoreError>;

    /// Rows matching `predicate`, newest-ingested first, capped at
    /// [`QUERY_ROW_LIMIT`].
    fn query(&self, family: Family, predicate: &Predicate)
    -> Result<Vec<CanonicalRow>, StoreError>;

    fn count_and_latest(
        &self,
        family: Family,
    ) -> Result<(usize, Option<NaiveDateTime>), StoreError>;

    fn clear(&mut self, family: Family) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    tables: BTreeMap<Family, Vec<CanonicalRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the store from `path`; a missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store file {path:?} not found, starting empty");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let file = File::create(path).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), self).map_err(|source| {
            StoreError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::other(source),
            }
        })
    }

    fn rows(&self, family: Family) -> &[CanonicalRow] {
        self.tables.get(&family).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl TabularStore for MemoryStore {
    fn append(&mut self, family: Family, rows: Vec<CanonicalRow>) -> Result<(), StoreError> {
        let schema = schema_for(family);
        for row in &rows {
            if row.values.len() != schema.len() {
                return Err(StoreError::RowShape {
                    family,
                    expected: schema.len(),
                    got: row.values.len(),
                });
            }
        }
        self.tables.entry(family).or_default().extend(rows);
        Ok(())
    }

    fn query(
        &self,
        family: Family,
        predicate: &Predicate,
    ) -> Result<Vec<CanonicalRow>, StoreError> {
        let schema = schema_for(family);
        let mut matched = Vec::new();
        for row in self.rows(family) {
            if row_matches(row, &schema, predicate)? {
                matched.push(row.clone());
            }
        }
        let ordered = matched
            .into_iter()
            .sorted_by(|a, b| {
                b.ingestion_timestamp(&schema)
                    .cmp(&a.ingestion_timestamp(&schema))
            })
            .take(QUERY_ROW_LIMIT)
            .collect();
        Ok(ordered)
    }

    fn count_and_latest(
        &self,
        family: Family,
    ) -> Result<(usize, Option<NaiveDateTime>), StoreError> {
        let schema = schema_for(family);
        let rows = self.rows(family);
        let latest = rows
            .iter()
            .filter_map(|row| row.ingestion_timestamp(&schema))
            .max();
        Ok((rows.len(), latest))
    }

    fn clear(&mut self, family: Family) -> Result<(), StoreError> {
        self.tables.remove(&family);
        Ok(())
    }
}

fn row_matches(
    row: &CanonicalRow,
    schema: &CanonicalSchema,
    predicate: &Predicate,
) -> Result<bool, StoreError> {
    for condition in &predicate.conditions {
        if !condition_matches(row, schema, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn condition_matches(
    row: &CanonicalRow,
    schema: &CanonicalSchema,
    condition: &Condition,
) -> Result<bool, StoreError> {
    match condition {
        Condition::Single { column, op } => {
            let value = column_value(row, schema, column)?;
            Ok(op_matches(value, op))
        }
        Condition::BothContain { first, second } => {
            let left = column_value(row, schema, &first.0)?;
            let right = column_value(row, schema, &second.0)?;
            Ok(value_contains(left, &first.1) && value_contains(right, &second.1))
        }
    }
}

fn column_value<'a>(
    row: &'a CanonicalRow,
    schema: &CanonicalSchema,
    column: &str,
) -> Result<Option<&'a Value>, StoreError> {
    let idx = schema
        .column_index(column)
        .ok_or_else(|| StoreError::UnknownColumn {
            family: schema.family,
            column: column.to_string(),
        })?;
    Ok(row.values.get(idx).and_then(|v| v.as_ref()))
}

/// Substring match on the display form, ASCII case-insensitive the way
/// SQLite's LIKE is. Null never matches.
fn value_contains(value: Option<&Value>, needle: &str) -> bool {
    value.is_some_and(|v| {
        v.as_display()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    })
}

fn op_matches(value: Option<&Value>, op: &ConditionOp) -> bool {
    match op {
        ConditionOp::Contains(needle) => value_contains(value, needle),
        ConditionOp::Equals(expected) => value == Some(expected),
        ConditionOp::DateBefore(cutoff) => value
            .and_then(Value::as_date)
            .is_some_and(|date| date < *cutoff),
        ConditionOp::After(instant) => value
            .and_then(Value::as_datetime)
            .is_some_and(|ts| ts > *instant),
        ConditionOp::OnDate(day) => value
            .and_then(Value::as_date)
            .is_some_and(|date| date == *day),
    }
}
