//! Row coercion: turning reconciled source rows into canonical rows.
//!
//! Output row count always equals input row count and no cell ever raises;
//! values that do not fit their column's semantic type become null. The two
//! metadata columns are stamped here: `source_filename` falls back to the
//! `manual_upload` sentinel when neither the upload nor the caller supplies
//! one, and `ingestion_timestamp` is always the coercion instant, even when a
//! source column happens to map onto it.

use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    reconcile::{ColumnMapping, reconcile},
    schema::{
        CanonicalSchema, INGESTION_TIMESTAMP_COLUMN, MANUAL_UPLOAD_SENTINEL,
        SOURCE_FILENAME_COLUMN,
    },
    value::{Value, coerce_value},
};

/// One uploaded file, already decoded into headers plus raw string rows.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One record conforming to a [`CanonicalSchema`]; `values` is parallel to
/// the schema's column list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub values: Vec<Option<Value>>,
}

impl CanonicalRow {
    pub fn get<'a>(&'a self, schema: &CanonicalSchema, column: &str) -> Option<&'a Value> {
        let idx = schema.column_index(column)?;
        self.values.get(idx).and_then(|v| v.as_ref())
    }

    pub fn ingestion_timestamp(
        &self,
        schema: &CanonicalSchema,
    ) -> Option<chrono::NaiveDateTime> {
        self.get(schema, INGESTION_TIMESTAMP_COLUMN)
            .and_then(Value::as_datetime)
    }

    pub fn to_display(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|v| v.as_ref().map(Value::as_display).unwrap_or_default())
            .collect()
    }
}

/// Coerces every row of `table` through `mapping` into canonical rows.
///
/// `source_name` populates `source_filename` for rows where the upload did
/// not carry one itself; `None` falls back to the sentinel.
pub fn coerce_table(
    table: &SourceTable,
    mapping: &ColumnMapping,
    schema: &CanonicalSchema,
    source_name: Option<&str>,
) -> Vec<CanonicalRow> {
    let stamped_at = Utc::now().naive_utc();
    let fallback_source = source_name.unwrap_or(MANUAL_UPLOAD_SENTINEL);

    let source_indices: Vec<Option<usize>> = schema
        .columns
        .iter()
        .map(|c| mapping.source_index(&c.name))
        .collect();
    let filename_idx = schema.column_index(SOURCE_FILENAME_COLUMN);
    let timestamp_idx = schema.column_index(INGESTION_TIMESTAMP_COLUMN);

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut values: Vec<Option<Value>> = schema
                .columns
                .iter()
                .zip(&source_indices)
                .map(|(column, source)| {
                    source
                        .and_then(|idx| row.get(idx))
                        .and_then(|raw| coerce_value(raw, column.data_type))
                })
                .collect();

            if let Some(idx) = filename_idx {
                if values[idx].is_none() {
                    values[idx] = Some(Value::Text(fallback_source.to_string()));
                }
            }
            if let Some(idx) = timestamp_idx {
                // Never taken from source data.
                values[idx] = Some(Value::DateTime(stamped_at));
            }

            CanonicalRow { values }
        })
        .collect::<Vec<_>>();

    debug!(
        "Coerced {} row(s) from '{}' into {} ({} of {} columns matched)",
        rows.len(),
        table.name,
        schema.family,
        mapping.matched_count(),
        schema.len()
    );
    rows
}

/// Reconciles `table`'s headers against `schema` and coerces its rows in one
/// step. This is the per-file unit of work the batch ingestor applies.
pub fn reconcile_and_coerce(
    table: &SourceTable,
    schema: &CanonicalSchema,
    source_name: Option<&str>,
) -> (ColumnMapping, Vec<CanonicalRow>) {
    let mapping = reconcile(&table.headers, schema);
    let rows = coerce_table(table, &mapping, schema, source_name);
    (mapping, rows)
}
