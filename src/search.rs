//! Search orchestration: compile a filter request, run it against the store,
//! and shape the results for rendering or export. Also implements the
//! two-step filterable-column description protocol that lets a front end
//! decide which columns to offer as dropdowns versus free text.

use std::{collections::BTreeSet, path::Path};

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use serde::Serialize;

use crate::{
    coerce::CanonicalRow,
    io_utils,
    predicate::{FilterRequest, Predicate, build_predicate},
    schema::{
        CanonicalSchema, ColumnType, Family, expiry_column_for, primary_keys_for, schema_for,
    },
    store::TabularStore,
    value::Value,
};

/// Columns with fewer distinct values than this are offered as dropdowns.
pub const ENUMERABLE_MAX_VALUES: usize = 50;

/// Rows sampled when describing filterable columns.
pub const DESCRIBE_SAMPLE_ROWS: usize = 1000;

#[derive(Debug)]
pub struct SearchResult {
    pub family: Family,
    pub predicate: Predicate,
    pub rows: Vec<CanonicalRow>,
}

impl SearchResult {
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows.iter().map(CanonicalRow::to_display).collect()
    }
}

/// Compiles `request` and executes it, newest-ingested rows first. A store
/// failure surfaces as the operation's error, never an empty result.
pub fn execute_search(
    request: &FilterRequest,
    family: Family,
    store: &dyn TabularStore,
) -> Result<SearchResult> {
    let schema = schema_for(family);
    let predicate = build_predicate(
        request,
        &schema,
        primary_keys_for(family),
        expiry_column_for(family),
        Utc::now().naive_utc(),
    );
    info!(
        "Searching {family} with {} condition(s): {}",
        predicate.len(),
        predicate.describe()
    );
    let rows = store
        .query(family, &predicate)
        .with_context(|| format!("Searching {family} records"))?;
    info!("Found {} record(s)", rows.len());
    Ok(SearchResult {
        family,
        predicate,
        rows,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnClassification {
    /// Few enough distinct values to enumerate; values sorted.
    Enumerable(Vec<String>),
    FreeText,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterableColumn {
    pub name: String,
    pub data_type: ColumnType,
    pub classification: ColumnClassification,
}

/// Classifies each business column of `schema` from a row sample. Columns
/// with no populated value in the sample are omitted, matching how the
/// filter UI hides them.
pub fn describe_filterable_columns(
    sample: &[CanonicalRow],
    schema: &CanonicalSchema,
) -> Vec<FilterableColumn> {
    schema
        .business_columns()
        .filter_map(|column| {
            let idx = schema.column_index(&column.name)?;
            let distinct: BTreeSet<String> = sample
                .iter()
                .filter_map(|row| row.values.get(idx).and_then(|v| v.as_ref()))
                .map(Value::as_display)
                .collect();
            if distinct.is_empty() {
                return None;
            }
            let classification = if distinct.len() < ENUMERABLE_MAX_VALUES {
                ColumnClassification::Enumerable(distinct.into_iter().collect())
            } else {
                ColumnClassification::FreeText
            };
            Some(FilterableColumn {
                name: column.name.clone(),
                data_type: column.data_type,
                classification,
            })
        })
        .collect()
}

/// Fetches the row sample `describe_filterable_columns` works from.
pub fn sample_rows(store: &dyn TabularStore, family: Family) -> Result<Vec<CanonicalRow>> {
    let mut rows = store
        .query(family, &Predicate::default())
        .with_context(|| format!("Sampling {family} records"))?;
    rows.truncate(DESCRIBE_SAMPLE_ROWS);
    Ok(rows)
}

/// Writes `result` as CSV with canonical headers; `-` or `None` means stdout.
pub fn export_csv(result: &SearchResult, path: Option<&Path>) -> Result<()> {
    let schema = schema_for(result.family);
    let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER)?;
    writer
        .write_record(schema.column_names())
        .context("Writing export header")?;
    for (idx, row) in result.rows.iter().enumerate() {
        writer
            .write_record(row.to_display())
            .with_context(|| format!("Writing export row {}", idx + 1))?;
    }
    writer.flush().context("Flushing export output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::{SourceTable, reconcile_and_coerce};

    fn sample(families: &[&str], states: &[&str]) -> (Vec<CanonicalRow>, CanonicalSchema) {
        let schema = schema_for(Family::StateLicence);
        let rows: Vec<Vec<String>> = families
            .iter()
            .zip(states)
            .map(|(f, s)| vec![f.to_string(), s.to_string()])
            .collect();
        let table = SourceTable {
            name: "sample.csv".to_string(),
            headers: vec!["FBO NAME".to_string(), "STATE".to_string()],
            rows,
        };
        let (_, rows) = reconcile_and_coerce(&table, &schema, Some("sample.csv"));
        (rows, schema)
    }

    #[test]
    fn describe_classifies_low_cardinality_as_enumerable() {
        let (rows, schema) = sample(
            &["Acme", "Bolt", "Crate"],
            &["Kerala", "Kerala", "Gujarat"],
        );
        let described = describe_filterable_columns(&rows, &schema);
        let state = described
            .iter()
            .find(|c| c.name == "STATE")
            .expect("STATE populated");
        assert_eq!(
            state.classification,
            ColumnClassification::Enumerable(vec![
                "Gujarat".to_string(),
                "Kerala".to_string()
            ])
        );
    }

    #[test]
    fn describe_omits_unpopulated_columns() {
        let (rows, schema) = sample(&["Acme"], &["Kerala"]);
        let described = describe_filterable_columns(&rows, &schema);
        assert!(described.iter().all(|c| c.name != "ADDRESS"));
        assert!(described.iter().all(|c| c.name != "source_filename"));
    }

    #[test]
    fn describe_flips_to_free_text_above_the_threshold() {
        let names: Vec<String> = (0..ENUMERABLE_MAX_VALUES)
            .map(|i| format!("Operator {i}"))
            .collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let states: Vec<&str> = names.iter().map(|_| "Kerala").collect();
        let (rows, schema) = sample(&name_refs, &states);
        let described = describe_filterable_columns(&rows, &schema);
        let fbo = described.iter().find(|c| c.name == "FBO NAME").unwrap();
        assert_eq!(fbo.classification, ColumnClassification::FreeText);
    }
}
