//! Batch ingestion: applying reconcile + coerce to every file in an upload
//! and appending the results to the store.
//!
//! Files are processed strictly in the order supplied. A failure in one file
//! (unreadable input, undecodable text, store append error) is recorded
//! against that file alone; the rest of the batch continues. ZIP archives are
//! expanded into the same per-file sequence, filtered to recognized tabular
//! extensions.

use std::{
    fs::File,
    io::{Cursor, Read},
    path::Path,
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{info, warn};
use serde::Serialize;

use crate::{
    coerce::{SourceTable, reconcile_and_coerce},
    io_utils,
    schema::{CanonicalSchema, Family, schema_for},
    store::TabularStore,
};

pub const RECOGNIZED_EXTENSIONS: &[&str] = &["csv", "tsv"];

/// Extensions the upload UI historically accepted but whose decoding lives
/// outside this tool; they fail per-file with a pointed reason.
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FileOutcome {
    Inserted { rows: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub name: String,
    pub outcome: FileOutcome,
}

/// Aggregate of one ingestion run; reported to the operator, not persisted.
#[derive(Debug, Default, Serialize)]
pub struct IngestionBatchResult {
    pub total_rows: usize,
    pub successful_files: usize,
    pub files: Vec<FileReport>,
}

impl IngestionBatchResult {
    fn record_success(&mut self, name: &str, rows: usize) {
        self.total_rows += rows;
        self.successful_files += 1;
        self.files.push(FileReport {
            name: name.to_string(),
            outcome: FileOutcome::Inserted { rows },
        });
    }

    fn record_failure(&mut self, name: &str, reason: String) {
        warn!("✗ {name}: {reason}");
        self.files.push(FileReport {
            name: name.to_string(),
            outcome: FileOutcome::Failed { reason },
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed { .. }))
    }

    pub fn summary(&self) -> String {
        format!(
            "{} file(s) succeeded, inserted {} row(s)",
            self.successful_files, self.total_rows
        )
    }
}

/// Ingests already-tabular sources. This is the core batch operation; file
/// and archive expansion feed it through [`ingest_files`].
pub fn ingest_tables(
    tables: &[SourceTable],
    family: Family,
    store: &mut dyn TabularStore,
) -> IngestionBatchResult {
    let schema = schema_for(family);
    let mut result = IngestionBatchResult::default();
    let total = tables.len();
    for (i, table) in tables.iter().enumerate() {
        info!("Processing {} ({} of {total})", table.name, i + 1);
        match ingest_one(table, &schema, store) {
            Ok(rows) => result.record_success(&table.name, rows),
            Err(err) => result.record_failure(&table.name, format!("{err:#}")),
        }
    }
    result
}

fn ingest_one(
    table: &SourceTable,
    schema: &CanonicalSchema,
    store: &mut dyn TabularStore,
) -> Result<usize> {
    let source_name = if table.name.is_empty() {
        None
    } else {
        Some(table.name.as_str())
    };
    let (mapping, rows) = reconcile_and_coerce(table, schema, source_name);
    if mapping.matched_count() == 0 && !table.headers.is_empty() {
        warn!(
            "'{}': no source column matched the {} schema",
            table.name, schema.family
        );
    }
    let count = rows.len();
    store
        .append(schema.family, rows)
        .with_context(|| format!("Appending rows from '{}'", table.name))?;
    Ok(count)
}

/// Reads `paths` (expanding `.zip` archives), ingesting each resulting table
/// independently. Per-file failures never abort the batch.
pub fn ingest_files(
    paths: &[std::path::PathBuf],
    family: Family,
    store: &mut dyn TabularStore,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> IngestionBatchResult {
    let schema = schema_for(family);
    let mut result = IngestionBatchResult::default();
    let total = paths.len();

    for (i, path) in paths.iter().enumerate() {
        let name = display_name(path);
        info!("Processing {name} ({} of {total})", i + 1);
        match extension_of(&name).as_deref() {
            Some("zip") => ingest_archive(path, &name, &schema, store, delimiter, encoding, &mut result),
            Some(ext) if RECOGNIZED_EXTENSIONS.contains(&ext) => {
                match load_table(path, &name, delimiter, encoding)
                    .and_then(|table| ingest_one(&table, &schema, store))
                {
                    Ok(rows) => result.record_success(&name, rows),
                    Err(err) => result.record_failure(&name, format!("{err:#}")),
                }
            }
            Some(ext) if SPREADSHEET_EXTENSIONS.contains(&ext) => {
                result.record_failure(
                    &name,
                    format!("spreadsheet decoding is not supported; convert '.{ext}' to CSV first"),
                );
            }
            _ => result.record_failure(&name, "unrecognized file extension".to_string()),
        }
    }

    info!("{}", result.summary());
    result
}

fn ingest_archive(
    path: &Path,
    archive_name: &str,
    schema: &CanonicalSchema,
    store: &mut dyn TabularStore,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
    result: &mut IngestionBatchResult,
) {
    let entries = match expand_archive(path) {
        Ok(entries) => entries,
        Err(err) => {
            result.record_failure(archive_name, format!("{err:#}"));
            return;
        }
    };
    if entries.is_empty() {
        result.record_failure(
            archive_name,
            "archive contains no recognized tabular files".to_string(),
        );
        return;
    }
    let total = entries.len();
    for (i, (entry_name, bytes)) in entries.into_iter().enumerate() {
        info!("Processing {entry_name} ({} of {total} in {archive_name})", i + 1);
        let outcome = read_table(
            Cursor::new(bytes),
            &entry_name,
            io_utils::resolve_delimiter(&entry_name, delimiter),
            encoding,
        )
        .and_then(|table| ingest_one(&table, schema, store));
        match outcome {
            Ok(rows) => result.record_success(&entry_name, rows),
            Err(err) => result.record_failure(&entry_name, format!("{err:#}")),
        }
    }
}

/// Unpacks `path`, keeping entries with a recognized tabular extension, in
/// archive order.
fn expand_archive(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let file = File::open(path).with_context(|| format!("Opening archive {path:?}"))?;
    let mut archive =
        zip::ZipArchive::new(file).with_context(|| format!("Reading archive {path:?}"))?;
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Reading entry {i} of {path:?}"))?;
        if !entry.is_file() {
            continue;
        }
        let entry_name = entry.name().to_string();
        let recognized = extension_of(&entry_name)
            .is_some_and(|ext| RECOGNIZED_EXTENSIONS.contains(&ext.as_str()));
        if !recognized {
            continue;
        }
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("Extracting '{entry_name}' from {path:?}"))?;
        entries.push((entry_name, bytes));
    }
    Ok(entries)
}

fn load_table(
    path: &Path,
    name: &str,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<SourceTable> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    read_table(file, name, io_utils::resolve_delimiter(name, delimiter), encoding)
}

fn read_table(
    reader: impl Read + 'static,
    name: &str,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<SourceTable> {
    let mut csv_reader = io_utils::open_csv_reader(reader, delimiter);
    let headers = io_utils::decode_record(
        &csv_reader
            .byte_headers()
            .with_context(|| format!("Reading header row of '{name}'"))?
            .clone(),
        encoding,
    )
    .with_context(|| format!("Decoding header row of '{name}'"))?;

    let mut rows = Vec::new();
    for (idx, record) in csv_reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} of '{name}'", idx + 2))?;
        let decoded = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {} of '{name}'", idx + 2))?;
        rows.push(decoded);
    }

    Ok(SourceTable {
        name: name.to_string(),
        headers,
        rows,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}
