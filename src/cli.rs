use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::schema::Family;

#[derive(Debug, Parser)]
#[command(version, about = "Ingest and search regulatory licence records", long_about = None)]
pub struct Cli {
    /// Path to the ledger store file
    #[arg(long, global = true, default_value = "ledger.json")]
    pub store: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest CSV/TSV files or ZIP archives into a record family
    Ingest(IngestArgs),
    /// Search a record family with composable filters
    Search(SearchArgs),
    /// Classify a family's columns as dropdown-friendly or free-text
    Describe(DescribeArgs),
    /// Show record counts and latest ingestion time per family
    Stats(StatsArgs),
    /// Delete every record of one family
    Clear(ClearArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Input files (.csv, .tsv, or .zip archives of either), processed in order
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
    /// Target record family
    #[arg(short, long, value_enum)]
    pub family: Family,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Emit the batch report as JSON instead of plain text
    #[arg(long = "report-json")]
    pub report_json: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Record family to search
    #[arg(short, long, value_enum)]
    pub family: Family,
    /// Partial match on the family's first primary-key column
    #[arg(long = "key-a")]
    pub key_a: Option<String>,
    /// Partial match on the family's second primary-key column;
    /// combined with --key-a, a record must match both
    #[arg(long = "key-b")]
    pub key_b: Option<String>,
    /// Only records whose expiry date has passed
    #[arg(long)]
    pub expired: bool,
    /// Only records ingested within the last 7 days
    #[arg(long)]
    pub recent: bool,
    /// Per-column filters: `column=value` (exact) or `column~value` (contains)
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Substring match on the source filename
    #[arg(long)]
    pub source: Option<String>,
    /// Records ingested on this calendar date (YYYY-MM-DD)
    #[arg(long = "ingested-on", value_parser = parse_date_arg)]
    pub ingested_on: Option<NaiveDate>,
    /// Records expiring on this calendar date (YYYY-MM-DD)
    #[arg(long = "expires-on", value_parser = parse_date_arg)]
    pub expires_on: Option<NaiveDate>,
    /// Write results as CSV to this path ('-' for stdout) instead of a table
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Record family to describe
    #[arg(short, long, value_enum)]
    pub family: Family,
    /// Emit the description as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Limit output to one family (defaults to all)
    #[arg(short, long, value_enum)]
    pub family: Option<Family>,
}

#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Record family to wipe
    #[arg(short, long, value_enum)]
    pub family: Family,
    /// Required confirmation; without it nothing is deleted
    #[arg(long)]
    pub yes: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    crate::value::parse_date(value.trim())
        .ok_or_else(|| format!("'{value}' is not a recognizable date"))
}
