pub mod cli;
pub mod coerce;
pub mod ingest;
pub mod io_utils;
pub mod predicate;
pub mod reconcile;
pub mod schema;
pub mod search;
pub mod store;
pub mod table;
pub mod value;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, ClearArgs, Commands, DescribeArgs, IngestArgs, SearchArgs, StatsArgs},
    ingest::FileOutcome,
    predicate::{FilterRequest, parse_column_filters},
    schema::{Family, schema_for},
    search::{ColumnClassification, describe_filterable_columns, execute_search, export_csv, sample_rows},
    store::{MemoryStore, TabularStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("licence_ledger", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&cli.store, &args),
        Commands::Search(args) => handle_search(&cli.store, &args),
        Commands::Describe(args) => handle_describe(&cli.store, &args),
        Commands::Stats(args) => handle_stats(&cli.store, &args),
        Commands::Clear(args) => handle_clear(&cli.store, &args),
    }
}

fn open_store(path: &Path) -> Result<MemoryStore> {
    MemoryStore::load(path).with_context(|| format!("Opening store {path:?}"))
}

fn handle_ingest(store_path: &Path, args: &IngestArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mut store = open_store(store_path)?;
    info!(
        "Ingesting {} input(s) into {}",
        args.inputs.len(),
        args.family
    );

    let result = ingest::ingest_files(&args.inputs, args.family, &mut store, args.delimiter, encoding);
    store
        .save(store_path)
        .with_context(|| format!("Saving store {store_path:?}"))?;

    if args.report_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.summary());
        for failure in result.failures() {
            if let FileOutcome::Failed { reason } = &failure.outcome {
                println!("  failed {}: {reason}", failure.name);
            }
        }
    }

    let (count, latest) = store.count_and_latest(args.family)?;
    info!(
        "{} now holds {count} record(s) (latest ingestion: {})",
        args.family,
        latest
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    Ok(())
}

fn handle_search(store_path: &Path, args: &SearchArgs) -> Result<()> {
    let store = open_store(store_path)?;
    let request = FilterRequest {
        key_terms: (args.key_a.clone(), args.key_b.clone()),
        expired_only: args.expired,
        recent_only: args.recent,
        column_filters: parse_column_filters(&args.filters)?,
        source_contains: args.source.clone(),
        ingested_on: args.ingested_on,
        expires_on: args.expires_on,
    };

    let result = execute_search(&request, args.family, &store)?;

    if let Some(output) = &args.output {
        export_csv(&result, Some(output.as_path()))?;
        info!(
            "Wrote {} record(s) to {}",
            result.rows.len(),
            output.display()
        );
        return Ok(());
    }

    if result.rows.is_empty() {
        println!("No records found matching your criteria.");
        return Ok(());
    }

    let schema = schema_for(args.family);
    table::print_table(&schema.column_names(), &result.display_rows());
    println!("Found {} record(s)", result.rows.len());
    Ok(())
}

fn handle_describe(store_path: &Path, args: &DescribeArgs) -> Result<()> {
    let store = open_store(store_path)?;
    let sample = sample_rows(&store, args.family)?;
    if sample.is_empty() {
        println!("No data available. Ingest some files first.");
        return Ok(());
    }
    let schema = schema_for(args.family);
    let described = describe_filterable_columns(&sample, &schema);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&described)?);
        return Ok(());
    }

    let headers = vec![
        "column".to_string(),
        "type".to_string(),
        "filter".to_string(),
        "values".to_string(),
    ];
    let rows: Vec<Vec<String>> = described
        .iter()
        .map(|column| {
            let (kind, values) = match &column.classification {
                ColumnClassification::Enumerable(values) => (
                    format!("dropdown ({})", values.len()),
                    values.join(", "),
                ),
                ColumnClassification::FreeText => ("free-text".to_string(), String::new()),
            };
            vec![
                column.name.clone(),
                column.data_type.to_string(),
                kind,
                values,
            ]
        })
        .collect();
    table::print_table(&headers, &rows);
    Ok(())
}

fn handle_stats(store_path: &Path, args: &StatsArgs) -> Result<()> {
    let store = open_store(store_path)?;
    let families: Vec<Family> = match args.family {
        Some(family) => vec![family],
        None => Family::ALL.to_vec(),
    };

    let headers = vec![
        "family".to_string(),
        "records".to_string(),
        "latest ingestion".to_string(),
    ];
    let mut rows = Vec::new();
    for family in families {
        let (count, latest) = store
            .count_and_latest(family)
            .with_context(|| format!("Reading stats for {family}"))?;
        rows.push(vec![
            family.to_string(),
            count.to_string(),
            latest
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string()),
        ]);
    }
    table::print_table(&headers, &rows);
    Ok(())
}

fn handle_clear(store_path: &Path, args: &ClearArgs) -> Result<()> {
    if !args.yes {
        bail!(
            "Clearing {} deletes every record; pass --yes to confirm",
            args.family
        );
    }
    let mut store = open_store(store_path)?;
    let (count, _) = store.count_and_latest(args.family)?;
    store.clear(args.family)?;
    store
        .save(store_path)
        .with_context(|| format!("Saving store {store_path:?}"))?;
    println!("Cleared {} ({count} row(s) removed)", args.family);
    Ok(())
}
