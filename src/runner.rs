//! High-level runner API for loading files into a table environment.
//!
//! This module wires the file readers, the table environment and the batch
//! codec together. It is the primary API for the CLI.

use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use crate::catalog::QualifiedPath;
use crate::codec;
use crate::config::{DEFAULT_CATALOG, DEFAULT_DATABASE};
use crate::formats::{Format, FrameHint, SourceData, read_source};
use crate::gateway::{EnvironmentSettings, LoopbackChannel, TableEnvironment};
use crate::schema::{EngineRow, RowSchema, SchemaHint};

/// Arguments for loading one source file
#[derive(Debug, Clone)]
pub struct LoadArgs {
    pub source: PathBuf,
    /// Auto-detected from the file extension when unset
    pub format: Option<Format>,

    /// Field names replacing the inferred or frame names
    pub names: Option<Vec<String>>,
    pub verify_schema: bool,
    /// Only applies to delimited formats
    pub has_header: bool,

    /// Register the loaded table as a temporary view at this path
    pub view: Option<String>,
    pub catalog: Option<String>,
    pub database: Option<String>,

    /// Write the loaded rows as a batch file here
    pub output: Option<PathBuf>,
}

impl LoadArgs {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            format: None,
            names: None,
            verify_schema: true,
            has_header: true,
            view: None,
            catalog: None,
            database: None,
            output: None,
        }
    }
}

/// Result of a completed load
#[derive(Debug)]
pub struct LoadResult {
    pub table_id: Uuid,
    pub schema: RowSchema,
    pub rows_loaded: usize,
    pub view: Option<QualifiedPath>,
    pub output: Option<PathBuf>,
    pub duration: Duration,
}

/// Load a file into an in-process engine session
///
/// The session starts in the default catalog and database; `catalog` and
/// `database` switch it (creating them in the in-process engine) before the
/// table is created.
pub async fn run_load(args: LoadArgs) -> Result<LoadResult> {
    let mut channel = LoopbackChannel::new();
    if args.catalog.is_some() || args.database.is_some() {
        channel = channel.with_database(
            args.catalog.as_deref().unwrap_or(DEFAULT_CATALOG),
            args.database.as_deref().unwrap_or(DEFAULT_DATABASE),
        );
    }

    let env = TableEnvironment::create(Arc::new(channel), EnvironmentSettings::default());

    if let Some(catalog) = &args.catalog {
        env.use_catalog(catalog).await?;
    }
    if let Some(database) = &args.database {
        env.use_database(database).await?;
    }

    load_into(&env, &args).await
}

/// Load a file through an existing table environment
pub async fn load_into(env: &TableEnvironment, args: &LoadArgs) -> Result<LoadResult> {
    let start = Instant::now();

    let format = match args.format {
        Some(format) => format,
        None => Format::detect(&args.source).with_context(|| {
            format!(
                "Could not detect format from file '{}'. \
                 Supported extensions: .csv, .tsv, .json, .jsonl, .ndjson, .parquet",
                args.source.display()
            )
        })?,
    };

    info!("Reading {} as {:?}", args.source.display(), format);
    let source = read_source(&args.source, format, args.has_header).await?;
    info!("Read {} rows", source.row_count());

    let table = match source {
        SourceData::Records(records) => {
            let hint = args.names.clone().map(SchemaHint::Names);
            env.from_elements(&records, hint.as_ref(), args.verify_schema)
                .await
                .context("Failed to create table from records")?
        }
        SourceData::Frame { schema, batches } => {
            let hint = args.names.clone().map(FrameHint::Names);
            env.from_record_batches(&schema, &batches, hint.as_ref())
                .await
                .context("Failed to create table from record batches")?
        }
    };

    let rows = env.collect(&table).await?;

    let view = match &args.view {
        Some(path) => Some(env.create_temporary_view(path, &table).await?),
        None => None,
    };

    if let Some(output) = &args.output {
        write_batch_file(output, &table.schema, rows.iter().cloned())?;
        info!("Wrote {} rows to {}", rows.len(), output.display());
    }

    Ok(LoadResult {
        table_id: table.id,
        schema: table.schema,
        rows_loaded: rows.len(),
        view,
        output: args.output.clone(),
        duration: start.elapsed(),
    })
}

fn write_batch_file(
    path: &Path,
    schema: &RowSchema,
    rows: impl Iterator<Item = EngineRow>,
) -> Result<u64> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let count = codec::serialize(schema, rows.map(Ok), BufWriter::new(file))
        .with_context(|| format!("Failed to write batch file {}", path.display()))?;
    Ok(count)
}

/// Decode a batch file, returning its schema and rows
pub fn inspect_batch_file(path: &Path) -> Result<(RowSchema, Vec<EngineRow>)> {
    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = codec::BatchReader::new(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to read batch header of {}", path.display()))?;
    let schema = reader.schema().clone();
    let rows = reader
        .collect::<crate::error::Result<Vec<_>>>()
        .with_context(|| format!("Failed to decode rows of {}", path.display()))?;
    Ok((schema, rows))
}
