use std::path::Path;

use anyhow::{Context, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use super::delimited::reader::read_delimited;
use super::json::read_json_lines;
use super::parquet::read_parquet;
use crate::schema::RawRecord;

/// Supported source file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Tsv,
    Json,
    Parquet,
}

impl Format {
    /// Parse format from string (case-insensitive)
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "tsv" => Ok(Format::Tsv),
            "json" | "jsonl" | "ndjson" => Ok(Format::Json),
            "parquet" => Ok(Format::Parquet),
            _ => Err(anyhow::anyhow!(
                "Unsupported format: {}. Supported formats: csv, tsv, json, parquet",
                s
            )),
        }
    }

    /// Auto-detect the format from a file extension
    pub fn detect(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "csv" => Some(Format::Csv),
            "tsv" => Some(Format::Tsv),
            "json" | "jsonl" | "ndjson" => Some(Format::Json),
            "parquet" => Some(Format::Parquet),
            _ => None,
        }
    }
}

/// Configuration for delimited file reading (CSV, TSV, etc.)
#[derive(Debug, Clone)]
pub struct DelimitedConfig {
    pub delimiter: u8,
    pub has_header: bool,
    pub quote: u8,
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            quote: b'"',
        }
    }
}

impl DelimitedConfig {
    pub fn csv() -> Self {
        Self::default()
    }

    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            has_header: true,
            quote: b'"',
        }
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }
}

/// Contents of a source file, in the shape the table environment accepts
#[derive(Debug)]
pub enum SourceData {
    /// Row-oriented records whose schema still has to be inferred
    Records(Vec<RawRecord>),
    /// A columnar frame that carries its own schema
    Frame {
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    },
}

impl SourceData {
    pub fn row_count(&self) -> usize {
        match self {
            SourceData::Records(records) => records.len(),
            SourceData::Frame { batches, .. } => batches.iter().map(|b| b.num_rows()).sum(),
        }
    }
}

/// Read a whole source file
///
/// `has_header` only applies to delimited formats.
pub async fn read_source(path: &Path, format: Format, has_header: bool) -> Result<SourceData> {
    match format {
        Format::Csv | Format::Tsv => {
            let config = match format {
                Format::Tsv => DelimitedConfig::tsv(),
                _ => DelimitedConfig::csv(),
            }
            .with_header(has_header);
            let buffer = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(SourceData::Records(read_delimited(&buffer, &config)?))
        }
        Format::Json => {
            let buffer = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(SourceData::Records(read_json_lines(&buffer)?))
        }
        Format::Parquet => {
            let (schema, batches) = read_parquet(path).await?;
            Ok(SourceData::Frame { schema, batches })
        }
    }
}
