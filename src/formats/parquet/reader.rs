//! Parquet file reader implementation.

use std::path::Path;

use anyhow::{Context, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use futures::StreamExt;
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;
use tracing::debug;

use crate::config::BATCH_SIZE;

/// Read every row group of a Parquet file into record batches
pub async fn read_parquet(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    // Read Parquet metadata from footer
    let builder = ParquetRecordBatchStreamBuilder::new(file)
        .await
        .context("Failed to read Parquet metadata")?;

    let schema = builder.schema().clone();
    let row_groups = builder.metadata().num_row_groups();

    let stream = builder
        .with_batch_size(BATCH_SIZE)
        .build()
        .context("Failed to build Parquet stream")?;

    let mut batches = Vec::new();
    let mut stream = Box::pin(stream);
    while let Some(batch_result) = stream.next().await {
        let batch = batch_result.context("Failed to read record batch")?;
        batches.push(batch);
    }

    debug!(
        "Read {} batches from {} row groups of {}",
        batches.len(),
        row_groups,
        path.display()
    );

    Ok((schema, batches))
}
