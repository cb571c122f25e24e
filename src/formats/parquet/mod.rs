//! Parquet file format support.
//!
//! Parquet files are read into Arrow record batches; their schema comes from
//! the file, so no inference is needed.

mod reader;

pub use reader::read_parquet;
