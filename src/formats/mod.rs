//! File format parsers and readers

pub mod delimited;
pub mod frame;
pub mod json;
pub mod parquet;
pub mod reader;

pub use frame::{FrameHint, record_batch_to_records, row_schema_from_arrow};
pub use reader::{DelimitedConfig, Format, SourceData, read_source};
