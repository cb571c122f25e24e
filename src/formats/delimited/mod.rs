//! Delimited text formats (CSV, TSV)

pub mod reader;

pub use reader::{parse_scalar, read_delimited};
