//! Length-prefixed batch encoding of engine rows
//!
//! A batch file starts with a header carrying the schema as JSON, followed by
//! frames of rows and a zero-length terminator:
//!
//! ```text
//! magic "TBRB" | version u8 | u32 schema_len | schema JSON
//! frame*       : u32 frame_len (> 0) | u32 row_count | row*
//! terminator   : u32 0
//! ```
//!
//! All integers are big-endian. The writer never needs the total row count
//! up front, so rows can be streamed straight from a lazy conversion.

pub mod reader;
pub mod sink;
pub mod writer;

pub use reader::BatchReader;
pub use sink::TempBatchFile;
pub use writer::BatchWriter;

use std::io::{Read, Write};

use crate::config::BATCH_SIZE;
use crate::error::Result;
use crate::schema::{EngineRow, RowSchema};

pub(crate) const TAG_NULL: u8 = 0;
pub(crate) const TAG_BOOL: u8 = 1;
pub(crate) const TAG_INT: u8 = 2;
pub(crate) const TAG_LONG: u8 = 3;
pub(crate) const TAG_FLOAT: u8 = 4;
pub(crate) const TAG_DOUBLE: u8 = 5;
pub(crate) const TAG_DECIMAL: u8 = 6;
pub(crate) const TAG_STRING: u8 = 7;
pub(crate) const TAG_BYTES: u8 = 8;
pub(crate) const TAG_DATE: u8 = 9;
pub(crate) const TAG_TIME: u8 = 10;
pub(crate) const TAG_TIMESTAMP: u8 = 11;
pub(crate) const TAG_DURATION: u8 = 12;
pub(crate) const TAG_LIST: u8 = 13;
pub(crate) const TAG_MAP: u8 = 14;
pub(crate) const TAG_ROW: u8 = 15;

/// Write `rows` into `sink` in the batch encoding, returning the row count
///
/// The first failing row aborts the write; the caller is responsible for
/// discarding whatever reached the sink.
pub fn serialize<W, I>(schema: &RowSchema, rows: I, sink: W) -> Result<u64>
where
    W: Write,
    I: IntoIterator<Item = Result<EngineRow>>,
{
    let mut writer = BatchWriter::new(sink, schema, BATCH_SIZE)?;
    for row in rows {
        writer.write_row(&row?)?;
    }
    let (_, count) = writer.finish()?;
    Ok(count)
}

/// Read every row of a batch, checking it was written for `schema`
pub fn deserialize<R: Read>(source: R, schema: &RowSchema) -> Result<Vec<EngineRow>> {
    let reader = BatchReader::new(source)?;
    reader.expect_schema(schema)?;
    reader.collect()
}
