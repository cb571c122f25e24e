use std::io::{self, Write};

use bytes::{BufMut, BytesMut};
use chrono::{Datelike, Timelike};

use super::{
    TAG_BOOL, TAG_BYTES, TAG_DATE, TAG_DECIMAL, TAG_DOUBLE, TAG_DURATION, TAG_FLOAT, TAG_INT,
    TAG_LIST, TAG_LONG, TAG_MAP, TAG_NULL, TAG_ROW, TAG_STRING, TAG_TIME, TAG_TIMESTAMP,
};
use crate::config::{BATCH_FORMAT_VERSION, BATCH_MAGIC, MAX_FRAME_BYTES};
use crate::error::{BridgeError, Result};
use crate::schema::{EngineRow, RowSchema, Value};

/// Streams engine rows into the batch encoding
///
/// Rows are buffered until `batch_size` of them (or roughly half the frame
/// limit in bytes) are pending, then written as one frame. `finish` must be
/// called to flush the last frame and write the terminator; a writer dropped
/// without it leaves a truncated batch that readers reject.
pub struct BatchWriter<W: Write> {
    inner: W,
    field_count: usize,
    batch_size: usize,
    frame: BytesMut,
    frame_rows: u32,
    rows_written: u64,
}

impl<W: Write> BatchWriter<W> {
    /// Create a writer and emit the header for `schema`
    pub fn new(mut inner: W, schema: &RowSchema, batch_size: usize) -> Result<Self> {
        let schema_json = serde_json::to_vec(schema).map_err(|e| {
            BridgeError::transport("Failed to encode schema header", io::Error::other(e))
        })?;
        let schema_len = encode_len(schema_json.len(), "schema header")?;

        let mut header = BytesMut::with_capacity(BATCH_MAGIC.len() + 5 + schema_json.len());
        header.put_slice(BATCH_MAGIC);
        header.put_u8(BATCH_FORMAT_VERSION);
        header.put_u32(schema_len);
        header.put_slice(&schema_json);

        inner
            .write_all(&header)
            .map_err(|e| BridgeError::transport("Failed to write batch header", e))?;

        Ok(Self {
            inner,
            field_count: schema.len(),
            batch_size: batch_size.max(1),
            frame: BytesMut::new(),
            frame_rows: 0,
            rows_written: 0,
        })
    }

    /// Append one row, flushing a frame when enough rows are pending
    pub fn write_row(&mut self, row: &EngineRow) -> Result<()> {
        if row.values.len() != self.field_count {
            return Err(BridgeError::corrupt(format!(
                "row has {} values but the schema has {} fields",
                row.values.len(),
                self.field_count
            )));
        }

        for value in &row.values {
            encode_value(&mut self.frame, value)?;
        }
        self.frame_rows += 1;

        if self.frame_rows as usize >= self.batch_size || self.frame.len() >= MAX_FRAME_BYTES / 2 {
            self.flush_frame()?;
        }
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written + u64::from(self.frame_rows)
    }

    fn flush_frame(&mut self) -> Result<()> {
        if self.frame_rows == 0 {
            return Ok(());
        }

        let frame_len = self.frame.len() + 4;
        if frame_len > MAX_FRAME_BYTES {
            return Err(BridgeError::transport(
                "Frame exceeds the maximum frame size",
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} bytes > {} bytes", frame_len, MAX_FRAME_BYTES),
                ),
            ));
        }

        let mut prefix = [0u8; 8];
        let mut cursor = &mut prefix[..];
        cursor.put_u32(frame_len as u32);
        cursor.put_u32(self.frame_rows);

        self.inner
            .write_all(&prefix)
            .and_then(|_| self.inner.write_all(&self.frame))
            .map_err(|e| BridgeError::transport("Failed to write batch frame", e))?;

        self.rows_written += u64::from(self.frame_rows);
        self.frame.clear();
        self.frame_rows = 0;
        Ok(())
    }

    /// Flush pending rows, write the terminator and hand back the sink with
    /// the number of rows written
    pub fn finish(mut self) -> Result<(W, u64)> {
        self.flush_frame()?;

        self.inner
            .write_all(&0u32.to_be_bytes())
            .and_then(|_| self.inner.flush())
            .map_err(|e| BridgeError::transport("Failed to finish batch", e))?;

        Ok((self.inner, self.rows_written))
    }
}

fn encode_len(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        BridgeError::transport(
            format!("Length of {} does not fit the encoding", what),
            io::Error::new(io::ErrorKind::InvalidInput, format!("{} bytes", len)),
        )
    })
}

/// Append the tagged encoding of `value`
pub(crate) fn encode_value(buf: &mut BytesMut, value: &Value) -> Result<()> {
    match value {
        Value::Null => buf.put_u8(TAG_NULL),
        Value::Bool(b) => {
            buf.put_u8(TAG_BOOL);
            buf.put_u8(u8::from(*b));
        }
        Value::Int(v) => {
            buf.put_u8(TAG_INT);
            buf.put_i32(*v);
        }
        Value::Long(v) => {
            buf.put_u8(TAG_LONG);
            buf.put_i64(*v);
        }
        Value::Float(v) => {
            buf.put_u8(TAG_FLOAT);
            buf.put_f32(*v);
        }
        Value::Double(v) => {
            buf.put_u8(TAG_DOUBLE);
            buf.put_f64(*v);
        }
        Value::Decimal(d) => {
            buf.put_u8(TAG_DECIMAL);
            buf.put_i128(d.unscaled);
            buf.put_u8(d.scale);
        }
        Value::String(s) => {
            buf.put_u8(TAG_STRING);
            buf.put_u32(encode_len(s.len(), "string value")?);
            buf.put_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            buf.put_u8(TAG_BYTES);
            buf.put_u32(encode_len(b.len(), "bytes value")?);
            buf.put_slice(b);
        }
        Value::Date(d) => {
            buf.put_u8(TAG_DATE);
            buf.put_i32(d.num_days_from_ce());
        }
        Value::Time(t) => {
            buf.put_u8(TAG_TIME);
            buf.put_u32(t.num_seconds_from_midnight());
            buf.put_u32(t.nanosecond());
        }
        Value::Timestamp(ts) => {
            let utc = ts.and_utc();
            buf.put_u8(TAG_TIMESTAMP);
            buf.put_i64(utc.timestamp());
            buf.put_u32(utc.timestamp_subsec_nanos());
        }
        Value::Duration(d) => {
            buf.put_u8(TAG_DURATION);
            buf.put_i64(d.num_seconds());
            buf.put_i32(d.subsec_nanos());
        }
        Value::List(values) => {
            buf.put_u8(TAG_LIST);
            buf.put_u32(encode_len(values.len(), "list")?);
            for v in values {
                encode_value(buf, v)?;
            }
        }
        Value::Map(entries) => {
            buf.put_u8(TAG_MAP);
            buf.put_u32(encode_len(entries.len(), "map")?);
            for (k, v) in entries {
                encode_value(buf, k)?;
                encode_value(buf, v)?;
            }
        }
        Value::Record(record) => {
            let values = record.values();
            buf.put_u8(TAG_ROW);
            buf.put_u32(encode_len(values.len(), "row")?);
            for v in values {
                encode_value(buf, v)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, RowField};

    fn int_schema() -> RowSchema {
        RowSchema::new(vec![RowField::new("n", DataType::int())]).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let (bytes, count) = BatchWriter::new(Vec::new(), &int_schema(), 10)
            .unwrap()
            .finish()
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(&bytes[..4], b"TBRB");
        assert_eq!(bytes[4], BATCH_FORMAT_VERSION);
        let schema_len = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        let schema: RowSchema = serde_json::from_slice(&bytes[9..9 + schema_len]).unwrap();
        assert_eq!(schema, int_schema());
        // Only the terminator follows the header
        assert_eq!(&bytes[9 + schema_len..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_frames_split_by_batch_size() {
        let mut writer = BatchWriter::new(Vec::new(), &int_schema(), 2).unwrap();
        for i in 0..5 {
            writer.write_row(&EngineRow::new(vec![Value::Int(i)])).unwrap();
        }
        assert_eq!(writer.rows_written(), 5);
        let (bytes, count) = writer.finish().unwrap();
        assert_eq!(count, 5);

        let schema_len = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        let mut frames = &bytes[9 + schema_len..];
        let mut row_counts = Vec::new();
        loop {
            let frame_len = u32::from_be_bytes([frames[0], frames[1], frames[2], frames[3]]) as usize;
            if frame_len == 0 {
                break;
            }
            row_counts.push(u32::from_be_bytes([frames[4], frames[5], frames[6], frames[7]]));
            frames = &frames[4 + frame_len..];
        }
        assert_eq!(row_counts, vec![2, 2, 1]);
    }

    #[test]
    fn test_value_encoding() {
        let cases = [
            (Value::Null, vec![TAG_NULL], "null"),
            (Value::Bool(true), vec![TAG_BOOL, 1], "bool"),
            (Value::Int(258), vec![TAG_INT, 0, 0, 1, 2], "int"),
            (
                Value::String("hi".to_string()),
                vec![TAG_STRING, 0, 0, 0, 2, b'h', b'i'],
                "string",
            ),
            (
                Value::List(vec![Value::Null, Value::Bool(false)]),
                vec![TAG_LIST, 0, 0, 0, 2, TAG_NULL, TAG_BOOL, 0],
                "list",
            ),
        ];

        for (value, expected, description) in cases {
            let mut buf = BytesMut::new();
            encode_value(&mut buf, &value).unwrap();
            assert_eq!(buf.to_vec(), expected, "Failed: {}", description);
        }
    }

    #[test]
    fn test_row_width_checked() {
        let mut writer = BatchWriter::new(Vec::new(), &int_schema(), 10).unwrap();
        let result = writer.write_row(&EngineRow::new(vec![Value::Int(1), Value::Int(2)]));
        assert!(matches!(result, Err(BridgeError::Transport { .. })));
    }
}
