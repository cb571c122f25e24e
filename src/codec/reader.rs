use std::collections::VecDeque;
use std::io::{self, Read};

use bytes::{Buf, Bytes};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta};

use super::{
    TAG_BOOL, TAG_BYTES, TAG_DATE, TAG_DECIMAL, TAG_DOUBLE, TAG_DURATION, TAG_FLOAT, TAG_INT,
    TAG_LIST, TAG_LONG, TAG_MAP, TAG_NULL, TAG_ROW, TAG_STRING, TAG_TIME, TAG_TIMESTAMP,
};
use crate::config::{BATCH_FORMAT_VERSION, BATCH_MAGIC, MAX_FRAME_BYTES, MAX_NESTING_DEPTH};
use crate::error::{BridgeError, Result};
use crate::schema::convert::describe;
use crate::schema::{DataType, Decimal, EngineRow, RawRecord, Row, RowSchema, TypeKind, Value};

/// Reads a batch back one frame at a time
///
/// The schema is decoded from the header, so a reader needs no out-of-band
/// metadata. Iterating yields rows until the terminator; a missing
/// terminator, a truncated frame, trailing bytes or a value that does not
/// match its header field are reported as corrupt.
pub struct BatchReader<R: Read> {
    inner: R,
    schema: RowSchema,
    pending: VecDeque<EngineRow>,
    rows_read: usize,
    finished: bool,
}

impl<R: Read> BatchReader<R> {
    /// Read and validate the batch header
    pub fn new(mut inner: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_exact(&mut inner, &mut magic, "batch magic")?;
        if &magic != BATCH_MAGIC {
            return Err(BridgeError::corrupt(format!(
                "bad magic {}",
                hex::encode(magic)
            )));
        }

        let mut version = [0u8; 1];
        read_exact(&mut inner, &mut version, "batch version")?;
        if version[0] != BATCH_FORMAT_VERSION {
            return Err(BridgeError::corrupt(format!(
                "unsupported version {}",
                version[0]
            )));
        }

        let schema_len = read_u32(&mut inner, "schema length")? as usize;
        if schema_len > MAX_FRAME_BYTES {
            return Err(BridgeError::corrupt(format!(
                "schema header of {} bytes",
                schema_len
            )));
        }
        let mut schema_json = vec![0u8; schema_len];
        read_exact(&mut inner, &mut schema_json, "schema header")?;
        let schema: RowSchema = serde_json::from_slice(&schema_json)
            .map_err(|e| BridgeError::corrupt(format!("invalid schema header: {}", e)))?;

        Ok(Self {
            inner,
            schema,
            pending: VecDeque::new(),
            rows_read: 0,
            finished: false,
        })
    }

    pub fn schema(&self) -> &RowSchema {
        &self.schema
    }

    /// Fail unless the batch was written for `expected`
    pub fn expect_schema(&self, expected: &RowSchema) -> Result<()> {
        if &self.schema != expected {
            return Err(BridgeError::corrupt(format!(
                "batch schema {} does not match expected schema {}",
                self.schema, expected
            )));
        }
        Ok(())
    }

    /// Read the next frame, or `None` once the terminator has been read
    pub fn next_frame(&mut self) -> Result<Option<Vec<EngineRow>>> {
        if self.finished {
            return Ok(None);
        }

        let frame_len = read_u32(&mut self.inner, "frame length")? as usize;
        if frame_len == 0 {
            self.finished = true;
            self.ensure_exhausted()?;
            return Ok(None);
        }
        if frame_len < 4 || frame_len > MAX_FRAME_BYTES {
            return Err(BridgeError::corrupt(format!(
                "frame length {} out of bounds",
                frame_len
            )));
        }

        let mut frame = vec![0u8; frame_len];
        read_exact(&mut self.inner, &mut frame, "frame")?;
        let mut buf = Bytes::from(frame);

        let row_count = buf.get_u32() as usize;
        let field_count = self.schema.len();
        let mut rows = Vec::with_capacity(row_count.min(frame_len));
        for _ in 0..row_count {
            let mut values = Vec::with_capacity(field_count);
            for field in self.schema.fields() {
                let value = decode_value(&mut buf)?;
                if !conforms(&field.data_type, &value) {
                    return Err(BridgeError::corrupt(format!(
                        "row {} field '{}' holds {} but the header declares {}",
                        self.rows_read,
                        field.name,
                        describe(&value),
                        field.data_type
                    )));
                }
                values.push(value);
            }
            rows.push(EngineRow::new(values));
            self.rows_read += 1;
        }

        if buf.has_remaining() {
            return Err(BridgeError::corrupt(format!(
                "{} unread bytes at the end of a frame",
                buf.remaining()
            )));
        }

        Ok(Some(rows))
    }

    fn ensure_exhausted(&mut self) -> Result<()> {
        let mut byte = [0u8; 1];
        let read = self
            .inner
            .read(&mut byte)
            .map_err(|e| BridgeError::transport("Failed to read batch", e))?;
        if read != 0 {
            return Err(BridgeError::corrupt("data after the terminator"));
        }
        Ok(())
    }
}

impl<R: Read> Iterator for BatchReader<R> {
    type Item = Result<EngineRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            match self.next_frame() {
                Ok(Some(rows)) => self.pending.extend(rows),
                Ok(None) => return None,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            BridgeError::corrupt(format!("truncated {}", what))
        } else {
            BridgeError::transport(format!("Failed to read {}", what), e)
        }
    })
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let mut bytes = [0u8; 4];
    read_exact(reader, &mut bytes, what)?;
    Ok(u32::from_be_bytes(bytes))
}

fn need(buf: &Bytes, n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(BridgeError::corrupt(format!(
            "value needs {} bytes but the frame has {} left",
            n,
            buf.remaining()
        )));
    }
    Ok(())
}

fn decode_len(buf: &mut Bytes) -> Result<usize> {
    need(buf, 4)?;
    Ok(buf.get_u32() as usize)
}

/// Whether a decoded value is exactly what the writer emits for `data_type`
fn conforms(data_type: &DataType, value: &Value) -> bool {
    match (&data_type.kind, value) {
        (_, Value::Null) => data_type.nullable,
        (TypeKind::Boolean, Value::Bool(_))
        | (TypeKind::Int, Value::Int(_))
        | (TypeKind::BigInt, Value::Long(_))
        | (TypeKind::Float, Value::Float(_))
        | (TypeKind::Double, Value::Double(_))
        | (TypeKind::String, Value::String(_))
        | (TypeKind::Bytes, Value::Bytes(_))
        | (TypeKind::Date, Value::Date(_))
        | (TypeKind::Time, Value::Time(_))
        | (TypeKind::Timestamp, Value::Timestamp(_))
        | (TypeKind::Interval, Value::Duration(_)) => true,
        (TypeKind::Decimal { precision, scale }, Value::Decimal(d)) => {
            d.scale == *scale && d.digits() <= *precision
        }
        (TypeKind::Array { element }, Value::List(values)) => {
            values.iter().all(|v| conforms(element, v))
        }
        (TypeKind::Map { key, value: value_type }, Value::Map(entries)) => entries
            .iter()
            .all(|(k, v)| conforms(key, k) && conforms(value_type, v)),
        (TypeKind::Row { fields }, Value::Record(record)) => {
            record.arity() == fields.len()
                && fields
                    .iter()
                    .zip(record.values())
                    .all(|(f, v)| conforms(&f.data_type, v))
        }
        _ => false,
    }
}

/// Decode one tagged value from the front of `buf`
pub(crate) fn decode_value(buf: &mut Bytes) -> Result<Value> {
    decode_nested(buf, 0)
}

fn decode_nested(buf: &mut Bytes, depth: usize) -> Result<Value> {
    need(buf, 1)?;
    let tag = buf.get_u8();

    let value = match tag {
        TAG_NULL => Value::Null,
        TAG_BOOL => {
            need(buf, 1)?;
            Value::Bool(buf.get_u8() != 0)
        }
        TAG_INT => {
            need(buf, 4)?;
            Value::Int(buf.get_i32())
        }
        TAG_LONG => {
            need(buf, 8)?;
            Value::Long(buf.get_i64())
        }
        TAG_FLOAT => {
            need(buf, 4)?;
            Value::Float(buf.get_f32())
        }
        TAG_DOUBLE => {
            need(buf, 8)?;
            Value::Double(buf.get_f64())
        }
        TAG_DECIMAL => {
            need(buf, 17)?;
            let unscaled = buf.get_i128();
            Value::Decimal(Decimal::new(unscaled, buf.get_u8()))
        }
        TAG_STRING => {
            let len = decode_len(buf)?;
            need(buf, len)?;
            let raw = buf.split_to(len);
            let s = std::str::from_utf8(&raw)
                .map_err(|e| BridgeError::corrupt(format!("invalid utf-8 string: {}", e)))?;
            Value::String(s.to_string())
        }
        TAG_BYTES => {
            let len = decode_len(buf)?;
            need(buf, len)?;
            Value::Bytes(buf.split_to(len).to_vec())
        }
        TAG_DATE => {
            need(buf, 4)?;
            let days = buf.get_i32();
            let date = NaiveDate::from_num_days_from_ce_opt(days)
                .ok_or_else(|| BridgeError::corrupt(format!("date out of range: {}", days)))?;
            Value::Date(date)
        }
        TAG_TIME => {
            need(buf, 8)?;
            let secs = buf.get_u32();
            let nanos = buf.get_u32();
            let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                .ok_or_else(|| BridgeError::corrupt(format!("time out of range: {}s", secs)))?;
            Value::Time(time)
        }
        TAG_TIMESTAMP => {
            need(buf, 12)?;
            let secs = buf.get_i64();
            let nanos = buf.get_u32();
            let ts = DateTime::from_timestamp(secs, nanos)
                .ok_or_else(|| BridgeError::corrupt(format!("timestamp out of range: {}s", secs)))?;
            Value::Timestamp(ts.naive_utc())
        }
        TAG_DURATION => {
            need(buf, 12)?;
            let secs = buf.get_i64();
            let nanos = buf.get_i32();
            let duration = TimeDelta::try_seconds(secs)
                .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(i64::from(nanos))))
                .ok_or_else(|| BridgeError::corrupt(format!("duration out of range: {}s", secs)))?;
            Value::Duration(duration)
        }
        TAG_LIST | TAG_MAP | TAG_ROW if depth >= MAX_NESTING_DEPTH => {
            return Err(BridgeError::corrupt(format!(
                "values nested deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        TAG_LIST => {
            let n = decode_len(buf)?;
            let mut values = Vec::with_capacity(n.min(buf.remaining()));
            for _ in 0..n {
                values.push(decode_nested(buf, depth + 1)?);
            }
            Value::List(values)
        }
        TAG_MAP => {
            let n = decode_len(buf)?;
            let mut entries = Vec::with_capacity(n.min(buf.remaining()));
            for _ in 0..n {
                let key = decode_nested(buf, depth + 1)?;
                let value = decode_nested(buf, depth + 1)?;
                entries.push((key, value));
            }
            Value::Map(entries)
        }
        TAG_ROW => {
            let n = decode_len(buf)?;
            let mut values = Vec::with_capacity(n.min(buf.remaining()));
            for _ in 0..n {
                values.push(decode_nested(buf, depth + 1)?);
            }
            Value::record(RawRecord::Row(Row::new(values)))
        }
        other => return Err(BridgeError::corrupt(format!("unknown value tag {}", other))),
    };

    Ok(value)
}
