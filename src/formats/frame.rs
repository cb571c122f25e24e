//! Conversion from Arrow schemas and record batches to row schemas and
//! records.
//!
//! Every column type maps to exactly one row type, so a frame's schema is
//! known before any value is read. Values are produced positionally; the
//! converter later widens them to the (possibly hinted) field types.

use arrow::array::*;
use arrow::datatypes::{
    DataType as ArrowType, Date32Type, Date64Type, Decimal128Type, DurationMicrosecondType,
    DurationMillisecondType, DurationNanosecondType, DurationSecondType, Float32Type, Float64Type,
    Int8Type, Int16Type, Int32Type, Int64Type, Schema, Time32MillisecondType, Time32SecondType,
    Time64MicrosecondType, Time64NanosecondType, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type, UInt16Type,
    UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::error::{BridgeError, Result, SchemaError};
use crate::schema::{DataType, Decimal, RawRecord, Row, RowField, RowSchema, Value};

/// Day number of 1970-01-01 counted from 0001-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Schema information supplied for a tabular frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameHint {
    /// Replace names and types
    Schema(RowSchema),
    /// Rename the columns, keeping the mapped types
    Names(Vec<String>),
    /// Retype the columns, keeping the frame's names
    Types(Vec<DataType>),
}

impl FrameHint {
    /// Apply the hint to the schema mapped from the frame
    pub fn apply(&self, mapped: RowSchema) -> Result<RowSchema> {
        let check_len = |expected: usize| -> Result<()> {
            if expected != mapped.len() {
                return Err(SchemaError::FrameHintMismatch {
                    expected,
                    actual: mapped.len(),
                }
                .into());
            }
            Ok(())
        };

        match self {
            FrameHint::Schema(schema) => {
                check_len(schema.len())?;
                Ok(schema.clone())
            }
            FrameHint::Names(names) => {
                check_len(names.len())?;
                let fields = mapped
                    .fields()
                    .iter()
                    .zip(names)
                    .map(|(field, name)| RowField::new(name.clone(), field.data_type.clone()))
                    .collect();
                Ok(RowSchema::new(fields)?)
            }
            FrameHint::Types(types) => {
                check_len(types.len())?;
                let fields = mapped
                    .fields()
                    .iter()
                    .zip(types)
                    .map(|(field, data_type)| RowField::new(field.name.clone(), data_type.clone()))
                    .collect();
                Ok(RowSchema::new(fields)?)
            }
        }
    }
}

/// Map an Arrow schema to a row schema
pub fn row_schema_from_arrow(schema: &Schema) -> Result<RowSchema> {
    let fields = schema
        .fields()
        .iter()
        .map(|field| {
            let data_type = map_type(field.name(), field.data_type())?;
            Ok(RowField::new(
                field.name().clone(),
                data_type.with_nullable(field.is_nullable()),
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RowSchema::new(fields)?)
}

fn unsupported(name: &str, arrow_type: &ArrowType) -> BridgeError {
    SchemaError::UnsupportedType {
        field: name.to_string(),
        data_type: arrow_type.to_string(),
    }
    .into()
}

/// Map one Arrow type; the result is nullable and callers set nullability
/// from the owning field
fn map_type(name: &str, arrow_type: &ArrowType) -> Result<DataType> {
    let data_type = match arrow_type {
        ArrowType::Boolean => DataType::boolean(),
        ArrowType::Int8 | ArrowType::Int16 | ArrowType::Int32 => DataType::int(),
        ArrowType::UInt8 | ArrowType::UInt16 => DataType::int(),
        ArrowType::Int64 | ArrowType::UInt32 => DataType::bigint(),
        ArrowType::UInt64 => DataType::decimal(20, 0),
        ArrowType::Float32 => DataType::float(),
        ArrowType::Float64 => DataType::double(),
        ArrowType::Decimal128(precision, scale) => {
            let scale = u8::try_from(*scale).map_err(|_| unsupported(name, arrow_type))?;
            DataType::decimal(*precision, scale)
        }
        ArrowType::Utf8 | ArrowType::LargeUtf8 => DataType::string(),
        ArrowType::Binary | ArrowType::LargeBinary => DataType::bytes(),
        ArrowType::Date32 | ArrowType::Date64 => DataType::date(),
        ArrowType::Time32(_) | ArrowType::Time64(_) => DataType::time(),
        ArrowType::Timestamp(_, _) => DataType::timestamp(),
        ArrowType::Duration(_) => DataType::interval(),
        ArrowType::List(element) | ArrowType::LargeList(element) => DataType::array(
            map_type(element.name(), element.data_type())?.with_nullable(element.is_nullable()),
        ),
        ArrowType::Map(entries, _) => match entries.data_type() {
            ArrowType::Struct(kv) if kv.len() == 2 => DataType::map(
                map_type(kv[0].name(), kv[0].data_type())?.with_nullable(kv[0].is_nullable()),
                map_type(kv[1].name(), kv[1].data_type())?.with_nullable(kv[1].is_nullable()),
            ),
            _ => return Err(unsupported(name, arrow_type)),
        },
        ArrowType::Struct(fields) => {
            let fields = fields
                .iter()
                .map(|f| {
                    Ok(RowField::new(
                        f.name().clone(),
                        map_type(f.name(), f.data_type())?.with_nullable(f.is_nullable()),
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            DataType::row(fields)
        }
        _ => return Err(unsupported(name, arrow_type)),
    };
    Ok(data_type)
}

/// Convert an Arrow RecordBatch to positional records
///
/// `first_record` is the index of the batch's first row within the whole
/// frame and is only used in error reports.
pub fn record_batch_to_records(batch: &RecordBatch, first_record: usize) -> Result<Vec<RawRecord>> {
    let num_rows = batch.num_rows();
    let schema = batch.schema();

    let mut records = Vec::with_capacity(num_rows);
    for row_idx in 0..num_rows {
        let mut values = Vec::with_capacity(batch.num_columns());
        for (col_idx, column) in batch.columns().iter().enumerate() {
            let at = Position {
                record: first_record + row_idx,
                field: schema.field(col_idx).name(),
            };
            values.push(value_at(at, column.as_ref(), row_idx)?);
        }
        records.push(RawRecord::Tuple(values));
    }

    Ok(records)
}

/// Where a value sits, for error reports
#[derive(Clone, Copy)]
struct Position<'a> {
    record: usize,
    field: &'a str,
}

fn invalid(at: Position<'_>, what: &str) -> BridgeError {
    BridgeError::Validation {
        record: at.record,
        field: at.field.to_string(),
        expected: what.to_string(),
        actual: "out of range value".to_string(),
    }
}

/// Read the value at `idx` of an Arrow array
fn value_at(at: Position<'_>, array: &dyn Array, idx: usize) -> Result<Value> {
    if array.is_null(idx) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        ArrowType::Boolean => Value::Bool(as_boolean_array(array).value(idx)),
        ArrowType::Int8 => Value::Int(i32::from(as_primitive_array::<Int8Type>(array).value(idx))),
        ArrowType::Int16 => {
            Value::Int(i32::from(as_primitive_array::<Int16Type>(array).value(idx)))
        }
        ArrowType::Int32 => Value::Int(as_primitive_array::<Int32Type>(array).value(idx)),
        ArrowType::Int64 => Value::Long(as_primitive_array::<Int64Type>(array).value(idx)),
        ArrowType::UInt8 => {
            Value::Int(i32::from(as_primitive_array::<UInt8Type>(array).value(idx)))
        }
        ArrowType::UInt16 => {
            Value::Int(i32::from(as_primitive_array::<UInt16Type>(array).value(idx)))
        }
        ArrowType::UInt32 => {
            Value::Long(i64::from(as_primitive_array::<UInt32Type>(array).value(idx)))
        }
        ArrowType::UInt64 => Value::Decimal(Decimal::new(
            i128::from(as_primitive_array::<UInt64Type>(array).value(idx)),
            0,
        )),
        ArrowType::Float32 => Value::Float(as_primitive_array::<Float32Type>(array).value(idx)),
        ArrowType::Float64 => Value::Double(as_primitive_array::<Float64Type>(array).value(idx)),
        ArrowType::Decimal128(_, scale) => {
            let scale = u8::try_from(*scale).map_err(|_| unsupported(at.field, array.data_type()))?;
            Value::Decimal(Decimal::new(
                as_primitive_array::<Decimal128Type>(array).value(idx),
                scale,
            ))
        }
        ArrowType::Utf8 => Value::String(as_string_array(array).value(idx).to_string()),
        ArrowType::LargeUtf8 => Value::String(as_largestring_array(array).value(idx).to_string()),
        ArrowType::Binary => Value::Bytes(as_generic_binary_array::<i32>(array).value(idx).to_vec()),
        ArrowType::LargeBinary => {
            Value::Bytes(as_generic_binary_array::<i64>(array).value(idx).to_vec())
        }
        ArrowType::Date32 => {
            let days = as_primitive_array::<Date32Type>(array).value(idx);
            let date = days
                .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
                .and_then(NaiveDate::from_num_days_from_ce_opt)
                .ok_or_else(|| invalid(at, "DATE"))?;
            Value::Date(date)
        }
        ArrowType::Date64 => {
            let millis = as_primitive_array::<Date64Type>(array).value(idx);
            let datetime =
                DateTime::from_timestamp_millis(millis).ok_or_else(|| invalid(at, "DATE"))?;
            Value::Date(datetime.date_naive())
        }
        ArrowType::Time32(unit) => {
            let (secs, nanos) = match unit {
                TimeUnit::Second => {
                    let v = as_primitive_array::<Time32SecondType>(array).value(idx);
                    (i64::from(v), 0)
                }
                _ => {
                    let v = as_primitive_array::<Time32MillisecondType>(array).value(idx);
                    (i64::from(v) / 1_000, (i64::from(v) % 1_000) * 1_000_000)
                }
            };
            Value::Time(time_of_day(at, secs, nanos)?)
        }
        ArrowType::Time64(unit) => {
            let (secs, nanos) = match unit {
                TimeUnit::Microsecond => {
                    let v = as_primitive_array::<Time64MicrosecondType>(array).value(idx);
                    (v / 1_000_000, (v % 1_000_000) * 1_000)
                }
                _ => {
                    let v = as_primitive_array::<Time64NanosecondType>(array).value(idx);
                    (v / 1_000_000_000, v % 1_000_000_000)
                }
            };
            Value::Time(time_of_day(at, secs, nanos)?)
        }
        ArrowType::Timestamp(unit, _) => Value::Timestamp(timestamp(at, array, unit, idx)?),
        ArrowType::Duration(unit) => {
            let duration = match unit {
                TimeUnit::Second => TimeDelta::try_seconds(
                    as_primitive_array::<DurationSecondType>(array).value(idx),
                ),
                TimeUnit::Millisecond => TimeDelta::try_milliseconds(
                    as_primitive_array::<DurationMillisecondType>(array).value(idx),
                ),
                TimeUnit::Microsecond => Some(TimeDelta::microseconds(
                    as_primitive_array::<DurationMicrosecondType>(array).value(idx),
                )),
                TimeUnit::Nanosecond => Some(TimeDelta::nanoseconds(
                    as_primitive_array::<DurationNanosecondType>(array).value(idx),
                )),
            };
            Value::Duration(duration.ok_or_else(|| invalid(at, "INTERVAL"))?)
        }
        ArrowType::List(_) => {
            let child = as_list_array(array).value(idx);
            Value::List(values_of(at, child.as_ref())?)
        }
        ArrowType::LargeList(_) => {
            let child = as_large_list_array(array).value(idx);
            Value::List(values_of(at, child.as_ref())?)
        }
        ArrowType::Map(_, _) => {
            let entries = as_map_array(array).value(idx);
            let keys = values_of(at, entries.column(0).as_ref())?;
            let vals = values_of(at, entries.column(1).as_ref())?;
            Value::Map(keys.into_iter().zip(vals).collect())
        }
        ArrowType::Struct(_) => {
            let struct_array = as_struct_array(array);
            let values = struct_array
                .columns()
                .iter()
                .map(|column| value_at(at, column.as_ref(), idx))
                .collect::<Result<Vec<_>>>()?;
            Value::record(RawRecord::Row(Row::new(values)))
        }
        other => return Err(unsupported(at.field, other)),
    };

    Ok(value)
}

fn values_of(at: Position<'_>, array: &dyn Array) -> Result<Vec<Value>> {
    (0..array.len()).map(|i| value_at(at, array, i)).collect()
}

fn time_of_day(at: Position<'_>, secs: i64, nanos: i64) -> Result<NaiveTime> {
    let secs = u32::try_from(secs).map_err(|_| invalid(at, "TIME"))?;
    let nanos = u32::try_from(nanos).map_err(|_| invalid(at, "TIME"))?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).ok_or_else(|| invalid(at, "TIME"))
}

/// Timestamps are read as UTC wall-clock time; any zone on the column is
/// dropped
fn timestamp(at: Position<'_>, array: &dyn Array, unit: &TimeUnit, idx: usize) -> Result<NaiveDateTime> {
    let datetime = match unit {
        TimeUnit::Second => DateTime::from_timestamp(
            as_primitive_array::<TimestampSecondType>(array).value(idx),
            0,
        ),
        TimeUnit::Millisecond => DateTime::from_timestamp_millis(
            as_primitive_array::<TimestampMillisecondType>(array).value(idx),
        ),
        TimeUnit::Microsecond => DateTime::from_timestamp_micros(
            as_primitive_array::<TimestampMicrosecondType>(array).value(idx),
        ),
        TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(
            as_primitive_array::<TimestampNanosecondType>(array).value(idx),
        )),
    };
    datetime
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| invalid(at, "TIMESTAMP"))
}
