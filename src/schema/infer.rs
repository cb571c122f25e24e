use crate::config::{GENERATED_FIELD_PREFIX, SCALAR_FIELD_NAME};
use crate::error::{BridgeError, Result, SchemaError};

use super::types::{DataType, RowField, RowSchema};
use super::value::{RawRecord, Value};

/// Caller-supplied schema information for a collection of elements
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaHint {
    /// Field names are given, types are inferred
    Names(Vec<String>),
    /// Every element is a single value of this (non-row) type
    Scalar(DataType),
    /// Names and types are given, inference is skipped
    Schema(RowSchema),
}

impl SchemaHint {
    /// A row type becomes a full schema hint, anything else a scalar hint
    pub fn from_data_type(data_type: DataType) -> Result<Self> {
        if data_type.is_row() {
            Ok(SchemaHint::Schema(RowSchema::from_data_type(
                data_type,
                SCALAR_FIELD_NAME,
            )?))
        } else {
            Ok(SchemaHint::Scalar(data_type))
        }
    }
}

/// Type of a column, element, key or value nothing has been observed for yet
fn unobserved() -> DataType {
    DataType::null().not_null()
}

/// Generated names for positional records: `_1`, `_2`, ...
pub fn generated_names(count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("{}{}", GENERATED_FIELD_PREFIX, i))
        .collect()
}

/// Schema inferrer for collections of in-memory records
pub struct SchemaInferrer;

impl SchemaInferrer {
    /// Infer (or take from the hint) the schema of `records`
    ///
    /// Without a hint, or with a names-only hint, the first record fixes the
    /// arity and field order and every record contributes to the column types.
    pub fn infer_schema(records: &[RawRecord], hint: Option<&SchemaHint>) -> Result<RowSchema> {
        match hint {
            Some(SchemaHint::Schema(schema)) => Ok(schema.clone()),
            Some(SchemaHint::Scalar(data_type)) => {
                data_type.validate()?;
                Ok(RowSchema::new(vec![RowField::new(
                    SCALAR_FIELD_NAME,
                    data_type.clone(),
                )])?)
            }
            Some(SchemaHint::Names(names)) => Self::infer_from_data(records, Some(names)),
            None => Self::infer_from_data(records, None),
        }
    }

    /// Infer the schema from the records, optionally renaming the fields
    fn infer_from_data(records: &[RawRecord], names: Option<&Vec<String>>) -> Result<RowSchema> {
        let first = records.first().ok_or(SchemaError::EmptyInput)?;
        let arity = first.arity();
        let source_names = Self::source_names(first);

        let output_names = match names {
            Some(names) if names.len() != arity => {
                return Err(SchemaError::NameHintMismatch {
                    names: names.len(),
                    arity,
                }
                .into());
            }
            Some(names) => names.clone(),
            None => source_names.clone(),
        };

        let mut column_types = vec![unobserved(); arity];

        for (record_idx, record) in records.iter().enumerate() {
            Self::check_shape(record_idx, first, record)?;

            for (col_idx, column_type) in column_types.iter_mut().enumerate() {
                let value = record
                    .lookup(&source_names[col_idx], col_idx)
                    .unwrap_or(&Value::Null);
                let field = &output_names[col_idx];
                let value_type = Self::infer_value_type(value, record_idx, field)?;

                *column_type = Self::merge(column_type, &value_type, record_idx, field)?;
            }
        }

        let mut fields = Vec::with_capacity(arity);
        for (name, data_type) in output_names.into_iter().zip(column_types) {
            if !data_type.is_resolved() {
                return Err(SchemaError::Undetermined { field: name }.into());
            }
            fields.push(RowField::new(name, data_type));
        }

        Ok(RowSchema::new(fields)?)
    }

    /// Names a record's values are looked up by
    fn source_names(record: &RawRecord) -> Vec<String> {
        record
            .field_names()
            .unwrap_or_else(|| generated_names(record.arity()))
    }

    /// Ensure a record has the same shape class, arity and field set as the
    /// first record
    fn check_shape(record_idx: usize, first: &RawRecord, record: &RawRecord) -> Result<()> {
        if first.shape_name() != record.shape_name() {
            return Err(SchemaError::ShapeMismatch {
                record: record_idx,
                expected: first.shape_name(),
                actual: record.shape_name(),
            }
            .into());
        }

        if first.arity() != record.arity() {
            return Err(SchemaError::ArityMismatch {
                record: record_idx,
                expected: first.arity(),
                actual: record.arity(),
            }
            .into());
        }

        if let (Some(mut expected), Some(mut actual)) = (first.field_names(), record.field_names())
        {
            expected.sort();
            actual.sort();
            if expected != actual {
                return Err(SchemaError::FieldSetMismatch {
                    record: record_idx,
                    expected,
                    actual,
                }
                .into());
            }
        }

        Ok(())
    }

    fn merge(
        current: &DataType,
        found: &DataType,
        record_idx: usize,
        field: &str,
    ) -> Result<DataType> {
        current.common_type(found).ok_or_else(|| {
            BridgeError::Schema(SchemaError::TypeMismatch {
                record: record_idx,
                field: field.to_string(),
                existing: current.to_string(),
                found: found.to_string(),
            })
        })
    }

    /// Infer the type of a single value
    ///
    /// Non-null values yield NOT NULL types; nullability only appears once a
    /// null is merged in. `field` is the path used in error messages.
    pub fn infer_value_type(value: &Value, record_idx: usize, field: &str) -> Result<DataType> {
        let data_type = match value {
            Value::Null => return Ok(DataType::null()),
            Value::Bool(_) => DataType::boolean(),
            Value::Int(_) => DataType::int(),
            Value::Long(_) => DataType::bigint(),
            Value::Float(_) => DataType::float(),
            Value::Double(_) => DataType::double(),
            Value::Decimal(d) => {
                let (precision, scale) = d.precision_and_scale();
                DataType::decimal(precision, scale)
            }
            Value::String(_) => DataType::string(),
            Value::Bytes(_) => DataType::bytes(),
            Value::Date(_) => DataType::date(),
            Value::Time(_) => DataType::time(),
            Value::Timestamp(_) => DataType::timestamp(),
            Value::Duration(_) => DataType::interval(),
            Value::List(values) => {
                let path = format!("{}[]", field);
                let mut element = unobserved();
                for v in values {
                    let found = Self::infer_value_type(v, record_idx, &path)?;
                    element = Self::merge(&element, &found, record_idx, &path)?;
                }
                DataType::array(element)
            }
            Value::Map(entries) => {
                let key_path = format!("{}{{key}}", field);
                let value_path = format!("{}{{value}}", field);
                let mut key = unobserved();
                let mut val = unobserved();
                for (k, v) in entries {
                    let found = Self::infer_value_type(k, record_idx, &key_path)?;
                    key = Self::merge(&key, &found, record_idx, &key_path)?;
                    let found = Self::infer_value_type(v, record_idx, &value_path)?;
                    val = Self::merge(&val, &found, record_idx, &value_path)?;
                }
                DataType::map(key, val)
            }
            Value::Record(record) => {
                let names = Self::source_names(record);
                let mut fields = Vec::with_capacity(names.len());
                for (name, v) in names.into_iter().zip(record.values()) {
                    let path = format!("{}.{}", field, name);
                    let data_type = Self::infer_value_type(v, record_idx, &path)?;
                    fields.push(RowField::new(name, data_type));
                }
                DataType::row(fields)
            }
        };

        Ok(data_type.not_null())
    }
}
