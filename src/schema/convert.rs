use crate::error::{BridgeError, Result};

use super::types::{DataType, RowField, RowSchema, TypeKind};
use super::value::{EngineRow, RawRecord, Row, Value};
use super::verify;

/// Converts raw records into engine rows for one schema
///
/// Conversion widens numeric values to the field type, rescales decimals and
/// recurses into arrays, maps and nested rows. Nullability is left to
/// verification; a null is passed through for any field.
#[derive(Debug, Clone)]
pub struct RecordConverter {
    schema: RowSchema,
    lookup_names: Vec<String>,
    verify: bool,
    scalar: bool,
}

impl RecordConverter {
    pub fn new(schema: RowSchema) -> Self {
        let lookup_names = schema
            .field_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            schema,
            lookup_names,
            verify: false,
            scalar: false,
        }
    }

    /// Verify every record against the schema before converting it
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Look values of named records up under these names instead of the
    /// schema's field names
    ///
    /// Used when a names hint renamed the fields of mapping or named-row
    /// records. `names` is positional, one per schema field.
    pub(crate) fn with_lookup_names(mut self, names: Vec<String>) -> Self {
        debug_assert_eq!(names.len(), self.schema.len());
        self.lookup_names = names;
        self
    }

    /// Treat every record as one bare value of the single schema field
    ///
    /// Named records carry no such value and are rejected instead of being
    /// looked up by the field name.
    pub(crate) fn with_scalar_elements(mut self) -> Self {
        self.scalar = true;
        self
    }

    pub fn schema(&self) -> &RowSchema {
        &self.schema
    }

    pub fn verifies(&self) -> bool {
        self.verify
    }

    /// Convert one record, verifying it first when enabled
    pub fn convert(&self, record_idx: usize, record: &RawRecord) -> Result<EngineRow> {
        if self.scalar && record.is_named() {
            return Err(BridgeError::Validation {
                record: record_idx,
                field: "<record>".to_string(),
                expected: "a single value".to_string(),
                actual: format!("{} record {}", record.shape_name(), record),
            });
        }

        let names: Vec<&str> = self.lookup_names.iter().map(String::as_str).collect();

        if self.verify {
            verify::verify_fields(self.schema.fields(), &names, record_idx, "", record)?;
        }

        let values = convert_fields(self.schema.fields(), &names, record_idx, "", record)?;
        Ok(EngineRow::new(values))
    }

    /// Lazily convert a sequence of records, numbering them from zero
    pub fn convert_all<'a, I>(&'a self, records: I) -> impl Iterator<Item = Result<EngineRow>> + 'a
    where
        I: IntoIterator<Item = &'a RawRecord>,
        I::IntoIter: 'a,
    {
        records
            .into_iter()
            .enumerate()
            .map(move |(idx, record)| self.convert(idx, record))
    }
}

/// Convert one record against `schema` without verifying nullability
pub fn convert(schema: &RowSchema, record_idx: usize, record: &RawRecord) -> Result<EngineRow> {
    let names = schema.field_names();
    let values = convert_fields(schema.fields(), &names, record_idx, "", record)?;
    Ok(EngineRow::new(values))
}

pub(crate) fn field_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Short description of an offending value for validation errors
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::List(values) => format!("ARRAY of {} elements", values.len()),
        Value::Map(entries) => format!("MAP of {} entries", entries.len()),
        Value::Record(record) => format!("ROW of {} fields", record.arity()),
        Value::String(_) | Value::Bytes(_) => value.kind_name().to_string(),
        other => format!("{} {}", other.kind_name(), other),
    }
}

pub(crate) fn mismatch(
    record_idx: usize,
    path: &str,
    expected: &DataType,
    actual: impl Into<String>,
) -> BridgeError {
    BridgeError::Validation {
        record: record_idx,
        field: if path.is_empty() {
            "<record>".to_string()
        } else {
            path.to_string()
        },
        expected: expected.to_string(),
        actual: actual.into(),
    }
}

/// Positional records must carry exactly one value per field
pub(crate) fn check_arity(
    fields: &[RowField],
    record_idx: usize,
    path: &str,
    record: &RawRecord,
) -> Result<()> {
    if !record.is_named() && record.arity() != fields.len() {
        return Err(BridgeError::Validation {
            record: record_idx,
            field: if path.is_empty() {
                "<record>".to_string()
            } else {
                path.to_string()
            },
            expected: format!("{} fields", fields.len()),
            actual: format!("{} fields", record.arity()),
        });
    }
    Ok(())
}

/// Coerce a non-composite value into a non-composite type
///
/// Returns `None` when the value cannot be represented by the type: the
/// value is of an unrelated kind, it is wider than the type, or it does not
/// fit the type's range or decimal precision.
pub(crate) fn coerce_atomic(kind: &TypeKind, value: &Value) -> Option<Value> {
    let coerced = match (kind, value) {
        (TypeKind::Boolean, Value::Bool(b)) => Value::Bool(*b),

        (TypeKind::Int, Value::Bool(b)) => Value::Int(i32::from(*b)),
        (TypeKind::Int, Value::Int(v)) => Value::Int(*v),
        (TypeKind::Int, Value::Long(v)) => Value::Int(i32::try_from(*v).ok()?),

        (TypeKind::BigInt, Value::Bool(b)) => Value::Long(i64::from(*b)),
        (TypeKind::BigInt, Value::Int(v)) => Value::Long(i64::from(*v)),
        (TypeKind::BigInt, Value::Long(v)) => Value::Long(*v),

        (TypeKind::Float, Value::Bool(b)) => Value::Float(if *b { 1.0 } else { 0.0 }),
        (TypeKind::Float, Value::Int(v)) => Value::Float(*v as f32),
        (TypeKind::Float, Value::Long(v)) => Value::Float(*v as f32),
        (TypeKind::Float, Value::Float(v)) => Value::Float(*v),

        (TypeKind::Double, Value::Bool(b)) => Value::Double(if *b { 1.0 } else { 0.0 }),
        (TypeKind::Double, Value::Int(v)) => Value::Double(f64::from(*v)),
        (TypeKind::Double, Value::Long(v)) => Value::Double(*v as f64),
        (TypeKind::Double, Value::Float(v)) => Value::Double(f64::from(*v)),
        (TypeKind::Double, Value::Double(v)) => Value::Double(*v),

        (TypeKind::Decimal { precision, scale }, Value::Decimal(d)) => {
            let rescaled = d.rescale(*scale)?;
            if rescaled.digits() > *precision {
                return None;
            }
            Value::Decimal(rescaled)
        }

        (TypeKind::String, Value::String(s)) => Value::String(s.clone()),
        (TypeKind::Bytes, Value::Bytes(b)) => Value::Bytes(b.clone()),
        (TypeKind::Date, Value::Date(d)) => Value::Date(*d),
        (TypeKind::Time, Value::Time(t)) => Value::Time(*t),
        (TypeKind::Timestamp, Value::Timestamp(ts)) => Value::Timestamp(*ts),
        (TypeKind::Interval, Value::Duration(d)) => Value::Duration(*d),

        _ => return None,
    };
    Some(coerced)
}

fn convert_fields(
    fields: &[RowField],
    names: &[&str],
    record_idx: usize,
    prefix: &str,
    record: &RawRecord,
) -> Result<Vec<Value>> {
    check_arity(fields, record_idx, prefix, record)?;

    let mut values = Vec::with_capacity(fields.len());
    for (idx, (field, name)) in fields.iter().zip(names).enumerate() {
        let value = record.lookup(name, idx).unwrap_or(&Value::Null);
        let path = field_path(prefix, &field.name);
        values.push(convert_value(&field.data_type, value, record_idx, &path)?);
    }
    Ok(values)
}

fn convert_value(data_type: &DataType, value: &Value, record_idx: usize, path: &str) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match (&data_type.kind, value) {
        (TypeKind::Array { element }, Value::List(values)) => {
            let mut converted = Vec::with_capacity(values.len());
            for (i, v) in values.iter().enumerate() {
                let path = format!("{}[{}]", path, i);
                converted.push(convert_value(element, v, record_idx, &path)?);
            }
            Ok(Value::List(converted))
        }

        (TypeKind::Map { key, value: value_type }, Value::Map(entries)) => {
            let key_path = format!("{}{{key}}", path);
            let value_path = format!("{}{{value}}", path);
            let mut converted = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                converted.push((
                    convert_value(key, k, record_idx, &key_path)?,
                    convert_value(value_type, v, record_idx, &value_path)?,
                ));
            }
            Ok(Value::Map(converted))
        }

        (TypeKind::Row { fields }, Value::Record(record)) => {
            let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
            let values = convert_fields(fields, &names, record_idx, path, record)?;
            Ok(Value::record(RawRecord::Row(Row::new(values))))
        }

        (TypeKind::Array { .. } | TypeKind::Map { .. } | TypeKind::Row { .. }, _) => {
            Err(mismatch(record_idx, path, data_type, describe(value)))
        }

        (kind, _) => coerce_atomic(kind, value)
            .ok_or_else(|| mismatch(record_idx, path, data_type, describe(value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::value::Decimal;
    use std::collections::BTreeMap;

    fn schema(fields: Vec<(&str, DataType)>) -> RowSchema {
        RowSchema::new(
            fields
                .into_iter()
                .map(|(n, t)| RowField::new(n, t))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_widening() {
        let cases = [
            (DataType::bigint(), Value::Int(5), Value::Long(5), "int into bigint"),
            (DataType::double(), Value::Int(5), Value::Double(5.0), "int into double"),
            (DataType::double(), Value::Long(7), Value::Double(7.0), "bigint into double"),
            (DataType::float(), Value::Int(2), Value::Float(2.0), "int into float"),
            (DataType::int(), Value::Bool(true), Value::Int(1), "boolean into int"),
            (DataType::int(), Value::Long(42), Value::Int(42), "small bigint into int"),
            (
                DataType::decimal(10, 3),
                Value::Decimal(Decimal::new(125, 1)),
                Value::Decimal(Decimal::new(12500, 3)),
                "decimal rescale",
            ),
        ];

        for (data_type, input, expected, description) in cases {
            let schema = schema(vec![("f", data_type)]);
            let row = convert(&schema, 0, &RawRecord::scalar(input)).unwrap();
            assert_eq!(row.values, vec![expected], "Failed: {}", description);
        }
    }

    #[test]
    fn test_incompatible_values_fail() {
        let cases = [
            (DataType::int(), Value::String("x".to_string()), "string into int"),
            (DataType::int(), Value::Long(i64::MAX), "large bigint into int"),
            (DataType::int(), Value::Double(1.5), "double into int"),
            (DataType::string(), Value::Int(1), "int into string"),
            (
                DataType::decimal(4, 2),
                Value::Decimal(Decimal::new(123456, 3)),
                "decimal with too large a scale",
            ),
            (
                DataType::decimal(4, 2),
                Value::Decimal(Decimal::new(12345, 2)),
                "decimal exceeding precision",
            ),
            (DataType::array(DataType::int()), Value::Int(1), "int into array"),
        ];

        for (data_type, input, description) in cases {
            let schema = schema(vec![("f", data_type)]);
            let result = convert(&schema, 3, &RawRecord::scalar(input));
            assert!(
                matches!(result, Err(BridgeError::Validation { record: 3, .. })),
                "Failed: {}",
                description
            );
        }
    }

    #[test]
    fn test_null_passes_conversion() {
        let schema = schema(vec![("f", DataType::int().not_null())]);
        let row = convert(&schema, 0, &RawRecord::scalar(Value::Null)).unwrap();
        assert_eq!(row.values, vec![Value::Null]);
    }

    #[test]
    fn test_mapping_ordered_by_schema() {
        let schema = schema(vec![
            ("name", DataType::string()),
            ("age", DataType::bigint()),
            ("city", DataType::string()),
        ]);
        let mut map = BTreeMap::new();
        map.insert("age".to_string(), Value::Int(30));
        map.insert("name".to_string(), Value::String("Alice".to_string()));
        map.insert("extra".to_string(), Value::Bool(true));

        let row = convert(&schema, 0, &RawRecord::Mapping(map)).unwrap();

        assert_eq!(
            row.values,
            vec![
                Value::String("Alice".to_string()),
                Value::Long(30),
                Value::Null
            ]
        );
    }

    #[test]
    fn test_positional_arity_checked() {
        let schema = schema(vec![("a", DataType::int()), ("b", DataType::int())]);
        let err = convert(&schema, 2, &RawRecord::Tuple(vec![Value::Int(1)])).unwrap_err();

        match err {
            BridgeError::Validation {
                record,
                field,
                expected,
                actual,
            } => {
                assert_eq!(record, 2);
                assert_eq!(field, "<record>");
                assert_eq!(expected, "2 fields");
                assert_eq!(actual, "1 fields");
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_conversion_and_paths() {
        let point = DataType::row(vec![
            RowField::new("x", DataType::double()),
            RowField::new("y", DataType::double()),
        ]);
        let schema = schema(vec![
            ("tags", DataType::array(DataType::bigint())),
            ("point", point),
        ]);

        let record = RawRecord::Tuple(vec![
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::record(RawRecord::Tuple(vec![Value::Int(1), Value::Float(2.5)])),
        ]);
        let row = convert(&schema, 0, &record).unwrap();
        assert_eq!(
            row.values,
            vec![
                Value::List(vec![Value::Long(1), Value::Long(2)]),
                Value::record(RawRecord::Row(Row::new(vec![
                    Value::Double(1.0),
                    Value::Double(2.5)
                ]))),
            ]
        );

        let bad = RawRecord::Tuple(vec![
            Value::List(vec![Value::Int(1), Value::String("two".to_string())]),
            Value::Null,
        ]);
        let err = convert(&schema, 0, &bad).unwrap_err();
        assert!(matches!(err, BridgeError::Validation { ref field, .. } if field == "tags[1]"));
    }

    #[test]
    fn test_converter_with_lookup_names() {
        let schema = schema(vec![("first", DataType::int()), ("second", DataType::int())]);
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Value::Int(1));
        map.insert("b".to_string(), Value::Int(2));

        let converter = RecordConverter::new(schema)
            .with_lookup_names(vec!["a".to_string(), "b".to_string()]);
        let row = converter.convert(0, &RawRecord::Mapping(map)).unwrap();

        assert_eq!(row.values, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_convert_all_is_lazy_and_numbered() {
        let schema = schema(vec![("f", DataType::int())]);
        let records = vec![
            RawRecord::scalar(Value::Int(1)),
            RawRecord::scalar(Value::String("x".to_string())),
            RawRecord::scalar(Value::Int(3)),
        ];
        let converter = RecordConverter::new(schema);

        let mut rows = converter.convert_all(&records);
        assert!(rows.next().unwrap().is_ok());
        assert!(matches!(
            rows.next().unwrap(),
            Err(BridgeError::Validation { record: 1, .. })
        ));
    }

    #[test]
    fn test_verification_enabled_rejects_nulls() {
        let schema = schema(vec![("f", DataType::int().not_null())]);
        let record = RawRecord::scalar(Value::Null);

        assert!(RecordConverter::new(schema.clone()).convert(0, &record).is_ok());
        assert!(
            RecordConverter::new(schema)
                .with_verification(true)
                .convert(0, &record)
                .is_err()
        );
    }
}
