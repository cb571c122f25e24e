use crate::error::Result;

use super::convert::{check_arity, coerce_atomic, describe, field_path, mismatch};
use super::types::{DataType, RowField, RowSchema, TypeKind};
use super::value::{RawRecord, Value};

/// Check that a record conforms to `schema`
///
/// Positional records must have one value per field. Named records are
/// matched by field name: a missing name counts as null and names the schema
/// does not mention are ignored. Every value must be null (in a nullable
/// field) or representable by its field type.
pub fn verify(schema: &RowSchema, record_idx: usize, record: &RawRecord) -> Result<()> {
    let names = schema.field_names();
    verify_fields(schema.fields(), &names, record_idx, "", record)
}

pub(crate) fn verify_fields(
    fields: &[RowField],
    names: &[&str],
    record_idx: usize,
    prefix: &str,
    record: &RawRecord,
) -> Result<()> {
    check_arity(fields, record_idx, prefix, record)?;

    for (idx, (field, name)) in fields.iter().zip(names).enumerate() {
        let value = record.lookup(name, idx).unwrap_or(&Value::Null);
        let path = field_path(prefix, &field.name);
        verify_value(&field.data_type, value, record_idx, &path)?;
    }
    Ok(())
}

fn verify_value(data_type: &DataType, value: &Value, record_idx: usize, path: &str) -> Result<()> {
    if value.is_null() {
        if data_type.nullable {
            return Ok(());
        }
        return Err(mismatch(record_idx, path, data_type, "NULL"));
    }

    match (&data_type.kind, value) {
        (TypeKind::Array { element }, Value::List(values)) => {
            for (i, v) in values.iter().enumerate() {
                verify_value(element, v, record_idx, &format!("{}[{}]", path, i))?;
            }
            Ok(())
        }

        (TypeKind::Map { key, value: value_type }, Value::Map(entries)) => {
            let key_path = format!("{}{{key}}", path);
            let value_path = format!("{}{{value}}", path);
            for (k, v) in entries {
                verify_value(key, k, record_idx, &key_path)?;
                verify_value(value_type, v, record_idx, &value_path)?;
            }
            Ok(())
        }

        (TypeKind::Row { fields }, Value::Record(record)) => {
            let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
            verify_fields(fields, &names, record_idx, path, record)
        }

        (TypeKind::Array { .. } | TypeKind::Map { .. } | TypeKind::Row { .. }, _) => {
            Err(mismatch(record_idx, path, data_type, describe(value)))
        }

        (kind, _) => {
            if coerce_atomic(kind, value).is_some() {
                Ok(())
            } else {
                Err(mismatch(record_idx, path, data_type, describe(value)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::schema::value::{Decimal, Row};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn people_schema() -> RowSchema {
        RowSchema::new(vec![
            RowField::new("id", DataType::bigint().not_null()),
            RowField::new("name", DataType::string()),
            RowField::new("born", DataType::date()),
        ])
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_conforming_records() {
        let schema = people_schema();
        let records = [
            RawRecord::Tuple(vec![
                Value::Int(1),
                Value::String("Ada".to_string()),
                date(1815, 12, 10),
            ]),
            RawRecord::Sequence(vec![Value::Long(2), Value::Null, Value::Null]),
            RawRecord::Row(Row::with_names(
                vec!["name".to_string(), "id".to_string()],
                vec![Value::String("Alan".to_string()), Value::Long(3)],
            )
            .unwrap()),
        ];

        for (idx, record) in records.iter().enumerate() {
            assert!(
                verify(&schema, idx, record).is_ok(),
                "Failed: record {} should verify",
                record
            );
        }
    }

    #[test]
    fn test_violations() {
        let schema = people_schema();
        let mut missing_id = BTreeMap::new();
        missing_id.insert("name".to_string(), Value::String("Grace".to_string()));

        let cases = [
            (
                RawRecord::Tuple(vec![Value::Null, Value::Null, Value::Null]),
                "id",
                "null in NOT NULL field",
            ),
            (
                RawRecord::Tuple(vec![Value::Int(1), Value::Int(5), Value::Null]),
                "name",
                "int in string field",
            ),
            (
                RawRecord::Tuple(vec![Value::Double(1.0), Value::Null, Value::Null]),
                "id",
                "double in bigint field",
            ),
            (
                RawRecord::Tuple(vec![Value::Int(1), Value::Null]),
                "<record>",
                "too few values",
            ),
            (RawRecord::Mapping(missing_id), "id", "missing key"),
        ];

        for (record, expected_field, description) in cases {
            match verify(&schema, 4, &record) {
                Err(BridgeError::Validation { record, field, .. }) => {
                    assert_eq!(record, 4, "Failed: {}", description);
                    assert_eq!(field, expected_field, "Failed: {}", description);
                }
                other => panic!("Failed: {} - got {:?}", description, other),
            }
        }
    }

    #[test]
    fn test_nested_violation_path() {
        let schema = RowSchema::new(vec![RowField::new(
            "prices",
            DataType::map(
                DataType::string().not_null(),
                DataType::decimal(5, 2).not_null(),
            ),
        )])
        .unwrap();

        let ok = RawRecord::scalar(Value::Map(vec![(
            Value::String("apple".to_string()),
            Value::Decimal(Decimal::new(125, 2)),
        )]));
        assert!(verify(&schema, 0, &ok).is_ok());

        let bad = RawRecord::scalar(Value::Map(vec![(
            Value::String("pear".to_string()),
            Value::Null,
        )]));
        let err = verify(&schema, 0, &bad).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Record 0: field 'prices{value}' expected DECIMAL(5, 2) NOT NULL, got NULL"
        );
    }

    #[test]
    fn test_error_message_names_value() {
        let schema = RowSchema::new(vec![RowField::new("n", DataType::int())]).unwrap();
        let err = verify(&schema, 7, &RawRecord::scalar(Value::Long(5_000_000_000))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Record 7: field 'n' expected INT, got BIGINT 5000000000"
        );
    }
}
