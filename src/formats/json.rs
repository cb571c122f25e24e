//! JSON lines input: one JSON document per non-empty line.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::Value as Json;

use crate::schema::{RawRecord, Value};

/// Parse JSON lines into records
///
/// Top-level arrays become tuples and objects become mappings; any other
/// document is a single-value record.
pub fn read_json_lines(buffer: &[u8]) -> Result<Vec<RawRecord>> {
    let text = std::str::from_utf8(buffer).context("JSON input is not valid UTF-8")?;

    let mut records = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let document: Json = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse JSON on line {}", line_no + 1))?;
        records.push(json_to_record(document));
    }

    Ok(records)
}

/// Convert a JSON document into a record
pub fn json_to_record(document: Json) -> RawRecord {
    match document {
        Json::Array(items) => RawRecord::Tuple(items.into_iter().map(json_to_value).collect()),
        Json::Object(map) => RawRecord::Mapping(object_to_mapping(map)),
        other => RawRecord::scalar(json_to_value(other)),
    }
}

fn object_to_mapping(map: serde_json::Map<String, Json>) -> BTreeMap<String, Value> {
    map.into_iter()
        .map(|(key, value)| (key, json_to_value(value)))
        .collect()
}

/// Convert a nested JSON value; nested objects become mapping records
pub fn json_to_value(value: Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Value::Int(small),
                    Err(_) => Value::Long(i),
                }
            } else {
                // u64 beyond i64 range and fractional numbers
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::List(items.into_iter().map(json_to_value).collect()),
        Json::Object(map) => Value::record(RawRecord::Mapping(object_to_mapping(map))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_shapes() {
        let input = br#"[1, "a"]
{"b": 2.5, "a": null}

"scalar"
"#;
        let records = read_json_lines(input).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            RawRecord::Tuple(vec![Value::Int(1), Value::String("a".to_string())])
        );
        assert_eq!(
            records[1].field_names(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            records[2],
            RawRecord::scalar(Value::String("scalar".to_string()))
        );
    }

    #[test]
    fn test_numbers() {
        let cases = [
            (json!(7), Value::Int(7), "small integer"),
            (json!(5_000_000_000_i64), Value::Long(5_000_000_000), "large integer"),
            (json!(1.5), Value::Double(1.5), "fraction"),
        ];

        for (input, expected, description) in cases {
            assert_eq!(json_to_value(input), expected, "Failed: {}", description);
        }
    }

    #[test]
    fn test_nested_values() {
        let value = json_to_value(json!({"tags": ["x", "y"], "point": {"x": 1}}));
        match value {
            Value::Record(record) => {
                assert_eq!(
                    record.lookup("tags", 0),
                    Some(&Value::List(vec![
                        Value::String("x".to_string()),
                        Value::String("y".to_string())
                    ]))
                );
                assert!(matches!(record.lookup("point", 0), Some(Value::Record(_))));
            }
            other => panic!("Expected a record, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_line_reports_position() {
        let err = read_json_lines(b"[1]\n{oops\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
