use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::error::SchemaError;

/// Fixed-point decimal stored as an unscaled integer and a scale
///
/// `Decimal { unscaled: 12345, scale: 2 }` is `123.45`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub unscaled: i128,
    pub scale: u8,
}

impl Decimal {
    pub fn new(unscaled: i128, scale: u8) -> Self {
        Self { unscaled, scale }
    }

    /// Number of significant digits of the unscaled value (at least 1)
    pub fn digits(&self) -> u8 {
        let mut n = self.unscaled.unsigned_abs();
        let mut digits = 1u8;
        while n >= 10 {
            n /= 10;
            digits += 1;
        }
        digits
    }

    /// Smallest (precision, scale) able to hold this value
    pub fn precision_and_scale(&self) -> (u8, u8) {
        (self.digits().max(self.scale), self.scale)
    }

    /// Same value expressed with a larger scale
    ///
    /// Returns `None` when `scale` is smaller than the current scale or the
    /// unscaled value would overflow.
    pub fn rescale(&self, scale: u8) -> Option<Decimal> {
        let shift = scale.checked_sub(self.scale)?;
        let factor = 10_i128.checked_pow(shift as u32)?;
        Some(Decimal {
            unscaled: self.unscaled.checked_mul(factor)?,
            scale,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.unsigned_abs().to_string();
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let scale = self.scale as usize;

        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }

        // Left-pad so at least one digit precedes the point
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (integer, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, integer, fraction)
    }
}

/// A single value inside a record
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Duration(TimeDelta),
    List(Vec<Value>),
    /// Key/value pairs in insertion order
    Map(Vec<(Value, Value)>),
    /// A nested record, which becomes a row-typed column
    Record(Box<RawRecord>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value's kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INT",
            Value::Long(_) => "BIGINT",
            Value::Float(_) => "FLOAT",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::String(_) => "STRING",
            Value::Bytes(_) => "BYTES",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Duration(_) => "INTERVAL",
            Value::List(_) => "ARRAY",
            Value::Map(_) => "MAP",
            Value::Record(_) => "ROW",
        }
    }

    pub fn record(record: RawRecord) -> Self {
        Value::Record(Box::new(record))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "x'{}'", hex::encode(v)),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Time(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v),
            Value::Duration(v) => write!(f, "{}", v),
            Value::List(values) => {
                write!(f, "[")?;
                write_joined(f, values.iter())?;
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Record(record) => write!(f, "{}", record),
        }
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    values: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, value) in values.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", value)?;
    }
    Ok(())
}

/// Positional values with optional field names
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    names: Option<Vec<String>>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            names: None,
        }
    }

    /// A row whose values are paired with names, one name per value
    pub fn with_names(names: Vec<String>, values: Vec<Value>) -> Result<Self, SchemaError> {
        if names.len() != values.len() {
            return Err(SchemaError::RowNamesMismatch {
                names: names.len(),
                values: values.len(),
            });
        }
        Ok(Self {
            values,
            names: Some(names),
        })
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    /// Value for a field name, if the row is named
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.names.as_ref()?.iter().position(|n| n == name)?;
        self.values.get(idx)
    }
}

/// One input element, in one of the four accepted shapes
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// Ordered, positional values
    Tuple(Vec<Value>),
    /// Values keyed by field name; iteration is in sorted key order
    Mapping(BTreeMap<String, Value>),
    /// Array-like positional values
    Sequence(Vec<Value>),
    /// Structured row, optionally named
    Row(Row),
}

impl RawRecord {
    /// Wrap a single value, as used with a scalar type hint
    pub fn scalar(value: Value) -> Self {
        RawRecord::Tuple(vec![value])
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            RawRecord::Tuple(_) => "tuple",
            RawRecord::Mapping(_) => "mapping",
            RawRecord::Sequence(_) => "sequence",
            RawRecord::Row(row) if row.names.is_some() => "named row",
            RawRecord::Row(_) => "row",
        }
    }

    /// Number of values carried by the record
    pub fn arity(&self) -> usize {
        match self {
            RawRecord::Tuple(values) | RawRecord::Sequence(values) => values.len(),
            RawRecord::Mapping(map) => map.len(),
            RawRecord::Row(row) => row.values.len(),
        }
    }

    /// Field names carried by the record itself, in record order
    pub fn field_names(&self) -> Option<Vec<String>> {
        match self {
            RawRecord::Tuple(_) | RawRecord::Sequence(_) => None,
            RawRecord::Mapping(map) => Some(map.keys().cloned().collect()),
            RawRecord::Row(row) => row.names.clone(),
        }
    }

    /// Values in record order
    pub fn values(&self) -> Vec<&Value> {
        match self {
            RawRecord::Tuple(values) | RawRecord::Sequence(values) => values.iter().collect(),
            RawRecord::Mapping(map) => map.values().collect(),
            RawRecord::Row(row) => row.values.iter().collect(),
        }
    }

    /// Whether values are addressed by name rather than position
    pub fn is_named(&self) -> bool {
        match self {
            RawRecord::Mapping(_) => true,
            RawRecord::Row(row) => row.names.is_some(),
            RawRecord::Tuple(_) | RawRecord::Sequence(_) => false,
        }
    }

    /// Look up a value by field name (named shapes) or position (positional
    /// shapes). A missing name yields `None`.
    pub fn lookup(&self, name: &str, position: usize) -> Option<&Value> {
        match self {
            RawRecord::Mapping(map) => map.get(name),
            RawRecord::Row(row) if row.names.is_some() => row.get(name),
            RawRecord::Row(row) => row.values.get(position),
            RawRecord::Tuple(values) | RawRecord::Sequence(values) => values.get(position),
        }
    }
}

impl fmt::Display for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawRecord::Tuple(values) => {
                write!(f, "(")?;
                write_joined(f, values.iter())?;
                write!(f, ")")
            }
            RawRecord::Sequence(values) => {
                write!(f, "[")?;
                write_joined(f, values.iter())?;
                write!(f, "]")
            }
            RawRecord::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            RawRecord::Row(row) => {
                write!(f, "Row(")?;
                match &row.names {
                    Some(names) => {
                        for (i, (n, v)) in names.iter().zip(&row.values).enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}={}", n, v)?;
                        }
                    }
                    None => write_joined(f, row.values.iter())?,
                }
                write!(f, ")")
            }
        }
    }
}

/// A converted record in the engine's positional row representation
///
/// Values are ordered by the schema and already widened to the field types.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRow {
    pub values: Vec<Value>,
}

impl EngineRow {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl fmt::Display for EngineRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+I[")?;
        write_joined(f, self.values.iter())?;
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_display() {
        let cases = [
            (Decimal::new(12345, 2), "123.45", "Fraction"),
            (Decimal::new(-5, 3), "-0.005", "Negative, padded"),
            (Decimal::new(42, 0), "42", "Zero scale"),
            (Decimal::new(-42, 0), "-42", "Negative zero scale"),
            (Decimal::new(1, 40), "0.0000000000000000000000000000000000000001", "Scale past 38"),
        ];

        for (decimal, expected, description) in cases {
            assert_eq!(decimal.to_string(), expected, "Failed: {}", description);
        }

        let extreme = Decimal::new(i128::MIN, u8::MAX).to_string();
        assert_eq!(
            extreme,
            format!("-0.{}{}", "0".repeat(216), "170141183460469231731687303715884105728")
        );
    }

    #[test]
    fn test_named_row_width_must_match() {
        let err = Row::with_names(
            vec!["a".to_string()],
            vec![Value::Int(1), Value::Int(2)],
        )
        .unwrap_err();

        assert_eq!(err, SchemaError::RowNamesMismatch { names: 1, values: 2 });
        assert!(Row::with_names(vec!["a".to_string()], vec![Value::Null]).is_ok());
    }

    #[test]
    fn test_decimal_precision() {
        assert_eq!(Decimal::new(12345, 2).precision_and_scale(), (5, 2));
        assert_eq!(Decimal::new(5, 3).precision_and_scale(), (3, 3));
        assert_eq!(Decimal::new(0, 0).precision_and_scale(), (1, 0));
    }

    #[test]
    fn test_decimal_rescale() {
        assert_eq!(Decimal::new(125, 1).rescale(3), Some(Decimal::new(12500, 3)));
        assert_eq!(Decimal::new(125, 2).rescale(1), None);
    }

    #[test]
    fn test_record_lookup() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), Value::Int(2));
        map.insert("a".to_string(), Value::Int(1));
        let mapping = RawRecord::Mapping(map);

        assert_eq!(mapping.lookup("a", 99), Some(&Value::Int(1)));
        assert_eq!(mapping.lookup("missing", 0), None);
        assert_eq!(
            mapping.field_names(),
            Some(vec!["a".to_string(), "b".to_string()])
        );

        let tuple = RawRecord::Tuple(vec![Value::Int(7), Value::Int(8)]);
        assert_eq!(tuple.lookup("ignored", 1), Some(&Value::Int(8)));
    }

    #[test]
    fn test_display() {
        let row = RawRecord::Row(Row::with_names(
            vec!["id".to_string(), "data".to_string()],
            vec![Value::Long(1), Value::Bytes(vec![0xde, 0xad])],
        )
        .unwrap());
        assert_eq!(row.to_string(), "Row(id=1, data=x'dead')");

        let engine_row = EngineRow::new(vec![Value::Int(1), Value::String("Hi".to_string())]);
        assert_eq!(engine_row.to_string(), "+I[1, Hi]");
    }
}
