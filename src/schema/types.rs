use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MAX_DECIMAL_PRECISION;
use crate::error::SchemaError;

/// Kind of a column type, without its nullability
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Placeholder for a column that has only seen nulls so far. Never part
    /// of a finished schema.
    Null,
    Boolean,
    Int,
    BigInt,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    String,
    Bytes,
    Date,
    Time,
    Timestamp,
    Interval,
    Array { element: Box<DataType> },
    Map { key: Box<DataType>, value: Box<DataType> },
    Row { fields: Vec<RowField> },
}

/// A column type together with its nullability
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType {
    pub kind: TypeKind,
    pub nullable: bool,
}

/// A named field of a row type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowField {
    pub name: String,
    pub data_type: DataType,
}

impl RowField {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl DataType {
    fn nullable_of(kind: TypeKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    pub fn null() -> Self {
        Self::nullable_of(TypeKind::Null)
    }

    pub fn boolean() -> Self {
        Self::nullable_of(TypeKind::Boolean)
    }

    pub fn int() -> Self {
        Self::nullable_of(TypeKind::Int)
    }

    pub fn bigint() -> Self {
        Self::nullable_of(TypeKind::BigInt)
    }

    pub fn float() -> Self {
        Self::nullable_of(TypeKind::Float)
    }

    pub fn double() -> Self {
        Self::nullable_of(TypeKind::Double)
    }

    pub fn decimal(precision: u8, scale: u8) -> Self {
        Self::nullable_of(TypeKind::Decimal { precision, scale })
    }

    pub fn string() -> Self {
        Self::nullable_of(TypeKind::String)
    }

    pub fn bytes() -> Self {
        Self::nullable_of(TypeKind::Bytes)
    }

    pub fn date() -> Self {
        Self::nullable_of(TypeKind::Date)
    }

    pub fn time() -> Self {
        Self::nullable_of(TypeKind::Time)
    }

    pub fn timestamp() -> Self {
        Self::nullable_of(TypeKind::Timestamp)
    }

    pub fn interval() -> Self {
        Self::nullable_of(TypeKind::Interval)
    }

    pub fn array(element: DataType) -> Self {
        Self::nullable_of(TypeKind::Array {
            element: Box::new(element),
        })
    }

    pub fn map(key: DataType, value: DataType) -> Self {
        Self::nullable_of(TypeKind::Map {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    pub fn row(fields: Vec<RowField>) -> Self {
        Self::nullable_of(TypeKind::Row { fields })
    }

    /// Same type with nulls disallowed
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Same type with nullability set explicitly
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn is_row(&self) -> bool {
        matches!(self.kind, TypeKind::Row { .. })
    }

    /// Position in the numeric widening chain
    /// boolean < int < bigint < float < double
    fn numeric_rank(kind: &TypeKind) -> Option<u8> {
        match kind {
            TypeKind::Boolean => Some(0),
            TypeKind::Int => Some(1),
            TypeKind::BigInt => Some(2),
            TypeKind::Float => Some(3),
            TypeKind::Double => Some(4),
            _ => None,
        }
    }

    /// Find the narrowest type that accommodates both types
    ///
    /// Returns `None` when the types cannot be reconciled. Strings, bytes and
    /// the temporal types only merge with themselves; decimals only merge with
    /// decimals.
    pub fn common_type(&self, other: &DataType) -> Option<DataType> {
        use TypeKind::*;

        let nullable = self.nullable || other.nullable;

        let kind = match (&self.kind, &other.kind) {
            (Null, kind) | (kind, Null) => kind.clone(),

            (a, b) if a == b => a.clone(),

            (a, b) if Self::numeric_rank(a).is_some() && Self::numeric_rank(b).is_some() => {
                if Self::numeric_rank(a) >= Self::numeric_rank(b) {
                    a.clone()
                } else {
                    b.clone()
                }
            }

            (
                Decimal {
                    precision: p1,
                    scale: s1,
                },
                Decimal {
                    precision: p2,
                    scale: s2,
                },
            ) => {
                let scale = (*s1).max(*s2);
                let integer_digits = p1.saturating_sub(*s1).max(p2.saturating_sub(*s2));
                let precision = integer_digits.checked_add(scale)?;
                if precision > MAX_DECIMAL_PRECISION {
                    return None;
                }
                Decimal { precision, scale }
            }

            (Array { element: a }, Array { element: b }) => Array {
                element: Box::new(a.common_type(b)?),
            },

            (Map { key: ka, value: va }, Map { key: kb, value: vb }) => Map {
                key: Box::new(ka.common_type(kb)?),
                value: Box::new(va.common_type(vb)?),
            },

            (Row { fields: fa }, Row { fields: fb }) => {
                if fa.len() != fb.len() {
                    return None;
                }
                let mut fields = Vec::with_capacity(fa.len());
                for (a, b) in fa.iter().zip(fb) {
                    if a.name != b.name {
                        return None;
                    }
                    fields.push(RowField::new(
                        a.name.clone(),
                        a.data_type.common_type(&b.data_type)?,
                    ));
                }
                Row { fields }
            }

            _ => return None,
        };

        Some(DataType { kind, nullable })
    }

    /// Whether a value of type `narrower` can be stored in this type without
    /// changing the type, ignoring nullability
    pub fn accepts(&self, narrower: &DataType) -> bool {
        match self.common_type(narrower) {
            Some(merged) => merged.kind == self.kind,
            None => false,
        }
    }

    /// True if no `null` placeholder remains anywhere in the type
    pub fn is_resolved(&self) -> bool {
        match &self.kind {
            TypeKind::Null => false,
            TypeKind::Array { element } => element.is_resolved(),
            TypeKind::Map { key, value } => key.is_resolved() && value.is_resolved(),
            TypeKind::Row { fields } => fields.iter().all(|f| f.data_type.is_resolved()),
            _ => true,
        }
    }

    /// Check the type is well formed, recursing into children
    pub fn validate(&self) -> Result<(), SchemaError> {
        match &self.kind {
            TypeKind::Decimal { precision, scale } => {
                if *precision == 0 || *precision > MAX_DECIMAL_PRECISION {
                    return Err(SchemaError::InvalidDecimal {
                        precision: *precision,
                        scale: *scale,
                        reason: format!("precision must be between 1 and {}", MAX_DECIMAL_PRECISION),
                    });
                }
                if scale > precision {
                    return Err(SchemaError::InvalidDecimal {
                        precision: *precision,
                        scale: *scale,
                        reason: "scale must not exceed precision".to_string(),
                    });
                }
                Ok(())
            }
            TypeKind::Array { element } => element.validate(),
            TypeKind::Map { key, value } => {
                key.validate()?;
                value.validate()
            }
            TypeKind::Row { fields } => validate_fields(fields),
            _ => Ok(()),
        }
    }
}

fn validate_fields(fields: &[RowField]) -> Result<(), SchemaError> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if field.name.is_empty() {
            return Err(SchemaError::EmptyFieldName);
        }
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateField {
                name: field.name.clone(),
            });
        }
        field.data_type.validate()?;
    }
    Ok(())
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Null => write!(f, "NULL")?,
            TypeKind::Boolean => write!(f, "BOOLEAN")?,
            TypeKind::Int => write!(f, "INT")?,
            TypeKind::BigInt => write!(f, "BIGINT")?,
            TypeKind::Float => write!(f, "FLOAT")?,
            TypeKind::Double => write!(f, "DOUBLE")?,
            TypeKind::Decimal { precision, scale } => write!(f, "DECIMAL({}, {})", precision, scale)?,
            TypeKind::String => write!(f, "STRING")?,
            TypeKind::Bytes => write!(f, "BYTES")?,
            TypeKind::Date => write!(f, "DATE")?,
            TypeKind::Time => write!(f, "TIME")?,
            TypeKind::Timestamp => write!(f, "TIMESTAMP")?,
            TypeKind::Interval => write!(f, "INTERVAL")?,
            TypeKind::Array { element } => write!(f, "ARRAY<{}>", element)?,
            TypeKind::Map { key, value } => write!(f, "MAP<{}, {}>", key, value)?,
            TypeKind::Row { fields } => {
                write!(f, "ROW<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "`{}` {}", field.name, field.data_type)?;
                }
                write!(f, ">")?;
            }
        }
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// Ordered, named, typed field list describing one tabular record shape
///
/// Field names are unique and every field type is well formed; both are
/// checked on construction, including when a schema is deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<RowField>", into = "Vec<RowField>")]
pub struct RowSchema {
    fields: Vec<RowField>,
}

impl RowSchema {
    pub fn new(fields: Vec<RowField>) -> Result<Self, SchemaError> {
        validate_fields(&fields)?;
        Ok(Self { fields })
    }

    /// Build a schema from a row type, or wrap any other type as the single
    /// field `name`
    pub fn from_data_type(data_type: DataType, name: &str) -> Result<Self, SchemaError> {
        match data_type.kind {
            TypeKind::Row { fields } => Self::new(fields),
            _ => Self::new(vec![RowField::new(name, data_type)]),
        }
    }

    pub fn fields(&self) -> &[RowField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn field_types(&self) -> Vec<&DataType> {
        self.fields.iter().map(|f| &f.data_type).collect()
    }

    /// The schema as a (non-null) row type
    pub fn to_row_type(&self) -> DataType {
        DataType::row(self.fields.clone()).not_null()
    }
}

impl TryFrom<Vec<RowField>> for RowSchema {
    type Error = SchemaError;

    fn try_from(fields: Vec<RowField>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<RowSchema> for Vec<RowField> {
    fn from(schema: RowSchema) -> Self {
        schema.fields
    }
}

impl fmt::Display for RowSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_row_type())
    }
}
