//! Schema inference, verification and conversion of in-memory records
//!
//! The entry point is [`converter_for`], which decides the schema of a
//! collection of elements and returns the converter that turns each element
//! into an engine row.

pub mod convert;
pub mod infer;
pub mod types;
pub mod value;
pub mod verify;

pub use convert::{RecordConverter, convert};
pub use infer::{SchemaHint, SchemaInferrer};
pub use types::{DataType, RowField, RowSchema, TypeKind};
pub use value::{Decimal, EngineRow, RawRecord, Row, Value};
pub use verify::verify;

use crate::error::Result;

/// Infer the schema of `records` and build their converter
///
/// Records are verified only when the caller supplied the types (a full
/// schema or a scalar type) and asked for verification. Inferred schemas fit
/// the records by construction.
pub fn converter_for(
    records: &[RawRecord],
    hint: Option<&SchemaHint>,
    verify_schema: bool,
) -> Result<RecordConverter> {
    let schema = SchemaInferrer::infer_schema(records, hint)?;

    let converter = match hint {
        Some(SchemaHint::Schema(_)) => {
            RecordConverter::new(schema).with_verification(verify_schema)
        }
        Some(SchemaHint::Scalar(_)) => RecordConverter::new(schema)
            .with_verification(verify_schema)
            .with_scalar_elements(),
        Some(SchemaHint::Names(_)) => {
            // Renamed fields of named records are still found under the
            // names the records carry.
            match records.first().and_then(RawRecord::field_names) {
                Some(source_names) => RecordConverter::new(schema).with_lookup_names(source_names),
                None => RecordConverter::new(schema),
            }
        }
        None => RecordConverter::new(schema),
    };

    Ok(converter)
}

/// Infer (or take from the hint) the schema of `records`
pub fn infer_schema(records: &[RawRecord], hint: Option<&SchemaHint>) -> Result<RowSchema> {
    SchemaInferrer::infer_schema(records, hint)
}
