//! Error types surfaced by the bridge

use std::io;

/// Result alias used by the library modules
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Errors produced while inferring, verifying, converting, serializing or
/// forwarding
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A path string could not be parsed into catalog/database/object segments
    #[error("Invalid object path '{input}': {message}")]
    Parse { input: String, message: String },

    /// Records could not be reconciled into one schema
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A concrete record does not conform to the schema
    #[error(
        "Record {record}: field '{field}' expected {expected}, got {actual}"
    )]
    Validation {
        record: usize,
        field: String,
        expected: String,
        actual: String,
    },

    /// The batch sink or source failed, or its contents are corrupt
    #[error("Transport failure: {context}")]
    Transport {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The engine rejected a forwarded call
    #[error("Remote call '{operation}' failed: {message}")]
    Remote { operation: String, message: String },

    /// The engine answered with a response of the wrong kind
    #[error("Unexpected response to '{operation}': {response}")]
    UnexpectedResponse { operation: String, response: String },
}

impl BridgeError {
    pub(crate) fn parse(input: &str, message: impl Into<String>) -> Self {
        BridgeError::Parse {
            input: input.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn transport(context: impl Into<String>, source: io::Error) -> Self {
        BridgeError::Transport {
            context: context.into(),
            source,
        }
    }

    /// Transport error for a batch whose bytes do not follow the encoding
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        let message = message.into();
        BridgeError::Transport {
            context: format!("Corrupt batch encoding: {}", message),
            source: io::Error::new(io::ErrorKind::InvalidData, message),
        }
    }
}

/// Reasons schema inference or schema construction can fail
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Cannot infer a schema from an empty collection of elements")]
    EmptyInput,

    #[error("Record {record}: expected a {expected} record, got a {actual} record")]
    ShapeMismatch {
        record: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Record {record}: expected {expected} fields, got {actual}")]
    ArityMismatch {
        record: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Record {record}: field names {actual:?} differ from the first record's {expected:?}")]
    FieldSetMismatch {
        record: usize,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("{names} field names were supplied but the records have {arity} fields")]
    NameHintMismatch { names: usize, arity: usize },

    #[error("Record {record}: field '{field}' has type {found}, which cannot be merged with {existing}")]
    TypeMismatch {
        record: usize,
        field: String,
        existing: String,
        found: String,
    },

    #[error("Field '{field}' has no value in any record, so its type cannot be determined")]
    Undetermined { field: String },

    #[error("Duplicate field name '{name}'")]
    DuplicateField { name: String },

    #[error("Field name must not be empty")]
    EmptyFieldName,

    #[error("Invalid decimal({precision}, {scale}): {reason}")]
    InvalidDecimal {
        precision: u8,
        scale: u8,
        reason: String,
    },

    #[error("Unsupported column type {data_type} for field '{field}'")]
    UnsupportedType { field: String, data_type: String },

    #[error("{expected} types were supplied but the frame has {actual} columns")]
    FrameHintMismatch { expected: usize, actual: usize },

    #[error("A row with {names} field names cannot carry {values} values")]
    RowNamesMismatch { names: usize, values: usize },
}
