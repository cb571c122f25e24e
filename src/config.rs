//! Configuration constants for the table bridge
//!
//! This module centralizes all tunable parameters and constants used throughout
//! the crate.

// ============================================================================
// Session Defaults
// ============================================================================

/// Catalog a fresh session starts in
pub const DEFAULT_CATALOG: &str = "default_catalog";

/// Database a fresh session starts in
pub const DEFAULT_DATABASE: &str = "default_database";

// ============================================================================
// Schema Inference
// ============================================================================

/// Prefix of generated field names for positional records (`_1`, `_2`, ...)
pub const GENERATED_FIELD_PREFIX: &str = "_";

/// Name of the single field a scalar type hint is wrapped into
pub const SCALAR_FIELD_NAME: &str = "value";

/// Largest decimal precision the engine accepts
pub const MAX_DECIMAL_PRECISION: u8 = 38;

// ============================================================================
// Batch Encoding
// ============================================================================

/// Leading bytes of every encoded batch file
pub const BATCH_MAGIC: &[u8; 4] = b"TBRB";

/// Version byte written after the magic
pub const BATCH_FORMAT_VERSION: u8 = 1;

/// Number of rows buffered into one length-prefixed frame
///
/// Set to 1000 rows so a frame stays in the low hundreds of kilobytes for
/// typical records while keeping the per-frame overhead negligible. The
/// writer never needs the total row count up front.
pub const BATCH_SIZE: usize = 1000;

/// Upper bound for a single frame read back from a batch file
///
/// Guards the reader against allocating absurd buffers when a length prefix
/// is corrupt.
pub const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024; // 256 MB

/// Deepest nesting of arrays, maps and rows the batch reader decodes
///
/// A corrupt or hostile frame made of nested container tags would otherwise
/// recurse until the stack overflows.
pub const MAX_NESTING_DEPTH: usize = 64;

/// File name of the batch file inside its scoped temporary directory
pub const BATCH_FILE_NAME: &str = "elements.tbrb";
