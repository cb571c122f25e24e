//! Catalog object paths
//!
//! Objects are addressed as `catalog.database.object`; shorter paths are
//! completed from the session's current catalog and database.

pub mod path;

pub use path::{ParsedPath, QualifiedPath, escape_identifier, is_reserved, resolve};
pub use crate::config::{DEFAULT_CATALOG, DEFAULT_DATABASE};
