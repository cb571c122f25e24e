//! Client side of the engine boundary
//!
//! A [`TableEnvironment`] issues typed [`Request`]s through an injected
//! [`Channel`] and decodes the typed [`Response`]s. Session state (current
//! catalog and database, registered views) lives on the engine side.

pub mod environment;
pub mod loopback;

pub use environment::{EnvironmentSettings, EnvironmentSettingsBuilder, TableEnvironment};
pub use loopback::LoopbackChannel;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::QualifiedPath;
use crate::error::Result;
use crate::schema::{EngineRow, RowSchema};

/// Handle to a table that lives on the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub id: Uuid,
    pub schema: RowSchema,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {} {}", self.id, self.schema)
    }
}

/// Calls the engine understands
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GetCurrentCatalog,
    UseCatalog { name: String },
    GetCurrentDatabase,
    UseDatabase { name: String },
    ListCatalogs,
    ListDatabases,
    ListTables,
    ListTemporaryViews,
    LookupTable { path: QualifiedPath },
    CreateTemporaryView { path: QualifiedPath, table_id: Uuid },
    DropTemporaryView { path: QualifiedPath },
    /// Read an encoded batch file into a new table
    ReadBatchFile { path: PathBuf, schema: RowSchema },
    CollectTable { id: Uuid },
}

impl Request {
    /// Name of the call, used in errors and logs
    pub fn operation(&self) -> &'static str {
        match self {
            Request::GetCurrentCatalog => "getCurrentCatalog",
            Request::UseCatalog { .. } => "useCatalog",
            Request::GetCurrentDatabase => "getCurrentDatabase",
            Request::UseDatabase { .. } => "useDatabase",
            Request::ListCatalogs => "listCatalogs",
            Request::ListDatabases => "listDatabases",
            Request::ListTables => "listTables",
            Request::ListTemporaryViews => "listTemporaryViews",
            Request::LookupTable { .. } => "from",
            Request::CreateTemporaryView { .. } => "createTemporaryView",
            Request::DropTemporaryView { .. } => "dropTemporaryView",
            Request::ReadBatchFile { .. } => "readBatchFile",
            Request::CollectTable { .. } => "collect",
        }
    }
}

/// Answers from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Name(String),
    Names(Vec<String>),
    Table(Table),
    Dropped(bool),
    Rows(Vec<EngineRow>),
    Done,
}

impl Response {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Response::Name(_) => "name",
            Response::Names(_) => "names",
            Response::Table(_) => "table",
            Response::Dropped(_) => "dropped",
            Response::Rows(_) => "rows",
            Response::Done => "done",
        }
    }
}

/// Transport to an engine session
#[async_trait]
pub trait Channel: Send + Sync {
    async fn call(&self, request: Request) -> Result<Response>;
}
