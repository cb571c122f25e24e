//! In-process engine
//!
//! Keeps a catalog tree, the session's current catalog and database, the
//! registered temporary views and every table read from a batch file.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{Channel, Request, Response, Table};
use crate::catalog::QualifiedPath;
use crate::codec;
use crate::config::{DEFAULT_CATALOG, DEFAULT_DATABASE};
use crate::error::{BridgeError, Result};
use crate::schema::{EngineRow, RowSchema};

struct CatalogEntry {
    default_database: String,
    /// database -> object name -> table id
    databases: BTreeMap<String, BTreeMap<String, Uuid>>,
}

impl CatalogEntry {
    fn new(default_database: &str) -> Self {
        let mut databases = BTreeMap::new();
        databases.insert(default_database.to_string(), BTreeMap::new());
        Self {
            default_database: default_database.to_string(),
            databases,
        }
    }
}

struct StoredTable {
    schema: RowSchema,
    rows: Vec<EngineRow>,
}

struct EngineState {
    catalogs: BTreeMap<String, CatalogEntry>,
    temporary_views: HashMap<QualifiedPath, Uuid>,
    tables: HashMap<Uuid, StoredTable>,
    current_catalog: String,
    current_database: String,
}

impl EngineState {
    fn database_exists(&self, catalog: &str, database: &str) -> bool {
        self.catalogs
            .get(catalog)
            .is_some_and(|entry| entry.databases.contains_key(database))
    }

    fn table(&self, id: Uuid) -> Option<Table> {
        self.tables.get(&id).map(|stored| Table {
            id,
            schema: stored.schema.clone(),
        })
    }

    fn lookup(&self, path: &QualifiedPath) -> Option<Uuid> {
        if let Some(id) = self.temporary_views.get(path) {
            return Some(*id);
        }
        self.catalogs
            .get(&path.catalog)
            .and_then(|entry| entry.databases.get(&path.database))
            .and_then(|objects| objects.get(&path.object))
            .copied()
    }

    fn views_in_current_database(&self) -> impl Iterator<Item = &QualifiedPath> {
        self.temporary_views.keys().filter(|path| {
            path.catalog == self.current_catalog && path.database == self.current_database
        })
    }
}

/// Engine session living in the current process
pub struct LoopbackChannel {
    state: RwLock<EngineState>,
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackChannel {
    /// A session with only the default catalog and database
    pub fn new() -> Self {
        let mut catalogs = BTreeMap::new();
        catalogs.insert(
            DEFAULT_CATALOG.to_string(),
            CatalogEntry::new(DEFAULT_DATABASE),
        );

        Self {
            state: RwLock::new(EngineState {
                catalogs,
                temporary_views: HashMap::new(),
                tables: HashMap::new(),
                current_catalog: DEFAULT_CATALOG.to_string(),
                current_database: DEFAULT_DATABASE.to_string(),
            }),
        }
    }

    /// Add a database, creating its catalog when missing
    ///
    /// The first database added to a new catalog becomes its default.
    pub fn with_database(mut self, catalog: &str, database: &str) -> Self {
        let state = self.state.get_mut();
        state
            .catalogs
            .entry(catalog.to_string())
            .or_insert_with(|| CatalogEntry::new(database))
            .databases
            .entry(database.to_string())
            .or_default();
        self
    }

    /// Store rows as a permanent table at `path`
    pub async fn register_table(
        &self,
        path: &QualifiedPath,
        schema: RowSchema,
        rows: Vec<EngineRow>,
    ) -> Result<Table> {
        let mut state = self.state.write().await;

        let objects = state
            .catalogs
            .get_mut(&path.catalog)
            .and_then(|entry| entry.databases.get_mut(&path.database))
            .ok_or_else(|| {
                remote(
                    "createTable",
                    format!("Database {}.{} does not exist", path.catalog, path.database),
                )
            })?;
        if objects.contains_key(&path.object) {
            return Err(remote(
                "createTable",
                format!("Table {} already exists", path),
            ));
        }

        let id = Uuid::new_v4();
        objects.insert(path.object.clone(), id);
        state.tables.insert(
            id,
            StoredTable {
                schema: schema.clone(),
                rows,
            },
        );
        Ok(Table { id, schema })
    }

    async fn read_batch_file(&self, path: &std::path::Path, schema: RowSchema) -> Result<Table> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            BridgeError::transport(format!("Failed to read batch file {}", path.display()), e)
        })?;
        let rows = codec::deserialize(bytes.as_slice(), &schema)?;

        let id = Uuid::new_v4();
        debug!("Read {} rows from {} into {}", rows.len(), path.display(), id);

        let mut state = self.state.write().await;
        state.tables.insert(
            id,
            StoredTable {
                schema: schema.clone(),
                rows,
            },
        );
        Ok(Table { id, schema })
    }
}

fn remote(operation: &str, message: impl Into<String>) -> BridgeError {
    BridgeError::Remote {
        operation: operation.to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl Channel for LoopbackChannel {
    async fn call(&self, request: Request) -> Result<Response> {
        let operation = request.operation();

        match request {
            Request::GetCurrentCatalog => {
                Ok(Response::Name(self.state.read().await.current_catalog.clone()))
            }
            Request::GetCurrentDatabase => {
                Ok(Response::Name(self.state.read().await.current_database.clone()))
            }
            Request::UseCatalog { name } => {
                let mut state = self.state.write().await;
                let default_database = state
                    .catalogs
                    .get(&name)
                    .map(|entry| entry.default_database.clone())
                    .ok_or_else(|| {
                        remote(operation, format!("Catalog {} does not exist", name))
                    })?;
                state.current_catalog = name;
                state.current_database = default_database;
                Ok(Response::Done)
            }
            Request::UseDatabase { name } => {
                let mut state = self.state.write().await;
                if !state.database_exists(&state.current_catalog, &name) {
                    return Err(remote(
                        operation,
                        format!(
                            "Database {} does not exist in catalog {}",
                            name, state.current_catalog
                        ),
                    ));
                }
                state.current_database = name;
                Ok(Response::Done)
            }
            Request::ListCatalogs => {
                let state = self.state.read().await;
                Ok(Response::Names(state.catalogs.keys().cloned().collect()))
            }
            Request::ListDatabases => {
                let state = self.state.read().await;
                let names = state
                    .catalogs
                    .get(&state.current_catalog)
                    .map(|entry| entry.databases.keys().cloned().collect())
                    .unwrap_or_default();
                Ok(Response::Names(names))
            }
            Request::ListTables => {
                // Permanent tables and temporary views of the current database
                let state = self.state.read().await;
                let mut names: Vec<String> = state
                    .catalogs
                    .get(&state.current_catalog)
                    .and_then(|entry| entry.databases.get(&state.current_database))
                    .map(|objects| objects.keys().cloned().collect())
                    .unwrap_or_default();
                names.extend(state.views_in_current_database().map(|p| p.object.clone()));
                names.sort();
                names.dedup();
                Ok(Response::Names(names))
            }
            Request::ListTemporaryViews => {
                let state = self.state.read().await;
                let mut names: Vec<String> = state
                    .views_in_current_database()
                    .map(|p| p.object.clone())
                    .collect();
                names.sort();
                Ok(Response::Names(names))
            }
            Request::LookupTable { path } => {
                let state = self.state.read().await;
                state
                    .lookup(&path)
                    .and_then(|id| state.table(id))
                    .map(Response::Table)
                    .ok_or_else(|| remote(operation, format!("Table {} was not found", path)))
            }
            Request::CreateTemporaryView { path, table_id } => {
                let mut state = self.state.write().await;
                if !state.tables.contains_key(&table_id) {
                    return Err(remote(operation, format!("Unknown table {}", table_id)));
                }
                if !state.database_exists(&path.catalog, &path.database) {
                    return Err(remote(
                        operation,
                        format!("Database {}.{} does not exist", path.catalog, path.database),
                    ));
                }
                if state.temporary_views.contains_key(&path) {
                    return Err(remote(
                        operation,
                        format!("Temporary view {} already exists", path),
                    ));
                }
                state.temporary_views.insert(path, table_id);
                Ok(Response::Done)
            }
            Request::DropTemporaryView { path } => {
                let mut state = self.state.write().await;
                Ok(Response::Dropped(
                    state.temporary_views.remove(&path).is_some(),
                ))
            }
            Request::ReadBatchFile { path, schema } => self
                .read_batch_file(&path, schema)
                .await
                .map(Response::Table),
            Request::CollectTable { id } => {
                let state = self.state.read().await;
                state
                    .tables
                    .get(&id)
                    .map(|stored| Response::Rows(stored.rows.clone()))
                    .ok_or_else(|| remote(operation, format!("Unknown table {}", id)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, RowField, Value};
    use tempfile::TempDir;

    fn schema() -> RowSchema {
        RowSchema::new(vec![RowField::new("id", DataType::int().not_null())]).unwrap()
    }

    async fn name(channel: &LoopbackChannel, request: Request) -> String {
        match channel.call(request).await.unwrap() {
            Response::Name(name) => name,
            other => panic!("Expected a name, got {:?}", other),
        }
    }

    async fn names(channel: &LoopbackChannel, request: Request) -> Vec<String> {
        match channel.call(request).await.unwrap() {
            Response::Names(names) => names,
            other => panic!("Expected names, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_use_catalog_resets_database() {
        let channel = LoopbackChannel::new()
            .with_database("warehouse", "sales")
            .with_database("warehouse", "archive");

        channel
            .call(Request::UseCatalog {
                name: "warehouse".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(name(&channel, Request::GetCurrentCatalog).await, "warehouse");
        assert_eq!(name(&channel, Request::GetCurrentDatabase).await, "sales");
        assert_eq!(
            names(&channel, Request::ListDatabases).await,
            vec!["archive", "sales"]
        );

        channel
            .call(Request::UseDatabase {
                name: "archive".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(name(&channel, Request::GetCurrentDatabase).await, "archive");

        channel
            .call(Request::UseCatalog {
                name: DEFAULT_CATALOG.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(
            name(&channel, Request::GetCurrentDatabase).await,
            DEFAULT_DATABASE
        );
    }

    #[tokio::test]
    async fn test_unknown_objects_are_remote_errors() {
        let channel = LoopbackChannel::new();

        let cases = [
            Request::UseCatalog {
                name: "missing".to_string(),
            },
            Request::UseDatabase {
                name: "missing".to_string(),
            },
            Request::LookupTable {
                path: QualifiedPath::new(DEFAULT_CATALOG, DEFAULT_DATABASE, "missing"),
            },
            Request::CollectTable { id: Uuid::new_v4() },
            Request::CreateTemporaryView {
                path: QualifiedPath::new(DEFAULT_CATALOG, DEFAULT_DATABASE, "v"),
                table_id: Uuid::new_v4(),
            },
        ];

        for request in cases {
            let operation = request.operation();
            let err = channel.call(request).await.unwrap_err();
            assert!(
                matches!(err, BridgeError::Remote { operation: ref op, .. } if op == operation),
                "Failed: {} - got {:?}",
                operation,
                err
            );
        }
    }

    #[tokio::test]
    async fn test_read_batch_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.tbrb");
        let rows = vec![
            Ok(EngineRow::new(vec![Value::Int(1)])),
            Ok(EngineRow::new(vec![Value::Int(2)])),
        ];
        let file = std::fs::File::create(&path).unwrap();
        codec::serialize(&schema(), rows, file).unwrap();

        let channel = LoopbackChannel::new();
        let table = match channel
            .call(Request::ReadBatchFile {
                path: path.clone(),
                schema: schema(),
            })
            .await
            .unwrap()
        {
            Response::Table(table) => table,
            other => panic!("Expected a table, got {:?}", other),
        };

        let rows = channel
            .call(Request::CollectTable { id: table.id })
            .await
            .unwrap();
        assert_eq!(
            rows,
            Response::Rows(vec![
                EngineRow::new(vec![Value::Int(1)]),
                EngineRow::new(vec![Value::Int(2)]),
            ])
        );
    }

    #[tokio::test]
    async fn test_missing_batch_file_is_transport_error() {
        let channel = LoopbackChannel::new();
        let err = channel
            .call(Request::ReadBatchFile {
                path: "/nonexistent/rows.tbrb".into(),
                schema: schema(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_tables_and_views_listing() {
        let channel = LoopbackChannel::new();
        let orders = QualifiedPath::new(DEFAULT_CATALOG, DEFAULT_DATABASE, "orders");
        let table = channel
            .register_table(&orders, schema(), Vec::new())
            .await
            .unwrap();

        assert!(channel
            .register_table(&orders, schema(), Vec::new())
            .await
            .is_err());

        channel
            .call(Request::CreateTemporaryView {
                path: QualifiedPath::new(DEFAULT_CATALOG, DEFAULT_DATABASE, "recent"),
                table_id: table.id,
            })
            .await
            .unwrap();

        assert_eq!(
            names(&channel, Request::ListTables).await,
            vec!["orders", "recent"]
        );
        assert_eq!(
            names(&channel, Request::ListTemporaryViews).await,
            vec!["recent"]
        );
        assert_eq!(
            names(&channel, Request::ListCatalogs).await,
            vec![DEFAULT_CATALOG]
        );
    }
}
