use std::path::PathBuf;
use std::sync::Arc;

use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use derive_builder::Builder;
use tracing::{debug, info};

use super::{Channel, Request, Response, Table};
use crate::catalog::{QualifiedPath, resolve};
use crate::codec::TempBatchFile;
use crate::config::BATCH_SIZE;
use crate::error::{BridgeError, Result};
use crate::formats::frame::{FrameHint, record_batch_to_records, row_schema_from_arrow};
use crate::schema::{EngineRow, RawRecord, RecordConverter, SchemaHint, converter_for};

/// Options of a table environment
#[derive(Debug, Clone, Builder)]
pub struct EnvironmentSettings {
    /// Rows per frame of the batch files handed to the engine
    #[builder(default = "BATCH_SIZE")]
    batch_size: usize,
    /// Directory the scoped batch directories are created in; the system
    /// temporary directory when unset
    #[builder(setter(into, strip_option), default)]
    temp_root: Option<PathBuf>,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            temp_root: None,
        }
    }
}

impl EnvironmentSettings {
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn temp_root(&self) -> Option<&PathBuf> {
        self.temp_root.as_ref()
    }
}

/// Session wrapper around an engine channel
///
/// Every call is forwarded; the environment keeps no session state of its
/// own, so relative paths are always resolved against what the engine
/// reports as current.
pub struct TableEnvironment {
    channel: Arc<dyn Channel>,
    settings: EnvironmentSettings,
}

impl TableEnvironment {
    pub fn create(channel: Arc<dyn Channel>, settings: EnvironmentSettings) -> Self {
        Self { channel, settings }
    }

    pub fn settings(&self) -> &EnvironmentSettings {
        &self.settings
    }

    async fn call(&self, request: Request) -> Result<Response> {
        debug!("Forwarding {}", request.operation());
        self.channel.call(request).await
    }

    async fn call_for_name(&self, request: Request) -> Result<String> {
        let operation = request.operation();
        match self.call(request).await? {
            Response::Name(name) => Ok(name),
            other => Err(unexpected(operation, &other)),
        }
    }

    async fn call_for_names(&self, request: Request) -> Result<Vec<String>> {
        let operation = request.operation();
        match self.call(request).await? {
            Response::Names(names) => Ok(names),
            other => Err(unexpected(operation, &other)),
        }
    }

    async fn call_for_table(&self, request: Request) -> Result<Table> {
        let operation = request.operation();
        match self.call(request).await? {
            Response::Table(table) => Ok(table),
            other => Err(unexpected(operation, &other)),
        }
    }

    async fn call_for_done(&self, request: Request) -> Result<()> {
        let operation = request.operation();
        match self.call(request).await? {
            Response::Done => Ok(()),
            other => Err(unexpected(operation, &other)),
        }
    }

    pub async fn get_current_catalog(&self) -> Result<String> {
        self.call_for_name(Request::GetCurrentCatalog).await
    }

    /// Switch catalogs; the engine also resets the current database to the
    /// new catalog's default
    pub async fn use_catalog(&self, name: &str) -> Result<()> {
        self.call_for_done(Request::UseCatalog {
            name: name.to_string(),
        })
        .await
    }

    pub async fn get_current_database(&self) -> Result<String> {
        self.call_for_name(Request::GetCurrentDatabase).await
    }

    pub async fn use_database(&self, name: &str) -> Result<()> {
        self.call_for_done(Request::UseDatabase {
            name: name.to_string(),
        })
        .await
    }

    pub async fn list_catalogs(&self) -> Result<Vec<String>> {
        self.call_for_names(Request::ListCatalogs).await
    }

    pub async fn list_databases(&self) -> Result<Vec<String>> {
        self.call_for_names(Request::ListDatabases).await
    }

    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.call_for_names(Request::ListTables).await
    }

    pub async fn list_temporary_views(&self) -> Result<Vec<String>> {
        self.call_for_names(Request::ListTemporaryViews).await
    }

    /// Resolve `path` against the session's current catalog and database
    pub async fn resolve_path(&self, path: &str) -> Result<QualifiedPath> {
        let catalog = self.get_current_catalog().await?;
        let database = self.get_current_database().await?;
        resolve(path, &catalog, &database)
    }

    /// Look up a table or view registered at `path`
    pub async fn from_path(&self, path: &str) -> Result<Table> {
        let path = self.resolve_path(path).await?;
        self.call_for_table(Request::LookupTable { path }).await
    }

    pub async fn create_temporary_view(&self, path: &str, table: &Table) -> Result<QualifiedPath> {
        let path = self.resolve_path(path).await?;
        self.call_for_done(Request::CreateTemporaryView {
            path: path.clone(),
            table_id: table.id,
        })
        .await?;
        info!("Registered temporary view {}", path);
        Ok(path)
    }

    /// Drop a temporary view, returning whether one was registered
    pub async fn drop_temporary_view(&self, path: &str) -> Result<bool> {
        let path = self.resolve_path(path).await?;
        let request = Request::DropTemporaryView { path };
        let operation = request.operation();
        match self.call(request).await? {
            Response::Dropped(dropped) => Ok(dropped),
            other => Err(unexpected(operation, &other)),
        }
    }

    /// Fetch every row of a table
    pub async fn collect(&self, table: &Table) -> Result<Vec<EngineRow>> {
        let request = Request::CollectTable { id: table.id };
        let operation = request.operation();
        match self.call(request).await? {
            Response::Rows(rows) => Ok(rows),
            other => Err(unexpected(operation, &other)),
        }
    }

    /// Create a table from in-memory records
    ///
    /// The schema is inferred (or taken from `hint`), the records are
    /// converted and encoded into a scoped temporary batch file, and the
    /// engine is asked to read it. The file is deleted before this returns,
    /// whether the engine accepted it or not.
    pub async fn from_elements(
        &self,
        records: &[RawRecord],
        hint: Option<&SchemaHint>,
        verify_schema: bool,
    ) -> Result<Table> {
        let converter = converter_for(records, hint, verify_schema)?;
        info!(
            "Creating table from {} elements with schema {}",
            records.len(),
            converter.schema()
        );
        self.load_rows(&converter, records).await
    }

    /// Create a table from Arrow record batches
    ///
    /// The schema comes from the Arrow schema, adjusted by `hint` when
    /// given, and every row is verified against it.
    pub async fn from_record_batches(
        &self,
        arrow_schema: &Schema,
        batches: &[RecordBatch],
        hint: Option<&FrameHint>,
    ) -> Result<Table> {
        let mapped = row_schema_from_arrow(arrow_schema)?;
        let schema = match hint {
            Some(hint) => hint.apply(mapped)?,
            None => mapped,
        };

        let mut records = Vec::new();
        for batch in batches {
            records.extend(record_batch_to_records(batch, records.len())?);
        }

        info!(
            "Creating table from {} batches ({} rows) with schema {}",
            batches.len(),
            records.len(),
            schema
        );

        let converter = RecordConverter::new(schema).with_verification(true);
        self.load_rows(&converter, &records).await
    }

    async fn load_rows(&self, converter: &RecordConverter, records: &[RawRecord]) -> Result<Table> {
        let batch = TempBatchFile::create(self.settings.temp_root.as_deref())?;
        let rows_written = batch.write_rows(
            converter.schema(),
            converter.convert_all(records),
            self.settings.batch_size,
        )?;

        let table = self
            .call_for_table(Request::ReadBatchFile {
                path: batch.path().to_path_buf(),
                schema: converter.schema().clone(),
            })
            .await?;

        info!("Engine read {} rows into {}", rows_written, table.id);
        drop(batch);
        Ok(table)
    }
}

fn unexpected(operation: &str, response: &Response) -> BridgeError {
    BridgeError::UnexpectedResponse {
        operation: operation.to_string(),
        response: response.kind_name().to_string(),
    }
}
