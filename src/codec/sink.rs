use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use super::BatchWriter;
use crate::config::BATCH_FILE_NAME;
use crate::error::{BridgeError, Result};
use crate::schema::{EngineRow, RowSchema};

/// Scoped temporary batch file
///
/// Each instance owns a fresh temporary directory; the batch file inside it
/// is created on the first write. Dropping the guard removes the directory
/// and the file on every exit path, including early returns on error.
pub struct TempBatchFile {
    dir: TempDir,
    path: PathBuf,
}

impl TempBatchFile {
    /// Create the scoped directory, under `root` when given
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("table-bridge-");

        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| BridgeError::transport("Failed to create temporary batch directory", e))?;

        let path = dir.path().join(BATCH_FILE_NAME);
        debug!("Created batch directory {}", dir.path().display());

        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode `rows` into the batch file and return the number written
    ///
    /// The file is fully written and synced before this returns; on failure
    /// its partial contents stay inside the scoped directory until the
    /// guard is dropped.
    pub fn write_rows<I>(&self, schema: &RowSchema, rows: I, batch_size: usize) -> Result<u64>
    where
        I: IntoIterator<Item = Result<EngineRow>>,
    {
        let file = File::create(&self.path).map_err(|e| {
            BridgeError::transport(
                format!("Failed to create batch file {}", self.path.display()),
                e,
            )
        })?;

        let mut writer = BatchWriter::new(BufWriter::new(file), schema, batch_size)?;
        for row in rows {
            writer.write_row(&row?)?;
        }
        let (mut buffered, count) = writer.finish()?;

        buffered
            .flush()
            .map_err(|e| BridgeError::transport("Failed to flush batch file", e))?;
        let file = buffered
            .into_inner()
            .map_err(|e| BridgeError::transport("Failed to flush batch file", e.into_error()))?;
        file.sync_all()
            .map_err(|e| BridgeError::transport("Failed to sync batch file", e))?;

        debug!("Wrote {} rows to {}", count, self.path.display());
        Ok(count)
    }
}

impl Drop for TempBatchFile {
    fn drop(&mut self) {
        // The directory itself is removed by TempDir's own drop
        if self.path.exists()
            && let Err(e) = std::fs::remove_file(&self.path)
        {
            warn!("Failed to remove batch file {}: {}", self.path.display(), e);
        }
        debug!("Removing batch directory {}", self.dir.path().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::deserialize;
    use crate::schema::{DataType, RowField, Value};

    fn schema() -> RowSchema {
        RowSchema::new(vec![RowField::new("n", DataType::bigint())]).unwrap()
    }

    #[test]
    fn test_file_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let sink = TempBatchFile::create(Some(root.path())).unwrap();
        let rows = (0..10).map(|i| Ok(EngineRow::new(vec![Value::Long(i)])));

        assert_eq!(sink.write_rows(&schema(), rows, 3).unwrap(), 10);
        let path = sink.path().to_path_buf();
        let decoded = deserialize(File::open(&path).unwrap(), &schema()).unwrap();
        assert_eq!(decoded.len(), 10);

        drop(sink);
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_file_removed_after_failure() {
        let root = TempDir::new().unwrap();
        let path = {
            let sink = TempBatchFile::create(Some(root.path())).unwrap();
            let rows = vec![
                Ok(EngineRow::new(vec![Value::Long(1)])),
                Err(BridgeError::Validation {
                    record: 1,
                    field: "n".to_string(),
                    expected: "BIGINT".to_string(),
                    actual: "STRING".to_string(),
                }),
            ];
            assert!(sink.write_rows(&schema(), rows, 1).is_err());
            assert!(sink.path().exists());
            sink.path().to_path_buf()
        };

        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_each_sink_is_fresh() {
        let a = TempBatchFile::create(None).unwrap();
        let b = TempBatchFile::create(None).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
