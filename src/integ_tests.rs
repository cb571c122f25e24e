//! Integration tests for file loading through the table environment
//!
//! These tests write real CSV, JSON lines and Parquet files and load them
//! into the in-process engine end to end.

#[cfg(test)]
mod tests {
    use crate::{
        error::BridgeError,
        formats::Format,
        gateway::{EnvironmentSettingsBuilder, LoopbackChannel, TableEnvironment},
        runner::{LoadArgs, inspect_batch_file, load_into, run_load},
        schema::{DataType, Value},
    };
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType as ArrowType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::fs::File;
    use tokio::io::AsyncWriteExt;

    // ============ Test Helpers ============

    /// Helper to create a file with the given lines
    async fn create_file(dir: &TempDir, filename: &str, content: &[&str]) -> PathBuf {
        let path = dir.path().join(filename);
        let mut file = File::create(&path).await.unwrap();
        for line in content {
            file.write_all(line.as_bytes()).await.unwrap();
        }
        file.flush().await.unwrap();
        path
    }

    /// Helper to create a Parquet file with id,name columns
    fn create_parquet(dir: &TempDir, filename: &str, num_rows: usize) -> PathBuf {
        let path = dir.path().join(filename);
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", ArrowType::Int64, false),
            Field::new("name", ArrowType::Utf8, true),
        ]));

        let ids: Vec<i64> = (0..num_rows as i64).collect();
        let names: Vec<Option<String>> = (0..num_rows)
            .map(|i| (i % 3 != 0).then(|| format!("name_{}", i)))
            .collect();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(StringArray::from(names)),
            ],
        )
        .unwrap();

        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        path
    }

    fn bridge_error(err: &anyhow::Error) -> &BridgeError {
        err.downcast_ref::<BridgeError>()
            .unwrap_or_else(|| panic!("Expected a bridge error, got {:#}", err))
    }

    // ============ Delimited Files ============

    #[tokio::test]
    async fn test_csv_load_infers_widened_types() {
        let dir = TempDir::new().unwrap();
        let path = create_file(
            &dir,
            "people.csv",
            &[
                "id,name,score,joined\n",
                "1,Alice,9.5,2024-01-02\n",
                "2,,7,2024-03-04\n",
                "3,Carol,8.25,2024-05-06\n",
            ],
        )
        .await;

        let result = run_load(LoadArgs::new(&path)).await.unwrap();

        assert_eq!(result.rows_loaded, 3);
        assert_eq!(
            result.schema.field_names(),
            vec!["id", "name", "score", "joined"]
        );
        assert_eq!(
            result.schema.field_types(),
            vec![
                &DataType::int().not_null(),
                &DataType::string(),
                &DataType::double().not_null(),
                &DataType::date().not_null(),
            ]
        );
        assert!(result.view.is_none());
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn test_headerless_tsv_with_names() {
        let dir = TempDir::new().unwrap();
        let path = create_file(&dir, "points.tsv", &["1\t2.5\n", "3\t4.5\n"]).await;

        let mut args = LoadArgs::new(&path);
        args.has_header = false;
        args.names = Some(vec!["x".to_string(), "y".to_string()]);

        let result = run_load(args).await.unwrap();

        assert_eq!(result.schema.field_names(), vec!["x", "y"]);
        assert_eq!(result.rows_loaded, 2);
    }

    #[tokio::test]
    async fn test_csv_output_batch_file() {
        let dir = TempDir::new().unwrap();
        let path = create_file(&dir, "data.csv", &["a,b\n", "1,x\n", "2,y\n"]).await;
        let output = dir.path().join("data.tbrb");

        let mut args = LoadArgs::new(&path);
        args.output = Some(output.clone());
        let result = run_load(args).await.unwrap();

        let (schema, rows) = inspect_batch_file(&output).unwrap();
        assert_eq!(schema, result.schema);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1].values,
            vec![Value::Int(2), Value::String("y".to_string())]
        );
    }

    #[tokio::test]
    async fn test_incompatible_column_fails() {
        let dir = TempDir::new().unwrap();
        let path = create_file(&dir, "bad.csv", &["a\n", "1\n", "hello\n"]).await;

        let err = run_load(LoadArgs::new(&path)).await.unwrap_err();

        assert!(matches!(bridge_error(&err), BridgeError::Schema(_)));
    }

    // ============ JSON Lines ============

    #[tokio::test]
    async fn test_json_lines_nested_records() {
        let dir = TempDir::new().unwrap();
        let path = create_file(
            &dir,
            "events.jsonl",
            &[
                "{\"id\": 1, \"tags\": [\"a\"], \"address\": {\"city\": \"Oslo\"}}\n",
                "\n",
                "{\"id\": 5000000000, \"tags\": [], \"address\": {\"city\": null}}\n",
            ],
        )
        .await;

        let result = run_load(LoadArgs::new(&path)).await.unwrap();

        assert_eq!(result.rows_loaded, 2);
        assert_eq!(result.schema.field_names(), vec!["address", "id", "tags"]);
        assert_eq!(
            result.schema.fields()[1].data_type,
            DataType::bigint().not_null()
        );
        assert_eq!(
            result.schema.fields()[2].data_type,
            DataType::array(DataType::string().not_null()).not_null()
        );
        assert!(result.schema.fields()[0].data_type.is_row());
    }

    #[tokio::test]
    async fn test_json_heterogeneous_arity_fails() {
        let dir = TempDir::new().unwrap();
        let path = create_file(&dir, "ragged.json", &["[1, 2]\n", "[3]\n"]).await;

        let err = run_load(LoadArgs::new(&path)).await.unwrap_err();

        assert!(matches!(bridge_error(&err), BridgeError::Schema(_)));
    }

    // ============ Parquet ============

    #[tokio::test]
    async fn test_parquet_load_with_renamed_fields() {
        let dir = TempDir::new().unwrap();
        let path = create_parquet(&dir, "people.parquet", 2500);
        let output = dir.path().join("people.tbrb");

        let mut args = LoadArgs::new(&path);
        args.names = Some(vec!["key".to_string(), "label".to_string()]);
        args.output = Some(output.clone());

        let result = run_load(args).await.unwrap();

        assert_eq!(result.rows_loaded, 2500);
        assert_eq!(result.schema.field_names(), vec!["key", "label"]);
        assert_eq!(
            result.schema.fields()[0].data_type,
            DataType::bigint().not_null()
        );

        let (_, rows) = inspect_batch_file(&output).unwrap();
        assert_eq!(rows.len(), 2500);
        assert_eq!(rows[0].values, vec![Value::Long(0), Value::Null]);
        assert_eq!(
            rows[1].values,
            vec![Value::Long(1), Value::String("name_1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_parquet_name_count_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = create_parquet(&dir, "people.parquet", 3);

        let mut args = LoadArgs::new(&path);
        args.names = Some(vec!["only_one".to_string()]);

        let err = run_load(args).await.unwrap_err();

        assert!(matches!(bridge_error(&err), BridgeError::Schema(_)));
    }

    // ============ Sessions and Views ============

    #[tokio::test]
    async fn test_view_in_switched_catalog() {
        let dir = TempDir::new().unwrap();
        let path = create_file(&dir, "events.csv", &["id\n", "1\n"]).await;

        let mut args = LoadArgs::new(&path);
        args.catalog = Some("lake".to_string());
        args.database = Some("raw".to_string());
        args.view = Some("events".to_string());

        let result = run_load(args).await.unwrap();

        assert_eq!(result.view.unwrap().to_string(), "lake.raw.events");
    }

    #[tokio::test]
    async fn test_load_into_shared_environment() {
        let dir = TempDir::new().unwrap();
        let batch_root = TempDir::new().unwrap();
        let path = create_file(&dir, "people.csv", &["id,name\n", "1,Alice\n"]).await;

        let settings = EnvironmentSettingsBuilder::default()
            .temp_root(batch_root.path())
            .build()
            .unwrap();
        let env = TableEnvironment::create(Arc::new(LoopbackChannel::new()), settings);

        let mut args = LoadArgs::new(&path);
        args.format = Some(Format::Csv);
        args.view = Some("`people`".to_string());
        let result = load_into(&env, &args).await.unwrap();

        let table = env.from_path("people").await.unwrap();
        assert_eq!(table.id, result.table_id);
        assert_eq!(env.list_tables().await.unwrap(), vec!["people"]);
        assert_eq!(
            std::fs::read_dir(batch_root.path()).unwrap().count(),
            0,
            "Batch directories should be removed after loading"
        );
    }

    #[tokio::test]
    async fn test_undetectable_format() {
        let dir = TempDir::new().unwrap();
        let path = create_file(&dir, "data.txt", &["a\n"]).await;

        let err = run_load(LoadArgs::new(&path)).await.unwrap_err();

        assert!(err.to_string().contains("Could not detect format"));
    }
}
