//! Durable per-device adapter: one JSON file per record.
//!
//! Layout: `{root}/{table}/{id}.json`, with table and id percent-encoded so
//! any string is a safe file name. Dots are escaped too, so no component can
//! be `.` or `..`. A table that was never written has no directory and lists
//! as empty.

use super::assign_id;
use crate::{error::Result, Error, Fields, Query, Record, RecordId, Schema, TableInterface};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const EXTENSION: &str = "json";

/// File-backed [`TableInterface`].
#[derive(Debug)]
pub struct FileAdapter {
    root: PathBuf,
    schema: Option<Schema>,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

fn encode_component(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('.', "%2E")
}

#[cfg(test)]
fn decode_component(encoded: &str) -> String {
    url::form_urlencoded::parse(format!("k={encoded}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

impl FileAdapter {
    /// Store tables under `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            schema: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Validate writes against a schema.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, table: &str) -> Result<PathBuf> {
        if table.is_empty() {
            return Err(Error::InvalidPayload("table name must not be empty".into()));
        }
        Ok(self.root.join(encode_component(table)))
    }

    fn record_path(&self, table: &str, id: &str) -> Result<PathBuf> {
        Ok(self
            .table_dir(table)?
            .join(format!("{}.{EXTENSION}", encode_component(id))))
    }

    async fn read_record(&self, table: &str, id: &str) -> Result<Record> {
        let path = self.record_path(table, id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::not_found(table, id)),
            Err(e) => return Err(e.into()),
        };
        parse_record(&path, &bytes)
    }

    async fn write_record(&self, table: &str, record: &Record) -> Result<()> {
        let dir = self.table_dir(table)?;
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.record_path(table, &record.id)?;
        let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let bytes = serde_json::to_vec_pretty(&record.to_value())
            .map_err(|e| Error::InvalidPayload(e.to_string()))?;

        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn parse_record(path: &Path, bytes: &[u8]) -> Result<Record> {
    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| {
        Error::Transport(format!("corrupt record file {}: {e}", path.display()))
    })?;
    Record::from_value(value)
}

#[async_trait]
impl TableInterface for FileAdapter {
    async fn find(&self, table: &str, id: &str) -> Result<Record> {
        self.read_record(table, id).await
    }

    async fn create(&self, table: &str, data: Fields) -> Result<Record> {
        if let Some(schema) = &self.schema {
            schema.validate_create(table, &data)?;
        }
        let id = assign_id(&data)?;

        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(self.record_path(table, &id)?).await? {
            return Err(Error::AlreadyExists {
                table: table.to_string(),
                id,
            });
        }

        let record = Record::new(id, data);
        self.write_record(table, &record).await?;
        tracing::trace!(table, id = %record.id, "file: created record");
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, data: Fields) -> Result<Record> {
        if let Some(schema) = &self.schema {
            schema.validate_patch(table, &data)?;
        }

        let _guard = self.write_lock.lock().await;
        let mut record = self.read_record(table, id).await?;
        record.merge(&data);
        self.write_record(table, &record).await?;
        Ok(record)
    }

    async fn remove(&self, table: &str, id: &str) -> Result<Record> {
        let _guard = self.write_lock.lock().await;
        let record = self.read_record(table, id).await?;
        tokio::fs::remove_file(self.record_path(table, id)?).await?;
        Ok(record)
    }

    async fn list(&self, table: &str, query: &Query) -> Result<Vec<Record>> {
        let mut entries = match tokio::fs::read_dir(self.table_dir(table)?).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records: BTreeMap<RecordId, Record> = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // Removed between read_dir and read.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let record = parse_record(&path, &bytes)?;
            records.insert(record.id.clone(), record);
        }

        Ok(query.apply(records.into_values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn component_encoding_roundtrip() {
        for raw in ["plain", "a/b", "..", ".", "a.b", "with space", "ünï", "%2E"] {
            let encoded = encode_component(raw);
            assert!(!encoded.contains('/'));
            assert!(!encoded.contains('.'));
            assert_eq!(decode_component(&encoded), raw);
        }
    }

    #[tokio::test]
    async fn one_file_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FileAdapter::new(dir.path());

        adapter
            .create("todos", fields(json!({"id": "a/1", "text": "x"})))
            .await
            .unwrap();
        adapter
            .create("todos", fields(json!({"id": "b", "text": "y"})))
            .await
            .unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path().join("todos"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a%2F1.json", "b.json"]);
    }

    #[tokio::test]
    async fn dot_tables_stay_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        let adapter = FileAdapter::new(&root);

        for table in ["..", "."] {
            adapter
                .create(table, fields(json!({"id": "escaped", "text": table})))
                .await
                .unwrap();
            assert_eq!(adapter.find(table, "escaped").await.unwrap().fields["text"], json!(table));
        }
        assert!(!dir.path().join("escaped.json").exists());
        assert!(!root.join("escaped.json").exists());
        assert!(root.join("%2E%2E").join("escaped.json").exists());
        assert!(root.join("%2E").join("escaped.json").exists());

        assert_eq!(adapter.list("..", &Query::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_table_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FileAdapter::new(dir.path());
        let err = adapter
            .create("", fields(json!({"id": "a"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(adapter.list("", &Query::new()).await.is_err());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let created = FileAdapter::new(dir.path())
            .create("todos", fields(json!({"text": "persist me"})))
            .await
            .unwrap();

        let reopened = FileAdapter::new(dir.path());
        assert_eq!(reopened.find("todos", &created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn empty_table_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FileAdapter::new(dir.path().join("not-yet-created"));
        assert!(adapter.list("todos", &Query::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FileAdapter::new(dir.path());
        adapter
            .create("todos", fields(json!({"id": "a", "text": "x", "completed": false})))
            .await
            .unwrap();

        let updated = adapter
            .update("todos", "a", fields(json!({"completed": true})))
            .await
            .unwrap();
        assert_eq!(updated.fields["completed"], json!(true));
        assert_eq!(adapter.find("todos", "a").await.unwrap(), updated);

        let removed = adapter.remove("todos", "a").await.unwrap();
        assert_eq!(removed, updated);
        assert!(adapter.find("todos", "a").await.unwrap_err().is_not_found());
        assert!(adapter.list("todos", &Query::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_transport_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("todos")).unwrap();
        std::fs::write(dir.path().join("todos").join("bad.json"), b"{not json").unwrap();

        let adapter = FileAdapter::new(dir.path());
        let err = adapter.find("todos", "bad").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }
}
