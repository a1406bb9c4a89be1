use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use scome_core::{
    CollectionPath, Document, DocumentStore, FieldValue, RecordId, StoreError, StoredDocument,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::{migrate, StorageError, DOCUMENT_SCHEMA_VERSION};

const DOCUMENT_MIGRATIONS: [&str; DOCUMENT_SCHEMA_VERSION as usize] = [
    include_str!("../migrations/0001_documents.sql"),
    include_str!("../migrations/0002_documents_no_delete.sql"),
];

/// Local stand-in for the hosted append-only document store.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        migrate(&conn, &DOCUMENT_MIGRATIONS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Appends `document`, resolving server timestamps to `now`.
    pub fn append_at(
        &self,
        collection: &CollectionPath,
        document: Document,
        now: DateTime<Utc>,
    ) -> Result<RecordId, StorageError> {
        let resolved = document.resolve_server_timestamps(now);
        let fields_json = serde_json::to_string(&resolved.fields)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let record_id = RecordId(Uuid::new_v4().simple().to_string());

        let conn = self.conn()?;
        conn.execute(
            "
            INSERT INTO documents (record_id, collection_path, fields_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                record_id.as_str(),
                collection.to_string(),
                fields_json,
                now.to_rfc3339(),
            ],
        )?;
        debug!(event = "document_appended", collection = %collection, record_id = %record_id);
        Ok(record_id)
    }

    pub fn documents(&self, collection: &CollectionPath) -> Result<Vec<StoredDocument>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "
            SELECT record_id, fields_json
            FROM documents
            WHERE collection_path = ?1
            ORDER BY seq ASC
            ",
        )?;
        let rows = stmt.query_map([collection.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (record_id, fields_json) = row?;
            let fields: BTreeMap<String, FieldValue> = serde_json::from_str(&fields_json)
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            documents.push(StoredDocument {
                id: RecordId(record_id),
                fields,
            });
        }
        Ok(documents)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn append(
        &self,
        collection: &CollectionPath,
        document: Document,
    ) -> Result<RecordId, StoreError> {
        Ok(self.append_at(collection, document, Utc::now())?)
    }

    async fn query_all(
        &self,
        collection: &CollectionPath,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        Ok(self.documents(collection)?)
    }
}
