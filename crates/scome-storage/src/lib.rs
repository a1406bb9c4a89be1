use rusqlite::Connection;
use scome_core::{FlagError, StoreError};
use thiserror::Error;

mod documents;
mod flags;

pub use documents::SqliteDocumentStore;
pub use flags::{DeviceFlagStore, SessionFlagStore};

pub const DEVICE_SCHEMA_VERSION: i64 = 1;
pub const DOCUMENT_SCHEMA_VERSION: i64 = 2;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
    #[error("connection lock poisoned")]
    Poisoned,
}

impl From<StorageError> for FlagError {
    fn from(err: StorageError) -> Self {
        FlagError::Unavailable(err.to_string())
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Poisoned => StoreError::Unavailable(err.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

fn schema_version(conn: &Connection) -> Result<i64, StorageError> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Applies `migrations[n]` to move the schema from version `n` to `n + 1`.
fn migrate(conn: &Connection, migrations: &[&str]) -> Result<(), StorageError> {
    let supported = migrations.len() as i64;
    let current = schema_version(conn)?;
    if current > supported {
        return Err(StorageError::UnsupportedSchemaVersion {
            found: current,
            supported,
        });
    }

    for (index, sql) in migrations.iter().enumerate().skip(current.max(0) as usize) {
        let next = index as i64 + 1;
        conn.execute_batch(sql)?;
        conn.execute_batch(&format!("PRAGMA user_version = {next}"))?;
    }

    Ok(())
}
