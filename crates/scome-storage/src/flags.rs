use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use scome_core::{FlagError, FlagStore};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::{migrate, StorageError, DEVICE_SCHEMA_VERSION};

const DEVICE_MIGRATIONS: [&str; DEVICE_SCHEMA_VERSION as usize] =
    [include_str!("../migrations/0001_device_flags.sql")];

/// Durable flags for one device profile, backed by a SQLite file.
pub struct DeviceFlagStore {
    conn: Mutex<Connection>,
}

impl DeviceFlagStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        migrate(&conn, &DEVICE_MIGRATIONS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    pub fn read(&self, key: &str) -> Result<Option<bool>, StorageError> {
        let conn = self.conn()?;
        let value: Option<i64> = conn
            .query_row(
                "SELECT value FROM device_flags WHERE name = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map(|value| value != 0))
    }

    pub fn write(&self, key: &str, value: bool) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "
            INSERT INTO device_flags (name, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                value=excluded.value,
                updated_at=excluded.updated_at
            ",
            params![key, i64::from(value), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let changes = conn.execute("DELETE FROM device_flags WHERE name = ?1", [key])?;
        Ok(changes > 0)
    }
}

impl FlagStore for DeviceFlagStore {
    fn get(&self, key: &str) -> Result<Option<bool>, FlagError> {
        Ok(self.read(key)?)
    }

    fn set(&self, key: &str, value: bool) -> Result<(), FlagError> {
        self.write(key, value).map_err(|err| FlagError::Write {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }

    fn clear(&self, key: &str) -> Result<(), FlagError> {
        self.remove(key)?;
        Ok(())
    }
}

/// Flags that live only as long as the process.
#[derive(Debug, Default)]
pub struct SessionFlagStore {
    values: Mutex<BTreeMap<String, bool>>,
}

impl SessionFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> Result<MutexGuard<'_, BTreeMap<String, bool>>, FlagError> {
        self.values
            .lock()
            .map_err(|_| FlagError::Unavailable("session flag lock poisoned".to_string()))
    }
}

impl FlagStore for SessionFlagStore {
    fn get(&self, key: &str) -> Result<Option<bool>, FlagError> {
        Ok(self.values()?.get(key).copied())
    }

    fn set(&self, key: &str, value: bool) -> Result<(), FlagError> {
        self.values()?.insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), FlagError> {
        self.values()?.remove(key);
        Ok(())
    }
}
