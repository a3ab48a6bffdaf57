//! `SQLite`-backed configuration store.

use std::collections::BTreeSet;

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::{ConfigValue, SEPARATOR, is_valid_key};
use crate::{Error, Result};

const UPSERT: &str = r"
    INSERT INTO config (key, value) VALUES (?, ?)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = CURRENT_TIMESTAMP
";

/// Persistent hierarchical key/value store.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
}

impl ConfigStore {
    /// Open (or create) the store at the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is illegal, the query fails or the stored
    /// value cannot be decoded.
    pub async fn get(&self, key: &str) -> Result<Option<ConfigValue>> {
        check_key(key)?;
        let row = sqlx::query("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let raw: String = row.get("value");
            serde_json::from_str(&raw).map_err(Error::from)
        })
        .transpose()
    }

    /// Get a string value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the key holds another type.
    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key).await? {
            None => Ok(None),
            Some(ConfigValue::String(s)) => Ok(Some(s)),
            Some(_) => Err(mismatch(key, "string")),
        }
    }

    /// Get an integer value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the key holds another type.
    pub async fn get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key).await? {
            None => Ok(None),
            Some(ConfigValue::Int(i)) => Ok(Some(i)),
            Some(_) => Err(mismatch(key, "int")),
        }
    }

    /// Get a boolean value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the key holds another type.
    pub async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key).await? {
            None => Ok(None),
            Some(ConfigValue::Bool(b)) => Ok(Some(b)),
            Some(_) => Err(mismatch(key, "bool")),
        }
    }

    /// Get a string list value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the key holds another type.
    pub async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.get(key).await? {
            None => Ok(None),
            Some(ConfigValue::List(l)) => Ok(Some(l)),
            Some(_) => Err(mismatch(key, "list")),
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is illegal or the query fails.
    pub async fn set(&self, key: &str, value: impl Into<ConfigValue>) -> Result<()> {
        check_key(key)?;
        let raw = serde_json::to_string(&value.into())?;
        sqlx::query(UPSERT)
            .bind(key)
            .bind(raw)
            .execute(&self.pool)
            .await?;

        debug!("Set {key}");
        Ok(())
    }

    /// Store several values at once.
    ///
    /// Either every value is written or none is.
    ///
    /// # Errors
    ///
    /// Returns an error if any key is illegal or the transaction fails.
    pub async fn set_many(&self, entries: &[(String, ConfigValue)]) -> Result<()> {
        for (key, _) in entries {
            check_key(key)?;
        }

        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(UPSERT)
                .bind(key)
                .bind(serde_json::to_string(value)?)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!("Set {} keys", entries.len());
        Ok(())
    }

    /// Store a string value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is illegal or the query fails.
    pub async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set(key, value).await
    }

    /// Store an integer value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is illegal or the query fails.
    pub async fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.set(key, value).await
    }

    /// Store a boolean value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is illegal or the query fails.
    pub async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, value).await
    }

    /// Store a string list value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is illegal or the query fails.
    pub async fn set_list(&self, key: &str, value: Vec<String>) -> Result<()> {
        self.set(key, value).await
    }

    /// Remove `key` and every key below it.
    ///
    /// Returns the number of removed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is illegal or the query fails.
    pub async fn remove(&self, key: &str) -> Result<u64> {
        check_key(key)?;
        let prefix = dir_prefix(key);
        let result = sqlx::query(
            "DELETE FROM config WHERE key = ? OR substr(key, 1, length(?)) = ?",
        )
        .bind(key)
        .bind(&prefix)
        .bind(&prefix)
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        debug!("Removed {key} ({removed} entries)");
        Ok(removed)
    }

    /// Whether `key` holds a value or has keys below it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is illegal or the query fails.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let prefix = dir_prefix(key);
        let row = sqlx::query(
            r"
            SELECT COUNT(*) as count FROM config
            WHERE key = ? OR substr(key, 1, length(?)) = ?
            ",
        )
        .bind(key)
        .bind(&prefix)
        .bind(&prefix)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    /// Names of the directories directly below `dir`, sorted.
    ///
    /// A directory is a segment that has at least one key below it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is illegal or the query fails.
    pub async fn list_subdirs(&self, dir: &str) -> Result<Vec<String>> {
        check_key(dir)?;
        let prefix = dir_prefix(dir);
        let rows = sqlx::query("SELECT key FROM config WHERE substr(key, 1, length(?)) = ?")
            .bind(&prefix)
            .bind(&prefix)
            .fetch_all(&self.pool)
            .await?;

        let dirs: BTreeSet<String> = rows
            .iter()
            .filter_map(|row| {
                let key: String = row.get("key");
                let rest = key.strip_prefix(&prefix)?;
                let (child, _) = rest.split_once(SEPARATOR)?;
                Some(child.to_string())
            })
            .collect();
        Ok(dirs.into_iter().collect())
    }

    /// Keys holding values directly below `dir`, as relative names, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is illegal or the query fails.
    pub async fn list_entries(&self, dir: &str) -> Result<Vec<String>> {
        check_key(dir)?;
        let prefix = dir_prefix(dir);
        let rows = sqlx::query(
            "SELECT key FROM config WHERE substr(key, 1, length(?)) = ? ORDER BY key",
        )
        .bind(&prefix)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let key: String = row.get("key");
                let rest = key.strip_prefix(&prefix)?;
                (!rest.contains(SEPARATOR)).then(|| rest.to_string())
            })
            .collect())
    }
}

fn check_key(key: &str) -> Result<()> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(Error::InvalidKey(key.to_string()))
    }
}

fn dir_prefix(key: &str) -> String {
    format!("{key}{SEPARATOR}")
}

fn mismatch(key: &str, expected: &'static str) -> Error {
    Error::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}
