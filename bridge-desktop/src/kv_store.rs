//! Namespaced key-value storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::KeyValueStore,
};
use sqlx::{sqlite::SqlitePool, Row};
use std::path::PathBuf;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS kv_entries (
        namespace TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (namespace, key)
    )
"#;

/// SQLite-backed key-value store
///
/// Every namespace shares one table; the composite primary key keeps
/// namespaces isolated and makes `clear` a single indexed delete.
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    /// Open (or create) a store at the given database path
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        // SQLite URLs want forward slashes
        let path_str = db_path.to_string_lossy().replace('\\', "/");
        let db_url = format!("sqlite://{}?mode=rwc", path_str);

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to connect to DB: {}", e)))?;

        Self::create_table(&pool).await?;
        debug!(path = ?db_path, "Initialized key-value store");

        Ok(Self { pool })
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        // A single connection keeps every query on the same in-memory database
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to connect to DB: {}", e)))?;

        Self::create_table(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_table(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    /// Number of keys stored in a namespace
    pub async fn len(&self, namespace: &str) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) FROM kv_entries WHERE namespace = ?")
            .bind(namespace)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to count keys: {}", e)))?;
        let count: i64 = row.get(0);
        Ok(count as usize)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to get key: {}", e)))?;

        Ok(row.map(|row| row.get(0)))
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (namespace, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(value)
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::StorageError(format!("Failed to set key: {}", e)))?;

        debug!(namespace, key, "Stored key");
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_entries WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to delete key: {}", e)))?;
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to clear namespace: {}", e)))?;

        debug!(namespace, removed = result.rows_affected(), "Cleared namespace");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let store = SqliteKeyValueStore::in_memory().await.unwrap();

        store.set("ns", "song.1", "{\"a\":1}").await.unwrap();
        assert_eq!(
            store.get("ns", "song.1").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        store.set("ns", "song.1", "{\"a\":2}").await.unwrap();
        assert_eq!(
            store.get("ns", "song.1").await.unwrap().as_deref(),
            Some("{\"a\":2}")
        );
        assert_eq!(store.len("ns").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = SqliteKeyValueStore::in_memory().await.unwrap();

        store.set("a", "k", "1").await.unwrap();
        store.set("b", "k", "2").await.unwrap();

        store.clear("a").await.unwrap();

        assert!(store.get("a", "k").await.unwrap().is_none());
        assert_eq!(store.get("b", "k").await.unwrap().as_deref(), Some("2"));
        assert!(store.contains("b", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = SqliteKeyValueStore::in_memory().await.unwrap();
        store.delete("ns", "missing").await.unwrap();
        assert!(!store.contains("ns", "missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let path = std::env::temp_dir()
            .join(format!("kv-store-test-{}", uuid::Uuid::new_v4()))
            .join("cache.db");

        {
            let store = SqliteKeyValueStore::new(path.clone()).await.unwrap();
            store.set("ns", "k", "v").await.unwrap();
        }

        let reopened = SqliteKeyValueStore::new(path).await.unwrap();
        assert_eq!(reopened.get("ns", "k").await.unwrap().as_deref(), Some("v"));
    }
}
