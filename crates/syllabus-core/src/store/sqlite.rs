// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed record store.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use uuid::Uuid;

use super::{ListFilter, RecordStore, StoreError, StoredItem};
use crate::error::CoreError;
use crate::migrations;

#[derive(sqlx::FromRow)]
struct RecordRow {
    collection: String,
    id: String,
    owner: Option<String>,
    body: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for StoredItem {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| StoreError::Rejected(format!("corrupt record id '{}': {}", row.id, e)))?;
        Ok(StoredItem {
            collection: row.collection,
            id,
            owner: row.owner,
            created_at: row.created_at,
            body: serde_json::from_str(&row.body)?,
        })
    }
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool. Migrations must already be applied.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and run migrations.
    ///
    /// In-memory databases get a single connection so every query sees the
    /// same database.
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {}: {}", url, e),
            })?;

        migrations::run_sqlite(&pool).await?;

        Ok(Self { pool })
    }

    /// Create and initialize a store from a file path.
    ///
    /// Creates parent directories and the database file when missing.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        Self::connect(&format!("sqlite:{}", path.to_string_lossy())).await
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn put_if_absent(&self, item: &StoredItem) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO records (collection, id, owner, body, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(&item.collection)
        .bind(item.id.to_string())
        .bind(&item.owner)
        .bind(item.body.to_string())
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<StoredItem>, StoreError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT collection, id, owner, body, created_at
            FROM records
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(collection)
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredItem::try_from).transpose()
    }

    async fn list(
        &self,
        collection: &str,
        filter: &ListFilter,
    ) -> Result<Vec<StoredItem>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT collection, id, owner, body, created_at
            FROM records
            WHERE collection = ?1
              AND (?2 IS NULL OR owner = ?2)
            ORDER BY created_at ASC, id ASC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(collection)
        .bind(&filter.owner)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredItem::try_from).collect()
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Create an in-memory SQLite store for testing.
    async fn test_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite store")
    }

    fn item(owner: Option<&str>) -> StoredItem {
        StoredItem {
            collection: "todos".to_string(),
            id: Uuid::new_v4(),
            owner: owner.map(str::to_string),
            created_at: Utc::now(),
            body: json!({"title": "A", "content": null}),
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = test_store().await;
        let todo = item(Some("user-1"));

        store.put_if_absent(&todo).await.expect("insert");

        let fetched = store
            .get("todos", todo.id)
            .await
            .expect("query")
            .expect("record should exist");
        assert_eq!(fetched.id, todo.id);
        assert_eq!(fetched.owner.as_deref(), Some("user-1"));
        assert_eq!(fetched.body, todo.body);
    }

    #[tokio::test]
    async fn test_conflict_keeps_original() {
        let store = test_store().await;
        let todo = item(None);
        store.put_if_absent(&todo).await.unwrap();

        let mut again = todo.clone();
        again.body = json!({"title": "B"});
        assert_eq!(
            store.put_if_absent(&again).await.unwrap_err(),
            StoreError::Conflict
        );

        let fetched = store.get("todos", todo.id).await.unwrap().unwrap();
        assert_eq!(fetched.body["title"], "A");
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let store = test_store().await;
        let result = store.get("todos", Uuid::new_v4()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_owner_filter() {
        let store = test_store().await;
        store.put_if_absent(&item(Some("a"))).await.unwrap();
        store.put_if_absent(&item(Some("a"))).await.unwrap();
        store.put_if_absent(&item(Some("b"))).await.unwrap();

        let all = store.list("todos", &ListFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let owned = store
            .list(
                "todos",
                &ListFilter {
                    owner: Some("a".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(owned.len(), 2);
        assert!(owned.iter().all(|i| i.owner.as_deref() == Some("a")));
    }

    #[tokio::test]
    async fn test_from_path_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");

        let store = SqliteStore::from_path(&path).await.unwrap();
        assert!(store.health_check().await.unwrap());
        assert!(path.exists());
    }
}
