// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use uuid::Uuid;

use super::{ListFilter, RecordStore, StoreError, StoredItem};
use crate::error::CoreError;
use crate::migrations;

#[derive(sqlx::FromRow)]
struct RecordRow {
    collection: String,
    id: Uuid,
    owner: Option<String>,
    body: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl From<RecordRow> for StoredItem {
    fn from(row: RecordRow) -> Self {
        StoredItem {
            collection: row.collection,
            id: row.id,
            owner: row.owner,
            created_at: row.created_at,
            body: row.body.0,
        }
    }
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing pool. Migrations must already be applied.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to PostgreSQL: {}", e),
            })?;

        migrations::run_postgres(&pool).await?;

        Ok(Self { pool })
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn put_if_absent(&self, item: &StoredItem) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO records (collection, id, owner, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(&item.collection)
        .bind(item.id)
        .bind(&item.owner)
        .bind(Json(&item.body))
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
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StoredItem::from))
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
            WHERE collection = $1
              AND ($2::TEXT IS NULL OR owner = $2)
            ORDER BY created_at ASC, id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(collection)
        .bind(&filter.owner)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredItem::from).collect())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
