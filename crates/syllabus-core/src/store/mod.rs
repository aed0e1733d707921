// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Record store interface and backends.
//!
//! The bulk creator only needs [`RecordStore::put_if_absent`]. Reads are used
//! by the HTTP layer.

pub mod memory;
pub mod postgres;
pub mod sqlite;

pub use self::memory::MemoryStore;
pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreError;

/// A record as held by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    /// Collection the record belongs to.
    pub collection: String,
    /// Record identifier; unique within the collection.
    pub id: Uuid,
    /// Owner subject, indexed for owner-scoped listing.
    pub owner: Option<String>,
    /// Creation instant, used for list ordering.
    pub created_at: DateTime<Utc>,
    /// Full serialized record.
    pub body: serde_json::Value,
}

/// Filter options for listing records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    /// Only records with this owner.
    pub owner: Option<String>,
    /// Maximum records to return.
    pub limit: i64,
    /// Records to skip.
    pub offset: i64,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            owner: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Outcome of a store call that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The key already exists; nothing was written.
    #[error("record already exists")]
    Conflict,

    /// The store refused this write (throttling, validation, constraint).
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict,
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Rejected(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Rejected(format!("corrupt record body: {}", err))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(details) => CoreError::InfrastructureError { details },
            other => CoreError::DatabaseError {
                operation: "read".to_string(),
                details: other.to_string(),
            },
        }
    }
}

/// Key-value record store with create-only writes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Write `item` only if `(collection, id)` is absent.
    ///
    /// Returns [`StoreError::Conflict`] without modifying the existing record
    /// when the key is taken. Atomic per key.
    async fn put_if_absent(&self, item: &StoredItem) -> Result<(), StoreError>;

    /// Fetch one record.
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<StoredItem>, StoreError>;

    /// List records of a collection, oldest first.
    async fn list(
        &self,
        collection: &str,
        filter: &ListFilter,
    ) -> Result<Vec<StoredItem>, StoreError>;

    /// Whether the store answers.
    async fn health_check(&self) -> Result<bool, StoreError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Open a store from a connection URL.
///
/// - `memory:` - process-local [`MemoryStore`]
/// - `sqlite:<path>` / `sqlite::memory:` - [`SqliteStore`]
/// - `postgres://...` / `postgresql://...` - [`PostgresStore`]
///
/// SQL backends run their embedded migrations before returning.
pub async fn connect(url: &str) -> Result<Arc<dyn RecordStore>, CoreError> {
    if url == "memory" || url == "memory:" {
        return Ok(Arc::new(MemoryStore::new()));
    }
    if url.starts_with("sqlite:") {
        return Ok(Arc::new(SqliteStore::connect(url).await?));
    }
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok(Arc::new(PostgresStore::connect(url).await?));
    }
    Err(CoreError::validation(
        "database_url",
        format!("unsupported store URL scheme: {}", url),
    ))
}
