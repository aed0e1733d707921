// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process-local record store.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ListFilter, RecordStore, StoreError, StoredItem};

/// In-memory store keyed by `(collection, id)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, Uuid), StoredItem>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all collections.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put_if_absent(&self, item: &StoredItem) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.entry((item.collection.clone(), item.id)) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(item.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<StoredItem>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&(collection.to_string(), id)).cloned())
    }

    async fn list(
        &self,
        collection: &str,
        filter: &ListFilter,
    ) -> Result<Vec<StoredItem>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<&StoredItem> = records
            .values()
            .filter(|item| item.collection == collection)
            .filter(|item| match filter.owner.as_deref() {
                Some(owner) => item.owner.as_deref() == Some(owner),
                None => true,
            })
            .collect();
        matching.sort_by_key(|item| (item.created_at, item.id));

        let offset = usize::try_from(filter.offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit.max(0)).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
