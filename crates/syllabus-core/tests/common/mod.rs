// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for syllabus-core integration tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Barrier;
use uuid::Uuid;

use syllabus_core::IdGenerator;
use syllabus_core::store::{ListFilter, RecordStore, StoreError, StoredItem};

/// Wraps a real store, counting writes and optionally failing chosen ids.
pub struct CountingStore {
    inner: Arc<dyn RecordStore>,
    put_calls: AtomicUsize,
    unavailable_ids: Mutex<HashSet<Uuid>>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            put_calls: AtomicUsize::new(0),
            unavailable_ids: Mutex::new(HashSet::new()),
        })
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Make writes for `id` fail as if the store were unreachable.
    pub fn fail_id(&self, id: Uuid) {
        self.unavailable_ids.lock().unwrap().insert(id);
    }

    pub fn heal(&self) {
        self.unavailable_ids.lock().unwrap().clear();
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn put_if_absent(&self, item: &StoredItem) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable_ids.lock().unwrap().contains(&item.id) {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        self.inner.put_if_absent(item).await
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<StoredItem>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn list(
        &self,
        collection: &str,
        filter: &ListFilter,
    ) -> Result<Vec<StoredItem>, StoreError> {
        self.inner.list(collection, filter).await
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        self.inner.health_check().await
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }
}

/// Holds every write at a barrier until `parties` writes are in flight.
///
/// Sequential writes never fill the barrier, so a batch of `parties` items
/// only completes when all of its writes run at once.
pub struct GatedStore {
    inner: Arc<dyn RecordStore>,
    barrier: Barrier,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl GatedStore {
    pub fn new(inner: Arc<dyn RecordStore>, parties: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            barrier: Barrier::new(parties),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Most writes observed in flight at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    async fn put_if_absent(&self, item: &StoredItem) -> Result<(), StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.barrier.wait().await;
        let result = self.inner.put_if_absent(item).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<StoredItem>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn list(
        &self,
        collection: &str,
        filter: &ListFilter,
    ) -> Result<Vec<StoredItem>, StoreError> {
        self.inner.list(collection, filter).await
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        self.inner.health_check().await
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }
}

/// Hands out queued ids first, then random ones.
pub struct SequenceIds(Mutex<VecDeque<Uuid>>);

impl SequenceIds {
    pub fn new(ids: impl IntoIterator<Item = Uuid>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(ids.into_iter().collect())))
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> Uuid {
        self.0.lock().unwrap().pop_front().unwrap_or_else(Uuid::new_v4)
    }
}

/// Skip a test if TEST_DATABASE_URL is not set.
#[macro_export]
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        }
    };
}
