// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bulk record creation.
//!
//! [`BulkCreator::create_batch`] writes every request as a new record with a
//! conditional "create if absent" write. Writes are issued concurrently and
//! joined; one item's failure never blocks or rolls back another.
//!
//! ## Outcome
//!
//! | Situation | Result |
//! |-----------|--------|
//! | No owner identity, not an allowed guest | `Err(AuthenticationRequired)`, no writes |
//! | Rules deny `create` for the caller | `Err(Forbidden)`, no writes |
//! | Empty request list | empty [`BatchResult`], no writes |
//! | Some items fail | `Ok(BatchResult)` with per-item failures |
//! | Every store call found the store unreachable | `Err(InfrastructureError)` |
//!
//! Items that fail validation never reach the store and do not count towards
//! an outage.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::authz::{self, Operation};
use crate::error::{CoreError, Result};
use crate::identity::{Identity, IdentityPolicy};
use crate::schema::{Entity, RecordMeta};
use crate::store::{RecordStore, StoreError, StoredItem};

/// Source of record identifiers.
pub trait IdGenerator: Send + Sync {
    /// Next identifier. Must be globally unique in production use.
    fn next_id(&self) -> Uuid;
}

/// Random v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Invocation payload: `{ "requests": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest<I> {
    /// One entry per record to create.
    pub requests: Vec<I>,
}

/// One failed item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    /// Position of the item in the request list.
    pub original_index: usize,
    /// Stable error code, e.g. `ITEM_CONFLICT`.
    pub error_code: String,
    /// Human-readable reason.
    pub error_description: String,
}

/// Partitioned outcome of a batch.
///
/// `created_records.len() + failures.len()` always equals the request count.
/// Created records keep input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult<E> {
    /// Records written by this call.
    pub created_records: Vec<E>,
    /// Number of failed items.
    pub failed_count: usize,
    /// Per-item failures, ordered by `original_index`.
    pub failures: Vec<ItemFailure>,
}

impl<E> BatchResult<E> {
    /// Result of an empty batch.
    pub fn empty() -> Self {
        Self {
            created_records: Vec::new(),
            failed_count: 0,
            failures: Vec::new(),
        }
    }

    /// Number of items the batch covered.
    pub fn len(&self) -> usize {
        self.created_records.len() + self.failures.len()
    }

    /// Whether the batch covered no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Input positions to resubmit.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.original_index).collect()
    }
}

/// Why a single item was not written.
enum WriteFailure {
    /// Rejected before any store call.
    Invalid(CoreError),
    Store { id: Uuid, source: StoreError },
}

/// Decode one JSON request. The error names no field; the creator prefixes
/// the item position.
fn decode_input<E: Entity>(raw: serde_json::Value) -> Result<E::Input> {
    serde_json::from_value(raw).map_err(|e| CoreError::validation("", e.to_string()))
}

/// `requests[2].title`, or `requests[2]` when the whole item is at fault.
fn item_field(index: usize, field: &str) -> String {
    if field.is_empty() {
        format!("requests[{}]", index)
    } else {
        format!("requests[{}].{}", index, field)
    }
}

impl WriteFailure {
    fn reached_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Store {
                source: StoreError::Unavailable(_),
                ..
            }
        )
    }

    fn into_core_error(self, collection: &str, index: usize) -> CoreError {
        match self {
            Self::Invalid(CoreError::ValidationError { field, message }) => {
                CoreError::ValidationError {
                    field: item_field(index, &field),
                    message,
                }
            }
            Self::Invalid(err) => err,
            Self::Store {
                id,
                source: StoreError::Conflict,
            } => CoreError::ItemConflict {
                collection: collection.to_string(),
                id,
            },
            Self::Store { id, source } => CoreError::ItemWriteError {
                id,
                reason: source.to_string(),
            },
        }
    }
}

/// Fan-out creator over a [`RecordStore`].
pub struct BulkCreator {
    store: Arc<dyn RecordStore>,
    policy: IdentityPolicy,
    ids: Arc<dyn IdGenerator>,
    max_batch_size: Option<usize>,
}

impl fmt::Debug for BulkCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkCreator")
            .field("store", &self.store.backend())
            .field("policy", &self.policy)
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

impl BulkCreator {
    /// Creator with random identifiers, a subject-required policy and no
    /// batch size limit.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            policy: IdentityPolicy::require_subject(),
            ids: Arc::new(RandomIds),
            max_batch_size: None,
        }
    }

    /// Set the identity policy.
    pub fn with_policy(mut self, policy: IdentityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the identifier source.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Reject batches larger than `max` before any write.
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max);
        self
    }

    /// The store records are written to.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// The active identity policy.
    pub fn policy(&self) -> &IdentityPolicy {
        &self.policy
    }

    /// Check that `identity` may create records of `E`.
    ///
    /// Returns the owner to stamp on new records. Every batch runs this before
    /// looking at its requests; adapters that decode a request body call it
    /// first as well.
    pub fn authorize_create<E: Entity>(&self, identity: &Identity) -> Result<Option<String>> {
        let owner = self.policy.resolve_owner(identity).inspect_err(|_| {
            warn!(kind = ?identity.kind, "Rejecting batch: no owner identity");
        })?;

        authz::ensure(
            E::auth_rules(),
            identity,
            Operation::Create,
            owner.as_deref(),
            E::COLLECTION,
        )?;

        Ok(owner)
    }

    /// Create one record per request.
    ///
    /// All records share one `createdAt`/`updatedAt` instant. See the module
    /// documentation for the outcome table.
    pub async fn create_batch<E: Entity>(
        &self,
        requests: Vec<E::Input>,
        identity: &Identity,
    ) -> Result<BatchResult<E>> {
        self.run_batch::<E, _, _>(requests, Ok, identity).await
    }

    /// Create one record per undecoded JSON request.
    ///
    /// An element that does not decode into `E::Input` becomes a
    /// `VALIDATION_ERROR` failure at its index; the rest of the batch is
    /// written as usual.
    pub async fn create_batch_json<E: Entity>(
        &self,
        requests: Vec<serde_json::Value>,
        identity: &Identity,
    ) -> Result<BatchResult<E>> {
        self.run_batch::<E, _, _>(requests, decode_input::<E>, identity)
            .await
    }

    #[instrument(
        skip(self, requests, decode, identity),
        fields(collection = E::COLLECTION, batch_size = requests.len())
    )]
    async fn run_batch<E, R, F>(
        &self,
        requests: Vec<R>,
        decode: F,
        identity: &Identity,
    ) -> Result<BatchResult<E>>
    where
        E: Entity,
        R: Send,
        F: Fn(R) -> Result<E::Input> + Send + Sync,
    {
        let owner = self.authorize_create::<E>(identity)?;

        if requests.is_empty() {
            debug!("Empty batch, nothing to write");
            return Ok(BatchResult::empty());
        }

        if let Some(max) = self.max_batch_size
            && requests.len() > max
        {
            return Err(CoreError::validation(
                "requests",
                format!("batch of {} exceeds the limit of {}", requests.len(), max),
            ));
        }

        let now = Utc::now();

        let writes = requests.into_iter().enumerate().map(|(index, raw)| {
            let meta = RecordMeta {
                id: self.ids.next_id(),
                now,
                owner: owner.clone(),
            };
            let input = decode(raw);
            async move {
                let outcome = match input {
                    Ok(input) => self.write_one::<E>(input, meta).await,
                    Err(err) => Err(WriteFailure::Invalid(err)),
                };
                (index, outcome)
            }
        });
        let outcomes = join_all(writes).await;

        let mut created_records = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        let mut store_calls = 0usize;
        let mut unavailable = 0usize;

        for (index, outcome) in outcomes {
            match outcome {
                Ok(record) => {
                    store_calls += 1;
                    created_records.push(record);
                }
                Err(failure) => {
                    if failure.reached_store() {
                        store_calls += 1;
                    }
                    if failure.is_unavailable() {
                        unavailable += 1;
                    }
                    let error = failure.into_core_error(E::COLLECTION, index);
                    debug!(index, code = error.error_code(), "Item not created: {}", error);
                    failures.push(ItemFailure {
                        original_index: index,
                        error_code: error.error_code().to_string(),
                        error_description: error.to_string(),
                    });
                }
            }
        }

        if store_calls > 0 && unavailable == store_calls {
            let details = failures
                .iter()
                .rev()
                .find(|f| f.error_code == "ITEM_WRITE_ERROR")
                .map(|f| f.error_description.clone())
                .unwrap_or_default();
            warn!(store_calls, "Store unreachable for every write");
            return Err(CoreError::InfrastructureError { details });
        }

        info!(
            created = created_records.len(),
            failed = failures.len(),
            "Batch processed"
        );

        Ok(BatchResult {
            failed_count: failures.len(),
            created_records,
            failures,
        })
    }

    async fn write_one<E: Entity>(
        &self,
        input: E::Input,
        meta: RecordMeta,
    ) -> std::result::Result<E, WriteFailure> {
        let id = meta.id;
        let owner = meta.owner.clone();
        let created_at = meta.now;

        let record = E::build(input, meta).map_err(WriteFailure::Invalid)?;
        let body = serde_json::to_value(&record)
            .map_err(|e| WriteFailure::Invalid(CoreError::from(e)))?;

        let item = StoredItem {
            collection: E::COLLECTION.to_string(),
            id,
            owner,
            created_at,
            body,
        };
        self.store
            .put_if_absent(&item)
            .await
            .map_err(|source| WriteFailure::Store { id, source })?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Todo, TodoInput};
    use crate::store::ListFilter;
    use async_trait::async_trait;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock store for creator unit tests.
    struct MockStore {
        written: Mutex<HashSet<Uuid>>,
        put_calls: AtomicUsize,
        reject_ids: Mutex<HashSet<Uuid>>,
        unavailable: Mutex<bool>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                written: Mutex::new(HashSet::new()),
                put_calls: AtomicUsize::new(0),
                reject_ids: Mutex::new(HashSet::new()),
                unavailable: Mutex::new(false),
            }
        }

        fn with_existing(self, id: Uuid) -> Self {
            self.written.lock().unwrap().insert(id);
            self
        }

        fn reject(self, id: Uuid) -> Self {
            self.reject_ids.lock().unwrap().insert(id);
            self
        }

        fn set_unavailable(&self) {
            *self.unavailable.lock().unwrap() = true;
        }

        fn put_calls(&self) -> usize {
            self.put_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecordStore for MockStore {
        async fn put_if_absent(&self, item: &StoredItem) -> std::result::Result<(), StoreError> {
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            if *self.unavailable.lock().unwrap() {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            if self.reject_ids.lock().unwrap().contains(&item.id) {
                return Err(StoreError::Rejected("throttled".to_string()));
            }
            if !self.written.lock().unwrap().insert(item.id) {
                return Err(StoreError::Conflict);
            }
            Ok(())
        }

        async fn get(
            &self,
            _collection: &str,
            _id: Uuid,
        ) -> std::result::Result<Option<StoredItem>, StoreError> {
            Ok(None)
        }

        async fn list(
            &self,
            _collection: &str,
            _filter: &ListFilter,
        ) -> std::result::Result<Vec<StoredItem>, StoreError> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> std::result::Result<bool, StoreError> {
            Ok(true)
        }

        fn backend(&self) -> &'static str {
            "mock"
        }
    }

    /// Hands out a fixed sequence of ids, then random ones.
    struct FixedIds(Mutex<VecDeque<Uuid>>);

    impl FixedIds {
        fn new(ids: impl IntoIterator<Item = Uuid>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(ids.into_iter().collect())))
        }
    }

    impl IdGenerator for FixedIds {
        fn next_id(&self) -> Uuid {
            self.0.lock().unwrap().pop_front().unwrap_or_else(Uuid::new_v4)
        }
    }

    fn todos(titles: &[&str]) -> Vec<TodoInput> {
        titles.iter().map(|t| TodoInput::titled(*t)).collect()
    }

    #[tokio::test]
    async fn test_two_items_created() {
        let store = Arc::new(MockStore::new());
        let creator = BulkCreator::new(store.clone());

        let result = creator
            .create_batch::<Todo>(todos(&["A", "B"]), &Identity::authenticated("user-1"))
            .await
            .unwrap();

        assert_eq!(result.created_records.len(), 2);
        assert_eq!(result.failed_count, 0);
        assert!(result.failures.is_empty());

        let (a, b) = (&result.created_records[0], &result.created_records[1]);
        assert_eq!(a.title, "A");
        assert_eq!(b.title, "B");
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, b.created_at);
        assert_eq!(a.updated_at, b.updated_at);
        assert_eq!(a.created_at, a.updated_at);
        assert_eq!(a.owner.as_deref(), Some("user-1"));
        assert_eq!(store.put_calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_store_calls() {
        let store = Arc::new(MockStore::new());
        let creator = BulkCreator::new(store.clone());

        let result = creator
            .create_batch::<Todo>(Vec::new(), &Identity::authenticated("user-1"))
            .await
            .unwrap();

        assert_eq!(result, BatchResult::empty());
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_identity_fails_before_writes() {
        let store = Arc::new(MockStore::new());
        let creator = BulkCreator::new(store.clone());

        let err = creator
            .create_batch::<Todo>(todos(&["A", "B", "C"]), &Identity::anonymous())
            .await
            .unwrap_err();

        assert_eq!(err, CoreError::AuthenticationRequired);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_guest_path_creates_ownerless_records() {
        let store = Arc::new(MockStore::new());
        let creator = BulkCreator::new(store.clone())
            .with_policy(IdentityPolicy::require_subject().with_guest_writes(true));

        let result = creator
            .create_batch::<Todo>(todos(&["A"]), &Identity::guest())
            .await
            .unwrap();

        assert_eq!(result.created_records.len(), 1);
        assert_eq!(result.created_records[0].owner, None);
    }

    #[tokio::test]
    async fn test_single_conflict_is_isolated() {
        let taken = Uuid::new_v4();
        let store = Arc::new(MockStore::new().with_existing(taken));
        let ids = FixedIds::new([Uuid::new_v4(), taken, Uuid::new_v4(), Uuid::new_v4()]);
        let creator = BulkCreator::new(store.clone()).with_id_generator(ids);

        let result = creator
            .create_batch::<Todo>(
                todos(&["a", "b", "c", "d"]),
                &Identity::authenticated("user-1"),
            )
            .await
            .unwrap();

        assert_eq!(result.created_records.len(), 3);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.failures[0].original_index, 1);
        assert_eq!(result.failures[0].error_code, "ITEM_CONFLICT");
        assert_eq!(result.len(), 4);
        let titles: Vec<_> = result.created_records.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c", "d"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_within_batch() {
        let dup = Uuid::new_v4();
        let store = Arc::new(MockStore::new());
        let creator = BulkCreator::new(store.clone()).with_id_generator(FixedIds::new([dup, dup]));

        let result = creator
            .create_batch::<Todo>(todos(&["x", "y"]), &Identity::authenticated("user-1"))
            .await
            .unwrap();

        assert_eq!(result.created_records.len(), 1);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.failures[0].error_code, "ITEM_CONFLICT");
    }

    #[tokio::test]
    async fn test_rejected_write_and_invalid_item() {
        let rejected = Uuid::new_v4();
        let store = Arc::new(MockStore::new().reject(rejected));
        let creator = BulkCreator::new(store.clone())
            .with_id_generator(FixedIds::new([Uuid::new_v4(), rejected, Uuid::new_v4()]));

        let result = creator
            .create_batch::<Todo>(todos(&["ok", "throttled", "  "]), &Identity::authenticated("u"))
            .await
            .unwrap();

        assert_eq!(result.created_records.len(), 1);
        assert_eq!(result.failed_indices(), vec![1, 2]);
        assert_eq!(result.failures[0].error_code, "ITEM_WRITE_ERROR");
        assert!(result.failures[0].error_description.contains("throttled"));
        assert_eq!(result.failures[1].error_code, "VALIDATION_ERROR");
        assert!(
            result.failures[1]
                .error_description
                .contains("'requests[2].title'")
        );
        // invalid items never reach the store
        assert_eq!(store.put_calls(), 2);
    }

    #[tokio::test]
    async fn test_outage_ignores_items_that_never_reached_the_store() {
        let store = Arc::new(MockStore::new());
        store.set_unavailable();
        let creator = BulkCreator::new(store.clone());

        let err = creator
            .create_batch::<Todo>(todos(&["  ", "b"]), &Identity::authenticated("u"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INFRASTRUCTURE_ERROR");
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(store.put_calls(), 1);

        // Nothing reached the store, so this is a plain item failure.
        let result = creator
            .create_batch::<Todo>(todos(&[" "]), &Identity::authenticated("u"))
            .await
            .unwrap();
        assert_eq!(result.failed_indices(), vec![0]);
        assert_eq!(store.put_calls(), 1);
    }

    #[tokio::test]
    async fn test_json_batch_isolates_undecodable_items() {
        let store = Arc::new(MockStore::new());
        let creator = BulkCreator::new(store.clone());

        let result = creator
            .create_batch_json::<Todo>(
                vec![
                    serde_json::json!({"title": "A"}),
                    serde_json::json!({"content": "no title"}),
                    serde_json::json!("not an object"),
                    serde_json::json!({"title": "C", "content": ""}),
                ],
                &Identity::authenticated("user-1"),
            )
            .await
            .unwrap();

        let titles: Vec<_> = result.created_records.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
        assert_eq!(result.created_records[1].content, None);
        assert_eq!(result.failed_indices(), vec![1, 2]);
        assert!(result.failures.iter().all(|f| f.error_code == "VALIDATION_ERROR"));
        assert!(result.failures[0].error_description.contains("'requests[1]'"));
        assert!(result.failures[0].error_description.contains("title"));
        assert_eq!(result.len(), 4);
        assert_eq!(store.put_calls(), 2);
    }

    #[tokio::test]
    async fn test_authorize_create_runs_first() {
        let store = Arc::new(MockStore::new());
        let creator = BulkCreator::new(store.clone());

        assert_eq!(
            creator
                .authorize_create::<Todo>(&Identity::anonymous())
                .unwrap_err(),
            CoreError::AuthenticationRequired
        );
        assert_eq!(
            creator
                .authorize_create::<Todo>(&Identity::authenticated("user-1"))
                .unwrap(),
            Some("user-1".to_string())
        );

        // Undecodable items do not mask a missing identity.
        let err = creator
            .create_batch_json::<Todo>(
                vec![serde_json::json!({"content": "x"})],
                &Identity::anonymous(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::AuthenticationRequired);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_total_outage_is_infrastructure_error() {
        let store = Arc::new(MockStore::new());
        store.set_unavailable();
        let creator = BulkCreator::new(store.clone());

        let err = creator
            .create_batch::<Todo>(todos(&["a", "b"]), &Identity::authenticated("u"))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "INFRASTRUCTURE_ERROR");
        assert_eq!(store.put_calls(), 2);
    }

    #[tokio::test]
    async fn test_batch_size_limit() {
        let store = Arc::new(MockStore::new());
        let creator = BulkCreator::new(store.clone()).with_max_batch_size(2);

        let err = creator
            .create_batch::<Todo>(todos(&["a", "b", "c"]), &Identity::authenticated("u"))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(store.put_calls(), 0);
    }

    #[test]
    fn test_batch_result_wire_shape() {
        let result: BatchResult<Todo> = BatchResult {
            created_records: Vec::new(),
            failed_count: 1,
            failures: vec![ItemFailure {
                original_index: 3,
                error_code: "ITEM_CONFLICT".to_string(),
                error_description: "exists".to_string(),
            }],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failedCount"], 1);
        assert_eq!(json["failures"][0]["originalIndex"], 3);
        assert_eq!(json["failures"][0]["errorDescription"], "exists");
        assert!(json["createdRecords"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_debug_hides_store() {
        let creator = BulkCreator::new(Arc::new(MockStore::new()));
        let debug_str = format!("{:?}", creator);
        assert!(debug_str.contains("BulkCreator"));
        assert!(debug_str.contains("mock"));
    }
}
