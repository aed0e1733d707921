// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Syllabus Core - Education Schema and Bulk Record Creation
//!
//! This crate declares the education schema (universities, majors, courses,
//! students) and the todo list, the authorization rules attached to each
//! collection, and the bulk create orchestrator that writes new records to a
//! key-value store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         syllabus-server (HTTP)                           │
//! │              identity from headers, JSON in / JSON out                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BulkCreator (this crate)                          │
//! │   IdentityPolicy ─► authz rules ─► concurrent put_if_absent ─► join      │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌───────────────────────┬──────────────────────┬──────────────────────────┐
//! │      MemoryStore      │     SqliteStore      │      PostgresStore       │
//! └───────────────────────┴──────────────────────┴──────────────────────────┘
//! ```
//!
//! # Batch Semantics
//!
//! 1. The caller identity is checked against the [`identity::IdentityPolicy`];
//!    a caller without a subject that is not an allowed guest fails with
//!    `AuthenticationRequired` before any write.
//! 2. The collection's rules must grant `create` to the caller.
//! 3. Every request gets a fresh identifier and the batch-wide timestamp and
//!    is written with `put_if_absent`. Writes run concurrently and are joined.
//! 4. Each outcome is classified on its own. Conflicts and store faults become
//!    entries in `failures`; the rest of the batch is unaffected.
//!
//! Retrying only the failed indices never duplicates records: created records
//! are never rewritten, and a repeated identifier is refused by the store.
//!
//! # Modules
//!
//! - [`authz`]: Authorization rules and checks
//! - [`creator`]: The bulk create orchestrator
//! - [`error`]: Error types with stable error codes
//! - [`identity`]: Caller identity and owner policy
//! - [`migrations`]: Embedded SQL migrations
//! - [`schema`]: Entity definitions
//! - [`store`]: Record store trait and backends

#![deny(missing_docs)]

/// Authorization rules attached to schema entities.
pub mod authz;

/// Concurrent create-if-absent batches with per-item failure reporting.
pub mod creator;

/// Error types with stable error codes.
pub mod error;

/// Caller identity and the owner policy.
pub mod identity;

/// Embedded SQL migrations for the SQLite and PostgreSQL stores.
pub mod migrations;

/// Entity definitions for the education schema and todos.
pub mod schema;

/// Record store trait and its memory, SQLite and PostgreSQL backends.
pub mod store;

pub use creator::{BatchRequest, BatchResult, BulkCreator, IdGenerator, ItemFailure, RandomIds};
pub use error::{CoreError, Result};
pub use identity::{CallerKind, Identity, IdentityPolicy};
pub use schema::Entity;
pub use store::{RecordStore, StoreError, StoredItem};
