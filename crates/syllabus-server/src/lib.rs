// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Syllabus Server - HTTP API for bulk record creation
//!
//! Exposes the [`syllabus_core::BulkCreator`] and the record store over
//! HTTP. Callers are identified by gateway-provided headers; see [`http`].
//!
//! # Modules
//!
//! - [`config`]: Environment configuration
//! - [`http`]: Router, identity extraction and error mapping
//! - [`runtime`]: Embeddable server with graceful shutdown

#![deny(missing_docs)]

/// Configuration loading from environment variables.
pub mod config;

/// Router, handlers and error responses.
pub mod http;

/// Embeddable runtime with graceful shutdown.
pub mod runtime;

pub use config::{Config, ConfigError};
pub use http::{ApiError, AppState, router};
pub use runtime::SyllabusRuntime;
