// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for syllabus-core.
//!
//! Provides a unified error type with stable error codes. Item-level variants
//! (`ItemConflict`, `ItemWriteError`, `ValidationError`) are normally rendered
//! into a batch result rather than returned.

use std::fmt;

use uuid::Uuid;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while creating or reading records.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    /// The caller has no usable identity and is not on an allowed guest path.
    AuthenticationRequired,

    /// The caller is identified but the entity's rules deny the operation.
    Forbidden {
        /// The collection being accessed.
        collection: String,
        /// The denied operation.
        operation: String,
    },

    /// The store reported that the record identifier already exists.
    ItemConflict {
        /// The collection written to.
        collection: String,
        /// The conflicting record identifier.
        id: Uuid,
    },

    /// Any other store-reported fault for a single record.
    ItemWriteError {
        /// The record identifier that failed to write.
        id: Uuid,
        /// The reason reported by the store.
        reason: String,
    },

    /// The store was unreachable for the whole call.
    InfrastructureError {
        /// Error details from the last observed failure.
        details: String,
    },

    /// Input validation failed.
    ValidationError {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// The requested record or collection does not exist.
    NotFound {
        /// The collection searched.
        collection: String,
        /// The identifier that was not found.
        id: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::ItemConflict { .. } => "ITEM_CONFLICT",
            Self::ItemWriteError { .. } => "ITEM_WRITE_ERROR",
            Self::InfrastructureError { .. } => "INFRASTRUCTURE_ERROR",
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }

    /// Shorthand for a validation error on `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationRequired => {
                write!(f, "Authentication required: caller has no owner identity")
            }
            Self::Forbidden {
                collection,
                operation,
            } => {
                write!(f, "Not authorized to {} records in '{}'", operation, collection)
            }
            Self::ItemConflict { collection, id } => {
                write!(f, "Record '{}' already exists in '{}'", id, collection)
            }
            Self::ItemWriteError { id, reason } => {
                write!(f, "Failed to write record '{}': {}", id, reason)
            }
            Self::InfrastructureError { details } => {
                write!(f, "Record store unavailable: {}", details)
            }
            Self::ValidationError { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::NotFound { collection, id } => {
                write!(f, "Record '{}' not found in '{}'", id, collection)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CoreError::DatabaseError {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::DatabaseError {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}
