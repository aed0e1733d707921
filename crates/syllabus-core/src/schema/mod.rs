// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Schema entities.
//!
//! Every persisted type implements [`Entity`]: it names its store collection,
//! declares the caller-supplied input it is built from, and carries its
//! authorization rules.
//!
//! | Entity | Collection | Relations |
//! |--------|------------|-----------|
//! | [`Todo`] | `todos` | - |
//! | [`University`] | `universities` | has many majors, courses, students |
//! | [`Major`] | `majors` | belongs to a university |
//! | [`Course`] | `courses` | belongs to a university, optionally a major |
//! | [`Student`] | `students` | belongs to a university and major, enrolls in courses |

mod education;
mod todo;

pub use education::{
    Course, CourseInput, Major, MajorInput, Student, StudentInput, University, UniversityInput,
};
pub use todo::{Todo, TodoInput};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::authz::AuthRule;
use crate::error::{CoreError, Result};

/// Every collection known to the schema.
pub const COLLECTIONS: &[&str] = &[
    Todo::COLLECTION,
    University::COLLECTION,
    Major::COLLECTION,
    Course::COLLECTION,
    Student::COLLECTION,
];

/// Rules for a collection by name, or `None` if the schema has no such
/// collection.
pub fn auth_rules_for(collection: &str) -> Option<&'static [AuthRule]> {
    match collection {
        Todo::COLLECTION => Some(Todo::auth_rules()),
        University::COLLECTION => Some(University::auth_rules()),
        Major::COLLECTION => Some(Major::auth_rules()),
        Course::COLLECTION => Some(Course::auth_rules()),
        Student::COLLECTION => Some(Student::auth_rules()),
        _ => None,
    }
}

/// System-assigned fields stamped onto a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    /// Generated record identifier.
    pub id: Uuid,
    /// Creation and update instant.
    pub now: DateTime<Utc>,
    /// Owner derived from the caller identity.
    pub owner: Option<String>,
}

/// A persisted schema type.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Store namespace for records of this type.
    const COLLECTION: &'static str;

    /// Caller-supplied fields for one new record.
    type Input: DeserializeOwned + Send + 'static;

    /// Validate `input` and assemble a record.
    fn build(input: Self::Input, meta: RecordMeta) -> Result<Self>;

    /// Record identifier.
    fn id(&self) -> Uuid;

    /// Record owner, if any.
    fn owner(&self) -> Option<&str>;

    /// Authorization rules for this collection.
    fn auth_rules() -> &'static [AuthRule];
}

/// Reject missing or whitespace-only required strings. The value is kept
/// exactly as supplied.
pub(crate) fn require_text(field: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(field, "must not be blank"));
    }
    Ok(value)
}

/// Blank optional strings become `None` so they serialize as explicit null.
/// Anything else is kept as supplied.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
