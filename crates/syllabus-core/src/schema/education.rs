// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Education entities: universities, majors, courses and students.
//!
//! Relations are carried as typed identifiers. The store offers no cross-key
//! transactions, so referenced records are not checked for existence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Entity, RecordMeta, optional_text, require_text};
use crate::authz::{ALL_OPERATIONS, AuthRule, READ_ONLY};
use crate::error::{CoreError, Result};

/// Group whose members administer the catalogue.
pub const ADMIN_GROUP: &str = "admins";

const CATALOGUE_RULES: &[AuthRule] = &[
    AuthRule::Group(ADMIN_GROUP, ALL_OPERATIONS),
    AuthRule::Authenticated(READ_ONLY),
    AuthRule::Guest(READ_ONLY),
];

const STUDENT_RULES: &[AuthRule] = &[
    AuthRule::Owner(ALL_OPERATIONS),
    AuthRule::Group(ADMIN_GROUP, ALL_OPERATIONS),
    AuthRule::Authenticated(READ_ONLY),
];

// ============================================================================
// University
// ============================================================================

/// A university. Parent of majors, courses and students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct University {
    /// Generated identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// City, if known.
    pub city: Option<String>,
    /// Country, if known.
    pub country: Option<String>,
    /// Subject of the creating caller.
    pub owner: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last update instant.
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies for a new university.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversityInput {
    /// Display name.
    pub name: String,
    /// City.
    #[serde(default)]
    pub city: Option<String>,
    /// Country.
    #[serde(default)]
    pub country: Option<String>,
}

impl Entity for University {
    const COLLECTION: &'static str = "universities";
    type Input = UniversityInput;

    fn build(input: UniversityInput, meta: RecordMeta) -> Result<Self> {
        Ok(Self {
            id: meta.id,
            name: require_text("name", input.name)?,
            city: optional_text(input.city),
            country: optional_text(input.country),
            owner: meta.owner,
            created_at: meta.now,
            updated_at: meta.now,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn auth_rules() -> &'static [AuthRule] {
        CATALOGUE_RULES
    }
}

// ============================================================================
// Major
// ============================================================================

/// A field of study offered by a university.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Major {
    /// Generated identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Owning university.
    pub university_id: Uuid,
    /// Optional description.
    pub description: Option<String>,
    /// Subject of the creating caller.
    pub owner: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last update instant.
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies for a new major.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorInput {
    /// Display name.
    pub name: String,
    /// Owning university.
    pub university_id: Uuid,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

impl Entity for Major {
    const COLLECTION: &'static str = "majors";
    type Input = MajorInput;

    fn build(input: MajorInput, meta: RecordMeta) -> Result<Self> {
        Ok(Self {
            id: meta.id,
            name: require_text("name", input.name)?,
            university_id: input.university_id,
            description: optional_text(input.description),
            owner: meta.owner,
            created_at: meta.now,
            updated_at: meta.now,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn auth_rules() -> &'static [AuthRule] {
        CATALOGUE_RULES
    }
}

// ============================================================================
// Course
// ============================================================================

/// A course taught at a university.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Generated identifier.
    pub id: Uuid,
    /// Catalogue code, e.g. `CS101`.
    pub code: String,
    /// Course title.
    pub title: String,
    /// Owning university.
    pub university_id: Uuid,
    /// Major the course belongs to, if any.
    pub major_id: Option<Uuid>,
    /// Credit points.
    pub credits: Option<u32>,
    /// Subject of the creating caller.
    pub owner: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last update instant.
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies for a new course.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    /// Catalogue code.
    pub code: String,
    /// Course title.
    pub title: String,
    /// Owning university.
    pub university_id: Uuid,
    /// Major the course belongs to.
    #[serde(default)]
    pub major_id: Option<Uuid>,
    /// Credit points.
    #[serde(default)]
    pub credits: Option<u32>,
}

impl Entity for Course {
    const COLLECTION: &'static str = "courses";
    type Input = CourseInput;

    fn build(input: CourseInput, meta: RecordMeta) -> Result<Self> {
        if input.credits == Some(0) {
            return Err(CoreError::validation("credits", "must be positive"));
        }
        Ok(Self {
            id: meta.id,
            code: require_text("code", input.code)?,
            title: require_text("title", input.title)?,
            university_id: input.university_id,
            major_id: input.major_id,
            credits: input.credits,
            owner: meta.owner,
            created_at: meta.now,
            updated_at: meta.now,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn auth_rules() -> &'static [AuthRule] {
        CATALOGUE_RULES
    }
}

// ============================================================================
// Student
// ============================================================================

/// A student enrolled at a university. Owned by the creating subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Generated identifier.
    pub id: Uuid,
    /// Full name.
    pub full_name: String,
    /// Contact email, if given.
    pub email: Option<String>,
    /// University of enrollment.
    pub university_id: Uuid,
    /// Declared major, if any.
    pub major_id: Option<Uuid>,
    /// Courses the student is enrolled in.
    pub enrolled_course_ids: Vec<Uuid>,
    /// Subject of the creating caller.
    pub owner: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last update instant.
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies for a new student.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    /// Full name.
    pub full_name: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// University of enrollment.
    pub university_id: Uuid,
    /// Declared major.
    #[serde(default)]
    pub major_id: Option<Uuid>,
    /// Courses to enroll in.
    #[serde(default)]
    pub enrolled_course_ids: Vec<Uuid>,
}

impl Entity for Student {
    const COLLECTION: &'static str = "students";
    type Input = StudentInput;

    fn build(input: StudentInput, meta: RecordMeta) -> Result<Self> {
        let email = optional_text(input.email);
        if let Some(ref email) = email
            && !email.contains('@')
        {
            return Err(CoreError::validation("email", "must contain '@'"));
        }

        let mut enrolled_course_ids = input.enrolled_course_ids;
        enrolled_course_ids.sort_unstable();
        enrolled_course_ids.dedup();

        Ok(Self {
            id: meta.id,
            full_name: require_text("fullName", input.full_name)?,
            email,
            university_id: input.university_id,
            major_id: input.major_id,
            enrolled_course_ids,
            owner: meta.owner,
            created_at: meta.now,
            updated_at: meta.now,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn auth_rules() -> &'static [AuthRule] {
        STUDENT_RULES
    }
}
