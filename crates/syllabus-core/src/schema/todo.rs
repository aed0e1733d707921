// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The Todo entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Entity, RecordMeta, optional_text, require_text};
use crate::authz::{ALL_OPERATIONS, AuthRule, Operation};
use crate::error::Result;

/// A persisted todo item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Generated identifier.
    pub id: Uuid,
    /// Short title.
    pub title: String,
    /// Optional body text; `null` when empty.
    pub content: Option<String>,
    /// Subject of the creating caller; `null` for guest writes.
    pub owner: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last update instant.
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies for a new todo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoInput {
    /// Short title.
    #[serde(alias = "name")]
    pub title: String,
    /// Optional body text.
    #[serde(default, alias = "description")]
    pub content: Option<String>,
}

impl TodoInput {
    /// Input with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: None,
        }
    }
}

const TODO_RULES: &[AuthRule] = &[
    AuthRule::Owner(ALL_OPERATIONS),
    AuthRule::Guest(&[Operation::Create, Operation::Read]),
];

impl Entity for Todo {
    const COLLECTION: &'static str = "todos";
    type Input = TodoInput;

    fn build(input: TodoInput, meta: RecordMeta) -> Result<Self> {
        Ok(Self {
            id: meta.id,
            title: require_text("title", input.title)?,
            content: optional_text(input.content),
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
        TODO_RULES
    }
}
