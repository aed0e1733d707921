// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Authorization rules attached to schema entities.
//!
//! Each entity declares a static list of [`AuthRule`]s. A request is allowed
//! when at least one rule grants the operation to the caller.

use std::fmt;

use crate::error::{CoreError, Result};
use crate::identity::{CallerKind, Identity};

/// Operations a rule can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create new records.
    Create,
    /// Read existing records.
    Read,
    /// Update existing records.
    Update,
    /// Delete existing records.
    Delete,
}

impl Operation {
    /// Lowercase name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every operation.
pub const ALL_OPERATIONS: &[Operation] = &[
    Operation::Create,
    Operation::Read,
    Operation::Update,
    Operation::Delete,
];

/// Read-only access.
pub const READ_ONLY: &[Operation] = &[Operation::Read];

/// One grant in an entity's rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRule {
    /// The caller's subject equals the record owner.
    Owner(&'static [Operation]),
    /// Any authenticated caller.
    Authenticated(&'static [Operation]),
    /// Callers on the guest (API key) path.
    Guest(&'static [Operation]),
    /// Authenticated callers in the named group.
    Group(&'static str, &'static [Operation]),
}

impl AuthRule {
    fn operations(&self) -> &'static [Operation] {
        match self {
            Self::Owner(ops) | Self::Authenticated(ops) | Self::Guest(ops) => ops,
            Self::Group(_, ops) => ops,
        }
    }

    fn grants(&self, identity: &Identity, op: Operation, record_owner: Option<&str>) -> bool {
        if !self.operations().contains(&op) {
            return false;
        }
        match self {
            Self::Owner(_) => match (identity.subject.as_deref(), record_owner) {
                (Some(subject), Some(owner)) => subject == owner,
                _ => false,
            },
            Self::Authenticated(_) => identity.kind == CallerKind::Authenticated,
            Self::Guest(_) => identity.kind == CallerKind::Guest,
            Self::Group(group, _) => {
                identity.kind == CallerKind::Authenticated && identity.in_group(group)
            }
        }
    }
}

/// Whether any rule grants `op` to the caller.
///
/// For [`Operation::Create`], `record_owner` is the owner that will be stamped
/// on the new record.
pub fn authorize(
    rules: &[AuthRule],
    identity: &Identity,
    op: Operation,
    record_owner: Option<&str>,
) -> bool {
    rules
        .iter()
        .any(|rule| rule.grants(identity, op, record_owner))
}

/// Like [`authorize`] but returns [`CoreError::Forbidden`] on denial.
pub fn ensure(
    rules: &[AuthRule],
    identity: &Identity,
    op: Operation,
    record_owner: Option<&str>,
    collection: &str,
) -> Result<()> {
    if authorize(rules, identity, op, record_owner) {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            collection: collection.to_string(),
            operation: op.to_string(),
        })
    }
}

/// Which records of a collection a caller may list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadScope {
    /// Every record.
    All,
    /// Only records owned by this subject.
    Owned(String),
    /// Nothing.
    Denied,
}

/// Compute the list scope for a caller.
pub fn read_scope(rules: &[AuthRule], identity: &Identity) -> ReadScope {
    let mut owner_read = false;
    for rule in rules {
        if !rule.operations().contains(&Operation::Read) {
            continue;
        }
        match rule {
            AuthRule::Owner(_) => owner_read = true,
            other if other.grants(identity, Operation::Read, None) => return ReadScope::All,
            _ => {}
        }
    }

    match identity.subject.as_deref() {
        Some(subject) if owner_read && !subject.is_empty() => ReadScope::Owned(subject.to_string()),
        _ => ReadScope::Denied,
    }
}
