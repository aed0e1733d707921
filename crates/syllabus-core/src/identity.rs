// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Caller identity and the policy deciding who may own new records.
//!
//! Identity is supplied by the surrounding platform (an HTTP gateway, an
//! authentication proxy). This crate never verifies credentials; it only reads
//! the subject, the caller kind, the issuer and the groups.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// How the caller reached the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerKind {
    /// Signed-in user with a verified subject.
    Authenticated,
    /// API key or guest credential; carries no subject.
    Guest,
    /// No credential at all.
    Anonymous,
}

/// Identity facts about the caller of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable subject identifier, present for authenticated callers.
    pub subject: Option<String>,
    /// How the caller authenticated.
    pub kind: CallerKind,
    /// Token issuer, when the platform reports one.
    pub issuer: Option<String>,
    /// Groups the caller belongs to.
    pub groups: Vec<String>,
}

impl Identity {
    /// Authenticated caller with the given subject.
    pub fn authenticated(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            kind: CallerKind::Authenticated,
            issuer: None,
            groups: Vec::new(),
        }
    }

    /// Caller on the guest (API key) path.
    pub fn guest() -> Self {
        Self {
            subject: None,
            kind: CallerKind::Guest,
            issuer: None,
            groups: Vec::new(),
        }
    }

    /// Caller without any credential.
    pub fn anonymous() -> Self {
        Self {
            subject: None,
            kind: CallerKind::Anonymous,
            issuer: None,
            groups: Vec::new(),
        }
    }

    /// Set the token issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Add group memberships.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Whether the caller belongs to `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

/// Rule deciding whether a caller may create records and who owns them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityPolicy {
    /// Guest callers may write records without an owner.
    pub allow_guest_writes: bool,
    /// When non-empty, subjects are only accepted from these issuers.
    pub trusted_issuers: Vec<String>,
}

impl IdentityPolicy {
    /// Policy that requires a subject for every write.
    pub fn require_subject() -> Self {
        Self::default()
    }

    /// Allow or reject ownerless guest writes.
    pub fn with_guest_writes(mut self, allow: bool) -> Self {
        self.allow_guest_writes = allow;
        self
    }

    /// Restrict accepted subjects to the given issuers.
    pub fn with_trusted_issuers<I, S>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_issuers = issuers.into_iter().map(Into::into).collect();
        self
    }

    fn issuer_trusted(&self, identity: &Identity) -> bool {
        if self.trusted_issuers.is_empty() {
            return true;
        }
        identity
            .issuer
            .as_deref()
            .is_some_and(|iss| self.trusted_issuers.iter().any(|t| t == iss))
    }

    /// Resolve the owner to stamp on new records.
    ///
    /// Returns `Ok(Some(subject))` for an accepted subject, `Ok(None)` for an
    /// allowed guest and [`CoreError::AuthenticationRequired`] otherwise.
    pub fn resolve_owner(&self, identity: &Identity) -> Result<Option<String>> {
        if let Some(subject) = identity.subject.as_deref().filter(|s| !s.is_empty())
            && self.issuer_trusted(identity)
        {
            return Ok(Some(subject.to_string()));
        }

        if identity.kind == CallerKind::Guest && self.allow_guest_writes {
            return Ok(None);
        }

        Err(CoreError::AuthenticationRequired)
    }
}
