//! Permission grants between build roles and buckets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::LogicalId;

/// Access level a principal holds on a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Read,
    Write,
    ReadWrite,
}

impl AccessLevel {
    pub fn allows_read(self) -> bool {
        matches!(self, AccessLevel::Read | AccessLevel::ReadWrite)
    }

    pub fn allows_write(self) -> bool {
        matches!(self, AccessLevel::Write | AccessLevel::ReadWrite)
    }

    /// The narrowest level that allows everything either level allows.
    pub fn union(self, other: AccessLevel) -> AccessLevel {
        let read = self.allows_read() || other.allows_read();
        let write = self.allows_write() || other.allows_write();
        match (read, write) {
            (true, true) => AccessLevel::ReadWrite,
            (false, true) => AccessLevel::Write,
            _ => AccessLevel::Read,
        }
    }

    /// Whether this level allows at least what `other` allows.
    pub fn covers(self, other: AccessLevel) -> bool {
        self.union(other) == self
    }

    /// S3 actions implied by this level, reads first.
    pub fn s3_actions(self) -> Vec<&'static str> {
        let mut actions = Vec::new();
        if self.allows_read() {
            actions.extend(["s3:GetObject*", "s3:GetBucket*", "s3:List*"]);
        }
        if self.allows_write() {
            actions.extend(["s3:DeleteObject*", "s3:PutObject*", "s3:Abort*"]);
        }
        actions
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessLevel::Read => write!(f, "read"),
            AccessLevel::Write => write!(f, "write"),
            AccessLevel::ReadWrite => write!(f, "read_write"),
        }
    }
}

/// A single `(principal, bucket, level)` grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Role receiving access.
    pub principal: LogicalId,
    /// Bucket being accessed.
    pub bucket: LogicalId,
    pub level: AccessLevel,
}

/// Grants collected while a stack is declared.
///
/// Adding a grant never narrows access: a repeated `(principal, bucket)`
/// pair keeps the union of the old and new levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantSet {
    grants: BTreeMap<(LogicalId, LogicalId), AccessLevel>,
}

impl GrantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant and return the effective level for the pair.
    pub fn grant(
        &mut self,
        principal: &LogicalId,
        bucket: &LogicalId,
        level: AccessLevel,
    ) -> AccessLevel {
        let entry = self
            .grants
            .entry((principal.clone(), bucket.clone()))
            .or_insert(level);
        *entry = entry.union(level);
        *entry
    }

    pub fn level(&self, principal: &LogicalId, bucket: &LogicalId) -> Option<AccessLevel> {
        self.grants
            .get(&(principal.clone(), bucket.clone()))
            .copied()
    }

    /// All grants held by one principal, ordered by bucket.
    pub fn for_principal<'a>(&'a self, principal: &'a LogicalId) -> impl Iterator<Item = Grant> + 'a {
        self.iter().filter(move |g| &g.principal == principal)
    }

    pub fn iter(&self) -> impl Iterator<Item = Grant> + '_ {
        self.grants.iter().map(|((principal, bucket), level)| Grant {
            principal: principal.clone(),
            bucket: bucket.clone(),
            level: *level,
        })
    }

    /// Fold every grant of `other` into this set.
    pub fn extend(&mut self, other: &GrantSet) {
        for grant in other.iter() {
            self.grant(&grant.principal, &grant.bucket, grant.level);
        }
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
