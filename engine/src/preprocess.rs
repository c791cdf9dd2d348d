//! Validation and normalization of raw mutation batches.
//!
//! Local and remote batches are cleaned up before conflict detection:
//!
//! - Local: `MODIFIED` becomes `CREATED`, then each conflict-key group is
//!   checked against the resource's [`LocalValidation`] rules. Violations are
//!   errors, never silently dropped.
//! - Remote: `MODIFIED` becomes `CREATED`, and deletions of resources the
//!   local side never had are dropped. The existence lookup itself is I/O and
//!   happens outside the engine; [`RemotePreprocessor::apply`] takes its answer.

use crate::error::{Error, Result};
use crate::{LocalModelMutation, Mutation, RemoteId, RemoteModelMutation, SyncModel};
use std::collections::{HashMap, HashSet};

/// Rules enforced on one resource's local mutation journal.
///
/// Each rule can be switched independently: resources whose journals are
/// compacted by the storage layer only need the remote-id rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalValidation {
    /// Maximum mutations allowed for one conflict key
    pub max_per_key: Option<usize>,
    /// At most one `DELETED` per key
    pub single_delete: bool,
    /// At most one `CREATED` per key
    pub single_create: bool,
    /// Reject a `CREATED` immediately followed by a `DELETED` for the same key
    pub forbid_create_then_delete: bool,
    /// Every `DELETED` must carry a remote id
    pub delete_requires_remote_id: bool,
}

impl LocalValidation {
    /// Full rule set, used for bookmarks.
    pub const fn strict() -> Self {
        Self {
            max_per_key: Some(2),
            single_delete: true,
            single_create: true,
            forbid_create_then_delete: true,
            delete_requires_remote_id: true,
        }
    }

    /// Only the remote-id rule, for journals already compacted to final state.
    pub const fn compacted() -> Self {
        Self {
            max_per_key: None,
            single_delete: false,
            single_create: false,
            forbid_create_then_delete: false,
            delete_requires_remote_id: true,
        }
    }

    fn needs_grouping(&self) -> bool {
        self.max_per_key.is_some()
            || self.single_delete
            || self.single_create
            || self.forbid_create_then_delete
    }
}

impl Default for LocalValidation {
    fn default() -> Self {
        Self::strict()
    }
}

/// Normalizes and validates a local mutation batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPreprocessor {
    rules: LocalValidation,
}

impl LocalPreprocessor {
    pub fn new(rules: LocalValidation) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> LocalValidation {
        self.rules
    }

    /// Returns the batch with `MODIFIED` normalized, in input order.
    pub fn preprocess<M: SyncModel>(
        &self,
        mutations: Vec<LocalModelMutation<M>>,
    ) -> Result<Vec<LocalModelMutation<M>>> {
        let mutations: Vec<_> = mutations
            .into_iter()
            .map(|mut m| {
                m.mutation = m.mutation.normalized();
                m
            })
            .collect();

        if self.rules.delete_requires_remote_id {
            if let Some(orphan) = mutations
                .iter()
                .find(|m| m.mutation == Mutation::Deleted && m.remote_id.is_none())
            {
                return Err(Error::DeletionWithoutRemoteId {
                    local_id: orphan.local_id.clone(),
                });
            }
        }

        if self.rules.needs_grouping() {
            for (key, group) in group_by_key(&mutations) {
                self.validate_group::<M>(&key, &group[..])?;
            }
        }

        Ok(mutations)
    }

    fn validate_group<M: SyncModel>(
        &self,
        key: &M::Key,
        group: &[&LocalModelMutation<M>],
    ) -> Result<()> {
        let invalid = |reason: String| Error::InvalidLocalMutations {
            key: format!("{key:?}"),
            reason,
        };

        if let Some(max) = self.rules.max_per_key {
            if group.len() > max {
                return Err(invalid(format!(
                    "expected at most {max} mutations, found {}",
                    group.len()
                )));
            }
        }

        let deletes = count(group, Mutation::Deleted);
        if self.rules.single_delete && deletes > 1 {
            return Err(invalid(format!("found {deletes} deletions")));
        }

        let creates = count(group, Mutation::Created);
        if self.rules.single_create && creates > 1 {
            return Err(invalid(format!("found {creates} creations")));
        }

        if self.rules.forbid_create_then_delete
            && group
                .windows(2)
                .any(|w| w[0].mutation == Mutation::Created && w[1].mutation == Mutation::Deleted)
        {
            return Err(invalid(
                "creation followed by deletion, two records share this key".to_string(),
            ));
        }

        Ok(())
    }
}

fn count<M>(group: &[&LocalModelMutation<M>], kind: Mutation) -> usize {
    group.iter().filter(|m| m.mutation == kind).count()
}

/// Groups mutations by conflict key, keeping first-seen key order and input
/// order within each group.
fn group_by_key<M: SyncModel>(
    mutations: &[LocalModelMutation<M>],
) -> Vec<(M::Key, Vec<&LocalModelMutation<M>>)> {
    let mut index: HashMap<M::Key, usize> = HashMap::new();
    let mut groups: Vec<(M::Key, Vec<&LocalModelMutation<M>>)> = Vec::new();

    for mutation in mutations {
        let key = mutation.model.conflict_key();
        match index.get(&key) {
            Some(&i) => groups[i].1.push(mutation),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![mutation]));
            }
        }
    }

    groups
}

/// Normalizes a remote mutation batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemotePreprocessor;

impl RemotePreprocessor {
    /// Remote ids of deletions whose local existence must be checked,
    /// deduplicated, in input order.
    pub fn deletion_ids<M>(mutations: &[RemoteModelMutation<M>]) -> Vec<RemoteId> {
        let mut seen = HashSet::new();
        mutations
            .iter()
            .filter(|m| m.mutation == Mutation::Deleted)
            .filter(|m| seen.insert(m.remote_id.as_str()))
            .map(|m| m.remote_id.clone())
            .collect()
    }

    /// Applies the existence answer for [`deletion_ids`](Self::deletion_ids).
    ///
    /// Deletions whose id is reported absent, or missing from `existence`,
    /// are dropped. Modifications become creations. Order is preserved.
    pub fn apply<M>(
        mutations: Vec<RemoteModelMutation<M>>,
        existence: &HashMap<RemoteId, bool>,
    ) -> Vec<RemoteModelMutation<M>> {
        mutations
            .into_iter()
            .filter_map(|mut m| match m.mutation {
                Mutation::Deleted => existence
                    .get(&m.remote_id)
                    .copied()
                    .unwrap_or(false)
                    .then_some(m),
                Mutation::Modified => {
                    m.mutation = Mutation::Created;
                    Some(m)
                }
                Mutation::Created => Some(m),
            })
            .collect()
    }
}
