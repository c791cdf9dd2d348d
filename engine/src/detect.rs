//! Conflict detection between local and remote mutation batches.
//!
//! # Algorithm
//!
//! 1. Group local mutations by conflict key
//! 2. Link every remote mutation to the local groups sharing its key, and to
//!    the local groups referencing its remote id
//! 3. Merge local groups linked through a common remote mutation
//! 4. Every merged group with at least one remote mutation is a conflict;
//!    everything else passes through untouched
//!
//! Every input mutation ends up in exactly one of the three output buckets.

use crate::{LocalModelMutation, RemoteId, RemoteModelMutation, SyncModel};
use std::collections::HashMap;

/// One maximal group of mutations, from both sides, about the same resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConflict<M> {
    pub local_mutations: Vec<LocalModelMutation<M>>,
    pub remote_mutations: Vec<RemoteModelMutation<M>>,
}

/// Output of [`ConflictDetector::detect`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictDetectionResult<M> {
    pub conflicts: Vec<ResourceConflict<M>>,
    pub non_conflicting_remote: Vec<RemoteModelMutation<M>>,
    pub non_conflicting_local: Vec<LocalModelMutation<M>>,
}

impl<M> ConflictDetectionResult<M> {
    fn empty() -> Self {
        Self {
            conflicts: Vec::new(),
            non_conflicting_remote: Vec::new(),
            non_conflicting_local: Vec::new(),
        }
    }
}

/// Minimal union-find over local group indices.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Joins two sets; the smaller root survives so roots stay in first-seen order.
    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            let (keep, drop) = if a < b { (a, b) } else { (b, a) };
            self.parent[drop] = keep;
        }
    }
}

/// Groups mutations that reference the same logical resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn detect<M: SyncModel>(
        remote: Vec<RemoteModelMutation<M>>,
        local: Vec<LocalModelMutation<M>>,
    ) -> ConflictDetectionResult<M> {
        // Local groups by key, in first-seen order.
        let mut group_of_key: HashMap<M::Key, usize> = HashMap::new();
        let mut local_group: Vec<usize> = Vec::with_capacity(local.len());
        for mutation in &local {
            let next = group_of_key.len();
            let group = *group_of_key
                .entry(mutation.model.conflict_key())
                .or_insert(next);
            local_group.push(group);
        }
        let group_count = group_of_key.len();

        let mut groups_of_remote_id: HashMap<&RemoteId, Vec<usize>> = HashMap::new();
        for (mutation, &group) in local.iter().zip(&local_group) {
            if let Some(remote_id) = &mutation.remote_id {
                let groups = groups_of_remote_id.entry(remote_id).or_default();
                if !groups.contains(&group) {
                    groups.push(group);
                }
            }
        }

        let mut sets = DisjointSet::new(group_count);
        let mut remote_owner: Vec<Option<usize>> = Vec::with_capacity(remote.len());
        for mutation in &remote {
            let mut linked: Vec<usize> = Vec::new();
            if let Some(&group) = group_of_key.get(&mutation.model.conflict_key()) {
                linked.push(group);
            }
            if let Some(groups) = groups_of_remote_id.get(&mutation.remote_id) {
                linked.extend(groups.iter().copied());
            }

            if let Some((&first, rest)) = linked.split_first() {
                for &other in rest {
                    sets.union(first, other);
                }
                remote_owner.push(Some(first));
            } else {
                remote_owner.push(None);
            }
        }

        let roots: Vec<usize> = (0..group_count).map(|g| sets.find(g)).collect();
        let mut has_remote = vec![false; group_count];
        for owner in remote_owner.iter().flatten() {
            has_remote[roots[*owner]] = true;
        }

        // Conflicts are emitted in order of their first local group.
        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut result = ConflictDetectionResult::empty();
        for &root in &roots {
            if has_remote[root] && !slot_of_root.contains_key(&root) {
                slot_of_root.insert(root, result.conflicts.len());
                result.conflicts.push(ResourceConflict {
                    local_mutations: Vec::new(),
                    remote_mutations: Vec::new(),
                });
            }
        }

        for (mutation, group) in local.into_iter().zip(local_group) {
            match slot_of_root.get(&roots[group]) {
                Some(&slot) => result.conflicts[slot].local_mutations.push(mutation),
                None => result.non_conflicting_local.push(mutation),
            }
        }

        for (mutation, owner) in remote.into_iter().zip(remote_owner) {
            let slot = owner.and_then(|group| slot_of_root.get(&roots[group]).copied());
            match slot {
                Some(slot) => result.conflicts[slot].remote_mutations.push(mutation),
                None => result.non_conflicting_remote.push(mutation),
            }
        }

        result
    }
}
