//! Mutation types shared by every resource.
//!
//! Changes are exchanged as mutations, not as full record states. A local
//! mutation comes from the device's mutation journal; a remote mutation comes
//! from the server's authoritative mutation log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Identifier assigned to a record by the local store.
pub type LocalId = String;

/// Identifier assigned to a resource by the server.
pub type RemoteId = String;

/// Kind of change a mutation describes.
///
/// On the wire the kinds are spelled `CREATE`, `UPDATE` and `DELETE`. Any other
/// string fails deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mutation {
    #[serde(rename = "CREATE")]
    Created,
    #[serde(rename = "DELETE")]
    Deleted,
    #[serde(rename = "UPDATE")]
    Modified,
}

impl Mutation {
    /// Upserts are treated as creations once preprocessed.
    pub fn normalized(self) -> Self {
        match self {
            Mutation::Modified => Mutation::Created,
            other => other,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mutation::Created => "CREATED",
            Mutation::Deleted => "DELETED",
            Mutation::Modified => "MODIFIED",
        };
        f.write_str(name)
    }
}

/// A model that can be synchronized.
///
/// The conflict key identifies "the same logical resource" independently of
/// the server-assigned identifier. `Default` yields the degenerate model used
/// for remote deletions that carry no payload.
pub trait SyncModel: Clone + fmt::Debug + Default + PartialEq + Send + Sync + 'static {
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync;

    fn conflict_key(&self) -> Self::Key;
}

/// A change recorded in the local mutation journal.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalModelMutation<M> {
    pub model: M,
    pub local_id: LocalId,
    /// Present only if the record came from, or was matched to, a remote resource.
    pub remote_id: Option<RemoteId>,
    pub mutation: Mutation,
}

impl<M> LocalModelMutation<M> {
    pub fn new(
        model: M,
        local_id: impl Into<LocalId>,
        remote_id: Option<RemoteId>,
        mutation: Mutation,
    ) -> Self {
        Self {
            model,
            local_id: local_id.into(),
            remote_id,
            mutation,
        }
    }

    pub fn created(model: M, local_id: impl Into<LocalId>) -> Self {
        Self::new(model, local_id, None, Mutation::Created)
    }

    pub fn deleted(model: M, local_id: impl Into<LocalId>, remote_id: impl Into<RemoteId>) -> Self {
        Self::new(model, local_id, Some(remote_id.into()), Mutation::Deleted)
    }
}

/// One entry of the server's mutation log, scoped to one resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteModelMutation<M> {
    pub model: M,
    pub remote_id: RemoteId,
    pub mutation: Mutation,
}

impl<M> RemoteModelMutation<M> {
    pub fn new(model: M, remote_id: impl Into<RemoteId>, mutation: Mutation) -> Self {
        Self {
            model,
            remote_id: remote_id.into(),
            mutation,
        }
    }

    pub fn created(model: M, remote_id: impl Into<RemoteId>) -> Self {
        Self::new(model, remote_id, Mutation::Created)
    }

    pub fn deleted(model: M, remote_id: impl Into<RemoteId>) -> Self {
        Self::new(model, remote_id, Mutation::Deleted)
    }
}

/// Short human-readable listing of local mutations, used in error messages.
pub(crate) fn describe_local<M: fmt::Debug>(mutations: &[LocalModelMutation<M>]) -> String {
    let items: Vec<String> = mutations
        .iter()
        .map(|m| {
            format!(
                "{}({:?}, local={}, remote={})",
                m.mutation,
                m.model,
                m.local_id,
                m.remote_id.as_deref().unwrap_or("-")
            )
        })
        .collect();
    format!("[{}]", items.join(", "))
}

/// Short human-readable listing of remote mutations, used in error messages.
pub(crate) fn describe_remote<M: fmt::Debug>(mutations: &[RemoteModelMutation<M>]) -> String {
    let items: Vec<String> = mutations
        .iter()
        .map(|m| format!("{}({:?}, remote={})", m.mutation, m.model, m.remote_id))
        .collect();
    format!("[{}]", items.join(", "))
}
