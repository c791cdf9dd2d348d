//! Collaborator ports consumed by the sync client.
//!
//! Storage, authentication and the remote endpoint live outside this crate.
//! The client only talks to them through these traits, so every cycle can be
//! driven against in-memory fakes.
//!
//! ## Design Notes
//!
//! - Every call is an explicit suspension point; the reconciliation in
//!   `marginalia-engine` stays synchronous between them.
//! - Traits are object-safe and used as `Arc<dyn ...>`.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marginalia_engine::{LocalModelMutation, RemoteId, RemoteModelMutation, SyncModel, SyncMutation};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Headers attached verbatim to every sync request.
pub type AuthHeaders = HashMap<String, String>;

/// Watermark of the server's mutation log, in milliseconds.
///
/// Only mutations newer than the token are requested. It advances once per
/// fully successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(pub i64);

impl SyncToken {
    pub fn millis(self) -> i64 {
        self.0
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for SyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One page of the server's mutation log, or the acknowledgement of a push.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationsPage {
    pub last_mutation_at: SyncToken,
    pub mutations: Vec<SyncMutation>,
}

/// Local storage for one resource type.
#[async_trait]
pub trait LocalDataFetcher<M: SyncModel>: Send + Sync {
    /// Journal entries recorded since the given token.
    async fn fetch_local_mutations(
        &self,
        last_modified: Option<SyncToken>,
    ) -> Result<Vec<LocalModelMutation<M>>>;

    /// Whether each remote id is known locally.
    async fn check_local_existence(&self, remote_ids: &[RemoteId]) -> Result<HashMap<RemoteId, bool>>;

    /// Look up a stored model for foreign-key resolution.
    async fn fetch_local_model(&self, _remote_id: &str) -> Result<Option<M>> {
        Ok(None)
    }
}

/// Receives the outcome of a cycle for one resource type.
#[async_trait]
pub trait ResultNotifier<M: SyncModel>: Send + Sync {
    /// Persist and clear atomically. Returning an error fails the resource.
    async fn did_succeed(
        &self,
        new_token: SyncToken,
        mutations_to_persist: Vec<RemoteModelMutation<M>>,
        mutations_to_clear: Vec<LocalModelMutation<M>>,
    ) -> Result<()>;

    /// Must not mutate local state.
    async fn did_fail(&self, message: &str);
}

#[async_trait]
pub trait LocalModificationDateFetcher: Send + Sync {
    async fn local_last_modification_date(&self) -> Result<Option<SyncToken>>;
}

#[async_trait]
pub trait AuthenticationDataFetcher: Send + Sync {
    async fn fetch_authentication_headers(&self) -> Result<AuthHeaders>;

    async fn is_logged_in(&self) -> bool;
}

/// The remote sync endpoint.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn get_mutations(
        &self,
        since: Option<SyncToken>,
        headers: &AuthHeaders,
    ) -> Result<MutationsPage>;

    /// Push mutations; the acknowledgements come back in the order sent.
    async fn post_mutations(
        &self,
        mutations: &[SyncMutation],
        since: Option<SyncToken>,
        headers: &AuthHeaders,
    ) -> Result<MutationsPage>;
}
