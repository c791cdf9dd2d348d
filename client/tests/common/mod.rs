//! In-memory collaborators shared by the client integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use marginalia_client::{
    AuthHeaders, AuthenticationDataFetcher, LocalDataFetcher, LocalModificationDateFetcher,
    MutationsPage, Result, ResultNotifier, SyncError, SyncToken, SyncTransport,
};
use marginalia_engine::{
    LocalModelMutation, Mutation, RemoteId, RemoteModelMutation, SyncModel, SyncMutation,
};
use tokio::sync::{Notify, Semaphore};

// ============================================================================
// Storage
// ============================================================================

/// Journal, stored models and notifications for one resource type.
pub struct MemoryResource<M> {
    pub journal: Mutex<Vec<LocalModelMutation<M>>>,
    pub stored: Mutex<HashMap<RemoteId, M>>,
    pub persisted: Mutex<Vec<RemoteModelMutation<M>>>,
    pub cleared: Mutex<Vec<LocalModelMutation<M>>>,
    pub tokens: Mutex<Vec<SyncToken>>,
    pub failures: Mutex<Vec<String>>,
    pub fail_persist: AtomicBool,
}

impl<M: SyncModel> MemoryResource<M> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            journal: Mutex::new(Vec::new()),
            stored: Mutex::new(HashMap::new()),
            persisted: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            fail_persist: AtomicBool::new(false),
        })
    }

    pub fn with_journal(journal: Vec<LocalModelMutation<M>>) -> Arc<Self> {
        let resource = Self::new();
        *resource.journal.lock().unwrap() = journal;
        resource
    }

    pub fn store(&self, remote_id: &str, model: M) {
        self.stored
            .lock()
            .unwrap()
            .insert(remote_id.to_string(), model);
    }

    pub fn persisted(&self) -> Vec<RemoteModelMutation<M>> {
        self.persisted.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }

    pub fn tokens(&self) -> Vec<SyncToken> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl<M: SyncModel> LocalDataFetcher<M> for MemoryResource<M> {
    async fn fetch_local_mutations(
        &self,
        _last_modified: Option<SyncToken>,
    ) -> Result<Vec<LocalModelMutation<M>>> {
        Ok(self.journal.lock().unwrap().clone())
    }

    async fn check_local_existence(
        &self,
        remote_ids: &[RemoteId],
    ) -> Result<HashMap<RemoteId, bool>> {
        let stored = self.stored.lock().unwrap();
        Ok(remote_ids
            .iter()
            .map(|id| (id.clone(), stored.contains_key(id)))
            .collect())
    }

    async fn fetch_local_model(&self, remote_id: &str) -> Result<Option<M>> {
        Ok(self.stored.lock().unwrap().get(remote_id).cloned())
    }
}

#[async_trait]
impl<M: SyncModel> ResultNotifier<M> for MemoryResource<M> {
    async fn did_succeed(
        &self,
        new_token: SyncToken,
        persist: Vec<RemoteModelMutation<M>>,
        clear: Vec<LocalModelMutation<M>>,
    ) -> Result<()> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(SyncError::storage("database is locked"));
        }

        let mut stored = self.stored.lock().unwrap();
        for mutation in &persist {
            match mutation.mutation {
                Mutation::Deleted => {
                    stored.remove(&mutation.remote_id);
                }
                _ => {
                    stored.insert(mutation.remote_id.clone(), mutation.model.clone());
                }
            }
        }
        let mut journal = self.journal.lock().unwrap();
        journal.retain(|m| !clear.contains(m));

        self.persisted.lock().unwrap().extend(persist);
        self.cleared.lock().unwrap().extend(clear);
        self.tokens.lock().unwrap().push(new_token);
        Ok(())
    }

    async fn did_fail(&self, message: &str) {
        self.failures.lock().unwrap().push(message.to_string());
    }
}

// ============================================================================
// Authentication and dates
// ============================================================================

pub struct FakeAuth {
    pub logged_in: AtomicBool,
    pub fail_headers: AtomicBool,
}

impl FakeAuth {
    pub fn logged_in() -> Arc<Self> {
        Arc::new(Self {
            logged_in: AtomicBool::new(true),
            fail_headers: AtomicBool::new(false),
        })
    }

    pub fn logged_out() -> Arc<Self> {
        Arc::new(Self {
            logged_in: AtomicBool::new(false),
            fail_headers: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl AuthenticationDataFetcher for FakeAuth {
    async fn fetch_authentication_headers(&self) -> Result<AuthHeaders> {
        if self.fail_headers.load(Ordering::SeqCst) {
            return Err(SyncError::storage("keychain unavailable"));
        }
        Ok(HashMap::from([(
            "Authorization".to_string(),
            "Bearer test-token".to_string(),
        )]))
    }

    async fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }
}

pub struct FixedDate(pub Option<SyncToken>);

#[async_trait]
impl LocalModificationDateFetcher for FixedDate {
    async fn local_last_modification_date(&self) -> Result<Option<SyncToken>> {
        Ok(self.0)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Scripted server: serves a fixed remote batch and assigns ids to pushes.
pub struct FakeTransport {
    pub remote: Mutex<Vec<SyncMutation>>,
    pub server_token: Mutex<i64>,
    pub gets: Mutex<Vec<Option<SyncToken>>>,
    pub posts: Mutex<Vec<Vec<SyncMutation>>>,
    pub fail_get: AtomicBool,
    /// Drop one acknowledgement from every push response
    pub short_ack: AtomicBool,
    /// When set, every GET waits for a permit
    pub gate: Option<Arc<Semaphore>>,
    /// Notified when a GET starts
    pub entered: Arc<Notify>,
    next_id: AtomicUsize,
}

impl FakeTransport {
    pub fn new(remote: Vec<SyncMutation>) -> Arc<Self> {
        Arc::new(Self::build(remote, None))
    }

    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), Some(gate)))
    }

    fn build(remote: Vec<SyncMutation>, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            remote: Mutex::new(remote),
            server_token: Mutex::new(1_000),
            gets: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            fail_get: AtomicBool::new(false),
            short_ack: AtomicBool::new(false),
            gate,
            entered: Arc::new(Notify::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn gets(&self) -> Vec<Option<SyncToken>> {
        self.gets.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<Vec<SyncMutation>> {
        self.posts.lock().unwrap().clone()
    }

    fn advance(&self) -> SyncToken {
        let mut token = self.server_token.lock().unwrap();
        *token += 1;
        SyncToken(*token)
    }
}

#[async_trait]
impl SyncTransport for FakeTransport {
    async fn get_mutations(
        &self,
        since: Option<SyncToken>,
        _headers: &AuthHeaders,
    ) -> Result<MutationsPage> {
        self.gets.lock().unwrap().push(since);
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| SyncError::Protocol(e.to_string()))?;
            permit.forget();
        }

        if self.fail_get.load(Ordering::SeqCst) {
            return Err(SyncError::Server {
                status: 503,
                message: "maintenance".into(),
            });
        }

        Ok(MutationsPage {
            last_mutation_at: self.advance(),
            mutations: self.remote.lock().unwrap().clone(),
        })
    }

    async fn post_mutations(
        &self,
        mutations: &[SyncMutation],
        _since: Option<SyncToken>,
        _headers: &AuthHeaders,
    ) -> Result<MutationsPage> {
        self.posts.lock().unwrap().push(mutations.to_vec());

        let mut acks: Vec<SyncMutation> = mutations
            .iter()
            .map(|m| {
                let id = m.resource_id.clone().unwrap_or_else(|| {
                    format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
                });
                let kind = match m.mutation {
                    Mutation::Deleted => Mutation::Deleted,
                    _ => Mutation::Created,
                };
                SyncMutation::new(m.resource.clone(), kind).with_resource_id(id)
            })
            .collect();
        if self.short_ack.load(Ordering::SeqCst) {
            acks.pop();
        }

        Ok(MutationsPage {
            last_mutation_at: self.advance(),
            mutations: acks,
        })
    }
}
