//! Per-resource sync adapters.
//!
//! An adapter wires one resource type's storage collaborators to the engine:
//! it builds a [`ResourceSyncPlan`] from the local journal and the remote
//! batch, and the plan finalizes the cycle once the push is acknowledged.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use marginalia_engine::{
    Bookmark, BookmarkCodec, Collection, CollectionBookmark, CollectionBookmarkCodec,
    CollectionCodec, LocalModelMutation, LocalPreprocessor, LocalValidation, Note, NoteCodec,
    Reconciler, RemoteModelMutation, RemotePreprocessor, ResourceCodec, SyncModel, SyncMutation,
};
use tracing::{debug, info, warn};

use crate::decode::{CodecDecoder, CollectionBookmarkDecoder, RemoteDecoder};
use crate::error::{Result, SyncError};
use crate::ports::{LocalDataFetcher, ResultNotifier, SyncToken};

/// Object-safe adapter contract consumed by the pipeline.
#[async_trait]
pub trait SyncResourceAdapter: Send + Sync {
    /// Wire resource tag handled by this adapter.
    fn resource(&self) -> &'static str;

    /// Reconcile the local journal against the remote batch.
    ///
    /// `remote` is the whole batch; mutations tagged for other resources are
    /// ignored.
    async fn build_plan(
        &self,
        last_modification: Option<SyncToken>,
        remote: &[SyncMutation],
    ) -> Result<Box<dyn ResourceSyncPlan>>;

    /// Report an unrecoverable failure for this resource type.
    async fn did_fail(&self, message: &str);
}

/// Outcome of [`SyncResourceAdapter::build_plan`], finalized after the push.
#[async_trait]
pub trait ResourceSyncPlan: Send + Sync {
    fn resource(&self) -> &'static str;

    /// Pending local mutations in wire form.
    fn mutations_to_push(&self) -> Vec<SyncMutation>;

    /// Persist the cycle's outcome.
    ///
    /// `pushed` holds the server's acknowledgements of
    /// [`mutations_to_push`](Self::mutations_to_push), in the order sent.
    async fn complete(&self, new_token: SyncToken, pushed: Vec<SyncMutation>) -> Result<()>;
}

/// Generic adapter, parameterized by the resource codec.
pub struct ResourceAdapter<C: ResourceCodec> {
    codec: Arc<C>,
    preprocessor: LocalPreprocessor,
    fetcher: Arc<dyn LocalDataFetcher<C::Model>>,
    notifier: Arc<dyn ResultNotifier<C::Model>>,
    decoder: Arc<dyn RemoteDecoder<C::Model>>,
}

impl<C: ResourceCodec + 'static> ResourceAdapter<C> {
    pub fn new(
        codec: C,
        rules: LocalValidation,
        fetcher: Arc<dyn LocalDataFetcher<C::Model>>,
        notifier: Arc<dyn ResultNotifier<C::Model>>,
    ) -> Self {
        let codec = Arc::new(codec);
        Self {
            decoder: Arc::new(CodecDecoder::new(Arc::clone(&codec))),
            codec,
            preprocessor: LocalPreprocessor::new(rules),
            fetcher,
            notifier,
        }
    }

    /// Replace the default codec-only decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn RemoteDecoder<C::Model>>) -> Self {
        self.decoder = decoder;
        self
    }
}

impl ResourceAdapter<BookmarkCodec> {
    pub fn bookmarks(
        mushaf: u32,
        fetcher: Arc<dyn LocalDataFetcher<Bookmark>>,
        notifier: Arc<dyn ResultNotifier<Bookmark>>,
    ) -> Self {
        Self::new(
            BookmarkCodec::new(mushaf),
            LocalValidation::strict(),
            fetcher,
            notifier,
        )
    }
}

impl ResourceAdapter<CollectionCodec> {
    pub fn collections(
        fetcher: Arc<dyn LocalDataFetcher<Collection>>,
        notifier: Arc<dyn ResultNotifier<Collection>>,
    ) -> Self {
        Self::new(CollectionCodec, LocalValidation::compacted(), fetcher, notifier)
    }
}

impl ResourceAdapter<CollectionBookmarkCodec> {
    /// `bookmarks` resolves bookmark references missing from the payload.
    pub fn collection_bookmarks(
        mushaf: u32,
        fetcher: Arc<dyn LocalDataFetcher<CollectionBookmark>>,
        notifier: Arc<dyn ResultNotifier<CollectionBookmark>>,
        bookmarks: Arc<dyn LocalDataFetcher<Bookmark>>,
    ) -> Self {
        let codec = CollectionBookmarkCodec::new(mushaf);
        let decoder = CollectionBookmarkDecoder::new(codec, BookmarkCodec::new(mushaf), bookmarks);
        Self::new(codec, LocalValidation::compacted(), fetcher, notifier)
            .with_decoder(Arc::new(decoder))
    }
}

impl ResourceAdapter<NoteCodec> {
    pub fn notes(
        fetcher: Arc<dyn LocalDataFetcher<Note>>,
        notifier: Arc<dyn ResultNotifier<Note>>,
    ) -> Self {
        Self::new(NoteCodec, LocalValidation::compacted(), fetcher, notifier)
    }
}

/// Decode the mutations tagged for `resource`, skipping those that fail.
async fn decode_batch<M: SyncModel>(
    decoder: &dyn RemoteDecoder<M>,
    resource: &'static str,
    mutations: &[SyncMutation],
    batch: &[SyncMutation],
) -> Vec<RemoteModelMutation<M>> {
    let mut decoded = Vec::new();
    for mutation in mutations.iter().filter(|m| m.resource == resource) {
        match decoder.decode(mutation, batch).await {
            Ok(remote) => decoded.push(remote),
            Err(e) => warn!(
                resource,
                resource_id = mutation.resource_id.as_deref().unwrap_or("-"),
                kind = ?mutation.mutation,
                error = %e,
                "Skipping undecodable remote mutation"
            ),
        }
    }
    decoded
}

/// Drop deletions unknown locally and normalize updates.
async fn preprocess_remote<M: SyncModel>(
    fetcher: &dyn LocalDataFetcher<M>,
    remote: Vec<RemoteModelMutation<M>>,
) -> Result<Vec<RemoteModelMutation<M>>> {
    let ids = RemotePreprocessor::deletion_ids(&remote);
    let existence = if ids.is_empty() {
        HashMap::new()
    } else {
        fetcher.check_local_existence(&ids).await?
    };
    Ok(RemotePreprocessor::apply(remote, &existence))
}

#[async_trait]
impl<C: ResourceCodec + 'static> SyncResourceAdapter for ResourceAdapter<C> {
    fn resource(&self) -> &'static str {
        self.codec.resource()
    }

    async fn build_plan(
        &self,
        last_modification: Option<SyncToken>,
        remote: &[SyncMutation],
    ) -> Result<Box<dyn ResourceSyncPlan>> {
        let resource = self.resource();

        let journal = self.fetcher.fetch_local_mutations(last_modification).await?;
        let local = self.preprocessor.preprocess(journal.clone())?;

        let decoded = decode_batch(self.decoder.as_ref(), resource, remote, remote).await;
        let remote = preprocess_remote(self.fetcher.as_ref(), decoded).await?;

        let resolution = Reconciler::reconcile(remote, local)?;
        let outbound = resolution
            .mutations_to_push
            .iter()
            .map(|local| self.codec.encode_local(local).map_err(SyncError::from))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            resource,
            journal = journal.len(),
            persist = resolution.mutations_to_persist.len(),
            push = outbound.len(),
            "Built sync plan"
        );

        Ok(Box::new(Plan {
            codec: Arc::clone(&self.codec),
            fetcher: Arc::clone(&self.fetcher),
            notifier: Arc::clone(&self.notifier),
            decoder: Arc::clone(&self.decoder),
            to_clear: journal,
            to_persist: resolution.mutations_to_persist,
            outbound,
        }))
    }

    async fn did_fail(&self, message: &str) {
        self.notifier.did_fail(message).await;
    }
}

struct Plan<C: ResourceCodec> {
    codec: Arc<C>,
    fetcher: Arc<dyn LocalDataFetcher<C::Model>>,
    notifier: Arc<dyn ResultNotifier<C::Model>>,
    decoder: Arc<dyn RemoteDecoder<C::Model>>,
    to_clear: Vec<LocalModelMutation<C::Model>>,
    to_persist: Vec<RemoteModelMutation<C::Model>>,
    /// Wire form of the local mutations left to push
    outbound: Vec<SyncMutation>,
}

impl<C: ResourceCodec> Plan<C> {
    /// Pair each acknowledgement with what was sent.
    ///
    /// Every acknowledgement must name the resource id the server assigned.
    /// Acknowledgements without a payload inherit the one that was sent.
    fn match_acknowledgements(&self, pushed: Vec<SyncMutation>) -> Result<Vec<SyncMutation>> {
        let resource = self.codec.resource();
        if pushed.len() != self.outbound.len() {
            return Err(SyncError::Protocol(format!(
                "{resource}: pushed {} mutations, {} acknowledged",
                self.outbound.len(),
                pushed.len()
            )));
        }

        self.outbound
            .iter()
            .zip(pushed)
            .enumerate()
            .map(|(index, (sent, mut ack))| {
                if ack.resource != resource {
                    return Err(SyncError::Protocol(format!(
                        "acknowledgement tagged {} for a {resource} mutation",
                        ack.resource
                    )));
                }
                if ack.resource_id.is_none() {
                    return Err(SyncError::Protocol(format!(
                        "{resource}: acknowledgement {index} has no resource id"
                    )));
                }
                if ack.data.is_none() {
                    ack.data = sent.data.clone();
                }
                Ok(ack)
            })
            .collect()
    }
}

#[async_trait]
impl<C: ResourceCodec + 'static> ResourceSyncPlan for Plan<C> {
    fn resource(&self) -> &'static str {
        self.codec.resource()
    }

    fn mutations_to_push(&self) -> Vec<SyncMutation> {
        self.outbound.clone()
    }

    async fn complete(&self, new_token: SyncToken, pushed: Vec<SyncMutation>) -> Result<()> {
        let resource = self.codec.resource();
        let acknowledged = self.match_acknowledgements(pushed)?;

        // Unlike the pulled batch, an acknowledgement that fails to decode
        // fails the resource: its journal entry must not be cleared.
        let mut decoded = Vec::with_capacity(acknowledged.len());
        for ack in &acknowledged {
            decoded.push(self.decoder.decode(ack, &acknowledged).await?);
        }
        let acknowledged = preprocess_remote(self.fetcher.as_ref(), decoded).await?;

        let mut to_persist = self.to_persist.clone();
        to_persist.extend(acknowledged);

        info!(
            resource,
            token = %new_token,
            persist = to_persist.len(),
            clear = self.to_clear.len(),
            "Completing resource sync"
        );

        self.notifier
            .did_succeed(new_token, to_persist, self.to_clear.clone())
            .await
    }
}
