//! Remote mutation decoding with optional foreign-key lookups.

use std::sync::Arc;

use async_trait::async_trait;
use marginalia_engine::wire::BOOKMARK;
use marginalia_engine::{
    Bookmark, BookmarkCodec, CollectionBookmark, CollectionBookmarkCodec, Error as EngineError,
    RemoteModelMutation, ResourceCodec, SyncModel, SyncMutation,
};
use tracing::debug;

use crate::error::Result;
use crate::ports::LocalDataFetcher;

/// Turns a wire mutation into a typed remote mutation.
///
/// `batch` is the whole remote batch the mutation arrived in, available to
/// decoders that resolve references against other resource types.
#[async_trait]
pub trait RemoteDecoder<M: SyncModel>: Send + Sync {
    async fn decode(
        &self,
        mutation: &SyncMutation,
        batch: &[SyncMutation],
    ) -> Result<RemoteModelMutation<M>>;
}

/// Decodes through the resource codec alone.
pub struct CodecDecoder<C> {
    codec: Arc<C>,
}

impl<C> CodecDecoder<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl<C: ResourceCodec> RemoteDecoder<C::Model> for CodecDecoder<C> {
    async fn decode(
        &self,
        mutation: &SyncMutation,
        _batch: &[SyncMutation],
    ) -> Result<RemoteModelMutation<C::Model>> {
        Ok(self.codec.decode_remote(mutation)?)
    }
}

/// Decoder for collection bookmarks whose payload only names the bookmark.
///
/// The bookmark is looked up in the same remote batch first, then in local
/// storage.
pub struct CollectionBookmarkDecoder {
    codec: CollectionBookmarkCodec,
    bookmark_codec: BookmarkCodec,
    bookmarks: Arc<dyn LocalDataFetcher<Bookmark>>,
}

impl CollectionBookmarkDecoder {
    pub fn new(
        codec: CollectionBookmarkCodec,
        bookmark_codec: BookmarkCodec,
        bookmarks: Arc<dyn LocalDataFetcher<Bookmark>>,
    ) -> Self {
        Self {
            codec,
            bookmark_codec,
            bookmarks,
        }
    }

    fn find_in_batch(&self, bookmark_id: &str, batch: &[SyncMutation]) -> Option<Bookmark> {
        batch
            .iter()
            .filter(|m| m.resource == BOOKMARK && m.resource_id.as_deref() == Some(bookmark_id))
            .filter_map(|m| m.data.as_ref())
            .find_map(|data| self.bookmark_codec.decode_payload(data).ok())
    }

    async fn lookup(&self, bookmark_id: &str, batch: &[SyncMutation]) -> Result<Option<Bookmark>> {
        if let Some(bookmark) = self.find_in_batch(bookmark_id, batch) {
            debug!(bookmark_id, "Resolved bookmark from remote batch");
            return Ok(Some(bookmark));
        }
        let local = self.bookmarks.fetch_local_model(bookmark_id).await?;
        if local.is_some() {
            debug!(bookmark_id, "Resolved bookmark from local storage");
        }
        Ok(local)
    }
}

#[async_trait]
impl RemoteDecoder<CollectionBookmark> for CollectionBookmarkDecoder {
    async fn decode(
        &self,
        mutation: &SyncMutation,
        batch: &[SyncMutation],
    ) -> Result<RemoteModelMutation<CollectionBookmark>> {
        let bookmark_id = match self.codec.decode_remote(mutation) {
            Ok(decoded) => return Ok(decoded),
            Err(EngineError::UnresolvedBookmark {
                bookmark_id: Some(id),
            }) => id,
            Err(err) => return Err(err.into()),
        };

        // decode_remote only reports an unresolved bookmark for payloads
        // that carry both an id and data.
        let (Some(data), Some(remote_id)) = (&mutation.data, &mutation.resource_id) else {
            return Err(EngineError::UnresolvedBookmark {
                bookmark_id: Some(bookmark_id),
            }
            .into());
        };
        let reference = self.codec.decode_reference(data)?;

        match self.lookup(&bookmark_id, batch).await? {
            Some(bookmark) => Ok(RemoteModelMutation::new(
                reference.resolve(bookmark),
                remote_id.clone(),
                mutation.mutation,
            )),
            None => Err(EngineError::UnresolvedBookmark {
                bookmark_id: Some(bookmark_id),
            }
            .into()),
        }
    }
}
