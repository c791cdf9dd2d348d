//! Translation between [`SyncMutation`] and typed model mutations.
//!
//! Each resource has one codec. Decoding turns a server mutation into a
//! [`RemoteModelMutation`]; encoding turns a pending local mutation into the
//! wire form pushed to the server.

use crate::error::{Error, Result};
use crate::resource::{Bookmark, Collection, CollectionBookmark, Note, VerseRange};
use crate::wire::{BOOKMARK, COLLECTION, COLLECTION_BOOKMARK, NOTE};
use crate::{LocalModelMutation, Mutation, RemoteModelMutation, SyncModel, SyncMutation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mushaf used when a payload does not name one.
pub const DEFAULT_MUSHAF: u32 = 1;

/// Wire codec for one resource type.
pub trait ResourceCodec: Send + Sync {
    type Model: SyncModel;

    /// Resource tag carried by every mutation of this type.
    fn resource(&self) -> &'static str;

    fn decode_payload(&self, data: &Value) -> Result<Self::Model>;

    fn encode_payload(&self, model: &Self::Model) -> Result<Value>;

    /// Decode a server mutation.
    ///
    /// A deletion is matched against local mutations through its remote id
    /// only, so a missing or partial payload yields the degenerate model.
    fn decode_remote(&self, mutation: &SyncMutation) -> Result<RemoteModelMutation<Self::Model>> {
        if mutation.resource != self.resource() {
            return Err(Error::UnexpectedResource {
                expected: self.resource().to_string(),
                got: mutation.resource.clone(),
            });
        }
        let remote_id = mutation
            .resource_id
            .clone()
            .ok_or_else(|| Error::MissingRemoteId {
                resource: self.resource().to_string(),
            })?;

        let data = mutation.data.as_ref().filter(|data| !data.is_null());
        let model = match (data, mutation.mutation) {
            (data, Mutation::Deleted) => data
                .and_then(|data| self.decode_payload(data).ok())
                .unwrap_or_default(),
            (Some(data), _) => self.decode_payload(data)?,
            (None, _) => return Err(Error::invalid_payload(self.resource(), "missing data")),
        };

        Ok(RemoteModelMutation::new(model, remote_id, mutation.mutation))
    }

    /// Encode a pending local mutation for the push request.
    ///
    /// A creation that already carries a remote id is a normalized local
    /// edit and is sent as an update of that resource.
    fn encode_local(&self, local: &LocalModelMutation<Self::Model>) -> Result<SyncMutation> {
        let wire = match (local.mutation.normalized(), &local.remote_id) {
            (Mutation::Deleted, remote_id) => {
                let mut wire = SyncMutation::new(self.resource(), Mutation::Deleted);
                wire.resource_id = remote_id.clone();
                wire
            }
            (_, Some(remote_id)) => SyncMutation::new(self.resource(), Mutation::Modified)
                .with_resource_id(remote_id.clone())
                .with_data(self.encode_payload(&local.model)?),
            (_, None) => SyncMutation::new(self.resource(), Mutation::Created)
                .with_data(self.encode_payload(&local.model)?),
        };
        Ok(wire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BookmarkType {
    Page,
    Ayah,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookmarkPayload {
    #[serde(rename = "type")]
    kind: BookmarkType,
    /// Page number, or sura number for ayah bookmarks
    key: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verse_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mushaf: Option<u32>,
}

fn bookmark_from_parts(
    resource: &str,
    kind: BookmarkType,
    key: u32,
    verse_number: Option<u32>,
) -> Result<Bookmark> {
    match kind {
        BookmarkType::Page => Ok(Bookmark::page(key)),
        BookmarkType::Ayah => {
            let ayah = verse_number
                .ok_or_else(|| Error::invalid_payload(resource, "ayah bookmark without verseNumber"))?;
            Ok(Bookmark::ayah(key, ayah))
        }
    }
}

fn bookmark_parts(bookmark: &Bookmark) -> (BookmarkType, u32, Option<u32>) {
    match bookmark {
        Bookmark::Page { page } => (BookmarkType::Page, *page, None),
        Bookmark::Ayah { sura, ayah } => (BookmarkType::Ayah, *sura, Some(*ayah)),
    }
}

/// Codec for `BOOKMARK` mutations.
#[derive(Debug, Clone, Copy)]
pub struct BookmarkCodec {
    mushaf: u32,
}

impl BookmarkCodec {
    pub fn new(mushaf: u32) -> Self {
        Self { mushaf }
    }
}

impl Default for BookmarkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MUSHAF)
    }
}

impl ResourceCodec for BookmarkCodec {
    type Model = Bookmark;

    fn resource(&self) -> &'static str {
        BOOKMARK
    }

    fn decode_payload(&self, data: &Value) -> Result<Bookmark> {
        let payload = BookmarkPayload::deserialize(data)
            .map_err(|e| Error::invalid_payload(BOOKMARK, e))?;
        bookmark_from_parts(BOOKMARK, payload.kind, payload.key, payload.verse_number)
    }

    fn encode_payload(&self, model: &Bookmark) -> Result<Value> {
        let (kind, key, verse_number) = bookmark_parts(model);
        serde_json::to_value(BookmarkPayload {
            kind,
            key,
            verse_number,
            mushaf: Some(self.mushaf),
        })
        .map_err(|e| Error::invalid_payload(BOOKMARK, e))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectionPayload {
    name: String,
}

/// Codec for `COLLECTION` mutations.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionCodec;

impl ResourceCodec for CollectionCodec {
    type Model = Collection;

    fn resource(&self) -> &'static str {
        COLLECTION
    }

    fn decode_payload(&self, data: &Value) -> Result<Collection> {
        let payload = CollectionPayload::deserialize(data)
            .map_err(|e| Error::invalid_payload(COLLECTION, e))?;
        Ok(Collection::new(payload.name))
    }

    fn encode_payload(&self, model: &Collection) -> Result<Value> {
        serde_json::to_value(CollectionPayload {
            name: model.name.clone(),
        })
        .map_err(|e| Error::invalid_payload(COLLECTION, e))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionBookmarkPayload {
    collection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bookmark_id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<BookmarkType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verse_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mushaf: Option<u32>,
}

/// A collection-bookmark payload whose bookmark may still need resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionBookmarkRef {
    pub collection_id: String,
    pub bookmark_id: Option<String>,
    /// Present when the payload inlines the bookmark's fields
    pub bookmark: Option<Bookmark>,
}

impl CollectionBookmarkRef {
    /// Complete the reference with a bookmark found elsewhere.
    pub fn resolve(self, bookmark: Bookmark) -> CollectionBookmark {
        CollectionBookmark {
            collection_id: self.collection_id,
            bookmark_id: self.bookmark_id,
            bookmark,
        }
    }
}

/// Codec for `COLLECTION_BOOKMARK` mutations.
#[derive(Debug, Clone, Copy)]
pub struct CollectionBookmarkCodec {
    mushaf: u32,
}

impl CollectionBookmarkCodec {
    pub fn new(mushaf: u32) -> Self {
        Self { mushaf }
    }

    /// Decode the payload without requiring the bookmark to be inlined.
    pub fn decode_reference(&self, data: &Value) -> Result<CollectionBookmarkRef> {
        let payload = CollectionBookmarkPayload::deserialize(data)
            .map_err(|e| Error::invalid_payload(COLLECTION_BOOKMARK, e))?;
        let bookmark = match (payload.kind, payload.key) {
            (Some(kind), Some(key)) => Some(bookmark_from_parts(
                COLLECTION_BOOKMARK,
                kind,
                key,
                payload.verse_number,
            )?),
            _ => None,
        };
        Ok(CollectionBookmarkRef {
            collection_id: payload.collection_id,
            bookmark_id: payload.bookmark_id,
            bookmark,
        })
    }
}

impl Default for CollectionBookmarkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MUSHAF)
    }
}

impl ResourceCodec for CollectionBookmarkCodec {
    type Model = CollectionBookmark;

    fn resource(&self) -> &'static str {
        COLLECTION_BOOKMARK
    }

    fn decode_payload(&self, data: &Value) -> Result<CollectionBookmark> {
        let CollectionBookmarkRef {
            collection_id,
            bookmark_id,
            bookmark,
        } = self.decode_reference(data)?;
        match bookmark {
            Some(bookmark) => Ok(CollectionBookmark {
                collection_id,
                bookmark_id,
                bookmark,
            }),
            None => Err(Error::UnresolvedBookmark { bookmark_id }),
        }
    }

    fn encode_payload(&self, model: &CollectionBookmark) -> Result<Value> {
        let (kind, key, verse_number) = bookmark_parts(&model.bookmark);
        serde_json::to_value(CollectionBookmarkPayload {
            collection_id: model.collection_id.clone(),
            bookmark_id: model.bookmark_id.clone(),
            kind: Some(kind),
            key: Some(key),
            verse_number,
            mushaf: Some(self.mushaf),
        })
        .map_err(|e| Error::invalid_payload(COLLECTION_BOOKMARK, e))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NotePayload {
    body: String,
    #[serde(default)]
    ranges: Vec<String>,
}

/// Codec for `NOTE` mutations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteCodec;

impl ResourceCodec for NoteCodec {
    type Model = Note;

    fn resource(&self) -> &'static str {
        NOTE
    }

    fn decode_payload(&self, data: &Value) -> Result<Note> {
        let payload =
            NotePayload::deserialize(data).map_err(|e| Error::invalid_payload(NOTE, e))?;
        let ranges = payload
            .ranges
            .iter()
            .map(|r| r.parse::<VerseRange>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::invalid_payload(NOTE, e))?;
        Ok(Note::new(payload.body, ranges))
    }

    fn encode_payload(&self, model: &Note) -> Result<Value> {
        serde_json::to_value(NotePayload {
            body: model.body.clone(),
            ranges: model.ranges.iter().map(ToString::to_string).collect(),
        })
        .map_err(|e| Error::invalid_payload(NOTE, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::VerseRef;
    use serde_json::json;

    #[test]
    fn decode_page_and_ayah_bookmarks() {
        let codec = BookmarkCodec::default();

        let page = SyncMutation::new(BOOKMARK, Mutation::Created)
            .with_resource_id("bm-1")
            .with_data(json!({"type": "page", "key": 10, "mushaf": 1}));
        let decoded = codec.decode_remote(&page).unwrap();
        assert_eq!(decoded.model, Bookmark::page(10));
        assert_eq!(decoded.remote_id, "bm-1");

        let ayah = SyncMutation::new(BOOKMARK, Mutation::Modified)
            .with_resource_id("bm-2")
            .with_data(json!({"type": "ayah", "key": 2, "verseNumber": 255}));
        let decoded = codec.decode_remote(&ayah).unwrap();
        assert_eq!(decoded.model, Bookmark::ayah(2, 255));
        assert_eq!(decoded.mutation, Mutation::Modified);
    }

    #[test]
    fn ayah_bookmark_requires_verse_number() {
        let codec = BookmarkCodec::default();
        let mutation = SyncMutation::new(BOOKMARK, Mutation::Created)
            .with_resource_id("bm-1")
            .with_data(json!({"type": "ayah", "key": 2}));
        assert!(matches!(
            codec.decode_remote(&mutation),
            Err(Error::InvalidPayload { .. })
        ));
    }

    #[test]
    fn deletion_without_data_is_degenerate() {
        let codec = BookmarkCodec::default();
        let mutation = SyncMutation::new(BOOKMARK, Mutation::Deleted).with_resource_id("bm-7");
        let decoded = codec.decode_remote(&mutation).unwrap();
        assert_eq!(decoded.model, Bookmark::default());
        assert_eq!(decoded.remote_id, "bm-7");
    }

    #[test]
    fn deletion_with_partial_data_is_degenerate() {
        let codec = BookmarkCodec::default();
        for data in [json!({"mushaf": 1}), json!({})] {
            let mutation = SyncMutation::new(BOOKMARK, Mutation::Deleted)
                .with_resource_id("bm-7")
                .with_data(data);
            let decoded = codec.decode_remote(&mutation).unwrap();
            assert_eq!(decoded.model, Bookmark::default());
            assert_eq!(decoded.mutation, Mutation::Deleted);
        }

        // A complete payload on a deletion is still decoded.
        let full = SyncMutation::new(BOOKMARK, Mutation::Deleted)
            .with_resource_id("bm-8")
            .with_data(json!({"type": "page", "key": 12}));
        assert_eq!(codec.decode_remote(&full).unwrap().model, Bookmark::page(12));
    }

    #[test]
    fn creation_with_partial_data_is_rejected() {
        let codec = BookmarkCodec::default();
        let mutation = SyncMutation::new(BOOKMARK, Mutation::Created)
            .with_resource_id("bm-1")
            .with_data(json!({"mushaf": 1}));
        assert!(matches!(
            codec.decode_remote(&mutation),
            Err(Error::InvalidPayload { .. })
        ));
    }

    #[test]
    fn creation_without_data_is_rejected() {
        let codec = CollectionCodec;
        let mutation = SyncMutation::new(COLLECTION, Mutation::Created).with_resource_id("c-1");
        assert!(codec.decode_remote(&mutation).is_err());
    }

    #[test]
    fn missing_resource_id_is_rejected() {
        let codec = CollectionCodec;
        let mutation =
            SyncMutation::new(COLLECTION, Mutation::Created).with_data(json!({"name": "x"}));
        assert_eq!(
            codec.decode_remote(&mutation),
            Err(Error::MissingRemoteId {
                resource: COLLECTION.to_string()
            })
        );
    }

    #[test]
    fn wrong_resource_is_rejected() {
        let codec = NoteCodec;
        let mutation = SyncMutation::new(COLLECTION, Mutation::Deleted).with_resource_id("c-1");
        assert!(matches!(
            codec.decode_remote(&mutation),
            Err(Error::UnexpectedResource { .. })
        ));
    }

    #[test]
    fn encode_local_kinds() {
        let codec = BookmarkCodec::new(4);

        let created = LocalModelMutation::created(Bookmark::page(30), "l-1");
        let wire = codec.encode_local(&created).unwrap();
        assert_eq!(wire.mutation, Mutation::Created);
        assert_eq!(wire.resource_id, None);
        assert_eq!(
            wire.data,
            Some(json!({"type": "page", "key": 30, "mushaf": 4}))
        );

        let deleted = LocalModelMutation::deleted(Bookmark::page(30), "l-1", "bm-1");
        let wire = codec.encode_local(&deleted).unwrap();
        assert_eq!(wire.mutation, Mutation::Deleted);
        assert_eq!(wire.resource_id.as_deref(), Some("bm-1"));
        assert_eq!(wire.data, None);

        let edited = LocalModelMutation::new(
            Bookmark::ayah(1, 1),
            "l-2",
            Some("bm-2".into()),
            Mutation::Created,
        );
        let wire = codec.encode_local(&edited).unwrap();
        assert_eq!(wire.mutation, Mutation::Modified);
        assert_eq!(wire.resource_id.as_deref(), Some("bm-2"));
    }

    #[test]
    fn collection_bookmark_reference_without_inline_bookmark() {
        let codec = CollectionBookmarkCodec::default();
        let data = json!({"collectionId": "col-1", "bookmarkId": "bm-3"});

        let reference = codec.decode_reference(&data).unwrap();
        assert_eq!(reference.bookmark, None);
        assert_eq!(reference.bookmark_id.as_deref(), Some("bm-3"));

        assert_eq!(
            codec.decode_payload(&data),
            Err(Error::UnresolvedBookmark {
                bookmark_id: Some("bm-3".into())
            })
        );

        let resolved = reference.resolve(Bookmark::page(3));
        assert_eq!(resolved.collection_id, "col-1");
        assert_eq!(resolved.bookmark, Bookmark::page(3));
    }

    #[test]
    fn collection_bookmark_inline_payload() {
        let codec = CollectionBookmarkCodec::default();
        let model = CollectionBookmark::new("col-1", Bookmark::ayah(18, 10)).with_bookmark_id("bm-1");
        let encoded = codec.encode_payload(&model).unwrap();
        assert_eq!(
            encoded,
            json!({
                "collectionId": "col-1",
                "bookmarkId": "bm-1",
                "type": "ayah",
                "key": 18,
                "verseNumber": 10,
                "mushaf": 1
            })
        );
        assert_eq!(codec.decode_payload(&encoded).unwrap(), model);

        let wire = SyncMutation::new(COLLECTION_BOOKMARK, Mutation::Created)
            .with_resource_id("cb-1")
            .with_data(encoded);
        let decoded = codec.decode_remote(&wire).unwrap();
        assert_eq!(decoded.model.bookmark, Bookmark::ayah(18, 10));
        assert_eq!(decoded.model.bookmark_id.as_deref(), Some("bm-1"));
    }

    #[test]
    fn note_payload() {
        let codec = NoteCodec;
        let data = json!({"body": "reflect", "ranges": ["2:255-2:257", "3:1"]});
        let note = codec.decode_payload(&data).unwrap();
        assert_eq!(note.body, "reflect");
        assert_eq!(note.ranges[0].end, VerseRef::new(2, 257));
        assert_eq!(note.ranges[1], VerseRange::single(VerseRef::new(3, 1)));

        assert_eq!(
            codec.encode_payload(&note).unwrap(),
            json!({"body": "reflect", "ranges": ["2:255-2:257", "3:1-3:1"]})
        );

        let bad = json!({"body": "x", "ranges": ["nope"]});
        assert!(codec.decode_payload(&bad).is_err());
    }
}
