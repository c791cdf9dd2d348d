//! Transport-neutral mutation exchanged with the sync server.

use crate::{Mutation, RemoteId};
use serde::{Deserialize, Serialize};

/// Resource tag for page and ayah bookmarks.
pub const BOOKMARK: &str = "BOOKMARK";
/// Resource tag for named collections.
pub const COLLECTION: &str = "COLLECTION";
/// Resource tag for bookmark-to-collection associations.
pub const COLLECTION_BOOKMARK: &str = "COLLECTION_BOOKMARK";
/// Resource tag for text notes.
pub const NOTE: &str = "NOTE";

/// A mutation as it crosses the network boundary.
///
/// Every resource type has a codec translating between this form and its
/// typed [`RemoteModelMutation`](crate::RemoteModelMutation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMutation {
    /// Resource tag, e.g. `BOOKMARK`
    pub resource: String,
    /// Server-assigned identifier; absent for creations not yet acknowledged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<RemoteId>,
    #[serde(rename = "type")]
    pub mutation: Mutation,
    /// Resource-specific payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Server timestamp in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl SyncMutation {
    pub fn new(resource: impl Into<String>, mutation: Mutation) -> Self {
        Self {
            resource: resource.into(),
            resource_id: None,
            mutation,
            data: None,
            timestamp: None,
        }
    }

    pub fn with_resource_id(mut self, id: impl Into<RemoteId>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
