//! Models for each synchronized resource type.
//!
//! Each model defines what "the same logical resource" means through its
//! conflict key. Variants are closed sum types so every per-variant site
//! (key extraction, wire encoding) is checked for exhaustiveness.

use crate::SyncModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A bookmark on a mushaf page or on a single ayah.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Bookmark {
    Page { page: u32 },
    Ayah { sura: u32, ayah: u32 },
}

/// Identity of a bookmark independent of its remote id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BookmarkKey {
    Page(u32),
    Ayah(u32, u32),
}

impl Bookmark {
    pub fn page(page: u32) -> Self {
        Bookmark::Page { page }
    }

    pub fn ayah(sura: u32, ayah: u32) -> Self {
        Bookmark::Ayah { sura, ayah }
    }

    pub fn key(&self) -> BookmarkKey {
        match self {
            Bookmark::Page { page } => BookmarkKey::Page(*page),
            Bookmark::Ayah { sura, ayah } => BookmarkKey::Ayah(*sura, *ayah),
        }
    }
}

impl Default for Bookmark {
    fn default() -> Self {
        Bookmark::Page { page: 0 }
    }
}

impl SyncModel for Bookmark {
    type Key = BookmarkKey;

    fn conflict_key(&self) -> BookmarkKey {
        self.key()
    }
}

/// A named collection of bookmarks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SyncModel for Collection {
    type Key = String;

    fn conflict_key(&self) -> String {
        self.name.clone()
    }
}

/// Membership of a bookmark in a collection.
///
/// The bookmark is carried by value so that two associations naming the same
/// page or ayah in the same collection collide even when only one side knows
/// the bookmark's remote id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBookmark {
    pub collection_id: String,
    pub bookmark_id: Option<String>,
    pub bookmark: Bookmark,
}

impl CollectionBookmark {
    pub fn new(collection_id: impl Into<String>, bookmark: Bookmark) -> Self {
        Self {
            collection_id: collection_id.into(),
            bookmark_id: None,
            bookmark,
        }
    }

    pub fn with_bookmark_id(mut self, bookmark_id: impl Into<String>) -> Self {
        self.bookmark_id = Some(bookmark_id.into());
        self
    }
}

impl Default for CollectionBookmark {
    fn default() -> Self {
        Self {
            collection_id: String::new(),
            bookmark_id: None,
            bookmark: Bookmark::default(),
        }
    }
}

impl SyncModel for CollectionBookmark {
    type Key = (String, BookmarkKey);

    fn conflict_key(&self) -> Self::Key {
        (self.collection_id.clone(), self.bookmark.key())
    }
}

/// Position of a single ayah.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseRef {
    pub sura: u32,
    pub ayah: u32,
}

impl VerseRef {
    pub fn new(sura: u32, ayah: u32) -> Self {
        Self { sura, ayah }
    }
}

impl fmt::Display for VerseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sura, self.ayah)
    }
}

impl FromStr for VerseRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sura, ayah) = s
            .split_once(':')
            .ok_or_else(|| format!("expected sura:ayah, got {s:?}"))?;
        let sura = sura.trim().parse().map_err(|_| format!("bad sura in {s:?}"))?;
        let ayah = ayah.trim().parse().map_err(|_| format!("bad ayah in {s:?}"))?;
        Ok(Self { sura, ayah })
    }
}

/// Inclusive ayah range, written `2:255-2:257` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerseRange {
    pub start: VerseRef,
    pub end: VerseRef,
}

impl VerseRange {
    pub fn new(start: VerseRef, end: VerseRef) -> Self {
        Self { start, end }
    }

    pub fn single(verse: VerseRef) -> Self {
        Self::new(verse, verse)
    }
}

impl fmt::Display for VerseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for VerseRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let range = match s.split_once('-') {
            Some((start, end)) => Self::new(start.parse()?, end.parse()?),
            None => Self::single(s.parse()?),
        };
        if range.end < range.start {
            return Err(format!("range {s:?} ends before it starts"));
        }
        Ok(range)
    }
}

/// A text note attached to one or more ayah ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub body: String,
    pub ranges: Vec<VerseRange>,
}

impl Note {
    pub fn new(body: impl Into<String>, ranges: Vec<VerseRange>) -> Self {
        Self {
            body: body.into(),
            ranges,
        }
    }
}

impl SyncModel for Note {
    // Notes have no natural identity: only identical notes collide by key,
    // distinct notes collide through their remote id.
    type Key = Note;

    fn conflict_key(&self) -> Note {
        self.clone()
    }
}
