//! # Marginalia Engine
//!
//! The reconciliation core of Marginalia's bookmark and note synchronization.
//!
//! This crate decides, for every resource changed on both the device and the
//! server since the last sync, whether the two sides agree, conflict, or are
//! independent, and produces one deterministic outcome: remote mutations to
//! persist locally and local mutations to push to the server.
//!
//! ## Design Principles
//!
//! - **No IO**: Fetching, pushing and persisting belong to the caller
//! - **Deterministic**: Same inputs always produce same outputs
//! - **Generic**: One algorithm for every resource type, parameterized by a
//!   conflict key ([`SyncModel`]) and a validation policy ([`LocalValidation`])
//! - **Fail loudly**: Illegal journal states and conflict shapes are errors,
//!   never guesses
//!
//! ## Core Concepts
//!
//! ### Mutations
//!
//! - [`LocalModelMutation`] - A change from the local mutation journal
//! - [`RemoteModelMutation`] - An entry of the server's mutation log
//! - [`SyncMutation`] - The wire form, translated by a [`ResourceCodec`]
//!
//! ### Pipeline
//!
//! 1. [`LocalPreprocessor`] and [`RemotePreprocessor`] normalize both batches
//! 2. [`ConflictDetector`] groups mutations about the same resource
//! 3. [`ConflictResolver`] turns each group into persist and push sets
//!
//! [`Reconciler`] runs steps 2 and 3 together.
//!
//! ## Quick Start
//!
//! ```rust
//! use marginalia_engine::{
//!     Bookmark, LocalModelMutation, LocalPreprocessor, LocalValidation, Reconciler,
//!     RemoteModelMutation, RemotePreprocessor,
//! };
//! use std::collections::HashMap;
//!
//! // The device deleted the server's page-10 bookmark and then bookmarked
//! // page 10 again; meanwhile the server saw the deletion from another device.
//! let local = LocalPreprocessor::new(LocalValidation::strict())
//!     .preprocess(vec![
//!         LocalModelMutation::deleted(Bookmark::page(10), "local-1", "remote-1"),
//!         LocalModelMutation::created(Bookmark::page(10), "local-2"),
//!     ])
//!     .unwrap();
//!
//! let remote = vec![RemoteModelMutation::deleted(Bookmark::default(), "remote-1")];
//! let existence = HashMap::from([("remote-1".to_string(), true)]);
//! let remote = RemotePreprocessor::apply(remote, &existence);
//!
//! let result = Reconciler::reconcile(remote, local).unwrap();
//! assert_eq!(result.mutations_to_persist.len(), 1);
//! assert_eq!(result.mutations_to_push[0].local_id, "local-2");
//! ```

pub mod codec;
pub mod detect;
pub mod error;
pub mod mutation;
pub mod preprocess;
pub mod reconcile;
pub mod resolve;
pub mod resource;
pub mod wire;

// Re-export main types at crate root
pub use codec::{
    BookmarkCodec, CollectionBookmarkCodec, CollectionBookmarkRef, CollectionCodec, NoteCodec,
    ResourceCodec, DEFAULT_MUSHAF,
};
pub use detect::{ConflictDetectionResult, ConflictDetector, ResourceConflict};
pub use error::{Error, Result};
pub use mutation::{LocalId, LocalModelMutation, Mutation, RemoteId, RemoteModelMutation, SyncModel};
pub use preprocess::{LocalPreprocessor, LocalValidation, RemotePreprocessor};
pub use reconcile::Reconciler;
pub use resolve::{ConflictResolutionResult, ConflictResolver};
pub use resource::{
    Bookmark, BookmarkKey, Collection, CollectionBookmark, Note, VerseRange, VerseRef,
};
pub use wire::SyncMutation;
