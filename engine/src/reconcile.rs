//! Reconciliation of one resource's preprocessed batches.
//!
//! This is the core of determinism. Given preprocessed local and remote
//! mutations, it produces the single set of remote mutations to persist and
//! local mutations to push.
//!
//! # Algorithm
//!
//! 1. Detect conflicts ([`ConflictDetector`])
//! 2. Resolve each conflict ([`ConflictResolver`])
//! 3. Pass non-conflicting remote mutations to persistence and
//!    non-conflicting local mutations to the push set

use crate::detect::ConflictDetector;
use crate::error::Result;
use crate::resolve::{ConflictResolutionResult, ConflictResolver};
use crate::{LocalModelMutation, RemoteModelMutation, SyncModel};

/// Runs detection and resolution for one resource type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler;

impl Reconciler {
    pub fn reconcile<M: SyncModel>(
        remote: Vec<RemoteModelMutation<M>>,
        local: Vec<LocalModelMutation<M>>,
    ) -> Result<ConflictResolutionResult<M>> {
        let detection = ConflictDetector::detect(remote, local);
        let resolved = ConflictResolver::resolve(detection.conflicts)?;

        let mut mutations_to_persist = detection.non_conflicting_remote;
        mutations_to_persist.extend(resolved.mutations_to_persist);

        let mut mutations_to_push = detection.non_conflicting_local;
        mutations_to_push.extend(resolved.mutations_to_push);

        Ok(ConflictResolutionResult {
            mutations_to_persist,
            mutations_to_push,
        })
    }
}
