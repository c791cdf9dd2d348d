//! Conflict resolution.
//!
//! Each conflict is classified against a fixed table over the kinds of
//! mutation present on each side. The remote log wins whenever both sides
//! touched the same resource, except when the local side already re-created
//! a resource after accepting its remote deletion: that creation is pushed.
//!
//! | Local               | Remote              | Outcome                          |
//! |---------------------|---------------------|----------------------------------|
//! | `CREATED`           | `DELETED`           | illegal                          |
//! | `DELETED`           | `CREATED`           | illegal                          |
//! | `CREATED`           | `CREATED`           | persist remote                   |
//! | `DELETED`           | `DELETED`           | persist remote                   |
//! | `DELETED`           | `DELETED`+`CREATED` | persist remote                   |
//! | `DELETED`+`CREATED` | `DELETED`           | persist remote, push local create|
//! | `DELETED`+`CREATED` | `DELETED`+`CREATED` | persist remote                   |
//! | anything else       | anything else       | illegal                          |

use crate::detect::ResourceConflict;
use crate::error::{Error, Result};
use crate::mutation::Mutation::{Created, Deleted};
use crate::mutation::{describe_local, describe_remote};
use crate::{LocalModelMutation, Mutation, RemoteModelMutation, SyncModel};

/// Output of resolving a batch of conflicts.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictResolutionResult<M> {
    /// Remote mutations to apply to local storage
    pub mutations_to_persist: Vec<RemoteModelMutation<M>>,
    /// Local mutations to send to the server
    pub mutations_to_push: Vec<LocalModelMutation<M>>,
}

impl<M> ConflictResolutionResult<M> {
    fn empty() -> Self {
        Self {
            mutations_to_persist: Vec::new(),
            mutations_to_push: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Persist every remote mutation, push nothing
    RemoteWins,
    /// Persist every remote mutation, push the local creation
    PushLocalCreation,
    Illegal(&'static str),
}

/// One row of the decision table. A rule applies when its kinds consume
/// both sides exactly.
struct Rule {
    local: &'static [Mutation],
    remote: &'static [Mutation],
    outcome: Outcome,
}

const RULES: &[Rule] = &[
    Rule {
        local: &[Created],
        remote: &[Deleted],
        outcome: Outcome::Illegal("local created a resource the remote deleted unseen"),
    },
    Rule {
        local: &[Deleted],
        remote: &[Created],
        outcome: Outcome::Illegal("local deleted a resource the remote never had"),
    },
    Rule {
        local: &[Created],
        remote: &[Created],
        outcome: Outcome::RemoteWins,
    },
    Rule {
        local: &[Deleted],
        remote: &[Deleted],
        outcome: Outcome::RemoteWins,
    },
    Rule {
        local: &[Deleted],
        remote: &[Deleted, Created],
        outcome: Outcome::RemoteWins,
    },
    Rule {
        local: &[Deleted, Created],
        remote: &[Deleted],
        outcome: Outcome::PushLocalCreation,
    },
    Rule {
        local: &[Deleted, Created],
        remote: &[Deleted, Created],
        outcome: Outcome::RemoteWins,
    },
];

/// Removes one mutation of `kind` from `kinds`, reporting whether it matched.
fn take(kinds: &mut Vec<Mutation>, kind: Mutation) -> bool {
    match kinds.iter().position(|k| *k == kind) {
        Some(i) => {
            kinds.remove(i);
            true
        }
        None => false,
    }
}

/// True when `expected` consumes `actual` exactly, in any order.
fn consumes(expected: &[Mutation], actual: &[Mutation]) -> bool {
    let mut remaining = actual.to_vec();
    expected.iter().all(|kind| take(&mut remaining, *kind)) && remaining.is_empty()
}

fn classify(local: &[Mutation], remote: &[Mutation]) -> Outcome {
    RULES
        .iter()
        .find(|rule| consumes(rule.local, local) && consumes(rule.remote, remote))
        .map(|rule| rule.outcome)
        .unwrap_or(Outcome::Illegal("unexpected conflict shape"))
}

/// Resolves detected conflicts into persist and push sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// Resolve every conflict, failing on the first illegal shape.
    pub fn resolve<M: SyncModel>(
        conflicts: Vec<ResourceConflict<M>>,
    ) -> Result<ConflictResolutionResult<M>> {
        let mut result = ConflictResolutionResult::empty();
        for conflict in conflicts {
            Self::resolve_one(conflict, &mut result)?;
        }
        Ok(result)
    }

    fn resolve_one<M: SyncModel>(
        conflict: ResourceConflict<M>,
        result: &mut ConflictResolutionResult<M>,
    ) -> Result<()> {
        let local: Vec<Mutation> = conflict
            .local_mutations
            .iter()
            .map(|m| m.mutation.normalized())
            .collect();
        let remote: Vec<Mutation> = conflict
            .remote_mutations
            .iter()
            .map(|m| m.mutation.normalized())
            .collect();

        match classify(&local, &remote) {
            Outcome::Illegal(reason) => Err(Error::IllegalConflict {
                reason: reason.to_string(),
                local: describe_local(&conflict.local_mutations),
                remote: describe_remote(&conflict.remote_mutations),
            }),
            Outcome::RemoteWins => {
                result
                    .mutations_to_persist
                    .extend(conflict.remote_mutations);
                Ok(())
            }
            Outcome::PushLocalCreation => {
                result
                    .mutations_to_persist
                    .extend(conflict.remote_mutations);
                result.mutations_to_push.extend(
                    conflict
                        .local_mutations
                        .into_iter()
                        .filter(|m| m.mutation.normalized() == Mutation::Created),
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Bookmark;

    fn conflict(
        local: Vec<LocalModelMutation<Bookmark>>,
        remote: Vec<RemoteModelMutation<Bookmark>>,
    ) -> ResourceConflict<Bookmark> {
        ResourceConflict {
            local_mutations: local,
            remote_mutations: remote,
        }
    }

    #[test]
    fn created_against_created_remote_wins() {
        let remote = RemoteModelMutation::created(Bookmark::page(10), "r-1");
        let result = ConflictResolver::resolve(vec![conflict(
            vec![LocalModelMutation::created(Bookmark::page(10), "l-1")],
            vec![remote.clone()],
        )])
        .unwrap();

        assert_eq!(result.mutations_to_persist, vec![remote]);
        assert!(result.mutations_to_push.is_empty());
    }

    #[test]
    fn deleted_against_deleted() {
        let remote = RemoteModelMutation::deleted(Bookmark::default(), "r-1");
        let result = ConflictResolver::resolve(vec![conflict(
            vec![LocalModelMutation::deleted(Bookmark::page(10), "l-1", "r-1")],
            vec![remote.clone()],
        )])
        .unwrap();

        assert_eq!(result.mutations_to_persist, vec![remote]);
        assert!(result.mutations_to_push.is_empty());
    }

    #[test]
    fn deleted_against_recreated() {
        let remote = vec![
            RemoteModelMutation::deleted(Bookmark::page(10), "r-1"),
            RemoteModelMutation::created(Bookmark::page(10), "r-2"),
        ];
        let result = ConflictResolver::resolve(vec![conflict(
            vec![LocalModelMutation::deleted(Bookmark::page(10), "l-1", "r-1")],
            remote.clone(),
        )])
        .unwrap();

        assert_eq!(result.mutations_to_persist, remote);
        assert!(result.mutations_to_push.is_empty());
    }

    #[test]
    fn local_recreation_is_pushed() {
        let remote = RemoteModelMutation::deleted(Bookmark::default(), "r-1");
        let local_create = LocalModelMutation::created(Bookmark::page(10), "l-2");
        let result = ConflictResolver::resolve(vec![conflict(
            vec![
                LocalModelMutation::deleted(Bookmark::page(10), "l-1", "r-1"),
                local_create.clone(),
            ],
            vec![remote.clone()],
        )])
        .unwrap();

        assert_eq!(result.mutations_to_persist, vec![remote]);
        assert_eq!(result.mutations_to_push, vec![local_create]);
    }

    #[test]
    fn both_recreated_remote_wins() {
        let remote = vec![
            RemoteModelMutation::deleted(Bookmark::page(10), "r-1"),
            RemoteModelMutation::created(Bookmark::page(10), "r-2"),
        ];
        let result = ConflictResolver::resolve(vec![conflict(
            vec![
                LocalModelMutation::deleted(Bookmark::page(10), "l-1", "r-1"),
                LocalModelMutation::created(Bookmark::page(10), "l-2"),
            ],
            remote.clone(),
        )])
        .unwrap();

        assert_eq!(result.mutations_to_persist, remote);
        assert!(result.mutations_to_push.is_empty());
    }

    #[test]
    fn created_against_deleted_is_illegal() {
        let err = ConflictResolver::resolve(vec![conflict(
            vec![LocalModelMutation::created(Bookmark::page(10), "l-1")],
            vec![RemoteModelMutation::deleted(Bookmark::page(10), "r-1")],
        )])
        .unwrap_err();
        assert!(matches!(err, Error::IllegalConflict { .. }));
    }

    #[test]
    fn deleted_against_created_is_illegal() {
        let err = ConflictResolver::resolve(vec![conflict(
            vec![LocalModelMutation::deleted(Bookmark::page(10), "l-1", "r-1")],
            vec![RemoteModelMutation::created(Bookmark::page(10), "r-1")],
        )])
        .unwrap_err();
        assert!(matches!(err, Error::IllegalConflict { .. }));
    }

    #[test]
    fn unexpected_shape_names_both_sides() {
        let err = ConflictResolver::resolve(vec![conflict(
            vec![LocalModelMutation::created(Bookmark::page(10), "l-1")],
            vec![
                RemoteModelMutation::created(Bookmark::page(10), "r-1"),
                RemoteModelMutation::created(Bookmark::page(10), "r-2"),
            ],
        )])
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("unexpected conflict shape"), "{message}");
        assert!(message.contains("local=l-1"), "{message}");
        assert!(message.contains("remote=r-2"), "{message}");
    }

    #[test]
    fn rule_matching_ignores_order() {
        assert!(consumes(&[Deleted, Created], &[Created, Deleted]));
        assert!(!consumes(&[Deleted], &[Deleted, Deleted]));
        assert!(!consumes(&[Deleted, Created], &[Deleted]));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        /// Legal (local, remote) shapes from the decision table.
        fn arb_legal_shape() -> impl Strategy<Value = (Vec<Mutation>, Vec<Mutation>)> {
            prop_oneof![
                Just((vec![Created], vec![Created])),
                Just((vec![Deleted], vec![Deleted])),
                Just((vec![Deleted], vec![Deleted, Created])),
                Just((vec![Deleted, Created], vec![Deleted])),
                Just((vec![Deleted, Created], vec![Deleted, Created])),
            ]
        }

        fn build(local: &[Mutation], remote: &[Mutation], page: u32) -> ResourceConflict<Bookmark> {
            ResourceConflict {
                local_mutations: local
                    .iter()
                    .enumerate()
                    .map(|(i, kind)| {
                        let remote_id = (*kind == Deleted).then(|| "r-0".to_string());
                        LocalModelMutation::new(Bookmark::page(page), format!("l-{i}"), remote_id, *kind)
                    })
                    .collect(),
                remote_mutations: remote
                    .iter()
                    .enumerate()
                    .map(|(i, kind)| {
                        RemoteModelMutation::new(Bookmark::page(page), format!("r-{i}"), *kind)
                    })
                    .collect(),
            }
        }

        proptest! {
            #[test]
            fn prop_legal_shapes_resolve(shape in arb_legal_shape(), page in 1u32..605) {
                let (local, remote) = shape;
                let input = build(&local, &remote, page);
                let result = ConflictResolver::resolve(vec![input.clone()]).unwrap();

                // Persisted entries come from the remote side, each once.
                prop_assert_eq!(&result.mutations_to_persist, &input.remote_mutations);

                // Pushed entries come from the local side, each at most once.
                for pushed in &result.mutations_to_push {
                    prop_assert_eq!(
                        input.local_mutations.iter().filter(|m| *m == pushed).count(),
                        1
                    );
                }
                prop_assert!(result.mutations_to_push.len() <= input.local_mutations.len());
            }

            #[test]
            fn prop_resolution_is_deterministic(shape in arb_legal_shape(), page in 1u32..605) {
                let (local, remote) = shape;
                let first = ConflictResolver::resolve(vec![build(&local, &remote, page)]).unwrap();
                let second = ConflictResolver::resolve(vec![build(&local, &remote, page)]).unwrap();
                prop_assert_eq!(first, second);
            }
        }
    }
}
