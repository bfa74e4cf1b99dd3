// THEORY:
// The `scene_state` module holds the engine's single piece of long-lived
// memory: the set of relationships currently believed to hold in the scene.
//
// Key architectural principles:
// 1.  **Snapshot, not History**: Every extraction is treated as a complete
//     picture of the scene. `commit` replaces the accepted set wholesale, so a
//     relationship the extractor missed once is dropped immediately instead of
//     lingering forever.
// 2.  **Pure Comparison**: `diff` only reads. It answers "what changed between
//     what we believe and what we just saw" and leaves the accepted state alone,
//     so a caller can report, validate or abandon the observation before
//     deciding to commit it.
// 3.  **Single Mutation Point**: `commit` is the only way to change the state.
//     The owner holds it by value, so the borrow checker keeps diff and commit
//     from interleaving with another writer.

use crate::core_modules::triple::{TripleKey, TripleSet};

/// Which half of a diff an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Appeared,
    Dropped,
}

/// A single reportable change to the scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub key: TripleKey,
}

/// The difference between the accepted state and a new observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDiff {
    /// Present in the observation, absent from the prior state. Boxes come from the observation.
    pub appeared: TripleSet,
    /// Present in the prior state, absent from the observation. Boxes come from the prior state.
    pub disappeared: TripleSet,
}

impl SceneDiff {
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.disappeared.is_empty()
    }

    /// Flattens the diff into events: drops first, then appearances, each group
    /// in lexical key order. Consumers should not rely on this order.
    pub fn events(&self) -> Vec<ChangeEvent> {
        let dropped = self.disappeared.sorted_keys().into_iter().map(|key| ChangeEvent {
            kind: ChangeKind::Dropped,
            key: key.clone(),
        });
        let appeared = self.appeared.sorted_keys().into_iter().map(|key| ChangeEvent {
            kind: ChangeKind::Appeared,
            key: key.clone(),
        });
        dropped.chain(appeared).collect()
    }
}

/// The accepted, authoritative set of relationships in the scene.
#[derive(Debug, Clone, Default)]
pub struct SceneState {
    current: TripleSet,
}

impl SceneState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an already accepted set, e.g. when handing state between loops.
    pub fn with_triples(current: TripleSet) -> Self {
        Self { current }
    }

    /// Compares `observed` against the accepted state without changing it.
    pub fn diff(&self, observed: &TripleSet) -> SceneDiff {
        SceneDiff {
            appeared: observed.difference(&self.current),
            disappeared: self.current.difference(observed),
        }
    }

    /// Replaces the accepted state with `observed`.
    pub fn commit(&mut self, observed: TripleSet) {
        self.current = observed;
    }

    pub fn snapshot(&self) -> &TripleSet {
        &self.current
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}
