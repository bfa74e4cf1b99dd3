// THEORY:
// The `triple` module is the data layer of the engine. A `Triple` is a single
// subject–predicate–object relationship seen in one extracted frame, together
// with the two bounding boxes that locate its subject and object.
//
// Key architectural principles:
// 1.  **Identity vs. Payload**: A triple's identity is only its three labels
//     (`TripleKey`). The boxes are payload: they move every frame even when
//     the relationship itself is unchanged, so they never take part in
//     equality or hashing.
// 2.  **Keyed Set**: A `TripleSet` is a map from `TripleKey` to `Triple`. Set
//     membership is decided by the key alone, and a collision on insert is an
//     explicit, observable replacement rather than a hashing accident.
// 3.  **Immutability**: Triples are built once from the extractor's output and
//     are never mutated afterwards. A newer observation replaces them wholesale.

use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An axis-aligned box in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self { xmin, ymin, xmax, ymax }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.xmin + self.width() / 2.0,
            self.ymin + self.height() / 2.0,
        )
    }
}

/// The identity of a relationship: the only fields that decide equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripleKey {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl TripleKey {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for TripleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// One detected relationship instance with its spatial payload.
#[derive(Debug, Clone)]
pub struct Triple {
    pub key: TripleKey,
    pub subject_box: BoundingBox,
    pub object_box: BoundingBox,
}

impl Triple {
    pub fn new(key: TripleKey, subject_box: BoundingBox, object_box: BoundingBox) -> Self {
        Self {
            key,
            subject_box,
            object_box,
        }
    }
}

// Equality and hashing look at the key only; boxes are payload.
impl PartialEq for Triple {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Triple {}

impl Hash for Triple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// A set of triples keyed by identity.
///
/// Inserting a triple whose key is already present replaces the stored entry
/// (the later one wins) and hands the previous entry back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripleSet {
    entries: HashMap<TripleKey, Triple>,
}

impl TripleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `triple`, returning the entry it displaced, if any.
    pub fn insert(&mut self, triple: Triple) -> Option<Triple> {
        self.entries.insert(triple.key.clone(), triple)
    }

    pub fn get(&self, key: &TripleKey) -> Option<&Triple> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &TripleKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_map::Values<'_, TripleKey, Triple> {
        self.entries.values()
    }

    pub fn keys(&self) -> hash_map::Keys<'_, TripleKey, Triple> {
        self.entries.keys()
    }

    /// Keys in lexical order, for stable logs and displays.
    pub fn sorted_keys(&self) -> Vec<&TripleKey> {
        let mut keys: Vec<&TripleKey> = self.entries.keys().collect();
        keys.sort();
        keys
    }

    /// Entries of `self` whose key is absent from `other`, payload taken from `self`.
    pub fn difference(&self, other: &TripleSet) -> TripleSet {
        self.iter()
            .filter(|triple| !other.contains(&triple.key))
            .cloned()
            .collect()
    }
}

impl FromIterator<Triple> for TripleSet {
    /// Collects in iteration order; on a key collision the later triple wins.
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut set = TripleSet::new();
        for triple in iter {
            set.insert(triple);
        }
        set
    }
}

impl Extend<Triple> for TripleSet {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        for triple in iter {
            self.insert(triple);
        }
    }
}

impl IntoIterator for TripleSet {
    type Item = Triple;
    type IntoIter = hash_map::IntoValues<TripleKey, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl<'a> IntoIterator for &'a TripleSet {
    type Item = &'a Triple;
    type IntoIter = hash_map::Values<'a, TripleKey, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
