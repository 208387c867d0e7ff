//! The local blockout collection and its reconciliation rules.
//!
//! The collection is the in-memory cache of one owner's blockouts. It is
//! seeded at load and reconciled only after the persistence collaborator
//! confirms a mutation. Every operation is synchronous: a read right after a
//! write observes it.

use tracing::debug;

use crate::model::{Blockout, BlockoutId};

/// What an [`BlockoutCollection::upsert`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub replaced: usize,
    /// Incoming records identical to what was already held.
    pub unchanged: usize,
}

impl ReconcileSummary {
    pub fn changed(&self) -> bool {
        self.inserted + self.replaced > 0
    }
}

/// Ordered collection of blockouts keyed by id.
///
/// Existing entries keep their position when replaced; new ids are appended.
#[derive(Debug, Clone, Default)]
pub struct BlockoutCollection {
    entries: Vec<Blockout>,
    revision: u64,
}

impl BlockoutCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a full listing. Later duplicates of an id replace earlier
    /// ones, as if upserted in order.
    pub fn seeded(blockouts: impl IntoIterator<Item = Blockout>) -> Self {
        let mut collection = BlockoutCollection::new();
        collection.upsert(blockouts);
        collection.revision = 0;
        collection
    }

    /// Replace entries sharing an id with the incoming record and append the
    /// rest. Entries not named are left untouched.
    pub fn upsert(&mut self, blockouts: impl IntoIterator<Item = Blockout>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for incoming in blockouts {
            match self.position(incoming.id()) {
                Some(i) if self.entries[i] == incoming => summary.unchanged += 1,
                Some(i) => {
                    self.entries[i] = incoming;
                    summary.replaced += 1;
                }
                None => {
                    self.entries.push(incoming);
                    summary.inserted += 1;
                }
            }
        }
        if summary.changed() {
            self.revision += 1;
        }
        debug!(
            inserted = summary.inserted,
            replaced = summary.replaced,
            unchanged = summary.unchanged,
            revision = self.revision,
            "reconciled blockouts"
        );
        summary
    }

    /// Replace the whole collection with a fresh listing.
    pub fn replace_all(&mut self, blockouts: impl IntoIterator<Item = Blockout>) {
        let revision = self.revision + 1;
        *self = BlockoutCollection::seeded(blockouts);
        self.revision = revision;
        debug!(entries = self.entries.len(), revision, "replaced blockout collection");
    }

    /// Drop the entry with `id`. Absent ids are a no-op, since another
    /// session may already have removed it.
    pub fn remove(&mut self, id: &BlockoutId) -> Option<Blockout> {
        let removed = self.position(id).map(|i| self.entries.remove(i));
        if removed.is_some() {
            self.revision += 1;
            debug!(%id, revision = self.revision, "removed blockout");
        }
        removed
    }

    /// The series a rendered occurrence belongs to.
    pub fn lookup_parent(&self, id: &BlockoutId) -> Option<&Blockout> {
        self.entries.iter().find(|b| b.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Blockout> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Blockout] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumps on every observable change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn position(&self, id: &BlockoutId) -> Option<usize> {
        self.entries.iter().position(|b| b.id() == id)
    }
}

impl<'a> IntoIterator for &'a BlockoutCollection {
    type Item = &'a Blockout;
    type IntoIter = std::slice::Iter<'a, Blockout>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
