//! The persistence seam.
//!
//! [`BlockoutStore`] is what the scheduler calls for create, update, delete
//! and list. Real deployments back it with a remote service; [`MemoryStore`]
//! is the in-process implementation used by tests and the CLI. Store errors
//! are passed to callers unmodified and never retried here.

use std::cell::RefCell;
use std::io::Read;

use thiserror::Error;
use tracing::warn;

use crate::error::{BlockoutError, Result};
use crate::model::{validate_bound, Blockout, BlockoutId, Interval, OwnerId, Recurrence};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Blockout not found: {0}")]
    NotFound(BlockoutId),

    #[error("Rejected by store: {0}")]
    Rejected(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A blockout that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockoutDraft {
    owner: Option<OwnerId>,
    range: Interval,
    recurrence: Option<Recurrence>,
}

impl BlockoutDraft {
    pub fn new(range: Interval) -> Self {
        BlockoutDraft {
            owner: None,
            range,
            recurrence: None,
        }
    }

    pub fn owned_by(mut self, owner: impl Into<OwnerId>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// # Errors
    ///
    /// Returns [`BlockoutError::InvalidRecurrenceBound`] if the bound precedes
    /// the first occurrence.
    pub fn recurring(mut self, recurrence: Recurrence) -> Result<Self> {
        validate_bound(&self.range, Some(&recurrence))?;
        self.recurrence = Some(recurrence);
        Ok(self)
    }

    pub fn range(&self) -> &Interval {
        &self.range
    }

    /// The record the store persists once it has picked an id.
    pub fn into_blockout(self, id: BlockoutId) -> Blockout {
        Blockout::assemble(id, self.owner, self.range, self.recurrence)
    }
}

/// Create/update/delete/list for one user's blockouts.
pub trait BlockoutStore {
    /// Every blockout belonging to `owner`, or all of them when `None`.
    fn list(&self, owner: Option<&OwnerId>) -> std::result::Result<Vec<Blockout>, StoreError>;

    /// Persist a new blockout and return it with its assigned id.
    fn create(&mut self, draft: BlockoutDraft) -> std::result::Result<Blockout, StoreError>;

    /// Overwrite an existing blockout (last write wins).
    fn update(&mut self, blockout: Blockout) -> std::result::Result<Blockout, StoreError>;

    fn delete(&mut self, id: &BlockoutId) -> std::result::Result<(), StoreError>;
}

/// In-memory [`BlockoutStore`] handing out sequential numeric ids.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: Vec<Blockout>,
    next_id: u64,
    /// Calls still to succeed, then the error the following call returns.
    fail_after: RefCell<Option<(usize, StoreError)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::with_records(Vec::new())
    }

    /// Start with existing records; new ids continue after the largest
    /// numeric id present.
    pub fn with_records(records: Vec<Blockout>) -> Self {
        let next_id = records
            .iter()
            .filter_map(|b| b.id().as_str().parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        MemoryStore {
            records,
            next_id,
            fail_after: RefCell::new(None),
        }
    }

    /// Load a JSON array of blockouts.
    ///
    /// # Errors
    ///
    /// Returns [`BlockoutError::InvalidInput`] if the JSON is malformed or any
    /// record breaks a blockout invariant.
    pub fn from_json_reader(reader: impl Read) -> Result<Self> {
        let records: Vec<Blockout> = serde_json::from_reader(reader)
            .map_err(|e| BlockoutError::InvalidInput(e.to_string()))?;
        Ok(MemoryStore::with_records(records))
    }

    /// Make the next call fail with `error`, as a flaky backend would.
    pub fn fail_next(&self, error: StoreError) {
        self.fail_after(0, error);
    }

    /// Let `calls` more calls succeed, then fail the one after with `error`.
    pub fn fail_after(&self, calls: usize, error: StoreError) {
        self.fail_after.replace(Some((calls, error)));
    }

    pub fn records(&self) -> &[Blockout] {
        &self.records
    }

    fn check_failure(&self, operation: &str) -> std::result::Result<(), StoreError> {
        let mut pending = self.fail_after.borrow_mut();
        match pending.take() {
            Some((0, err)) => {
                warn!(operation, error = %err, "store call failed");
                Err(err)
            }
            Some((calls, err)) => {
                *pending = Some((calls - 1, err));
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn position(&self, id: &BlockoutId) -> Option<usize> {
        self.records.iter().position(|b| b.id() == id)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl BlockoutStore for MemoryStore {
    fn list(&self, owner: Option<&OwnerId>) -> std::result::Result<Vec<Blockout>, StoreError> {
        self.check_failure("list")?;
        Ok(self
            .records
            .iter()
            .filter(|b| owner.is_none() || b.owner() == owner)
            .cloned()
            .collect())
    }

    fn create(&mut self, draft: BlockoutDraft) -> std::result::Result<Blockout, StoreError> {
        self.check_failure("create")?;
        let id = BlockoutId::from(self.next_id);
        self.next_id += 1;
        let blockout = draft.into_blockout(id);
        self.records.push(blockout.clone());
        Ok(blockout)
    }

    fn update(&mut self, blockout: Blockout) -> std::result::Result<Blockout, StoreError> {
        self.check_failure("update")?;
        let i = self
            .position(blockout.id())
            .ok_or_else(|| StoreError::NotFound(blockout.id().clone()))?;
        self.records[i] = blockout.clone();
        Ok(blockout)
    }

    fn delete(&mut self, id: &BlockoutId) -> std::result::Result<(), StoreError> {
        self.check_failure("delete")?;
        let i = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.records.remove(i);
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
