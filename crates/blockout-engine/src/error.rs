//! Error types for blockout-engine operations.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::model::BlockoutId;
use crate::store::StoreError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockoutError {
    #[error("Invalid range: end {end} precedes start {start}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Invalid recurrence bound: {until} precedes first occurrence at {start}")]
    InvalidRecurrenceBound {
        start: NaiveDateTime,
        until: NaiveDateTime,
    },

    #[error("Unknown blockout: {0}")]
    UnknownBlockout(BlockoutId),

    #[error("Blockout {blockout_id} has no occurrence anchored at {anchor}")]
    UnknownOccurrence {
        blockout_id: BlockoutId,
        anchor: NaiveDateTime,
    },

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, BlockoutError>;
