//! # blockout-engine
//!
//! Deterministic scheduling core for a calendar of blockouts: periods during
//! which a person is unavailable.
//!
//! Blockouts are one-off or recur daily, weekly or monthly with an optional
//! inclusive bound. For a visible window the engine expands each series into
//! concrete occurrences, splits them into per-day segments for rendering, and
//! keeps a local collection reconciled with what the backing store confirmed.
//! All times are wall-clock values in the single configured timezone.
//!
//! ## Modules
//!
//! - [`model`]: blockout ids, intervals, recurrence rules and the blockout record
//! - [`window`]: the visible window, month grids and the window controller
//! - [`expander`]: series + window → occurrences
//! - [`segmenter`]: occurrences → per-day segments and highlighted days
//! - [`reconcile`]: the local collection and its upsert/remove rules
//! - [`store`]: the persistence trait and an in-memory implementation
//! - [`modal`]: edit-modal state and occurrence/series targeting
//! - [`scheduler`]: everything above behind one command surface
//! - [`config`]: timezone and calendar settings
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod expander;
pub mod modal;
pub mod model;
pub mod reconcile;
pub mod scheduler;
pub mod segmenter;
pub mod store;
pub mod window;

pub use config::EngineConfig;
pub use error::BlockoutError;
pub use expander::{anchor_at, emits_anchor, expand, expand_all, Occurrence, Occurrences};
pub use modal::{EditTarget, ModalRequest, ModalState};
pub use model::{Blockout, BlockoutId, Frequency, Interval, OwnerId, Recurrence};
pub use reconcile::{BlockoutCollection, ReconcileSummary};
pub use scheduler::{Outcome, Scheduler, SchedulerCommand};
pub use segmenter::{segment, segment_occurrence, DayBuckets, DaySegment};
pub use store::{BlockoutDraft, BlockoutStore, MemoryStore, StoreError};
pub use window::{VisibleWindow, WeekStartDay, WindowController};
