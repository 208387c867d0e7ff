//! The scheduler: window, collection and modal state behind one command
//! surface.
//!
//! Rendering code reads through accessors ([`Scheduler::window`],
//! [`Scheduler::agenda`], [`Scheduler::lookup_parent`]) and sends every user
//! action through [`Scheduler::dispatch`]. A mutation reaches the local
//! collection only after the store confirms it; when the store fails, the
//! error is returned as-is and the collection is unchanged.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{BlockoutError, Result};
use crate::expander::{emits_anchor, expand_all, Occurrence};
use crate::modal::{EditTarget, ModalState};
use crate::model::{Blockout, BlockoutId, Interval, OwnerId};
use crate::reconcile::{BlockoutCollection, ReconcileSummary};
use crate::segmenter::{segment, DayBuckets};
use crate::store::{BlockoutDraft, BlockoutStore, StoreError};
use crate::window::{VisibleWindow, WindowController};

/// Everything a rendering collaborator can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCommand {
    SetWindow(VisibleWindow),
    NextMonth,
    PreviousMonth,
    Create(BlockoutDraft),
    /// Save a fully edited blockout record.
    Update(Blockout),
    /// Move one occurrence, or the whole series, to `range`.
    Reschedule { target: EditTarget, range: Interval },
    Delete(EditTarget),
}

/// What a dispatched command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Navigated { changed: bool },
    /// The store confirmed these records and they were reconciled.
    Saved(Vec<Blockout>),
    Removed(BlockoutId),
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    config: EngineConfig,
    window: WindowController,
    blockouts: BlockoutCollection,
    modal: ModalState,
}

impl Scheduler {
    /// Start on the month containing `now` with an empty collection.
    pub fn new(config: EngineConfig, now: DateTime<Utc>) -> Result<Self> {
        let window = config.initial_window(now)?;
        Ok(Scheduler::with_window(config, window))
    }

    pub fn with_window(config: EngineConfig, window: VisibleWindow) -> Self {
        Scheduler {
            config,
            window: WindowController::new(window),
            blockouts: BlockoutCollection::new(),
            modal: ModalState::new(),
        }
    }

    /// Seed the collection from the store's listing for `owner`.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged; the collection is not touched.
    pub fn load<S>(&mut self, store: &S, owner: Option<&OwnerId>) -> Result<usize>
    where
        S: BlockoutStore + ?Sized,
    {
        let listed = store.list(owner).inspect_err(|e| {
            warn!(error = %e, "listing blockouts failed");
        })?;
        self.blockouts.replace_all(listed);
        Ok(self.blockouts.len())
    }

    // ── Read accessors ──────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn window(&self) -> &VisibleWindow {
        self.window.window()
    }

    /// Changes whenever the window or the collection does; dependents
    /// re-expand when it moves.
    pub fn revision(&self) -> (u64, u64) {
        (self.window.revision(), self.blockouts.revision())
    }

    pub fn blockouts(&self) -> &BlockoutCollection {
        &self.blockouts
    }

    pub fn lookup_parent(&self, id: &BlockoutId) -> Option<&Blockout> {
        self.blockouts.lookup_parent(id)
    }

    pub fn modal(&self) -> &ModalState {
        &self.modal
    }

    pub fn modal_mut(&mut self) -> &mut ModalState {
        &mut self.modal
    }

    /// Every occurrence in the current window, ordered by start time.
    pub fn occurrences(&self) -> Vec<Occurrence> {
        expand_all(&self.blockouts, self.window())
    }

    /// Per-day segments for the current window, recomputed on every call.
    pub fn agenda(&self) -> DayBuckets {
        segment(&self.occurrences(), self.window())
    }

    // ── Reconciliation ──────────────────────────────────────────────────

    /// Reconcile records the store confirmed outside a dispatched command.
    pub fn apply_confirmed(
        &mut self,
        blockouts: impl IntoIterator<Item = Blockout>,
    ) -> ReconcileSummary {
        self.blockouts.upsert(blockouts)
    }

    /// Reconcile a removal the store confirmed outside a dispatched command.
    pub fn apply_removed(&mut self, id: &BlockoutId) {
        self.blockouts.remove(id);
        self.modal.dismiss_for(id);
    }

    // ── Commands ────────────────────────────────────────────────────────

    /// Run one user action to completion.
    ///
    /// # Errors
    ///
    /// - [`BlockoutError::UnknownBlockout`] if a target isn't in the collection
    /// - [`BlockoutError::UnknownOccurrence`] if a single-occurrence target's
    ///   anchor isn't one the series emits
    /// - [`BlockoutError::InvalidRange`] / [`BlockoutError::InvalidRecurrenceBound`]
    ///   if an edit would break a blockout invariant
    /// - [`BlockoutError::Store`] with the store's error, unmodified
    pub fn dispatch<S>(&mut self, store: &mut S, command: SchedulerCommand) -> Result<Outcome>
    where
        S: BlockoutStore + ?Sized,
    {
        match command {
            SchedulerCommand::SetWindow(window) => Ok(Outcome::Navigated {
                changed: self.window.set_window(window),
            }),
            SchedulerCommand::NextMonth => self.navigate(1),
            SchedulerCommand::PreviousMonth => self.navigate(-1),
            SchedulerCommand::Create(draft) => {
                let created = store.create(draft).inspect_err(log_store_error)?;
                self.confirmed(vec![created])
            }
            SchedulerCommand::Update(blockout) => {
                if self.lookup_parent(blockout.id()).is_none() {
                    return Err(BlockoutError::UnknownBlockout(blockout.id().clone()));
                }
                let updated = store.update(blockout).inspect_err(log_store_error)?;
                self.confirmed(vec![updated])
            }
            SchedulerCommand::Reschedule { target, range } => {
                self.reschedule(store, target, range)
            }
            SchedulerCommand::Delete(target) => self.delete(store, target),
        }
    }

    fn navigate(&mut self, months: i32) -> Result<Outcome> {
        let current = self.window();
        let target = if months >= 0 {
            current.next_month()?
        } else {
            current.previous_month()?
        };
        let window = self.config.month_window(target.first_day())?;
        Ok(Outcome::Navigated {
            changed: self.window.set_window(window),
        })
    }

    fn parent(&self, id: &BlockoutId) -> Result<Blockout> {
        self.blockouts
            .lookup_parent(id)
            .cloned()
            .ok_or_else(|| BlockoutError::UnknownBlockout(id.clone()))
    }

    /// The parent of `target`, checking that a single-occurrence target names
    /// an occurrence the series currently emits.
    fn target_parent(&self, target: &EditTarget) -> Result<Blockout> {
        let parent = self.parent(target.blockout_id())?;
        if let EditTarget::ThisOccurrence { blockout_id, anchor } = target {
            if !emits_anchor(&parent, *anchor) {
                return Err(BlockoutError::UnknownOccurrence {
                    blockout_id: blockout_id.clone(),
                    anchor: *anchor,
                });
            }
        }
        Ok(parent)
    }

    fn confirmed(&mut self, saved: Vec<Blockout>) -> Result<Outcome> {
        self.blockouts.upsert(saved.iter().cloned());
        self.modal.close();
        Ok(Outcome::Saved(saved))
    }

    fn reschedule<S>(&mut self, store: &mut S, target: EditTarget, range: Interval) -> Result<Outcome>
    where
        S: BlockoutStore + ?Sized,
    {
        let parent = self.target_parent(&target)?;
        match target {
            EditTarget::ThisOccurrence { anchor, .. } if parent.is_recurring() => {
                let mut draft = BlockoutDraft::new(range);
                if let Some(owner) = parent.owner() {
                    draft = draft.owned_by(owner.clone());
                }
                let series = store
                    .update(parent.excluding(anchor))
                    .inspect_err(log_store_error)?;
                // The exception is persisted now; reconcile it even if the
                // replacement fails so the display matches the store.
                self.blockouts.upsert([series.clone()]);
                let replacement = store.create(draft).inspect_err(log_store_error)?;
                debug!(
                    series = %series.id(),
                    replacement = %replacement.id(),
                    %anchor,
                    "split occurrence from series"
                );
                self.confirmed(vec![series, replacement])
            }
            _ => {
                let moved = parent.with_range(range)?;
                let updated = store.update(moved).inspect_err(log_store_error)?;
                self.confirmed(vec![updated])
            }
        }
    }

    fn delete<S>(&mut self, store: &mut S, target: EditTarget) -> Result<Outcome>
    where
        S: BlockoutStore + ?Sized,
    {
        let id = target.blockout_id().clone();
        if let EditTarget::ThisOccurrence { anchor, .. } = target {
            let parent = self.target_parent(&target)?;
            if parent.is_recurring() {
                return self.delete_occurrence(store, parent, anchor);
            }
        }

        match store.delete(&id) {
            Ok(()) => {}
            // Already gone on the server, e.g. deleted from another session.
            Err(StoreError::NotFound(_)) => debug!(%id, "blockout already deleted"),
            Err(e) => {
                log_store_error(&e);
                return Err(e.into());
            }
        }
        self.apply_removed(&id);
        Ok(Outcome::Removed(id))
    }

    fn delete_occurrence<S>(
        &mut self,
        store: &mut S,
        parent: Blockout,
        anchor: NaiveDateTime,
    ) -> Result<Outcome>
    where
        S: BlockoutStore + ?Sized,
    {
        let id = parent.id().clone();
        match store.update(parent.excluding(anchor)) {
            Ok(updated) => {
                self.blockouts.upsert([updated.clone()]);
                self.modal.close();
                Ok(Outcome::Saved(vec![updated]))
            }
            // The whole series is gone on the server, so this occurrence is too.
            Err(StoreError::NotFound(_)) => {
                debug!(%id, %anchor, "series already deleted");
                self.apply_removed(&id);
                Ok(Outcome::Removed(id))
            }
            Err(e) => {
                log_store_error(&e);
                Err(e.into())
            }
        }
    }
}

fn log_store_error(error: &StoreError) {
    warn!(error = %error, "store rejected blockout change");
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modal::ModalRequest;
    use crate::model::Recurrence;
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, TimeZone};

    fn at(m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn range(m: u32, d: u32, h1: u32, h2: u32) -> Interval {
        Interval::new(at(m, d, h1), at(m, d, h2)).unwrap()
    }

    fn march() -> Scheduler {
        Scheduler::with_window(EngineConfig::default(), VisibleWindow::month(2024, 3).unwrap())
    }

    fn weekly_store() -> MemoryStore {
        let weekly = Blockout::new("1", range(3, 4, 12, 13))
            .owned_by("alice")
            .recurring(Recurrence::weekly())
            .unwrap();
        MemoryStore::with_records(vec![weekly])
    }

    #[test]
    fn test_new_starts_on_current_month() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let scheduler = Scheduler::new(EngineConfig::default(), now).unwrap();
        assert_eq!(*scheduler.window(), VisibleWindow::month(2024, 3).unwrap());
    }

    #[test]
    fn test_navigation_respects_padding() {
        let config = EngineConfig {
            pad_to_weeks: true,
            ..EngineConfig::default()
        };
        let mut scheduler = Scheduler::with_window(
            config.clone(),
            config.month_window(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).unwrap(),
        );
        let mut store = MemoryStore::new();
        scheduler.dispatch(&mut store, SchedulerCommand::NextMonth).unwrap();
        assert_eq!(
            *scheduler.window(),
            config.month_window(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()).unwrap()
        );
    }

    #[test]
    fn test_set_same_window_reports_unchanged() {
        let mut scheduler = march();
        let mut store = MemoryStore::new();
        let outcome = scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::SetWindow(VisibleWindow::month(2024, 3).unwrap()),
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Navigated { changed: false });
        assert_eq!(scheduler.revision(), (0, 0));
    }

    #[test]
    fn test_create_reconciles_after_confirmation() {
        let mut scheduler = march();
        let mut store = MemoryStore::new();
        scheduler
            .modal_mut()
            .open(ModalRequest::Create { date: None });
        let outcome = scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::Create(BlockoutDraft::new(range(3, 10, 9, 10))),
            )
            .unwrap();
        let Outcome::Saved(saved) = outcome else {
            panic!("expected Saved");
        };
        assert_eq!(scheduler.lookup_parent(saved[0].id()), Some(&saved[0]));
        assert_eq!(scheduler.agenda().segment_count(), 1);
        assert!(!scheduler.modal().is_open());
    }

    #[test]
    fn test_store_failure_leaves_collection_unchanged() {
        let mut store = weekly_store();
        let mut scheduler = march();
        scheduler.load(&store, None).unwrap();
        let before = scheduler.blockouts().as_slice().to_vec();

        store.fail_next(StoreError::Unavailable("offline".into()));
        let err = scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::Delete(EditTarget::WholeSeries {
                    blockout_id: "1".into(),
                }),
            )
            .unwrap_err();
        assert_eq!(
            err,
            BlockoutError::Store(StoreError::Unavailable("offline".into()))
        );
        assert_eq!(scheduler.blockouts().as_slice(), before.as_slice());
    }

    #[test]
    fn test_delete_one_occurrence_of_series() {
        let mut store = weekly_store();
        let mut scheduler = march();
        scheduler.load(&store, None).unwrap();

        scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::Delete(EditTarget::ThisOccurrence {
                    blockout_id: "1".into(),
                    anchor: at(3, 11, 12),
                }),
            )
            .unwrap();

        let starts: Vec<_> = scheduler.occurrences().iter().map(Occurrence::start).collect();
        assert_eq!(starts, vec![at(3, 4, 12), at(3, 18, 12), at(3, 25, 12)]);
        assert!(store.records()[0].is_excepted(at(3, 11, 12)));
    }

    #[test]
    fn test_delete_series_already_gone_is_idempotent() {
        let mut store = MemoryStore::new();
        let mut scheduler = march();
        scheduler.apply_confirmed([Blockout::new("9", range(3, 1, 9, 10))]);
        let outcome = scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::Delete(EditTarget::WholeSeries {
                    blockout_id: "9".into(),
                }),
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Removed("9".into()));
        assert!(scheduler.blockouts().is_empty());
    }

    #[test]
    fn test_reschedule_occurrence_splits_series() {
        let mut store = weekly_store();
        let mut scheduler = march();
        scheduler.load(&store, None).unwrap();

        let outcome = scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::Reschedule {
                    target: EditTarget::ThisOccurrence {
                        blockout_id: "1".into(),
                        anchor: at(3, 18, 12),
                    },
                    range: range(3, 19, 15, 16),
                },
            )
            .unwrap();
        let Outcome::Saved(saved) = outcome else {
            panic!("expected Saved");
        };
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].owner().map(OwnerId::as_str), Some("alice"));

        let starts: Vec<_> = scheduler.occurrences().iter().map(Occurrence::start).collect();
        assert_eq!(
            starts,
            vec![at(3, 4, 12), at(3, 11, 12), at(3, 19, 15), at(3, 25, 12)]
        );
    }

    #[test]
    fn test_reschedule_whole_series() {
        let mut store = weekly_store();
        let mut scheduler = march();
        scheduler.load(&store, None).unwrap();

        scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::Reschedule {
                    target: EditTarget::WholeSeries {
                        blockout_id: "1".into(),
                    },
                    range: range(3, 5, 8, 9),
                },
            )
            .unwrap();
        let starts: Vec<_> = scheduler.occurrences().iter().map(Occurrence::start).collect();
        assert_eq!(
            starts,
            vec![at(3, 5, 8), at(3, 12, 8), at(3, 19, 8), at(3, 26, 8)]
        );
    }

    #[test]
    fn test_update_unknown_blockout_is_rejected() {
        let mut store = MemoryStore::new();
        let mut scheduler = march();
        let err = scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::Update(Blockout::new("77", range(3, 1, 9, 10))),
            )
            .unwrap_err();
        assert_eq!(err, BlockoutError::UnknownBlockout("77".into()));
    }

    #[test]
    fn test_load_failure_keeps_previous_collection() {
        let store = weekly_store();
        let mut scheduler = march();
        scheduler.load(&store, None).unwrap();
        store.fail_next(StoreError::Unavailable("offline".into()));
        assert!(scheduler.load(&store, None).is_err());
        assert_eq!(scheduler.blockouts().len(), 1);
    }

    // ── Occurrence targeting ────────────────────────────────────────────

    #[test]
    fn test_reschedule_off_grid_anchor_is_rejected() {
        let mut store = weekly_store();
        let mut scheduler = march();
        scheduler.load(&store, None).unwrap();

        let err = scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::Reschedule {
                    target: EditTarget::ThisOccurrence {
                        blockout_id: "1".into(),
                        anchor: at(3, 12, 7),
                    },
                    range: range(3, 13, 15, 16),
                },
            )
            .unwrap_err();
        assert_eq!(
            err,
            BlockoutError::UnknownOccurrence {
                blockout_id: "1".into(),
                anchor: at(3, 12, 7),
            }
        );
        assert_eq!(scheduler.occurrences().len(), 4);
        assert_eq!(store.records().len(), 1);
        assert!(store.records()[0].exceptions().is_empty());
    }

    #[test]
    fn test_delete_excepted_anchor_is_rejected() {
        let mut store = weekly_store();
        let mut scheduler = march();
        scheduler.load(&store, None).unwrap();
        let target = EditTarget::ThisOccurrence {
            blockout_id: "1".into(),
            anchor: at(3, 11, 12),
        };

        scheduler
            .dispatch(&mut store, SchedulerCommand::Delete(target.clone()))
            .unwrap();
        let err = scheduler
            .dispatch(&mut store, SchedulerCommand::Delete(target))
            .unwrap_err();
        assert!(matches!(err, BlockoutError::UnknownOccurrence { .. }));
        assert_eq!(scheduler.occurrences().len(), 3);
    }

    #[test]
    fn test_delete_occurrence_of_series_deleted_elsewhere() {
        let mut store = MemoryStore::new();
        let mut scheduler = march();
        scheduler.apply_confirmed(weekly_store().records().to_vec());

        let outcome = scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::Delete(EditTarget::ThisOccurrence {
                    blockout_id: "1".into(),
                    anchor: at(3, 11, 12),
                }),
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Removed("1".into()));
        assert!(scheduler.blockouts().is_empty());
        assert!(scheduler.agenda().is_empty());
    }

    #[test]
    fn test_split_keeps_exception_when_replacement_fails() {
        let mut store = weekly_store();
        let mut scheduler = march();
        scheduler.load(&store, None).unwrap();
        scheduler.modal_mut().open(ModalRequest::Edit(EditTarget::ThisOccurrence {
            blockout_id: "1".into(),
            anchor: at(3, 18, 12),
        }));

        store.fail_after(1, StoreError::Unavailable("offline".into()));
        let err = scheduler
            .dispatch(
                &mut store,
                SchedulerCommand::Reschedule {
                    target: EditTarget::ThisOccurrence {
                        blockout_id: "1".into(),
                        anchor: at(3, 18, 12),
                    },
                    range: range(3, 19, 15, 16),
                },
            )
            .unwrap_err();
        assert_eq!(
            err,
            BlockoutError::Store(StoreError::Unavailable("offline".into()))
        );

        // The persisted exception is reflected locally; no replacement exists.
        assert_eq!(store.records().len(), 1);
        assert!(store.records()[0].is_excepted(at(3, 18, 12)));
        assert_eq!(scheduler.lookup_parent(&"1".into()), Some(&store.records()[0]));
        let starts: Vec<_> = scheduler.occurrences().iter().map(Occurrence::start).collect();
        assert_eq!(starts, vec![at(3, 4, 12), at(3, 11, 12), at(3, 25, 12)]);
        assert!(scheduler.modal().is_open());
    }
}
