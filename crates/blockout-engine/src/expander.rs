//! Recurrence expansion: blockout + visible window → concrete occurrences.
//!
//! Anchors are always computed from the series start (`start + n·period`),
//! never by stepping from the previous anchor, so a monthly series on the
//! 31st returns to the 31st after every short month instead of drifting.

use std::iter::FusedIterator;

use chrono::{Datelike, Days, Duration, Months, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::model::{Blockout, BlockoutId, Frequency, Interval};
use crate::window::VisibleWindow;

/// One concrete, non-recurring materialization of a blockout.
///
/// `blockout_id` is a relation back to the series, resolved through
/// [`crate::reconcile::BlockoutCollection::lookup_parent`]; occurrences can be
/// discarded and recomputed freely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Occurrence {
    pub blockout_id: BlockoutId,
    pub interval: Interval,
    /// Index of this occurrence's anchor in its series (0 for the first).
    pub sequence: u32,
    /// Whether the originating blockout repeats.
    pub recurring: bool,
}

impl Occurrence {
    pub fn start(&self) -> NaiveDateTime {
        self.interval.start()
    }

    pub fn end(&self) -> NaiveDateTime {
        self.interval.end()
    }

    /// The series anchor this occurrence was generated from. Used as the key
    /// when excepting a single occurrence.
    pub fn anchor(&self) -> NaiveDateTime {
        self.interval.start()
    }
}

/// Lazily yields the occurrences of one blockout overlapping a window, in
/// ascending start order. Created by [`expand`].
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    blockout: &'a Blockout,
    window: VisibleWindow,
    next: Option<u32>,
}

/// Expand `blockout` into every occurrence that overlaps `window`.
///
/// A one-off blockout yields its range if it overlaps the window. A recurring
/// one yields anchors `range.start + n·period` whose occurrence overlaps the
/// window. Expansion stops at the first anchor at or past `window.end`, or
/// past the recurrence bound. Occurrences ending before the window are
/// skipped without stopping, and so are excepted anchors.
///
/// Re-expanding with the same inputs always yields the same sequence.
pub fn expand<'a>(blockout: &'a Blockout, window: &VisibleWindow) -> Occurrences<'a> {
    let next = if window.is_empty() {
        None
    } else {
        Some(first_candidate(blockout, window))
    };
    Occurrences {
        blockout,
        window: *window,
        next,
    }
}

/// Expand every blockout and merge the results by start time, ties broken by
/// blockout id then end. Id order is lexical, so `"10"` sorts before `"9"`.
pub fn expand_all<'a, I>(blockouts: I, window: &VisibleWindow) -> Vec<Occurrence>
where
    I: IntoIterator<Item = &'a Blockout>,
{
    let mut occurrences: Vec<Occurrence> = blockouts
        .into_iter()
        .flat_map(|b| expand(b, window))
        .collect();
    occurrences.sort_by(|a, b| {
        (a.start(), &a.blockout_id, a.end()).cmp(&(b.start(), &b.blockout_id, b.end()))
    });
    debug!(
        window_start = %window.start(),
        window_end = %window.end(),
        occurrences = occurrences.len(),
        "expanded blockouts"
    );
    occurrences
}

impl Iterator for Occurrences<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        loop {
            let n = self.next?;
            let range = *self.blockout.range();

            let Some(recurrence) = self.blockout.recurrence() else {
                self.next = None;
                return self
                    .window
                    .overlaps(&range)
                    .then(|| self.occurrence(range, 0, false));
            };

            let Some(anchor) = anchor_at(range.start(), recurrence.frequency, n) else {
                self.next = None;
                return None;
            };
            let past_bound = recurrence.until.is_some_and(|until| anchor > until);
            if anchor >= self.window.end() || past_bound {
                self.next = None;
                return None;
            }
            self.next = n.checked_add(1);

            if self.blockout.is_excepted(anchor) {
                continue;
            }
            let Some(interval) = range.moved_to(anchor) else {
                self.next = None;
                return None;
            };
            if self.window.overlaps(&interval) {
                return Some(self.occurrence(interval, n, true));
            }
        }
    }
}

impl FusedIterator for Occurrences<'_> {}

impl Occurrences<'_> {
    fn occurrence(&self, interval: Interval, sequence: u32, recurring: bool) -> Occurrence {
        Occurrence {
            blockout_id: self.blockout.id().clone(),
            interval,
            sequence,
            recurring,
        }
    }
}

/// Whether `blockout` currently emits an occurrence anchored at `anchor`.
///
/// False for instants off the series grid, past the recurrence bound, or
/// already excepted.
pub fn emits_anchor(blockout: &Blockout, anchor: NaiveDateTime) -> bool {
    let Some(end) = anchor.checked_add_signed(Duration::seconds(1)) else {
        return false;
    };
    let Ok(window) = VisibleWindow::new(anchor, end) else {
        return false;
    };
    expand(blockout, &window).any(|o| o.anchor() == anchor)
}

/// The `n`th anchor of a series starting at `start`.
///
/// Monthly anchors keep the day of month and fall back to the last valid day
/// of shorter months.
pub fn anchor_at(start: NaiveDateTime, frequency: Frequency, n: u32) -> Option<NaiveDateTime> {
    match frequency {
        Frequency::Daily => start.checked_add_days(Days::new(u64::from(n))),
        Frequency::Weekly => start.checked_add_days(Days::new(7 * u64::from(n))),
        Frequency::Monthly => start.checked_add_months(Months::new(n)),
    }
}

/// The lowest anchor index that could possibly overlap `window`.
///
/// Every skipped anchor starts strictly before `window.start - duration`, so
/// its occurrence ends before the window opens. Long-running series therefore
/// don't walk every period since their first occurrence.
fn first_candidate(blockout: &Blockout, window: &VisibleWindow) -> u32 {
    let Some(recurrence) = blockout.recurrence() else {
        return 0;
    };
    let range = blockout.range();
    let Some(target) = window.start().checked_sub_signed(range.duration()) else {
        return 0;
    };
    if target <= range.start() {
        return 0;
    }

    let skipped = match recurrence.frequency {
        Frequency::Daily | Frequency::Weekly => {
            let period_secs = if recurrence.frequency == Frequency::Daily {
                86_400
            } else {
                7 * 86_400
            };
            (target - range.start()).num_seconds() / period_secs - 1
        }
        Frequency::Monthly => {
            let start = range.start();
            let months = i64::from(target.year() - start.year()) * 12
                + i64::from(target.month())
                - i64::from(start.month());
            months - 1
        }
    };
    u32::try_from(skipped.max(0)).unwrap_or(u32::MAX)
}

// ── Tests ───────────────────────────────────────────────────────────────────
