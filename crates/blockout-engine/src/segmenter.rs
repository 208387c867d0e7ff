//! Day segmentation: occurrences → per-calendar-day pieces.
//!
//! Each occurrence is clipped to the window and then cut at every midnight it
//! crosses. The pieces of one occurrence are disjoint and contiguous, and
//! together they cover exactly the clipped occurrence. A piece ending at
//! midnight ends at `00:00` of the next date and is displayed as `24:00`.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::expander::Occurrence;
use crate::model::{BlockoutId, Interval};
use crate::window::VisibleWindow;

/// The portion of one occurrence falling on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySegment {
    pub date: NaiveDate,
    pub blockout_id: BlockoutId,
    /// Start of the whole occurrence, for targeting "this occurrence".
    pub anchor: NaiveDateTime,
    pub interval: Interval,
    /// The segment covers the date from midnight to midnight.
    pub all_day: bool,
    pub recurring: bool,
}

impl DaySegment {
    /// `"all day"`, or `"HH:MM-HH:MM"` with a day-ending boundary as `24:00`.
    pub fn time_label(&self) -> String {
        if self.all_day {
            return "all day".to_string();
        }
        let start = self.interval.start().format("%H:%M");
        let end = if self.interval.end().date() > self.date {
            "24:00".to_string()
        } else {
            self.interval.end().format("%H:%M").to_string()
        };
        format!("{start}-{end}")
    }
}

/// Segments grouped by date, each day ordered by start time with ties broken
/// by blockout id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DayBuckets {
    days: BTreeMap<NaiveDate, Vec<DaySegment>>,
}

impl DayBuckets {
    /// Segments on `date`, empty if nothing is blocked out that day.
    pub fn on(&self, date: NaiveDate) -> &[DaySegment] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate days with at least one segment, in date order.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &[DaySegment])> {
        self.days.iter().map(|(d, s)| (d, s.as_slice()))
    }

    /// Dates a month calendar should highlight.
    pub fn highlighted_days(&self) -> Vec<NaiveDate> {
        self.days.keys().copied().collect()
    }

    /// Number of days with any segment.
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn segment_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// All segments of one blockout across the window, in date order.
    pub fn for_blockout<'a>(
        &'a self,
        id: &'a BlockoutId,
    ) -> impl Iterator<Item = &'a DaySegment> + 'a {
        self.days
            .values()
            .flatten()
            .filter(move |s| &s.blockout_id == id)
    }
}

fn next_midnight(date: NaiveDate) -> Option<NaiveDateTime> {
    date.checked_add_days(Days::new(1))
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Cut one occurrence into day segments after clipping it to `window`.
///
/// A zero-length occurrence inside the window yields a single zero-length
/// segment on its date.
pub fn segment_occurrence(occurrence: &Occurrence, window: &VisibleWindow) -> Vec<DaySegment> {
    let Some(clipped) = window.clip(&occurrence.interval) else {
        return Vec::new();
    };

    let piece = |date: NaiveDate, interval: Interval, all_day: bool| DaySegment {
        date,
        blockout_id: occurrence.blockout_id.clone(),
        anchor: occurrence.anchor(),
        interval,
        all_day,
        recurring: occurrence.recurring,
    };

    if clipped.is_instant() {
        return vec![piece(clipped.start().date(), clipped, false)];
    }

    let mut segments = Vec::new();
    let mut cursor = clipped.start();
    while cursor < clipped.end() {
        let date = cursor.date();
        let Some(day_end) = next_midnight(date) else {
            break;
        };
        let end = day_end.min(clipped.end());
        let all_day = cursor.time() == NaiveTime::MIN && end == day_end;
        segments.push(piece(date, Interval::ordered(cursor, end), all_day));
        cursor = end;
    }
    segments
}

/// Segment every occurrence and bucket the pieces by date.
pub fn segment(occurrences: &[Occurrence], window: &VisibleWindow) -> DayBuckets {
    let mut days: BTreeMap<NaiveDate, Vec<DaySegment>> = BTreeMap::new();
    for occurrence in occurrences {
        for seg in segment_occurrence(occurrence, window) {
            days.entry(seg.date).or_default().push(seg);
        }
    }
    for segments in days.values_mut() {
        segments.sort_by(|a, b| {
            (a.interval.start(), &a.blockout_id, a.interval.end()).cmp(&(
                b.interval.start(),
                &b.blockout_id,
                b.interval.end(),
            ))
        });
    }
    DayBuckets { days }
}

// ── Tests ───────────────────────────────────────────────────────────────────
