//! The visible window and the controller that owns it.
//!
//! A [`VisibleWindow`] is a contiguous, day-aligned range of wall-clock time,
//! half-open as `[start, end)`. Month views use [`VisibleWindow::month`], list
//! views any range from [`VisibleWindow::from_dates`]. The [`WindowController`]
//! is the only place the current window lives; dependents compare its
//! [`revision`](WindowController::revision) to know when to re-expand.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BlockoutError, Result};
use crate::model::Interval;

// ── Configurable week start ─────────────────────────────────────────────────

/// Which day begins a week in a padded calendar grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStartDay {
    /// ISO 8601 standard (Monday = day 0 of the week).
    #[default]
    Monday,
    /// US/Canada convention (Sunday = day 0 of the week).
    Sunday,
}

/// How many days `weekday` is from the week-start day.
fn days_from_week_start(weekday: Weekday, week_start: WeekStartDay) -> u64 {
    match week_start {
        WeekStartDay::Monday => weekday.num_days_from_monday() as u64,
        WeekStartDay::Sunday => weekday.num_days_from_sunday() as u64,
    }
}

// ── VisibleWindow ───────────────────────────────────────────────────────────

/// The date range currently rendered or queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VisibleWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| BlockoutError::InvalidWindow(format!("no such month {year}-{month:02}")))
}

impl VisibleWindow {
    /// A window over arbitrary instants.
    ///
    /// # Errors
    ///
    /// Returns [`BlockoutError::InvalidWindow`] if `end` precedes `start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end < start {
            return Err(BlockoutError::InvalidWindow(format!(
                "end {end} precedes start {start}"
            )));
        }
        Ok(VisibleWindow { start, end })
    }

    /// The whole calendar month `year-month`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockoutError::InvalidWindow`] for an out-of-range month.
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let first = first_of_month(year, month)?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| BlockoutError::InvalidWindow(format!("{year}-{month:02} overflows")))?;
        Ok(VisibleWindow {
            start: midnight(first),
            end: midnight(next),
        })
    }

    /// The month containing `date`.
    pub fn containing_month(date: NaiveDate) -> Result<Self> {
        VisibleWindow::month(date.year(), date.month())
    }

    /// The month containing `now` as seen from `tz`.
    pub fn current_month(now: DateTime<Utc>, tz: Tz) -> Result<Self> {
        VisibleWindow::containing_month(now.with_timezone(&tz).date_naive())
    }

    /// Every day from `first` through `last`, inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`BlockoutError::InvalidWindow`] if `last` precedes `first`.
    pub fn from_dates(first: NaiveDate, last: NaiveDate) -> Result<Self> {
        if last < first {
            return Err(BlockoutError::InvalidWindow(format!(
                "last day {last} precedes first day {first}"
            )));
        }
        let end = last
            .checked_add_days(Days::new(1))
            .ok_or_else(|| BlockoutError::InvalidWindow(format!("{last} overflows")))?;
        Ok(VisibleWindow {
            start: midnight(first),
            end: midnight(end),
        })
    }

    /// The month grid a calendar shows: the month padded out to whole weeks.
    pub fn month_grid(year: i32, month: u32, week_start: WeekStartDay) -> Result<Self> {
        let month_window = VisibleWindow::month(year, month)?;
        let first = month_window.first_day();
        let last = month_window.last_day().unwrap_or(first);

        let lead = days_from_week_start(first.weekday(), week_start);
        let trail = 6 - days_from_week_start(last.weekday(), week_start);

        let grid_first = first
            .checked_sub_days(Days::new(lead))
            .ok_or_else(|| BlockoutError::InvalidWindow(format!("{first} underflows")))?;
        let grid_last = last
            .checked_add_days(Days::new(trail))
            .ok_or_else(|| BlockoutError::InvalidWindow(format!("{last} overflows")))?;
        VisibleWindow::from_dates(grid_first, grid_last)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_interval(&self) -> Interval {
        Interval::ordered(self.start, self.end)
    }

    /// The calendar date the window starts on.
    pub fn first_day(&self) -> NaiveDate {
        self.start.date()
    }

    /// The last calendar date with any instant inside the window.
    pub fn last_day(&self) -> Option<NaiveDate> {
        if self.is_empty() {
            return None;
        }
        let last_instant = self.end - chrono::Duration::nanoseconds(1);
        Some(last_instant.date())
    }

    /// Every calendar date touched by the window, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last_day();
        self.first_day()
            .iter_days()
            .take_while(move |d| last.is_some_and(|l| *d <= l))
    }

    /// Whether `interval` shares any instant with the window.
    ///
    /// An empty window overlaps nothing.
    pub fn overlaps(&self, interval: &Interval) -> bool {
        !self.is_empty() && interval.overlaps(&self.as_interval())
    }

    /// The part of `interval` inside the window.
    pub fn clip(&self, interval: &Interval) -> Option<Interval> {
        if self.is_empty() {
            return None;
        }
        interval.clip(&self.as_interval())
    }

    /// The month after the one this window shows.
    ///
    /// Navigation always lands on a whole month, whatever shape the current
    /// window has.
    pub fn next_month(&self) -> Result<Self> {
        self.shift_months(1)
    }

    /// The month before the one this window shows.
    pub fn previous_month(&self) -> Result<Self> {
        self.shift_months(-1)
    }

    fn shift_months(&self, delta: i32) -> Result<Self> {
        let anchor = self.month_anchor();
        let shifted = if delta >= 0 {
            anchor.checked_add_months(Months::new(delta.unsigned_abs()))
        } else {
            anchor.checked_sub_months(Months::new(delta.unsigned_abs()))
        }
        .ok_or_else(|| BlockoutError::InvalidWindow(format!("cannot move {delta} months")))?;
        VisibleWindow::containing_month(shifted)
    }

    /// The month a window "belongs to": for a padded grid that is the month
    /// of its middle day, not of the leading days from the previous month.
    fn month_anchor(&self) -> NaiveDate {
        let span = (self.end - self.start) / 2;
        let middle = self.start + span;
        NaiveDate::from_ymd_opt(middle.year(), middle.month(), 1).unwrap_or(self.first_day())
    }
}

// ── WindowController ────────────────────────────────────────────────────────

/// Owns the current [`VisibleWindow`].
///
/// `revision` increments only when the window actually changes, so setting
/// the same window twice is observably a no-op.
#[derive(Debug, Clone)]
pub struct WindowController {
    window: VisibleWindow,
    revision: u64,
}

impl WindowController {
    pub fn new(window: VisibleWindow) -> Self {
        WindowController {
            window,
            revision: 0,
        }
    }

    /// Start on the month containing `now` in `tz`.
    pub fn starting_at(now: DateTime<Utc>, tz: Tz) -> Result<Self> {
        Ok(WindowController::new(VisibleWindow::current_month(now, tz)?))
    }

    pub fn window(&self) -> &VisibleWindow {
        &self.window
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the current window. Returns `true` if dependents must
    /// re-expand.
    pub fn set_window(&mut self, window: VisibleWindow) -> bool {
        if window == self.window {
            return false;
        }
        debug!(
            from = %self.window.start,
            to = %window.start,
            revision = self.revision + 1,
            "visible window changed"
        );
        self.window = window;
        self.revision += 1;
        true
    }

    pub fn next_month(&mut self) -> Result<bool> {
        let next = self.window.next_month()?;
        Ok(self.set_window(next))
    }

    pub fn previous_month(&mut self) -> Result<bool> {
        let previous = self.window.previous_month()?;
        Ok(self.set_window(previous))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
