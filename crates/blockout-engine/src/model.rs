//! The interval model: blockouts, their ranges, and recurrence descriptors.
//!
//! All instants are wall-clock [`NaiveDateTime`] values that the caller has
//! already normalized to one timezone (see [`crate::config::EngineConfig`]).
//! Construction validates every invariant, and deserialization goes through
//! the same checks, so a [`Blockout`] in hand is always well formed.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{BlockoutError, Result};

// ── Identifiers ─────────────────────────────────────────────────────────────

/// Defines an opaque string identifier that deserializes from either a JSON
/// string or a non-negative integer (persistence layers disagree on which).
macro_rules! define_id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                $name(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(v: &str) -> Self {
                $name(v.to_string())
            }
        }

        impl From<String> for $name {
            fn from(v: String) -> Self {
                $name(v)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                $name(v.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Text(String),
                    Number(u64),
                }

                Ok(match Raw::deserialize(deserializer)? {
                    Raw::Text(s) => $name(s),
                    Raw::Number(n) => $name(n.to_string()),
                })
            }
        }
    };
}

define_id_type!(
    /// Stable identifier of a blockout, unique within its owner's collection.
    ///
    /// Ordering is lexical (`"10"` sorts before `"9"`) and is only used as a
    /// deterministic tie-breaker.
    BlockoutId
);

define_id_type!(
    /// Reference to the user who owns a blockout.
    OwnerId
);

// ── Interval ────────────────────────────────────────────────────────────────

/// A span of wall-clock time with `end >= start`.
///
/// Intervals are treated as half-open (`[start, end)`) when tested for overlap,
/// so an interval ending at midnight does not touch the following day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "IntervalRecord", into = "IntervalRecord")]
pub struct Interval {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

#[derive(Serialize, Deserialize)]
struct IntervalRecord {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TryFrom<IntervalRecord> for Interval {
    type Error = BlockoutError;

    fn try_from(record: IntervalRecord) -> Result<Self> {
        Interval::new(record.start, record.end)
    }
}

impl From<Interval> for IntervalRecord {
    fn from(interval: Interval) -> Self {
        IntervalRecord {
            start: interval.start,
            end: interval.end,
        }
    }
}

impl Interval {
    /// Create an interval, rejecting `end < start`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockoutError::InvalidRange`] if `end` precedes `start`.
    /// The range is never silently clamped.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end < start {
            return Err(BlockoutError::InvalidRange { start, end });
        }
        Ok(Interval { start, end })
    }

    /// Construct from bounds the caller has already ordered.
    pub(crate) fn ordered(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start <= end);
        Interval { start, end }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// A zero-length interval marks a single instant.
    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }

    /// Whether this interval and `other` share any instant.
    ///
    /// Adjacent intervals (one ends exactly where the other starts) do not
    /// overlap. A zero-length interval overlaps `other` when its instant lies
    /// in `[other.start, other.end)`.
    pub fn overlaps(&self, other: &Interval) -> bool {
        match (self.is_instant(), other.is_instant()) {
            (true, true) => self.start == other.start,
            (true, false) => other.start <= self.start && self.start < other.end,
            (false, true) => self.start <= other.start && other.start < self.end,
            (false, false) => self.start < other.end && other.start < self.end,
        }
    }

    /// The portion of this interval inside `bounds`, if any.
    pub fn clip(&self, bounds: &Interval) -> Option<Interval> {
        if !self.overlaps(bounds) {
            return None;
        }
        Some(Interval::ordered(
            self.start.max(bounds.start),
            self.end.min(bounds.end),
        ))
    }

    /// Shift both ends so the interval starts at `start`, keeping its length.
    pub(crate) fn moved_to(&self, start: NaiveDateTime) -> Option<Interval> {
        let end = start.checked_add_signed(self.duration())?;
        Some(Interval::ordered(start, end))
    }
}

// ── Recurrence ──────────────────────────────────────────────────────────────

/// The closed set of supported recurrence periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every day at the same wall-clock time.
    Daily,
    /// Every seven days.
    Weekly,
    /// Every calendar month on the same day of month, clamped to the last
    /// day of shorter months.
    Monthly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

/// How a blockout repeats, with an optional last permitted anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: Frequency,
    /// No occurrence starts after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDateTime>,
}

impl Recurrence {
    pub fn daily() -> Self {
        Recurrence {
            frequency: Frequency::Daily,
            until: None,
        }
    }

    pub fn weekly() -> Self {
        Recurrence {
            frequency: Frequency::Weekly,
            until: None,
        }
    }

    pub fn monthly() -> Self {
        Recurrence {
            frequency: Frequency::Monthly,
            until: None,
        }
    }

    pub fn until(mut self, bound: NaiveDateTime) -> Self {
        self.until = Some(bound);
        self
    }
}

// ── Blockout ────────────────────────────────────────────────────────────────

/// A period, possibly recurring, during which a person is unavailable.
///
/// `exceptions` holds anchor instants of a recurring series that were removed
/// one at a time ("delete this occurrence"). They have no effect on one-off
/// blockouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlockoutRecord", into = "BlockoutRecord")]
pub struct Blockout {
    id: BlockoutId,
    owner: Option<OwnerId>,
    range: Interval,
    recurrence: Option<Recurrence>,
    exceptions: BTreeSet<NaiveDateTime>,
}

/// Wire shape of a [`Blockout`]; every conversion back is validated.
#[derive(Serialize, Deserialize)]
struct BlockoutRecord {
    id: BlockoutId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<OwnerId>,
    range: Interval,
    #[serde(default)]
    recurrence: Option<Recurrence>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    exceptions: BTreeSet<NaiveDateTime>,
}

impl TryFrom<BlockoutRecord> for Blockout {
    type Error = BlockoutError;

    fn try_from(record: BlockoutRecord) -> Result<Self> {
        validate_bound(&record.range, record.recurrence.as_ref())?;
        Ok(Blockout {
            id: record.id,
            owner: record.owner,
            range: record.range,
            recurrence: record.recurrence,
            exceptions: record.exceptions,
        })
    }
}

impl From<Blockout> for BlockoutRecord {
    fn from(b: Blockout) -> Self {
        BlockoutRecord {
            id: b.id,
            owner: b.owner,
            range: b.range,
            recurrence: b.recurrence,
            exceptions: b.exceptions,
        }
    }
}

pub(crate) fn validate_bound(range: &Interval, recurrence: Option<&Recurrence>) -> Result<()> {
    if let Some(until) = recurrence.and_then(|r| r.until) {
        if until < range.start() {
            return Err(BlockoutError::InvalidRecurrenceBound {
                start: range.start(),
                until,
            });
        }
    }
    Ok(())
}

impl Blockout {
    /// A one-off blockout covering `range`.
    pub fn new(id: impl Into<BlockoutId>, range: Interval) -> Self {
        Blockout {
            id: id.into(),
            owner: None,
            range,
            recurrence: None,
            exceptions: BTreeSet::new(),
        }
    }

    /// Assemble from parts that were validated together elsewhere.
    pub(crate) fn assemble(
        id: BlockoutId,
        owner: Option<OwnerId>,
        range: Interval,
        recurrence: Option<Recurrence>,
    ) -> Self {
        debug_assert!(validate_bound(&range, recurrence.as_ref()).is_ok());
        Blockout {
            id,
            owner,
            range,
            recurrence,
            exceptions: BTreeSet::new(),
        }
    }

    /// Shorthand for [`Interval::new`] followed by [`Blockout::new`].
    ///
    /// # Errors
    ///
    /// Returns [`BlockoutError::InvalidRange`] if `end` precedes `start`.
    pub fn try_new(
        id: impl Into<BlockoutId>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Self> {
        Ok(Blockout::new(id, Interval::new(start, end)?))
    }

    pub fn owned_by(mut self, owner: impl Into<OwnerId>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Make this blockout repeat.
    ///
    /// # Errors
    ///
    /// Returns [`BlockoutError::InvalidRecurrenceBound`] if the bound precedes
    /// the first occurrence.
    pub fn recurring(mut self, recurrence: Recurrence) -> Result<Self> {
        validate_bound(&self.range, Some(&recurrence))?;
        self.recurrence = Some(recurrence);
        Ok(self)
    }

    /// Drop the recurrence, keeping only the first occurrence.
    pub fn one_off(mut self) -> Self {
        self.recurrence = None;
        self.exceptions.clear();
        self
    }

    /// Replace the range, re-checking the recurrence bound against it.
    ///
    /// # Errors
    ///
    /// Returns [`BlockoutError::InvalidRecurrenceBound`] if the existing bound
    /// now precedes the new start.
    pub fn with_range(mut self, range: Interval) -> Result<Self> {
        validate_bound(&range, self.recurrence.as_ref())?;
        self.range = range;
        Ok(self)
    }

    /// Suppress the occurrence anchored at `anchor`.
    pub fn excluding(mut self, anchor: NaiveDateTime) -> Self {
        self.exceptions.insert(anchor);
        self
    }

    pub fn id(&self) -> &BlockoutId {
        &self.id
    }

    pub fn owner(&self) -> Option<&OwnerId> {
        self.owner.as_ref()
    }

    pub fn range(&self) -> &Interval {
        &self.range
    }

    pub fn recurrence(&self) -> Option<&Recurrence> {
        self.recurrence.as_ref()
    }

    pub fn exceptions(&self) -> &BTreeSet<NaiveDateTime> {
        &self.exceptions
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Whether the anchor at `at` has been removed from the series.
    pub fn is_excepted(&self, at: NaiveDateTime) -> bool {
        self.is_recurring() && self.exceptions.contains(&at)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
