//! Edit-modal state, kept apart from window and collection state.

use chrono::{NaiveDate, NaiveDateTime};

use crate::expander::Occurrence;
use crate::model::BlockoutId;
use crate::segmenter::DaySegment;

/// What an edit or delete applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTarget {
    /// A single occurrence, identified by its series and anchor.
    ThisOccurrence {
        blockout_id: BlockoutId,
        anchor: NaiveDateTime,
    },
    /// The blockout record itself.
    WholeSeries { blockout_id: BlockoutId },
}

impl EditTarget {
    pub fn occurrence(occurrence: &Occurrence) -> Self {
        EditTarget::ThisOccurrence {
            blockout_id: occurrence.blockout_id.clone(),
            anchor: occurrence.anchor(),
        }
    }

    /// Target a rendered segment's occurrence or, with `whole_series`, its
    /// series.
    pub fn from_segment(segment: &DaySegment, whole_series: bool) -> Self {
        if whole_series {
            EditTarget::WholeSeries {
                blockout_id: segment.blockout_id.clone(),
            }
        } else {
            EditTarget::ThisOccurrence {
                blockout_id: segment.blockout_id.clone(),
                anchor: segment.anchor,
            }
        }
    }

    pub fn blockout_id(&self) -> &BlockoutId {
        match self {
            EditTarget::ThisOccurrence { blockout_id, .. } => blockout_id,
            EditTarget::WholeSeries { blockout_id } => blockout_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalRequest {
    /// New blockout, optionally prefilled with the clicked date.
    Create { date: Option<NaiveDate> },
    Edit(EditTarget),
}

/// Which editor, if any, is showing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalState {
    open: Option<ModalRequest>,
}

impl ModalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `request`, replacing whatever was open.
    pub fn open(&mut self, request: ModalRequest) {
        self.open = Some(request);
    }

    pub fn close(&mut self) -> Option<ModalRequest> {
        self.open.take()
    }

    pub fn current(&self) -> Option<&ModalRequest> {
        self.open.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Close the editor if it targets `id`, e.g. after that blockout was
    /// deleted.
    pub fn dismiss_for(&mut self, id: &BlockoutId) {
        if matches!(&self.open, Some(ModalRequest::Edit(t)) if t.blockout_id() == id) {
            self.open = None;
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
