/// Types for schedule data
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Status of a schedule entry, from its optional leading marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    Normal,
    Changed,
    Cancelled,
}

impl EntryStatus {
    /// Marker line Lectio puts first in a changed entry.
    pub const CHANGED_MARKER: &'static str = "Ændret!";
    /// Marker line Lectio puts first in a cancelled entry.
    pub const CANCELLED_MARKER: &'static str = "Aflyst!";

    /// Maps a leading marker line to its status; `None` if the line is no marker.
    pub fn from_marker(line: &str) -> Option<Self> {
        match line {
            Self::CHANGED_MARKER => Some(EntryStatus::Changed),
            Self::CANCELLED_MARKER => Some(EntryStatus::Cancelled),
            _ => None,
        }
    }

    pub fn marker(&self) -> Option<&'static str> {
        match self {
            EntryStatus::Normal => None,
            EntryStatus::Changed => Some(Self::CHANGED_MARKER),
            EntryStatus::Cancelled => Some(Self::CANCELLED_MARKER),
        }
    }
}

/// One decoded schedule entry (a class period, a booking, ...).
///
/// Times are portal-local wall clock times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub status: EntryStatus,
    pub title: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// "Hold", e.g. `1.a Da`; several teams stay comma separated
    pub subject: Option<String>,
    /// Teacher initials, possibly several
    pub teacher: Option<String>,
    /// Room name(s), e.g. `0.015`
    pub room: Option<String>,
    /// Homework, notes and anything else after the labelled fields
    pub extra_info: Option<String>,
    /// Link to the entry's detail page
    pub url: Option<String>,
}

impl ScheduleRecord {
    pub fn is_cancelled(&self) -> bool {
        self.status == EntryStatus::Cancelled
    }

    /// Returns a copy with the detail link attached.
    pub fn with_url(self, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..self
        }
    }
}
