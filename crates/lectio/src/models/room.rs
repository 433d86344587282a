/// Rooms and their bookings
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::error::LectioError;
use crate::schedule::{fetch_schedule, ScheduleQuery, ScheduleRecord, ScheduleTarget};
use crate::session::{SessionManager, Transport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub id: u64,
    pub name: String,
}

impl Room {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Fetches the room's bookings.
    ///
    /// Lectio returns nothing for room ranges longer than about a month.
    pub async fn schedule<T: Transport>(
        &self,
        session: &mut SessionManager<T>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        whole_days: bool,
    ) -> Result<Vec<ScheduleRecord>, LectioError> {
        let query = ScheduleQuery::new(ScheduleTarget::Room(self.id), start, end)
            .whole_days(whole_days);
        fetch_schedule(session, &query).await
    }

    /// Returns true if nothing but cancelled entries occupy the room at `at`.
    pub async fn is_available<T: Transport>(
        &self,
        session: &mut SessionManager<T>,
        at: NaiveDateTime,
    ) -> Result<bool, LectioError> {
        let bookings = self
            .schedule(session, at, at + Duration::seconds(1), false)
            .await?;
        Ok(is_free(&bookings))
    }
}

/// A room is free when every booking in the window is cancelled.
pub fn is_free(bookings: &[ScheduleRecord]) -> bool {
    bookings.iter().all(ScheduleRecord::is_cancelled)
}
