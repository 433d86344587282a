//! Client for the Lectio school portal.
//!
//! A [`SessionManager`] owns one logged-in cookie session and transparently
//! logs in again when Lectio reports it expired. Schedules are fetched with
//! [`fetch_schedule`], and every entry's description text is turned into a
//! [`ScheduleRecord`] by [`decode_entry`].

pub mod config;
pub mod error;
pub mod models;
pub mod schedule;
pub mod session;

pub use config::ClientConfig;
pub use error::LectioError;
pub use models::{Room, User, UserKind};
pub use schedule::{
    decode_entry, fetch_schedule, EntryStatus, MalformedEntryPolicy, ScheduleQuery,
    ScheduleRecord, ScheduleTarget,
};
pub use session::{Method, SessionManager, SessionState, Transport};
