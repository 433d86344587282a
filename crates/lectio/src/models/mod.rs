//! Portal entities built on top of the session and schedule modules.

mod room;
mod user;

pub use room::{is_free, Room};
pub use user::{parse_own_user, parse_user_page, Population, User, UserDetails, UserKind};
