mod account;
mod mosque;
mod post;
mod prayer_time;
mod status;

pub use account::{Account, PublicAccount};
pub use mosque::{Mosque, NewMosque};
pub use post::Post;
pub use prayer_time::{parse_date, DailyTimings, PrayerTimeRecord, DATE_FORMAT};
pub use status::{ApprovalStatus, Role, Verdict};

/// Collection names in the document store.
pub const USERS: &str = "users";
pub const MOSQUES: &str = "mosques";
pub const PRAYER_TIMES: &str = "prayer_times";
pub const POSTS: &str = "posts";
