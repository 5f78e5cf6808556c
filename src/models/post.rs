use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::ApprovalStatus;

/// A community post. Only `approved` posts reach the public feed.
///
/// A post carries text, an image, or both. Event announcements add a start/end window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub mosque_id: String,
    pub admin_id: String,
    pub title: String,
    pub content: Option<String>,
    /// Base64 image bytes.
    pub image: Option<String>,
    pub event_start_date: Option<DateTime<Utc>>,
    pub event_end_date: Option<DateTime<Utc>>,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
}
