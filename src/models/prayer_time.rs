use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The five daily prayer times as clock strings, e.g. "05:10".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTimings {
    pub fajr: String,
    pub dhuhr: String,
    pub asr: String,
    pub maghrib: String,
    pub isha: String,
}

impl DailyTimings {
    /// Name of the first empty time, if any.
    pub fn first_missing(&self) -> Option<&'static str> {
        [
            ("fajr", &self.fajr),
            ("dhuhr", &self.dhuhr),
            ("asr", &self.asr),
            ("maghrib", &self.maghrib),
            ("isha", &self.isha),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Stored in `prayer_times`. At most one manual and one cached record per (mosque, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerTimeRecord {
    pub id: String,
    pub mosque_id: String,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    #[serde(flatten)]
    pub timings: DailyTimings,
    pub is_manual: bool,
    pub created_at: DateTime<Utc>,
}

impl PrayerTimeRecord {
    pub fn new(mosque_id: &str, date: NaiveDate, timings: DailyTimings, is_manual: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mosque_id: mosque_id.to_string(),
            date: date.format(DATE_FORMAT).to_string(),
            timings,
            is_manual,
            created_at: Utc::now(),
        }
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| ServiceError::InvalidDate(value.to_string()))
}
