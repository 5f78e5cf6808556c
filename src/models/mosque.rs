use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mosque {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub alternate_phone: Option<String>,
    pub address: String,
    pub district: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Base64 donation QR image.
    pub donation_qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Mosque {
    /// Both halves of the coordinate pair, or nothing.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Mosque fields supplied by a caller, either directly or inline with an admin registration.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMosque {
    pub name: String,
    pub phone: Option<String>,
    pub alternate_phone: Option<String>,
    pub address: String,
    pub district: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
