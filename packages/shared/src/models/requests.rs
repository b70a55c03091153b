use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ride::RideKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRideRequest {
    pub kind: RideKind,
    pub origin: String,
    pub destination: String,
    pub departs_at: Option<DateTime<Utc>>,
    pub arrives_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seats: i32,
    pub note: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
}

/// Target status for the ride status endpoint. Parsed as a raw token so an
/// unknown status fails validation rather than deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRideStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRatingRequest {
    pub stars: i16,
    pub comment: Option<String>,
}
