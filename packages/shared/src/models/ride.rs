use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::status::RideStatus;

/// Whether the owner is offering seats or looking for a lift.
///
/// The kind also fixes the roles of a match: on an `offer` the owner drives
/// and the responder rides along, on a `request` it is the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideKind {
    Offer,
    Request,
}

impl RideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideKind::Offer => "offer",
            RideKind::Request => "request",
        }
    }

    pub fn parse(value: &str) -> Option<RideKind> {
        match value {
            "offer" => Some(RideKind::Offer),
            "request" => Some(RideKind::Request),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: i64,
    pub owner_id: i64,
    pub kind: RideKind,
    pub origin: String,
    pub destination: String,
    pub departs_at: Option<DateTime<Utc>>,
    pub arrives_at: Option<DateTime<Utc>>,
    /// 0 means package-only, no passenger seat.
    pub seats: i32,
    pub note: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub status: RideStatus,
    pub deleted: bool,
    pub confirmed_match_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }

    /// Role assignment for a responder, as `(driver_id, passenger_id)`.
    pub fn assign_roles(&self, responder_id: i64) -> (i64, i64) {
        match self.kind {
            RideKind::Offer => (self.owner_id, responder_id),
            RideKind::Request => (responder_id, self.owner_id),
        }
    }
}

/// Input for inserting a ride. Status always starts at `open`.
#[derive(Debug, Clone)]
pub struct NewRide {
    pub owner_id: i64,
    pub kind: RideKind,
    pub origin: String,
    pub destination: String,
    pub departs_at: Option<DateTime<Utc>>,
    pub arrives_at: Option<DateTime<Utc>>,
    pub seats: i32,
    pub note: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ride(kind: RideKind, owner_id: i64) -> Ride {
        let now = Utc::now();
        Ride {
            id: 1,
            owner_id,
            kind,
            origin: "Galway".to_string(),
            destination: "Dublin".to_string(),
            departs_at: None,
            arrives_at: None,
            seats: 3,
            note: None,
            contact_phone: None,
            contact_email: None,
            status: RideStatus::Open,
            deleted: false,
            confirmed_match_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_offer_owner_drives() {
        let ride = ride(RideKind::Offer, 10);
        assert_eq!(ride.assign_roles(20), (10, 20));
    }

    #[test]
    fn test_request_responder_drives() {
        let ride = ride(RideKind::Request, 10);
        assert_eq!(ride.assign_roles(20), (20, 10));
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in [RideKind::Offer, RideKind::Request] {
            assert_eq!(RideKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RideKind::parse("carpool"), None);
    }

    #[test]
    fn test_ride_serialization() {
        let ride = ride(RideKind::Offer, 10);
        let json = serde_json::to_string(&ride).unwrap();
        assert!(json.contains("\"kind\":\"offer\""));
        assert!(json.contains("\"status\":\"open\""));

        let back: Ride = serde_json::from_str(&json).unwrap();
        assert_eq!(back.owner_id, ride.owner_id);
        assert_eq!(back.status, ride.status);
    }
}
