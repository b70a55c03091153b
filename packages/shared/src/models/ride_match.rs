use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::rating::RatedRole;
use crate::models::status::MatchStatus;

/// A proposed or realized pairing between a ride's owner and a responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideMatch {
    pub id: i64,
    pub ride_id: i64,
    pub driver_id: i64,
    pub passenger_id: i64,
    pub status: MatchStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RideMatch {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.driver_id == user_id || self.passenger_id == user_id
    }

    /// The other participant and the role they played, seen from `user_id`.
    /// `None` if `user_id` is not part of the match.
    pub fn counterpart_of(&self, user_id: i64) -> Option<(i64, RatedRole)> {
        if user_id == self.driver_id {
            Some((self.passenger_id, RatedRole::Passenger))
        } else if user_id == self.passenger_id {
            Some((self.driver_id, RatedRole::Driver))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairing() -> RideMatch {
        let now = Utc::now();
        RideMatch {
            id: 5,
            ride_id: 1,
            driver_id: 10,
            passenger_id: 20,
            status: MatchStatus::Pending,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_participants() {
        let m = pairing();
        assert!(m.is_participant(10));
        assert!(m.is_participant(20));
        assert!(!m.is_participant(30));
    }

    #[test]
    fn test_counterpart_roles() {
        let m = pairing();
        assert_eq!(m.counterpart_of(10), Some((20, RatedRole::Passenger)));
        assert_eq!(m.counterpart_of(20), Some((10, RatedRole::Driver)));
        assert_eq!(m.counterpart_of(30), None);
    }
}
