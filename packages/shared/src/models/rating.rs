use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role the rated party played on the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatedRole {
    Driver,
    Passenger,
}

impl RatedRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatedRole::Driver => "driver",
            RatedRole::Passenger => "passenger",
        }
    }

    pub fn parse(value: &str) -> Option<RatedRole> {
        match value {
            "driver" => Some(RatedRole::Driver),
            "passenger" => Some(RatedRole::Passenger),
            _ => None,
        }
    }
}

/// One rating per (match, rater) pair, written once the match is completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub match_id: i64,
    pub rater_id: i64,
    pub rated_id: i64,
    pub rated_role: RatedRole,
    pub stars: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRating {
    pub match_id: i64,
    pub rater_id: i64,
    pub rated_id: i64,
    pub rated_role: RatedRole,
    pub stars: i16,
    pub comment: Option<String>,
}
