use serde::{Deserialize, Serialize};

use crate::models::ride::Ride;
use crate::models::ride_match::RideMatch;
use crate::models::status::{MatchStatus, RideStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(code: &str) -> Self {
        ErrorResponse {
            ok: false,
            error: code.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        OkResponse { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        OkResponse::new()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RideResponse {
    pub ok: bool,
    pub ride: Ride,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchRequestedResponse {
    pub ok: bool,
    pub status: MatchStatus,
    pub match_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchAcceptedResponse {
    pub ok: bool,
    pub status: MatchStatus,
    pub ride: Ride,
    #[serde(rename = "match")]
    pub accepted: RideMatch,
    pub bumped_users: Vec<i64>,
    pub score_delta: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RideStatusResponse {
    pub ok: bool,
    pub status: RideStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchCompletedResponse {
    pub ok: bool,
    pub status: MatchStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RatingResponse {
    pub ok: bool,
    pub bonus: i64,
}
