use serde::{Deserialize, Serialize};

/// Lifecycle states of a posted ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Open,
    Matched,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Open => "open",
            RideStatus::Matched => "matched",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<RideStatus> {
        match value {
            "open" => Some(RideStatus::Open),
            "matched" => Some(RideStatus::Matched),
            "in_progress" => Some(RideStatus::InProgress),
            "completed" => Some(RideStatus::Completed),
            "cancelled" => Some(RideStatus::Cancelled),
            _ => None,
        }
    }

    pub const ALL: [RideStatus; 5] = [
        RideStatus::Open,
        RideStatus::Matched,
        RideStatus::InProgress,
        RideStatus::Completed,
        RideStatus::Cancelled,
    ];
}

/// Lifecycle states of a match between a ride and a responder.
///
/// `confirmed` is a legacy final-positive state: old rows may carry it and it
/// is treated exactly like `accepted`, but no transition produces it anymore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Confirmed,
    InProgress,
    Completed,
    Rejected,
    Withdrawn,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Accepted => "accepted",
            MatchStatus::Confirmed => "confirmed",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Completed => "completed",
            MatchStatus::Rejected => "rejected",
            MatchStatus::Withdrawn => "withdrawn",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<MatchStatus> {
        match value {
            "pending" => Some(MatchStatus::Pending),
            "accepted" => Some(MatchStatus::Accepted),
            "confirmed" => Some(MatchStatus::Confirmed),
            "in_progress" => Some(MatchStatus::InProgress),
            "completed" => Some(MatchStatus::Completed),
            "rejected" => Some(MatchStatus::Rejected),
            "withdrawn" => Some(MatchStatus::Withdrawn),
            "cancelled" => Some(MatchStatus::Cancelled),
            _ => None,
        }
    }

    /// An active or concluded pairing. A ride may hold at most one of these.
    pub fn is_final_positive(&self) -> bool {
        matches!(
            self,
            MatchStatus::Accepted
                | MatchStatus::Confirmed
                | MatchStatus::InProgress
                | MatchStatus::Completed
        )
    }

    /// A state that no transition can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MatchStatus::Completed
                | MatchStatus::Rejected
                | MatchStatus::Withdrawn
                | MatchStatus::Cancelled
        )
    }

    pub const FINAL_POSITIVE: [MatchStatus; 4] = [
        MatchStatus::Accepted,
        MatchStatus::Confirmed,
        MatchStatus::InProgress,
        MatchStatus::Completed,
    ];

    pub const NON_TERMINAL: [MatchStatus; 4] = [
        MatchStatus::Pending,
        MatchStatus::Accepted,
        MatchStatus::Confirmed,
        MatchStatus::InProgress,
    ];

    pub const ALL: [MatchStatus; 8] = [
        MatchStatus::Pending,
        MatchStatus::Accepted,
        MatchStatus::Confirmed,
        MatchStatus::InProgress,
        MatchStatus::Completed,
        MatchStatus::Rejected,
        MatchStatus::Withdrawn,
        MatchStatus::Cancelled,
    ];
}

/// Mapping between the canonical status vocabulary and the persisted tokens.
///
/// The status column is limited to 9 characters, a leftover from the first
/// schema, so `in_progress` is stored as `in_prog`. Every other token is
/// stored verbatim. Tokens this codec does not know pass through unchanged so
/// newer writers do not break older readers.
pub mod codec {
    const RENAMES: [(&str, &str); 1] = [("in_progress", "in_prog")];

    /// Canonical token -> persisted token.
    pub fn encode(canonical: &str) -> &str {
        for (canon, stored) in RENAMES {
            if canonical == canon {
                return stored;
            }
        }
        canonical
    }

    /// Persisted token -> canonical token.
    pub fn decode(stored: &str) -> &str {
        for (canon, st) in RENAMES {
            if stored == st {
                return canon;
            }
        }
        stored
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_every_ride_status_roundtrips_through_codec() {
        for status in RideStatus::ALL {
            let stored = codec::encode(status.as_str());
            assert!(stored.len() <= 9, "{stored} exceeds the legacy column");
            let canonical = codec::decode(stored);
            assert_eq!(RideStatus::parse(canonical), Some(status));
        }
    }

    #[test]
    fn test_every_match_status_roundtrips_through_codec() {
        for status in MatchStatus::ALL {
            let stored = codec::encode(status.as_str());
            assert!(stored.len() <= 9, "{stored} exceeds the legacy column");
            let canonical = codec::decode(stored);
            assert_eq!(MatchStatus::parse(canonical), Some(status));
        }
    }

    #[test]
    fn test_in_progress_is_truncated() {
        assert_eq!(codec::encode("in_progress"), "in_prog");
        assert_eq!(codec::decode("in_prog"), "in_progress");
    }

    #[test]
    fn test_unknown_tokens_pass_through() {
        assert_eq!(codec::encode("archived"), "archived");
        assert_eq!(codec::decode("archived"), "archived");
    }

    #[test_case(MatchStatus::Accepted, true ; "accepted is final positive")]
    #[test_case(MatchStatus::Confirmed, true ; "confirmed is final positive")]
    #[test_case(MatchStatus::InProgress, true ; "in progress is final positive")]
    #[test_case(MatchStatus::Completed, true ; "completed is final positive")]
    #[test_case(MatchStatus::Pending, false ; "pending is not final positive")]
    #[test_case(MatchStatus::Rejected, false ; "rejected is not final positive")]
    #[test_case(MatchStatus::Withdrawn, false ; "withdrawn is not final positive")]
    #[test_case(MatchStatus::Cancelled, false ; "cancelled is not final positive")]
    fn test_final_positive(status: MatchStatus, expected: bool) {
        assert_eq!(status.is_final_positive(), expected);
    }

    #[test_case(MatchStatus::Completed, true ; "completed is terminal")]
    #[test_case(MatchStatus::Rejected, true ; "rejected is terminal")]
    #[test_case(MatchStatus::Withdrawn, true ; "withdrawn is terminal")]
    #[test_case(MatchStatus::Cancelled, true ; "cancelled is terminal")]
    #[test_case(MatchStatus::Pending, false ; "pending is not terminal")]
    #[test_case(MatchStatus::Accepted, false ; "accepted is not terminal")]
    #[test_case(MatchStatus::Confirmed, false ; "confirmed is not terminal")]
    #[test_case(MatchStatus::InProgress, false ; "in progress is not terminal")]
    fn test_terminal(status: MatchStatus, expected: bool) {
        assert_eq!(status.is_terminal(), expected);
    }

    #[test]
    fn test_serde_uses_canonical_tokens() {
        let json = serde_json::to_string(&RideStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let status: MatchStatus = serde_json::from_str("\"withdrawn\"").unwrap();
        assert_eq!(status, MatchStatus::Withdrawn);
    }
}
