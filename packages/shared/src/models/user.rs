use serde::{Deserialize, Serialize};

/// Per-user aggregates owned by the score ledger.
///
/// Every counter is monotonically increasing; nothing in the lifecycle engine
/// ever decrements one. Rows are created lazily on the first bump so user
/// provisioning can stay with the external auth system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub rides_offered_count: i64,
    pub rides_requested_count: i64,
    pub rides_given_count: i64,
    pub rides_received_count: i64,
    pub score: i64,
    pub driver_rating_sum: i64,
    pub driver_rating_count: i64,
    pub passenger_rating_sum: i64,
    pub passenger_rating_count: i64,
}

impl UserAccount {
    pub fn new(id: i64) -> Self {
        UserAccount {
            id,
            rides_offered_count: 0,
            rides_requested_count: 0,
            rides_given_count: 0,
            rides_received_count: 0,
            score: 0,
            driver_rating_sum: 0,
            driver_rating_count: 0,
            passenger_rating_sum: 0,
            passenger_rating_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_starts_at_zero() {
        let account = UserAccount::new(7);
        assert_eq!(account.id, 7);
        assert_eq!(account.score, 0);
        assert_eq!(account.rides_given_count, 0);
        assert_eq!(account.driver_rating_count, 0);
    }
}
