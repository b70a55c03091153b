//! Counter and score mutations applied as part of a workflow transition.
//!
//! Everything here runs against the caller's open transaction, so a rolled
//! back transition never leaves a stray counter bump behind. This module is
//! the only place that knows the bonus amounts; in particular the match
//! bonus is credited here and nowhere else, whichever accept path fires it.

use crate::models::rating::RatedRole;
use crate::models::ride::RideKind;
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::LifecycleTx;

/// Credited to both participants when a match is locked in.
pub const MATCH_ACCEPT_BONUS: i64 = 100;

/// Credited to the rated party for a five-star rating.
pub const FIVE_STAR_BONUS: i64 = 100;

const FIVE_STARS: i16 = 5;

/// Posting a ride counts towards the owner's offered/requested tally.
pub async fn record_posting(
    tx: &mut dyn LifecycleTx,
    owner_id: i64,
    kind: RideKind,
) -> Result<(), RepositoryError> {
    tx.bump_posted_count(owner_id, kind).await
}

/// The accept bonus, credited to both sides exactly once per ride.
pub async fn credit_match_bonus(
    tx: &mut dyn LifecycleTx,
    driver_id: i64,
    passenger_id: i64,
) -> Result<(), RepositoryError> {
    tx.add_score(driver_id, MATCH_ACCEPT_BONUS).await?;
    tx.add_score(passenger_id, MATCH_ACCEPT_BONUS).await
}

/// A completed trip: the driver gave a ride, the passenger received one.
pub async fn record_completion(
    tx: &mut dyn LifecycleTx,
    driver_id: i64,
    passenger_id: i64,
) -> Result<(), RepositoryError> {
    tx.bump_given_count(driver_id).await?;
    tx.bump_received_count(passenger_id).await
}

/// Updates the rated party's aggregate and returns the score bonus applied
/// (zero unless the rating is five stars).
pub async fn record_rating(
    tx: &mut dyn LifecycleTx,
    rated_id: i64,
    role: RatedRole,
    stars: i16,
) -> Result<i64, RepositoryError> {
    tx.add_rating_aggregate(rated_id, role, stars).await?;
    if stars == FIVE_STARS {
        tx.add_score(rated_id, FIVE_STAR_BONUS).await?;
        return Ok(FIVE_STAR_BONUS);
    }
    Ok(0)
}
