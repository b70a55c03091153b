pub mod errors;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::rating::{NewRating, RatedRole, Rating};
use crate::models::ride::{NewRide, Ride, RideKind};
use crate::models::ride_match::RideMatch;
use crate::models::status::{MatchStatus, RideStatus};
use errors::repository_errors::RepositoryError;

/// Opens lifecycle transactions. Every workflow operation runs inside exactly
/// one transaction obtained here; all decision reads happen through the
/// returned [`LifecycleTx`] after the relevant ride row is locked.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LifecycleTx>, RepositoryError>;
}

/// Read/lock/update access to a single ride row.
#[async_trait]
pub trait RideStore: Send {
    async fn insert_ride(&mut self, ride: &NewRide) -> Result<Ride, RepositoryError>;

    /// Plain read, filtered to non-deleted rides. Only for display and for
    /// resolving which ride to lock; never for transition decisions.
    async fn find_ride(&mut self, ride_id: i64) -> Result<Ride, RepositoryError>;

    /// Exclusive row lock held until the transaction ends, filtered to
    /// non-deleted rides. Must precede any mutation that depends on the
    /// current ride status.
    async fn lock_and_load(&mut self, ride_id: i64) -> Result<Ride, RepositoryError>;

    /// Unconditional status write; callers validate the transition first.
    async fn advance_status(
        &mut self,
        ride_id: i64,
        status: RideStatus,
    ) -> Result<(), RepositoryError>;

    async fn set_confirmed_match(
        &mut self,
        ride_id: i64,
        match_id: Option<i64>,
    ) -> Result<(), RepositoryError>;

    /// Sets the deleted flag and forces the status to `cancelled`.
    async fn soft_delete(&mut self, ride_id: i64) -> Result<(), RepositoryError>;
}

/// Read/lock/update/insert access to the matches of a ride.
#[async_trait]
pub trait MatchStore: Send {
    /// Plain read used to discover the owning ride before taking locks.
    async fn find_match(&mut self, match_id: i64) -> Result<RideMatch, RepositoryError>;

    /// Locks and re-reads a match scoped to its ride. The ride row must
    /// already be locked by the same transaction.
    async fn lock_and_load_by_id(
        &mut self,
        match_id: i64,
        ride_id: i64,
    ) -> Result<RideMatch, RepositoryError>;

    /// Any match in a final-positive state for the ride, if one exists. The
    /// returned row is locked like [`MatchStore::lock_and_load_by_id`], so
    /// callers may mutate it directly.
    async fn find_final_for_ride(
        &mut self,
        ride_id: i64,
    ) -> Result<Option<RideMatch>, RepositoryError>;

    /// Most recent match for a specific (driver, passenger) pair on the ride.
    async fn find_existing_pair(
        &mut self,
        ride_id: i64,
        driver_id: i64,
        passenger_id: i64,
    ) -> Result<Option<RideMatch>, RepositoryError>;

    /// Fails with [`RepositoryError::Duplicate`] when a non-terminal match for
    /// the same (ride, driver, passenger) triple already exists.
    async fn insert_match(
        &mut self,
        ride_id: i64,
        driver_id: i64,
        passenger_id: i64,
        status: MatchStatus,
        confirmed_at: Option<DateTime<Utc>>,
    ) -> Result<RideMatch, RepositoryError>;

    /// `confirmed_at` is only written when `Some`; existing values persist.
    async fn set_status(
        &mut self,
        match_id: i64,
        status: MatchStatus,
        confirmed_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError>;

    /// Every other pending match on the ride becomes rejected. Returns how
    /// many rows changed.
    async fn reject_siblings(
        &mut self,
        ride_id: i64,
        except_match_id: i64,
    ) -> Result<u64, RepositoryError>;

    /// Every non-terminal match on the ride becomes cancelled. Returns how
    /// many rows changed.
    async fn cancel_open_matches(&mut self, ride_id: i64) -> Result<u64, RepositoryError>;
}

/// Counter and score mutations. All bumps upsert the user row.
#[async_trait]
pub trait ScoreStore: Send {
    async fn add_score(&mut self, user_id: i64, points: i64) -> Result<(), RepositoryError>;

    async fn bump_posted_count(
        &mut self,
        user_id: i64,
        kind: RideKind,
    ) -> Result<(), RepositoryError>;

    async fn bump_given_count(&mut self, user_id: i64) -> Result<(), RepositoryError>;

    async fn bump_received_count(&mut self, user_id: i64) -> Result<(), RepositoryError>;

    async fn add_rating_aggregate(
        &mut self,
        user_id: i64,
        role: RatedRole,
        stars: i16,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RatingStore: Send {
    /// Fails with [`RepositoryError::Duplicate`] when the rater already rated
    /// this match.
    async fn insert_rating(&mut self, rating: &NewRating) -> Result<Rating, RepositoryError>;
}

/// One open transaction across rides, matches, scores and ratings.
///
/// Dropping an uncommitted transaction rolls it back, so error paths can
/// simply return.
#[async_trait]
pub trait LifecycleTx: RideStore + MatchStore + ScoreStore + RatingStore {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}
