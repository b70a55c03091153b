//! In-memory store used by unit and HTTP tests (and handy for local
//! experiments). A transaction clones the current state, works on the copy,
//! and publishes it on commit; dropping the transaction discards the copy.
//! Begin-order serialization through the mutex stands in for the row-lock
//! backpressure of the Postgres store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::rating::{NewRating, RatedRole, Rating};
use crate::models::ride::{NewRide, Ride, RideKind};
use crate::models::ride_match::RideMatch;
use crate::models::status::{MatchStatus, RideStatus};
use crate::models::user::UserAccount;
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::{
    LifecycleStore, LifecycleTx, MatchStore, RatingStore, RideStore, ScoreStore,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    rides: HashMap<i64, Ride>,
    matches: HashMap<i64, RideMatch>,
    users: HashMap<i64, UserAccount>,
    ratings: HashMap<i64, Rating>,
    next_ride_id: i64,
    next_match_id: i64,
    next_rating_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Clone, Default)]
pub struct InMemoryLifecycleStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryLifecycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter snapshot for a user; a zeroed account if never bumped.
    pub async fn user(&self, user_id: i64) -> UserAccount {
        let state = self.state.lock().await;
        state
            .users
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UserAccount::new(user_id))
    }

    pub async fn ride(&self, ride_id: i64) -> Option<Ride> {
        self.state.lock().await.rides.get(&ride_id).cloned()
    }

    pub async fn match_row(&self, match_id: i64) -> Option<RideMatch> {
        self.state.lock().await.matches.get(&match_id).cloned()
    }

    pub async fn matches_for_ride(&self, ride_id: i64) -> Vec<RideMatch> {
        let state = self.state.lock().await;
        let mut matches: Vec<RideMatch> = state
            .matches
            .values()
            .filter(|m| m.ride_id == ride_id)
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.id);
        matches
    }

    pub async fn ratings_for_match(&self, match_id: i64) -> Vec<Rating> {
        let state = self.state.lock().await;
        let mut ratings: Vec<Rating> = state
            .ratings
            .values()
            .filter(|r| r.match_id == match_id)
            .cloned()
            .collect();
        ratings.sort_by_key(|r| r.id);
        ratings
    }
}

#[async_trait]
impl LifecycleStore for InMemoryLifecycleStore {
    async fn begin(&self) -> Result<Box<dyn LifecycleTx>, RepositoryError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(InMemoryTx { guard, work }))
    }
}

pub struct InMemoryTx {
    guard: OwnedMutexGuard<StoreState>,
    work: StoreState,
}

impl InMemoryTx {
    fn ride_mut(&mut self, ride_id: i64) -> Result<&mut Ride, RepositoryError> {
        self.work
            .rides
            .get_mut(&ride_id)
            .ok_or(RepositoryError::NotFound)
    }

    fn match_mut(&mut self, match_id: i64) -> Result<&mut RideMatch, RepositoryError> {
        self.work
            .matches
            .get_mut(&match_id)
            .ok_or(RepositoryError::NotFound)
    }

    fn user_mut(&mut self, user_id: i64) -> &mut UserAccount {
        self.work
            .users
            .entry(user_id)
            .or_insert_with(|| UserAccount::new(user_id))
    }
}

#[async_trait]
impl RideStore for InMemoryTx {
    async fn insert_ride(&mut self, ride: &NewRide) -> Result<Ride, RepositoryError> {
        let now = Utc::now();
        let created = Ride {
            id: next_id(&mut self.work.next_ride_id),
            owner_id: ride.owner_id,
            kind: ride.kind,
            origin: ride.origin.clone(),
            destination: ride.destination.clone(),
            departs_at: ride.departs_at,
            arrives_at: ride.arrives_at,
            seats: ride.seats,
            note: ride.note.clone(),
            contact_phone: ride.contact_phone.clone(),
            contact_email: ride.contact_email.clone(),
            status: RideStatus::Open,
            deleted: false,
            confirmed_match_id: None,
            created_at: now,
            updated_at: now,
        };
        self.work.rides.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_ride(&mut self, ride_id: i64) -> Result<Ride, RepositoryError> {
        self.work
            .rides
            .get(&ride_id)
            .filter(|r| !r.deleted)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn lock_and_load(&mut self, ride_id: i64) -> Result<Ride, RepositoryError> {
        // The whole store is already exclusively held by this transaction.
        self.find_ride(ride_id).await
    }

    async fn advance_status(
        &mut self,
        ride_id: i64,
        status: RideStatus,
    ) -> Result<(), RepositoryError> {
        let ride = self.ride_mut(ride_id)?;
        ride.status = status;
        ride.updated_at = Utc::now();
        Ok(())
    }

    async fn set_confirmed_match(
        &mut self,
        ride_id: i64,
        match_id: Option<i64>,
    ) -> Result<(), RepositoryError> {
        let ride = self.ride_mut(ride_id)?;
        ride.confirmed_match_id = match_id;
        ride.updated_at = Utc::now();
        Ok(())
    }

    async fn soft_delete(&mut self, ride_id: i64) -> Result<(), RepositoryError> {
        let ride = self.ride_mut(ride_id)?;
        ride.deleted = true;
        ride.status = RideStatus::Cancelled;
        ride.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl MatchStore for InMemoryTx {
    async fn find_match(&mut self, match_id: i64) -> Result<RideMatch, RepositoryError> {
        self.work
            .matches
            .get(&match_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn lock_and_load_by_id(
        &mut self,
        match_id: i64,
        ride_id: i64,
    ) -> Result<RideMatch, RepositoryError> {
        self.work
            .matches
            .get(&match_id)
            .filter(|m| m.ride_id == ride_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_final_for_ride(
        &mut self,
        ride_id: i64,
    ) -> Result<Option<RideMatch>, RepositoryError> {
        Ok(self
            .work
            .matches
            .values()
            .filter(|m| m.ride_id == ride_id && m.status.is_final_positive())
            .min_by_key(|m| m.id)
            .cloned())
    }

    async fn find_existing_pair(
        &mut self,
        ride_id: i64,
        driver_id: i64,
        passenger_id: i64,
    ) -> Result<Option<RideMatch>, RepositoryError> {
        Ok(self
            .work
            .matches
            .values()
            .filter(|m| {
                m.ride_id == ride_id && m.driver_id == driver_id && m.passenger_id == passenger_id
            })
            .max_by_key(|m| m.id)
            .cloned())
    }

    async fn insert_match(
        &mut self,
        ride_id: i64,
        driver_id: i64,
        passenger_id: i64,
        status: MatchStatus,
        confirmed_at: Option<DateTime<Utc>>,
    ) -> Result<RideMatch, RepositoryError> {
        let duplicate = self.work.matches.values().any(|m| {
            m.ride_id == ride_id
                && m.driver_id == driver_id
                && m.passenger_id == passenger_id
                && !m.status.is_terminal()
        });
        if duplicate {
            return Err(RepositoryError::Duplicate);
        }
        let now = Utc::now();
        let created = RideMatch {
            id: next_id(&mut self.work.next_match_id),
            ride_id,
            driver_id,
            passenger_id,
            status,
            confirmed_at,
            created_at: now,
            updated_at: now,
        };
        self.work.matches.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_status(
        &mut self,
        match_id: i64,
        status: MatchStatus,
        confirmed_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let m = self.match_mut(match_id)?;
        m.status = status;
        if confirmed_at.is_some() {
            m.confirmed_at = confirmed_at;
        }
        m.updated_at = Utc::now();
        Ok(())
    }

    async fn reject_siblings(
        &mut self,
        ride_id: i64,
        except_match_id: i64,
    ) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut rejected = 0;
        for m in self.work.matches.values_mut() {
            if m.ride_id == ride_id && m.id != except_match_id && m.status == MatchStatus::Pending {
                m.status = MatchStatus::Rejected;
                m.updated_at = now;
                rejected += 1;
            }
        }
        Ok(rejected)
    }

    async fn cancel_open_matches(&mut self, ride_id: i64) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut cancelled = 0;
        for m in self.work.matches.values_mut() {
            if m.ride_id == ride_id && !m.status.is_terminal() {
                m.status = MatchStatus::Cancelled;
                m.updated_at = now;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }
}

#[async_trait]
impl ScoreStore for InMemoryTx {
    async fn add_score(&mut self, user_id: i64, points: i64) -> Result<(), RepositoryError> {
        self.user_mut(user_id).score += points;
        Ok(())
    }

    async fn bump_posted_count(
        &mut self,
        user_id: i64,
        kind: RideKind,
    ) -> Result<(), RepositoryError> {
        let user = self.user_mut(user_id);
        match kind {
            RideKind::Offer => user.rides_offered_count += 1,
            RideKind::Request => user.rides_requested_count += 1,
        }
        Ok(())
    }

    async fn bump_given_count(&mut self, user_id: i64) -> Result<(), RepositoryError> {
        self.user_mut(user_id).rides_given_count += 1;
        Ok(())
    }

    async fn bump_received_count(&mut self, user_id: i64) -> Result<(), RepositoryError> {
        self.user_mut(user_id).rides_received_count += 1;
        Ok(())
    }

    async fn add_rating_aggregate(
        &mut self,
        user_id: i64,
        role: RatedRole,
        stars: i16,
    ) -> Result<(), RepositoryError> {
        let user = self.user_mut(user_id);
        match role {
            RatedRole::Driver => {
                user.driver_rating_sum += i64::from(stars);
                user.driver_rating_count += 1;
            }
            RatedRole::Passenger => {
                user.passenger_rating_sum += i64::from(stars);
                user.passenger_rating_count += 1;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RatingStore for InMemoryTx {
    async fn insert_rating(&mut self, rating: &NewRating) -> Result<Rating, RepositoryError> {
        let duplicate = self
            .work
            .ratings
            .values()
            .any(|r| r.match_id == rating.match_id && r.rater_id == rating.rater_id);
        if duplicate {
            return Err(RepositoryError::Duplicate);
        }
        let created = Rating {
            id: next_id(&mut self.work.next_rating_id),
            match_id: rating.match_id,
            rater_id: rating.rater_id,
            rated_id: rating.rated_id,
            rated_role: rating.rated_role,
            stars: rating.stars,
            comment: rating.comment.clone(),
            created_at: Utc::now(),
        };
        self.work.ratings.insert(created.id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl LifecycleTx for InMemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let InMemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}
