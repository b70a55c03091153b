//! The match state machine.
//!
//! Every operation opens one transaction, locks the ride row first and the
//! target match second, re-reads all state it decides on under that lock,
//! and either commits the whole transition or rolls everything back.
//! Notifications go out after the commit and are best effort.

use std::sync::Arc;

use chrono::Utc;

use crate::models::ride::Ride;
use crate::models::ride_match::RideMatch;
use crate::models::status::{MatchStatus, RideStatus};
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::{LifecycleStore, LifecycleTx};
use crate::services::errors::match_workflow_errors::MatchWorkflowError;
use crate::services::notifier::{LifecycleEvent, LifecycleNotifier, Notification};
use crate::services::score_ledger;

/// Result of locking in a match, whichever accept path produced it.
#[derive(Debug)]
pub struct AcceptOutcome {
    pub ride: Ride,
    pub accepted: RideMatch,
    pub rejected_siblings: u64,
    /// Points credited to each participant by this call. Zero when the call
    /// was an idempotent replay.
    pub score_delta: i64,
}

impl AcceptOutcome {
    pub fn bumped_users(&self) -> Vec<i64> {
        if self.score_delta == 0 {
            return vec![];
        }
        vec![self.accepted.driver_id, self.accepted.passenger_id]
    }
}

pub struct MatchWorkflowService {
    store: Arc<dyn LifecycleStore>,
    notifier: Arc<dyn LifecycleNotifier>,
}

impl MatchWorkflowService {
    pub fn new(store: Arc<dyn LifecycleStore>, notifier: Arc<dyn LifecycleNotifier>) -> Self {
        MatchWorkflowService { store, notifier }
    }

    /// A responder expresses interest in an open ride. The ride status does
    /// not change; a ride may hold any number of pending matches.
    pub async fn request_match(
        &self,
        actor_id: i64,
        ride_id: i64,
    ) -> Result<RideMatch, MatchWorkflowError> {
        const OP: &str = "request_match";
        let mut tx = self.begin(OP, ride_id).await?;
        let ride = self.lock_ride(tx.as_mut(), OP, ride_id).await?;
        if ride.is_owner(actor_id) {
            return Err(MatchWorkflowError::OwnRide);
        }
        if ride.status != RideStatus::Open {
            return Err(MatchWorkflowError::RideNotOpen);
        }
        if self
            .find_final(tx.as_mut(), OP, ride_id)
            .await?
            .is_some()
        {
            return Err(MatchWorkflowError::AlreadyFinal);
        }

        let (driver_id, passenger_id) = ride.assign_roles(actor_id);
        if let Some(existing) = tx
            .find_existing_pair(ride_id, driver_id, passenger_id)
            .await
            .map_err(|e| self.storage(OP, ride_id, None, e))?
        {
            if !existing.status.is_terminal() {
                return Err(MatchWorkflowError::AlreadyRequested);
            }
        }

        let created = match tx
            .insert_match(ride_id, driver_id, passenger_id, MatchStatus::Pending, None)
            .await
        {
            Ok(created) => created,
            Err(RepositoryError::Duplicate) => return Err(MatchWorkflowError::AlreadyRequested),
            Err(e) => return Err(self.storage(OP, ride_id, None, e)),
        };
        self.commit(tx, OP, ride_id).await?;

        self.notifier
            .notify(Notification {
                event: LifecycleEvent::MatchRequested,
                ride_id,
                actor_id,
                recipient_id: ride.owner_id,
                title: "New ride request".to_string(),
                body: format!("Someone wants to join {} to {}", ride.origin, ride.destination),
            })
            .await;
        Ok(created)
    }

    /// The owner picks one pending match. The chosen match is locked in, its
    /// pending siblings are rejected, the ride flips to matched, and both
    /// participants receive the accept bonus.
    pub async fn accept_match(
        &self,
        actor_id: i64,
        ride_id: i64,
        match_id: i64,
    ) -> Result<AcceptOutcome, MatchWorkflowError> {
        const OP: &str = "accept_match";
        let mut tx = self.begin(OP, ride_id).await?;
        let ride = self.lock_ride(tx.as_mut(), OP, ride_id).await?;
        if !ride.is_owner(actor_id) {
            return Err(MatchWorkflowError::NotRideOwner);
        }
        let target = self.lock_match(tx.as_mut(), OP, match_id, ride_id).await?;

        if ride.status != RideStatus::Open {
            // A retried call that already went through succeeds as a no-op.
            if ride.status == RideStatus::Matched
                && ride.confirmed_match_id == Some(match_id)
                && target.status.is_final_positive()
            {
                return Ok(AcceptOutcome {
                    ride,
                    accepted: target,
                    rejected_siblings: 0,
                    score_delta: 0,
                });
            }
            return Err(MatchWorkflowError::RideNotOpen);
        }
        if target.status != MatchStatus::Pending {
            return Err(MatchWorkflowError::MatchNotPending);
        }

        let outcome = self
            .lock_in_match(tx.as_mut(), OP, ride, target)
            .await?;
        self.commit(tx, OP, ride_id).await?;

        let responder = if outcome.accepted.driver_id == actor_id {
            outcome.accepted.passenger_id
        } else {
            outcome.accepted.driver_id
        };
        self.notifier
            .notify(Notification {
                event: LifecycleEvent::MatchAccepted,
                ride_id,
                actor_id,
                recipient_id: responder,
                title: "Your ride is confirmed".to_string(),
                body: format!(
                    "{} to {} is locked in",
                    outcome.ride.origin, outcome.ride.destination
                ),
            })
            .await;
        Ok(outcome)
    }

    /// One-step path: a responder takes an open ride outright, skipping the
    /// pending stage. Shares the "no existing final match" and pair
    /// uniqueness checks with the two-step path.
    pub async fn fast_accept(
        &self,
        actor_id: i64,
        ride_id: i64,
    ) -> Result<AcceptOutcome, MatchWorkflowError> {
        const OP: &str = "fast_accept";
        let mut tx = self.begin(OP, ride_id).await?;
        let ride = self.lock_ride(tx.as_mut(), OP, ride_id).await?;
        if ride.is_owner(actor_id) {
            return Err(MatchWorkflowError::OwnRide);
        }
        if ride.status != RideStatus::Open {
            return Err(MatchWorkflowError::RideNotOpen);
        }
        if self
            .find_final(tx.as_mut(), OP, ride_id)
            .await?
            .is_some()
        {
            return Err(MatchWorkflowError::AlreadyFinal);
        }

        let (driver_id, passenger_id) = ride.assign_roles(actor_id);
        if let Some(existing) = tx
            .find_existing_pair(ride_id, driver_id, passenger_id)
            .await
            .map_err(|e| self.storage(OP, ride_id, None, e))?
        {
            if !existing.status.is_terminal() {
                return Err(MatchWorkflowError::AlreadyRequested);
            }
        }

        let now = Utc::now();
        let target = match tx
            .insert_match(
                ride_id,
                driver_id,
                passenger_id,
                MatchStatus::Accepted,
                Some(now),
            )
            .await
        {
            Ok(created) => created,
            Err(RepositoryError::Duplicate) => return Err(MatchWorkflowError::AlreadyRequested),
            Err(e) => return Err(self.storage(OP, ride_id, None, e)),
        };

        let outcome = self
            .lock_in_match(tx.as_mut(), OP, ride, target)
            .await?;
        self.commit(tx, OP, ride_id).await?;

        self.notifier
            .notify(Notification {
                event: LifecycleEvent::MatchAccepted,
                ride_id,
                actor_id,
                recipient_id: outcome.ride.owner_id,
                title: "Your ride was taken".to_string(),
                body: format!(
                    "{} to {} is locked in",
                    outcome.ride.origin, outcome.ride.destination
                ),
            })
            .await;
        Ok(outcome)
    }

    /// A participant backs out of a pending match. The ride stays open.
    pub async fn withdraw(&self, actor_id: i64, match_id: i64) -> Result<(), MatchWorkflowError> {
        const OP: &str = "withdraw";
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| self.storage(OP, 0, Some(match_id), e))?;
        // Plain read to discover the ride, then both rows under lock.
        let probe = match tx.find_match(match_id).await {
            Ok(probe) => probe,
            Err(RepositoryError::NotFound) => return Err(MatchWorkflowError::MatchNotFound),
            Err(e) => return Err(self.storage(OP, 0, Some(match_id), e)),
        };
        let ride = self.lock_ride(tx.as_mut(), OP, probe.ride_id).await?;
        let target = self
            .lock_match(tx.as_mut(), OP, match_id, ride.id)
            .await?;
        if !target.is_participant(actor_id) {
            return Err(MatchWorkflowError::NotParticipant);
        }
        if target.status == MatchStatus::Withdrawn {
            return Ok(());
        }
        if target.status != MatchStatus::Pending {
            return Err(MatchWorkflowError::MatchNotPending);
        }

        tx.set_status(match_id, MatchStatus::Withdrawn, None)
            .await
            .map_err(|e| self.storage(OP, ride.id, Some(match_id), e))?;
        self.commit(tx, OP, ride.id).await?;

        if let Some((counterpart, _)) = target.counterpart_of(actor_id) {
            self.notifier
                .notify(Notification {
                    event: LifecycleEvent::MatchWithdrawn,
                    ride_id: ride.id,
                    actor_id,
                    recipient_id: counterpart,
                    title: "A ride request was withdrawn".to_string(),
                    body: format!("{} to {}", ride.origin, ride.destination),
                })
                .await;
        }
        Ok(())
    }

    /// A participant marks the trip done. Match and ride both complete and
    /// the given/received counters move exactly once.
    pub async fn complete_match(
        &self,
        actor_id: i64,
        ride_id: i64,
        match_id: i64,
    ) -> Result<RideMatch, MatchWorkflowError> {
        const OP: &str = "complete_match";
        let mut tx = self.begin(OP, ride_id).await?;
        let ride = self.lock_ride(tx.as_mut(), OP, ride_id).await?;
        let target = self.lock_match(tx.as_mut(), OP, match_id, ride_id).await?;
        if !target.is_participant(actor_id) {
            return Err(MatchWorkflowError::NotParticipant);
        }
        if target.status == MatchStatus::Completed && ride.status == RideStatus::Completed {
            return Ok(target);
        }
        if !Self::completable(&target) {
            return Err(MatchWorkflowError::BadState);
        }
        if !matches!(ride.status, RideStatus::Matched | RideStatus::InProgress) {
            return Err(MatchWorkflowError::BadState);
        }

        self.apply_completion(tx.as_mut(), OP, &ride, &target).await?;
        self.commit(tx, OP, ride_id).await?;
        self.notify_completed(&ride, &target, actor_id).await;

        let mut completed = target;
        completed.status = MatchStatus::Completed;
        Ok(completed)
    }

    /// The explicit ride status endpoint. `open` and `matched` can never be
    /// set directly; they only arise from posting and accepting.
    pub async fn change_ride_status(
        &self,
        actor_id: i64,
        ride_id: i64,
        to: RideStatus,
    ) -> Result<RideStatus, MatchWorkflowError> {
        match to {
            RideStatus::Open | RideStatus::Matched => Err(MatchWorkflowError::IllegalTransition),
            RideStatus::Cancelled => {
                self.cancel_ride(actor_id, ride_id).await?;
                Ok(RideStatus::Cancelled)
            }
            RideStatus::InProgress => {
                self.start_ride(actor_id, ride_id).await?;
                Ok(RideStatus::InProgress)
            }
            RideStatus::Completed => {
                self.complete_via_status(actor_id, ride_id).await?;
                Ok(RideStatus::Completed)
            }
        }
    }

    /// Owner-only. Every non-terminal match on the ride is cancelled with it.
    pub async fn cancel_ride(&self, actor_id: i64, ride_id: i64) -> Result<(), MatchWorkflowError> {
        const OP: &str = "cancel_ride";
        let mut tx = self.begin(OP, ride_id).await?;
        let ride = self.lock_ride(tx.as_mut(), OP, ride_id).await?;
        if !ride.is_owner(actor_id) {
            return Err(MatchWorkflowError::NotRideOwner);
        }
        match ride.status {
            RideStatus::Cancelled => return Ok(()),
            RideStatus::Completed => return Err(MatchWorkflowError::IllegalTransition),
            RideStatus::Open | RideStatus::Matched | RideStatus::InProgress => {}
        }

        let active = self.find_final(tx.as_mut(), OP, ride_id).await?;
        tx.cancel_open_matches(ride_id)
            .await
            .map_err(|e| self.storage(OP, ride_id, None, e))?;
        tx.advance_status(ride_id, RideStatus::Cancelled)
            .await
            .map_err(|e| self.storage(OP, ride_id, None, e))?;
        self.commit(tx, OP, ride_id).await?;

        if let Some(active) = active {
            if let Some((counterpart, _)) = active.counterpart_of(actor_id) {
                self.notifier
                    .notify(Notification {
                        event: LifecycleEvent::RideCancelled,
                        ride_id,
                        actor_id,
                        recipient_id: counterpart,
                        title: "Ride cancelled".to_string(),
                        body: format!("{} to {} was cancelled", ride.origin, ride.destination),
                    })
                    .await;
            }
        }
        Ok(())
    }

    async fn start_ride(&self, actor_id: i64, ride_id: i64) -> Result<(), MatchWorkflowError> {
        const OP: &str = "start_ride";
        let mut tx = self.begin(OP, ride_id).await?;
        let ride = self.lock_ride(tx.as_mut(), OP, ride_id).await?;
        let active = self
            .find_final(tx.as_mut(), OP, ride_id)
            .await?
            .ok_or(MatchWorkflowError::NoActiveMatch)?;
        if !active.is_participant(actor_id) {
            return Err(MatchWorkflowError::NotParticipant);
        }
        if ride.status == RideStatus::InProgress {
            return Ok(());
        }
        if ride.status != RideStatus::Matched {
            return Err(MatchWorkflowError::IllegalTransition);
        }

        tx.set_status(active.id, MatchStatus::InProgress, None)
            .await
            .map_err(|e| self.storage(OP, ride_id, Some(active.id), e))?;
        tx.advance_status(ride_id, RideStatus::InProgress)
            .await
            .map_err(|e| self.storage(OP, ride_id, None, e))?;
        self.commit(tx, OP, ride_id).await?;

        if let Some((counterpart, _)) = active.counterpart_of(actor_id) {
            self.notifier
                .notify(Notification {
                    event: LifecycleEvent::RideInProgress,
                    ride_id,
                    actor_id,
                    recipient_id: counterpart,
                    title: "Ride under way".to_string(),
                    body: format!("{} to {} has started", ride.origin, ride.destination),
                })
                .await;
        }
        Ok(())
    }

    async fn complete_via_status(
        &self,
        actor_id: i64,
        ride_id: i64,
    ) -> Result<(), MatchWorkflowError> {
        const OP: &str = "complete_ride";
        let mut tx = self.begin(OP, ride_id).await?;
        let ride = self.lock_ride(tx.as_mut(), OP, ride_id).await?;
        let active = self
            .find_final(tx.as_mut(), OP, ride_id)
            .await?
            .ok_or(MatchWorkflowError::NoActiveMatch)?;
        if !active.is_participant(actor_id) {
            return Err(MatchWorkflowError::NotParticipant);
        }
        if ride.status == RideStatus::Completed && active.status == MatchStatus::Completed {
            return Ok(());
        }
        if !Self::completable(&active) {
            return Err(MatchWorkflowError::IllegalTransition);
        }
        if !matches!(ride.status, RideStatus::Matched | RideStatus::InProgress) {
            return Err(MatchWorkflowError::IllegalTransition);
        }

        self.apply_completion(tx.as_mut(), OP, &ride, &active).await?;
        self.commit(tx, OP, ride_id).await?;
        self.notify_completed(&ride, &active, actor_id).await;
        Ok(())
    }

    fn completable(target: &RideMatch) -> bool {
        matches!(
            target.status,
            MatchStatus::Accepted | MatchStatus::Confirmed | MatchStatus::InProgress
        )
    }

    /// The one place a match and its ride become `matched`: sets the chosen
    /// match accepted, rejects pending siblings, flips the ride, records the
    /// confirmed match and credits the accept bonus.
    async fn lock_in_match(
        &self,
        tx: &mut dyn LifecycleTx,
        operation: &'static str,
        ride: Ride,
        target: RideMatch,
    ) -> Result<AcceptOutcome, MatchWorkflowError> {
        let now = Utc::now();
        tx.set_status(target.id, MatchStatus::Accepted, Some(now))
            .await
            .map_err(|e| self.storage(operation, ride.id, Some(target.id), e))?;
        let rejected_siblings = tx
            .reject_siblings(ride.id, target.id)
            .await
            .map_err(|e| self.storage(operation, ride.id, Some(target.id), e))?;
        tx.advance_status(ride.id, RideStatus::Matched)
            .await
            .map_err(|e| self.storage(operation, ride.id, None, e))?;
        tx.set_confirmed_match(ride.id, Some(target.id))
            .await
            .map_err(|e| self.storage(operation, ride.id, None, e))?;
        score_ledger::credit_match_bonus(tx, target.driver_id, target.passenger_id)
            .await
            .map_err(|e| self.storage(operation, ride.id, Some(target.id), e))?;

        let mut ride = ride;
        ride.status = RideStatus::Matched;
        ride.confirmed_match_id = Some(target.id);
        let mut accepted = target;
        accepted.status = MatchStatus::Accepted;
        accepted.confirmed_at = Some(now);
        Ok(AcceptOutcome {
            ride,
            accepted,
            rejected_siblings,
            score_delta: score_ledger::MATCH_ACCEPT_BONUS,
        })
    }

    async fn apply_completion(
        &self,
        tx: &mut dyn LifecycleTx,
        operation: &'static str,
        ride: &Ride,
        target: &RideMatch,
    ) -> Result<(), MatchWorkflowError> {
        tx.set_status(target.id, MatchStatus::Completed, None)
            .await
            .map_err(|e| self.storage(operation, ride.id, Some(target.id), e))?;
        tx.advance_status(ride.id, RideStatus::Completed)
            .await
            .map_err(|e| self.storage(operation, ride.id, None, e))?;
        score_ledger::record_completion(tx, target.driver_id, target.passenger_id)
            .await
            .map_err(|e| self.storage(operation, ride.id, Some(target.id), e))
    }

    async fn notify_completed(&self, ride: &Ride, target: &RideMatch, actor_id: i64) {
        if let Some((counterpart, _)) = target.counterpart_of(actor_id) {
            self.notifier
                .notify(Notification {
                    event: LifecycleEvent::RideCompleted,
                    ride_id: ride.id,
                    actor_id,
                    recipient_id: counterpart,
                    title: "Ride completed".to_string(),
                    body: format!("{} to {} is done", ride.origin, ride.destination),
                })
                .await;
        }
    }

    async fn begin(
        &self,
        operation: &'static str,
        ride_id: i64,
    ) -> Result<Box<dyn LifecycleTx>, MatchWorkflowError> {
        self.store
            .begin()
            .await
            .map_err(|e| self.storage(operation, ride_id, None, e))
    }

    async fn commit(
        &self,
        tx: Box<dyn LifecycleTx>,
        operation: &'static str,
        ride_id: i64,
    ) -> Result<(), MatchWorkflowError> {
        tx.commit()
            .await
            .map_err(|e| self.storage(operation, ride_id, None, e))
    }

    async fn lock_ride(
        &self,
        tx: &mut dyn LifecycleTx,
        operation: &'static str,
        ride_id: i64,
    ) -> Result<Ride, MatchWorkflowError> {
        match tx.lock_and_load(ride_id).await {
            Ok(ride) => Ok(ride),
            Err(RepositoryError::NotFound) => Err(MatchWorkflowError::RideNotFound),
            Err(e) => Err(self.storage(operation, ride_id, None, e)),
        }
    }

    async fn lock_match(
        &self,
        tx: &mut dyn LifecycleTx,
        operation: &'static str,
        match_id: i64,
        ride_id: i64,
    ) -> Result<RideMatch, MatchWorkflowError> {
        match tx.lock_and_load_by_id(match_id, ride_id).await {
            Ok(target) => Ok(target),
            Err(RepositoryError::NotFound) => Err(MatchWorkflowError::MatchNotFound),
            Err(e) => Err(self.storage(operation, ride_id, Some(match_id), e)),
        }
    }

    async fn find_final(
        &self,
        tx: &mut dyn LifecycleTx,
        operation: &'static str,
        ride_id: i64,
    ) -> Result<Option<RideMatch>, MatchWorkflowError> {
        tx.find_final_for_ride(ride_id)
            .await
            .map_err(|e| self.storage(operation, ride_id, None, e))
    }

    fn storage(
        &self,
        operation: &'static str,
        ride_id: i64,
        match_id: Option<i64>,
        error: RepositoryError,
    ) -> MatchWorkflowError {
        tracing::error!(
            operation,
            ride_id,
            match_id = ?match_id,
            error = %error,
            "workflow storage failure"
        );
        MatchWorkflowError::RepositoryError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ride::{NewRide, RideKind};
    use crate::repositories::memory::InMemoryLifecycleStore;
    use crate::services::notifier::{LogNotifier, MockLifecycleNotifier};

    const OWNER: i64 = 1;
    const RESPONDER: i64 = 2;
    const OTHER: i64 = 3;

    fn service(store: &InMemoryLifecycleStore) -> MatchWorkflowService {
        MatchWorkflowService::new(Arc::new(store.clone()), Arc::new(LogNotifier))
    }

    async fn post_ride(store: &InMemoryLifecycleStore, kind: RideKind) -> Ride {
        let mut tx = store.begin().await.unwrap();
        let ride = tx
            .insert_ride(&NewRide {
                owner_id: OWNER,
                kind,
                origin: "Athlone".to_string(),
                destination: "Galway".to_string(),
                departs_at: None,
                arrives_at: None,
                seats: 2,
                note: None,
                contact_phone: None,
                contact_email: None,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        ride
    }

    async fn open_offer(store: &InMemoryLifecycleStore) -> Ride {
        post_ride(store, RideKind::Offer).await
    }

    #[tokio::test]
    async fn test_request_creates_pending_match_with_offer_roles() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;

        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();
        assert_eq!(m.status, MatchStatus::Pending);
        assert_eq!(m.driver_id, OWNER);
        assert_eq!(m.passenger_id, RESPONDER);
        // The ride stays open and accumulates pending matches.
        assert_eq!(store.ride(ride.id).await.unwrap().status, RideStatus::Open);
    }

    #[tokio::test]
    async fn test_request_on_request_ride_reverses_roles() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = post_ride(&store, RideKind::Request).await;

        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();
        assert_eq!(m.driver_id, RESPONDER);
        assert_eq!(m.passenger_id, OWNER);
    }

    #[tokio::test]
    async fn test_owner_cannot_request_own_ride() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;

        let result = engine.request_match(OWNER, ride.id).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::OwnRide);
    }

    #[tokio::test]
    async fn test_duplicate_request_is_refused() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;

        engine.request_match(RESPONDER, ride.id).await.unwrap();
        let result = engine.request_match(RESPONDER, ride.id).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::AlreadyRequested);
    }

    #[tokio::test]
    async fn test_withdrawn_pair_may_request_again() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;

        let first = engine.request_match(RESPONDER, ride.id).await.unwrap();
        engine.withdraw(RESPONDER, first.id).await.unwrap();
        let second = engine.request_match(RESPONDER, ride.id).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_request_missing_ride_is_not_found() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);

        let result = engine.request_match(RESPONDER, 99).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::RideNotFound);
    }

    #[tokio::test]
    async fn test_accept_locks_in_match_and_rejects_siblings() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;

        let chosen = engine.request_match(RESPONDER, ride.id).await.unwrap();
        let sibling = engine.request_match(OTHER, ride.id).await.unwrap();

        let outcome = engine
            .accept_match(OWNER, ride.id, chosen.id)
            .await
            .unwrap();
        assert_eq!(outcome.accepted.status, MatchStatus::Accepted);
        assert_eq!(outcome.rejected_siblings, 1);
        assert_eq!(outcome.score_delta, score_ledger::MATCH_ACCEPT_BONUS);
        assert_eq!(outcome.bumped_users(), vec![OWNER, RESPONDER]);

        let stored_ride = store.ride(ride.id).await.unwrap();
        assert_eq!(stored_ride.status, RideStatus::Matched);
        assert_eq!(stored_ride.confirmed_match_id, Some(chosen.id));
        assert_eq!(
            store.match_row(sibling.id).await.unwrap().status,
            MatchStatus::Rejected
        );
        assert!(store.match_row(chosen.id).await.unwrap().confirmed_at.is_some());

        assert_eq!(store.user(OWNER).await.score, 100);
        assert_eq!(store.user(RESPONDER).await.score, 100);
        assert_eq!(store.user(OTHER).await.score, 0);
    }

    #[tokio::test]
    async fn test_accept_rejects_only_pending_siblings() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;

        let withdrawn = engine.request_match(OTHER, ride.id).await.unwrap();
        engine.withdraw(OTHER, withdrawn.id).await.unwrap();
        let chosen = engine.request_match(RESPONDER, ride.id).await.unwrap();

        engine
            .accept_match(OWNER, ride.id, chosen.id)
            .await
            .unwrap();
        assert_eq!(
            store.match_row(withdrawn.id).await.unwrap().status,
            MatchStatus::Withdrawn
        );
    }

    #[tokio::test]
    async fn test_only_the_owner_may_accept() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();

        let result = engine.accept_match(RESPONDER, ride.id, m.id).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::NotRideOwner);
    }

    #[tokio::test]
    async fn test_accept_requires_pending_target() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();
        engine.withdraw(RESPONDER, m.id).await.unwrap();

        let result = engine.accept_match(OWNER, ride.id, m.id).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::MatchNotPending);
    }

    #[tokio::test]
    async fn test_accept_replay_is_idempotent() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();
        engine.accept_match(OWNER, ride.id, m.id).await.unwrap();

        let replay = engine.accept_match(OWNER, ride.id, m.id).await.unwrap();
        assert_eq!(replay.score_delta, 0);
        assert_eq!(replay.bumped_users(), Vec::<i64>::new());
        // The bonus never lands twice.
        assert_eq!(store.user(OWNER).await.score, 100);
        assert_eq!(store.user(RESPONDER).await.score, 100);
    }

    #[tokio::test]
    async fn test_accept_on_matched_ride_with_other_match_conflicts() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let first = engine.request_match(RESPONDER, ride.id).await.unwrap();
        let second = engine.request_match(OTHER, ride.id).await.unwrap();
        engine.accept_match(OWNER, ride.id, first.id).await.unwrap();

        let result = engine.accept_match(OWNER, ride.id, second.id).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::RideNotOpen);
    }

    #[tokio::test]
    async fn test_fast_accept_takes_the_ride_in_one_step() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;

        let outcome = engine.fast_accept(RESPONDER, ride.id).await.unwrap();
        assert_eq!(outcome.accepted.status, MatchStatus::Accepted);
        assert_eq!(outcome.ride.status, RideStatus::Matched);
        assert!(outcome.accepted.confirmed_at.is_some());
        assert_eq!(store.user(OWNER).await.score, 100);
        assert_eq!(store.user(RESPONDER).await.score, 100);

        // The ride is no longer up for grabs, either way in.
        let late_request = engine.request_match(OTHER, ride.id).await;
        assert_eq!(late_request.unwrap_err(), MatchWorkflowError::RideNotOpen);
        let late_take = engine.fast_accept(OTHER, ride.id).await;
        assert_eq!(late_take.unwrap_err(), MatchWorkflowError::RideNotOpen);
    }

    #[tokio::test]
    async fn test_fast_accept_rejects_pending_siblings() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let pending = engine.request_match(OTHER, ride.id).await.unwrap();

        engine.fast_accept(RESPONDER, ride.id).await.unwrap();
        assert_eq!(
            store.match_row(pending.id).await.unwrap().status,
            MatchStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_withdraw_requires_participant() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();

        let result = engine.withdraw(OTHER, m.id).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::NotParticipant);
    }

    #[tokio::test]
    async fn test_withdraw_replay_is_idempotent() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();

        engine.withdraw(RESPONDER, m.id).await.unwrap();
        assert!(engine.withdraw(RESPONDER, m.id).await.is_ok());
        assert_eq!(store.ride(ride.id).await.unwrap().status, RideStatus::Open);
    }

    #[tokio::test]
    async fn test_complete_moves_counters_exactly_once() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();
        engine.accept_match(OWNER, ride.id, m.id).await.unwrap();

        engine
            .complete_match(RESPONDER, ride.id, m.id)
            .await
            .unwrap();
        assert_eq!(
            store.ride(ride.id).await.unwrap().status,
            RideStatus::Completed
        );
        assert_eq!(store.user(OWNER).await.rides_given_count, 1);
        assert_eq!(store.user(RESPONDER).await.rides_received_count, 1);

        // Replay short-circuits without another bump.
        engine
            .complete_match(RESPONDER, ride.id, m.id)
            .await
            .unwrap();
        assert_eq!(store.user(OWNER).await.rides_given_count, 1);
        assert_eq!(store.user(RESPONDER).await.rides_received_count, 1);
    }

    #[tokio::test]
    async fn test_complete_requires_locked_in_match() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();

        let result = engine.complete_match(RESPONDER, ride.id, m.id).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::BadState);
    }

    #[tokio::test]
    async fn test_complete_requires_participant() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();
        engine.accept_match(OWNER, ride.id, m.id).await.unwrap();

        let result = engine.complete_match(OTHER, ride.id, m.id).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::NotParticipant);
    }

    #[tokio::test]
    async fn test_status_endpoint_never_sets_open_or_matched() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;

        for to in [RideStatus::Open, RideStatus::Matched] {
            let result = engine.change_ride_status(OWNER, ride.id, to).await;
            assert_eq!(result.unwrap_err(), MatchWorkflowError::IllegalTransition);
        }
    }

    #[tokio::test]
    async fn test_ride_runs_matched_in_progress_completed() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();
        engine.accept_match(OWNER, ride.id, m.id).await.unwrap();

        engine
            .change_ride_status(RESPONDER, ride.id, RideStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(
            store.ride(ride.id).await.unwrap().status,
            RideStatus::InProgress
        );
        // The active match mirrors the ride.
        assert_eq!(
            store.match_row(m.id).await.unwrap().status,
            MatchStatus::InProgress
        );

        engine
            .change_ride_status(OWNER, ride.id, RideStatus::Completed)
            .await
            .unwrap();
        assert_eq!(
            store.ride(ride.id).await.unwrap().status,
            RideStatus::Completed
        );
        assert_eq!(
            store.match_row(m.id).await.unwrap().status,
            MatchStatus::Completed
        );
        assert_eq!(store.user(OWNER).await.rides_given_count, 1);
    }

    #[tokio::test]
    async fn test_in_progress_needs_an_active_match() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        engine.request_match(RESPONDER, ride.id).await.unwrap();

        let result = engine
            .change_ride_status(RESPONDER, ride.id, RideStatus::InProgress)
            .await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::NoActiveMatch);
    }

    #[tokio::test]
    async fn test_cancel_cascades_to_live_matches() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let first = engine.request_match(RESPONDER, ride.id).await.unwrap();
        let second = engine.request_match(OTHER, ride.id).await.unwrap();
        engine.accept_match(OWNER, ride.id, first.id).await.unwrap();

        engine.cancel_ride(OWNER, ride.id).await.unwrap();
        assert_eq!(
            store.ride(ride.id).await.unwrap().status,
            RideStatus::Cancelled
        );
        assert_eq!(
            store.match_row(first.id).await.unwrap().status,
            MatchStatus::Cancelled
        );
        // Already-terminal siblings stay as they were.
        assert_eq!(
            store.match_row(second.id).await.unwrap().status,
            MatchStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_cancel_is_owner_only_and_never_after_completion() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;
        let m = engine.request_match(RESPONDER, ride.id).await.unwrap();

        let result = engine.cancel_ride(RESPONDER, ride.id).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::NotRideOwner);

        engine.accept_match(OWNER, ride.id, m.id).await.unwrap();
        engine
            .complete_match(RESPONDER, ride.id, m.id)
            .await
            .unwrap();
        let result = engine.cancel_ride(OWNER, ride.id).await;
        assert_eq!(result.unwrap_err(), MatchWorkflowError::IllegalTransition);
    }

    #[tokio::test]
    async fn test_cancel_replay_is_idempotent() {
        let store = InMemoryLifecycleStore::new();
        let engine = service(&store);
        let ride = open_offer(&store).await;

        engine.cancel_ride(OWNER, ride.id).await.unwrap();
        assert!(engine.cancel_ride(OWNER, ride.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_accept_notifies_the_responder() {
        let store = InMemoryLifecycleStore::new();
        let mut notifier = MockLifecycleNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| {
                n.event == LifecycleEvent::MatchAccepted && n.recipient_id == RESPONDER
            })
            .times(1)
            .returning(|_| ());
        let engine = MatchWorkflowService::new(Arc::new(store.clone()), Arc::new(notifier));

        let ride = open_offer(&store).await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_match(ride.id, OWNER, RESPONDER, MatchStatus::Pending, None)
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }
        engine.accept_match(OWNER, ride.id, 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_accepts_have_exactly_one_winner() {
        let store = InMemoryLifecycleStore::new();
        let engine = Arc::new(service(&store));
        let ride = open_offer(&store).await;
        let first = engine.request_match(RESPONDER, ride.id).await.unwrap();
        let second = engine.request_match(OTHER, ride.id).await.unwrap();

        let a = tokio::spawn({
            let engine = engine.clone();
            async move { engine.accept_match(OWNER, ride.id, first.id).await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            async move { engine.accept_match(OWNER, ride.id, second.id).await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(winners, 1);
        for loser in [a, b].into_iter().filter(|r| r.is_err()) {
            let err = loser.unwrap_err();
            assert!(
                err == MatchWorkflowError::RideNotOpen
                    || err == MatchWorkflowError::MatchNotPending,
                "unexpected loser error: {err:?}"
            );
        }

        // Exactly one final-positive match, exactly one rejected sibling.
        let matches = store.matches_for_ride(ride.id).await;
        let finals = matches
            .iter()
            .filter(|m| m.status.is_final_positive())
            .count();
        let rejected = matches
            .iter()
            .filter(|m| m.status == MatchStatus::Rejected)
            .count();
        assert_eq!(finals, 1);
        assert_eq!(rejected, 1);
        // The bonus landed once per participant of the winning pair.
        assert_eq!(store.user(OWNER).await.score, 100);
        assert_eq!(
            store.user(RESPONDER).await.score + store.user(OTHER).await.score,
            100
        );
    }
}
