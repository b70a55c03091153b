use std::sync::Arc;

use crate::models::requests::CreateRideRequest;
use crate::models::ride::{NewRide, Ride};
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::LifecycleStore;
use crate::services::errors::ride_service_errors::RideServiceError;
use crate::services::score_ledger;

const MAX_SEATS: i32 = 8;

pub struct RideService {
    store: Arc<dyn LifecycleStore>,
}

impl RideService {
    pub fn new(store: Arc<dyn LifecycleStore>) -> Self {
        RideService { store }
    }

    pub async fn create_ride(
        &self,
        actor_id: i64,
        request: &CreateRideRequest,
    ) -> Result<Ride, RideServiceError> {
        let origin = request.origin.trim();
        let destination = request.destination.trim();
        if origin.is_empty() {
            return Err(RideServiceError::ValidationError(
                "Origin cannot be empty".to_string(),
            ));
        }
        if destination.is_empty() {
            return Err(RideServiceError::ValidationError(
                "Destination cannot be empty".to_string(),
            ));
        }
        if !(0..=MAX_SEATS).contains(&request.seats) {
            return Err(RideServiceError::ValidationError(format!(
                "Seats must be between 0 and {}",
                MAX_SEATS
            )));
        }
        if let (Some(departs), Some(arrives)) = (request.departs_at, request.arrives_at) {
            if arrives < departs {
                return Err(RideServiceError::ValidationError(
                    "Arrival cannot precede departure".to_string(),
                ));
            }
        }

        let new_ride = NewRide {
            owner_id: actor_id,
            kind: request.kind,
            origin: origin.to_string(),
            destination: destination.to_string(),
            departs_at: request.departs_at,
            arrives_at: request.arrives_at,
            seats: request.seats,
            note: request.note.clone(),
            contact_phone: request.contact_phone.clone(),
            contact_email: request.contact_email.clone(),
        };

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| self.storage("create_ride", None, e))?;
        let ride = tx
            .insert_ride(&new_ride)
            .await
            .map_err(|e| self.storage("create_ride", None, e))?;
        score_ledger::record_posting(tx.as_mut(), actor_id, new_ride.kind)
            .await
            .map_err(|e| self.storage("create_ride", Some(ride.id), e))?;
        tx.commit()
            .await
            .map_err(|e| self.storage("create_ride", Some(ride.id), e))?;

        Ok(ride)
    }

    pub async fn get_ride(&self, ride_id: i64) -> Result<Ride, RideServiceError> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| self.storage("get_ride", Some(ride_id), e))?;
        let ride = tx.find_ride(ride_id).await.map_err(|e| match e {
            RepositoryError::NotFound => RideServiceError::NotFound,
            other => self.storage("get_ride", Some(ride_id), other),
        })?;
        // Read-only; dropping the transaction rolls it back.
        drop(tx);
        Ok(ride)
    }

    /// Owner-only. The ride disappears from reads and its status is forced to
    /// cancelled; live matches are cancelled along with it.
    pub async fn soft_delete(&self, actor_id: i64, ride_id: i64) -> Result<(), RideServiceError> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| self.storage("soft_delete", Some(ride_id), e))?;
        let ride = tx.lock_and_load(ride_id).await.map_err(|e| match e {
            RepositoryError::NotFound => RideServiceError::NotFound,
            other => self.storage("soft_delete", Some(ride_id), other),
        })?;
        if !ride.is_owner(actor_id) {
            return Err(RideServiceError::NotOwner);
        }
        tx.cancel_open_matches(ride_id)
            .await
            .map_err(|e| self.storage("soft_delete", Some(ride_id), e))?;
        tx.soft_delete(ride_id)
            .await
            .map_err(|e| self.storage("soft_delete", Some(ride_id), e))?;
        tx.commit()
            .await
            .map_err(|e| self.storage("soft_delete", Some(ride_id), e))?;
        Ok(())
    }

    fn storage(
        &self,
        operation: &'static str,
        ride_id: Option<i64>,
        error: RepositoryError,
    ) -> RideServiceError {
        tracing::error!(
            operation,
            ride_id = ?ride_id,
            error = %error,
            "ride storage failure"
        );
        RideServiceError::RepositoryError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ride::RideKind;
    use crate::models::status::{MatchStatus, RideStatus};
    use crate::repositories::memory::InMemoryLifecycleStore;

    fn create_request(kind: RideKind) -> CreateRideRequest {
        CreateRideRequest {
            kind,
            origin: "Sligo".to_string(),
            destination: "Dublin".to_string(),
            departs_at: None,
            arrives_at: None,
            seats: 3,
            note: Some("Leaving after lunch".to_string()),
            contact_phone: None,
            contact_email: None,
        }
    }

    fn service(store: &InMemoryLifecycleStore) -> RideService {
        RideService::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_create_ride_starts_open_and_counts_posting() {
        let store = InMemoryLifecycleStore::new();
        let service = service(&store);

        let ride = service
            .create_ride(1, &create_request(RideKind::Offer))
            .await
            .unwrap();
        assert_eq!(ride.status, RideStatus::Open);
        assert_eq!(ride.owner_id, 1);
        assert_eq!(store.user(1).await.rides_offered_count, 1);

        service
            .create_ride(1, &create_request(RideKind::Request))
            .await
            .unwrap();
        assert_eq!(store.user(1).await.rides_requested_count, 1);
    }

    #[tokio::test]
    async fn test_create_ride_rejects_blank_origin() {
        let store = InMemoryLifecycleStore::new();
        let service = service(&store);

        let mut request = create_request(RideKind::Offer);
        request.origin = "   ".to_string();
        let result = service.create_ride(1, &request).await;
        assert!(matches!(
            result,
            Err(RideServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_ride_rejects_too_many_seats() {
        let store = InMemoryLifecycleStore::new();
        let service = service(&store);

        let mut request = create_request(RideKind::Offer);
        request.seats = 9;
        let result = service.create_ride(1, &request).await;
        assert!(matches!(
            result,
            Err(RideServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_is_owner_only_and_cancels_matches() {
        let store = InMemoryLifecycleStore::new();
        let service = service(&store);
        let ride = service
            .create_ride(1, &create_request(RideKind::Offer))
            .await
            .unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_match(ride.id, 1, 2, MatchStatus::Pending, None)
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let result = service.soft_delete(2, ride.id).await;
        assert!(matches!(result, Err(RideServiceError::NotOwner)));

        service.soft_delete(1, ride.id).await.unwrap();
        let stored = store.ride(ride.id).await.unwrap();
        assert!(stored.deleted);
        assert_eq!(stored.status, RideStatus::Cancelled);
        let matches = store.matches_for_ride(ride.id).await;
        assert_eq!(matches[0].status, MatchStatus::Cancelled);

        let result = service.get_ride(ride.id).await;
        assert!(matches!(result, Err(RideServiceError::NotFound)));
    }
}
