use std::sync::Arc;

use crate::models::rating::{NewRating, Rating};
use crate::models::requests::SubmitRatingRequest;
use crate::models::status::MatchStatus;
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::LifecycleStore;
use crate::services::errors::rating_service_errors::RatingServiceError;
use crate::services::notifier::{LifecycleEvent, LifecycleNotifier, Notification};
use crate::services::score_ledger;

const MIN_STARS: i16 = 1;
const MAX_STARS: i16 = 5;

pub struct RatingService {
    store: Arc<dyn LifecycleStore>,
    notifier: Arc<dyn LifecycleNotifier>,
}

/// A stored rating plus the score bonus it triggered, if any.
#[derive(Debug)]
pub struct RatingOutcome {
    pub rating: Rating,
    pub bonus: i64,
}

impl RatingService {
    pub fn new(store: Arc<dyn LifecycleStore>, notifier: Arc<dyn LifecycleNotifier>) -> Self {
        RatingService { store, notifier }
    }

    /// One rating per rater per match. The rated party is always the rater's
    /// counterpart on the match; five stars carries a score bonus.
    pub async fn submit_rating(
        &self,
        actor_id: i64,
        ride_id: i64,
        match_id: i64,
        request: &SubmitRatingRequest,
    ) -> Result<RatingOutcome, RatingServiceError> {
        if !(MIN_STARS..=MAX_STARS).contains(&request.stars) {
            return Err(RatingServiceError::ValidationError(format!(
                "Stars must be between {} and {}",
                MIN_STARS, MAX_STARS
            )));
        }

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| self.storage(match_id, e))?;
        match tx.lock_and_load(ride_id).await {
            Ok(_) => {}
            Err(RepositoryError::NotFound) => return Err(RatingServiceError::RideNotFound),
            Err(e) => return Err(self.storage(match_id, e)),
        }
        let target = match tx.lock_and_load_by_id(match_id, ride_id).await {
            Ok(target) => target,
            Err(RepositoryError::NotFound) => return Err(RatingServiceError::MatchNotFound),
            Err(e) => return Err(self.storage(match_id, e)),
        };
        let (rated_id, rated_role) = target
            .counterpart_of(actor_id)
            .ok_or(RatingServiceError::NotParticipant)?;
        if target.status != MatchStatus::Completed {
            return Err(RatingServiceError::NotCompleted);
        }

        let new_rating = NewRating {
            match_id,
            rater_id: actor_id,
            rated_id,
            rated_role,
            stars: request.stars,
            comment: request.comment.clone(),
        };
        let rating = match tx.insert_rating(&new_rating).await {
            Ok(rating) => rating,
            Err(RepositoryError::Duplicate) => return Err(RatingServiceError::AlreadyRated),
            Err(e) => return Err(self.storage(match_id, e)),
        };
        let bonus = score_ledger::record_rating(tx.as_mut(), rated_id, rated_role, request.stars)
            .await
            .map_err(|e| self.storage(match_id, e))?;
        tx.commit().await.map_err(|e| self.storage(match_id, e))?;

        self.notifier
            .notify(Notification {
                event: LifecycleEvent::RatingReceived,
                ride_id,
                actor_id,
                recipient_id: rated_id,
                title: "You received a rating".to_string(),
                body: format!("{} stars", request.stars),
            })
            .await;
        Ok(RatingOutcome { rating, bonus })
    }

    fn storage(&self, match_id: i64, error: RepositoryError) -> RatingServiceError {
        tracing::error!(match_id, error = %error, "rating storage failure");
        RatingServiceError::RepositoryError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rating::RatedRole;
    use crate::models::ride::{NewRide, RideKind};
    use crate::models::ride_match::RideMatch;
    use crate::repositories::memory::InMemoryLifecycleStore;
    use crate::services::notifier::LogNotifier;

    const DRIVER: i64 = 1;
    const PASSENGER: i64 = 2;

    fn service(store: &InMemoryLifecycleStore) -> RatingService {
        RatingService::new(Arc::new(store.clone()), Arc::new(LogNotifier))
    }

    fn rating_request(stars: i16) -> SubmitRatingRequest {
        SubmitRatingRequest {
            stars,
            comment: Some("Grand trip".to_string()),
        }
    }

    async fn completed_match(store: &InMemoryLifecycleStore) -> (i64, RideMatch) {
        let mut tx = store.begin().await.unwrap();
        let ride = tx
            .insert_ride(&NewRide {
                owner_id: DRIVER,
                kind: RideKind::Offer,
                origin: "Cork".to_string(),
                destination: "Limerick".to_string(),
                departs_at: None,
                arrives_at: None,
                seats: 1,
                note: None,
                contact_phone: None,
                contact_email: None,
            })
            .await
            .unwrap();
        let created = tx
            .insert_match(ride.id, DRIVER, PASSENGER, MatchStatus::Completed, None)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (ride.id, created)
    }

    #[tokio::test]
    async fn test_five_stars_rates_the_counterpart_and_pays_the_bonus() {
        let store = InMemoryLifecycleStore::new();
        let service = service(&store);
        let (ride_id, m) = completed_match(&store).await;

        let outcome = service
            .submit_rating(PASSENGER, ride_id, m.id, &rating_request(5))
            .await
            .unwrap();
        assert_eq!(outcome.bonus, score_ledger::FIVE_STAR_BONUS);
        assert_eq!(outcome.rating.rated_id, DRIVER);
        assert_eq!(outcome.rating.rated_role, RatedRole::Driver);

        let driver = store.user(DRIVER).await;
        assert_eq!(driver.score, score_ledger::FIVE_STAR_BONUS);
        assert_eq!(driver.driver_rating_sum, 5);
        assert_eq!(driver.driver_rating_count, 1);
    }

    #[tokio::test]
    async fn test_both_sides_may_rate_once_each() {
        let store = InMemoryLifecycleStore::new();
        let service = service(&store);
        let (ride_id, m) = completed_match(&store).await;

        service
            .submit_rating(PASSENGER, ride_id, m.id, &rating_request(5))
            .await
            .unwrap();
        let outcome = service
            .submit_rating(DRIVER, ride_id, m.id, &rating_request(3))
            .await
            .unwrap();
        assert_eq!(outcome.bonus, 0);
        assert_eq!(outcome.rating.rated_id, PASSENGER);
        assert_eq!(outcome.rating.rated_role, RatedRole::Passenger);
        assert_eq!(store.ratings_for_match(m.id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_second_rating_by_same_rater_is_refused_without_a_second_bonus() {
        let store = InMemoryLifecycleStore::new();
        let service = service(&store);
        let (ride_id, m) = completed_match(&store).await;

        service
            .submit_rating(PASSENGER, ride_id, m.id, &rating_request(5))
            .await
            .unwrap();
        let result = service
            .submit_rating(PASSENGER, ride_id, m.id, &rating_request(5))
            .await;
        assert!(matches!(result, Err(RatingServiceError::AlreadyRated)));

        let driver = store.user(DRIVER).await;
        assert_eq!(driver.score, score_ledger::FIVE_STAR_BONUS);
        assert_eq!(driver.driver_rating_count, 1);
    }

    #[tokio::test]
    async fn test_rating_requires_a_completed_match() {
        let store = InMemoryLifecycleStore::new();
        let service = service(&store);

        let mut tx = store.begin().await.unwrap();
        let ride = tx
            .insert_ride(&NewRide {
                owner_id: DRIVER,
                kind: RideKind::Offer,
                origin: "Cork".to_string(),
                destination: "Limerick".to_string(),
                departs_at: None,
                arrives_at: None,
                seats: 1,
                note: None,
                contact_phone: None,
                contact_email: None,
            })
            .await
            .unwrap();
        let m = tx
            .insert_match(ride.id, DRIVER, PASSENGER, MatchStatus::Accepted, None)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let result = service
            .submit_rating(PASSENGER, ride.id, m.id, &rating_request(5))
            .await;
        assert!(matches!(result, Err(RatingServiceError::NotCompleted)));
    }

    #[tokio::test]
    async fn test_outsiders_cannot_rate() {
        let store = InMemoryLifecycleStore::new();
        let service = service(&store);
        let (ride_id, m) = completed_match(&store).await;

        let result = service
            .submit_rating(42, ride_id, m.id, &rating_request(5))
            .await;
        assert!(matches!(result, Err(RatingServiceError::NotParticipant)));
    }

    #[tokio::test]
    async fn test_stars_out_of_range_are_refused() {
        let store = InMemoryLifecycleStore::new();
        let service = service(&store);
        let (ride_id, m) = completed_match(&store).await;

        for stars in [0, 6] {
            let result = service
                .submit_rating(PASSENGER, ride_id, m.id, &rating_request(stars))
                .await;
            assert!(matches!(
                result,
                Err(RatingServiceError::ValidationError(_))
            ));
        }
    }
}
