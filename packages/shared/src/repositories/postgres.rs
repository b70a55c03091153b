use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::rating::{NewRating, RatedRole, Rating};
use crate::models::ride::{NewRide, Ride, RideKind};
use crate::models::ride_match::RideMatch;
use crate::models::status::{codec, MatchStatus, RideStatus};
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::{
    LifecycleStore, LifecycleTx, MatchStore, RatingStore, RideStore, ScoreStore,
};

const ACTIVE_PAIR_INDEX: &str = "ride_matches_active_pair_idx";
const RATING_UNIQUE_CONSTRAINT: &str = "ratings_match_rater_key";

pub struct PgLifecycleStore {
    pool: PgPool,
}

impl PgLifecycleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LifecycleStore for PgLifecycleStore {
    async fn begin(&self) -> Result<Box<dyn LifecycleTx>, RepositoryError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgLifecycleTx { tx }))
    }
}

pub struct PgLifecycleTx {
    tx: Transaction<'static, Postgres>,
}

fn db_err(error: sqlx::Error) -> RepositoryError {
    match error {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        other => RepositoryError::Database(other.to_string()),
    }
}

fn unique_err(error: sqlx::Error, constraint: &str) -> RepositoryError {
    if let sqlx::Error::Database(db) = &error {
        if db.constraint() == Some(constraint) {
            return RepositoryError::Duplicate;
        }
    }
    db_err(error)
}

fn encoded(status: MatchStatus) -> String {
    codec::encode(status.as_str()).to_string()
}

fn encoded_all(statuses: &[MatchStatus]) -> Vec<String> {
    statuses.iter().map(|s| encoded(*s)).collect()
}

#[derive(sqlx::FromRow)]
struct RideRow {
    id: i64,
    owner_id: i64,
    kind: String,
    origin: String,
    destination: String,
    departs_at: Option<DateTime<Utc>>,
    arrives_at: Option<DateTime<Utc>>,
    seats: i32,
    note: Option<String>,
    contact_phone: Option<String>,
    contact_email: Option<String>,
    status: String,
    deleted: bool,
    confirmed_match_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RideRow {
    fn into_ride(self) -> Result<Ride, RepositoryError> {
        let kind = RideKind::parse(&self.kind)
            .ok_or_else(|| RepositoryError::Database(format!("unexpected ride kind {}", self.kind)))?;
        let status = RideStatus::parse(codec::decode(&self.status)).ok_or_else(|| {
            RepositoryError::Database(format!("unexpected ride status {}", self.status))
        })?;
        Ok(Ride {
            id: self.id,
            owner_id: self.owner_id,
            kind,
            origin: self.origin,
            destination: self.destination,
            departs_at: self.departs_at,
            arrives_at: self.arrives_at,
            seats: self.seats,
            note: self.note,
            contact_phone: self.contact_phone,
            contact_email: self.contact_email,
            status,
            deleted: self.deleted,
            confirmed_match_id: self.confirmed_match_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MatchRow {
    id: i64,
    ride_id: i64,
    driver_id: i64,
    passenger_id: i64,
    status: String,
    confirmed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MatchRow {
    fn into_match(self) -> Result<RideMatch, RepositoryError> {
        let status = MatchStatus::parse(codec::decode(&self.status)).ok_or_else(|| {
            RepositoryError::Database(format!("unexpected match status {}", self.status))
        })?;
        Ok(RideMatch {
            id: self.id,
            ride_id: self.ride_id,
            driver_id: self.driver_id,
            passenger_id: self.passenger_id,
            status,
            confirmed_at: self.confirmed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RatingRow {
    id: i64,
    match_id: i64,
    rater_id: i64,
    rated_id: i64,
    rated_role: String,
    stars: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl RatingRow {
    fn into_rating(self) -> Result<Rating, RepositoryError> {
        let rated_role = RatedRole::parse(&self.rated_role).ok_or_else(|| {
            RepositoryError::Database(format!("unexpected rated role {}", self.rated_role))
        })?;
        Ok(Rating {
            id: self.id,
            match_id: self.match_id,
            rater_id: self.rater_id,
            rated_id: self.rated_id,
            rated_role,
            stars: self.stars,
            comment: self.comment,
            created_at: self.created_at,
        })
    }
}

const RIDE_COLUMNS: &str = r#"
    id, owner_id, kind, origin, destination, departs_at, arrives_at, seats,
    note, contact_phone, contact_email, status, deleted, confirmed_match_id,
    created_at, updated_at
"#;

const MATCH_COLUMNS: &str = r#"
    id, ride_id, driver_id, passenger_id, status, confirmed_at, created_at, updated_at
"#;

#[async_trait]
impl RideStore for PgLifecycleTx {
    async fn insert_ride(&mut self, ride: &NewRide) -> Result<Ride, RepositoryError> {
        let query = format!(
            r#"
INSERT INTO rides (
    owner_id, kind, origin, destination, departs_at, arrives_at, seats,
    note, contact_phone, contact_email, status
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
RETURNING {RIDE_COLUMNS}
"#
        );
        let row: RideRow = sqlx::query_as(&query)
            .bind(ride.owner_id)
            .bind(ride.kind.as_str())
            .bind(&ride.origin)
            .bind(&ride.destination)
            .bind(ride.departs_at)
            .bind(ride.arrives_at)
            .bind(ride.seats)
            .bind(&ride.note)
            .bind(&ride.contact_phone)
            .bind(&ride.contact_email)
            .bind(codec::encode(RideStatus::Open.as_str()))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.into_ride()
    }

    async fn find_ride(&mut self, ride_id: i64) -> Result<Ride, RepositoryError> {
        let query = format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1 AND NOT deleted");
        let row: Option<RideRow> = sqlx::query_as(&query)
            .bind(ride_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.ok_or(RepositoryError::NotFound)?.into_ride()
    }

    async fn lock_and_load(&mut self, ride_id: i64) -> Result<Ride, RepositoryError> {
        let query = format!(
            "SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1 AND NOT deleted FOR UPDATE"
        );
        let row: Option<RideRow> = sqlx::query_as(&query)
            .bind(ride_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.ok_or(RepositoryError::NotFound)?.into_ride()
    }

    async fn advance_status(
        &mut self,
        ride_id: i64,
        status: RideStatus,
    ) -> Result<(), RepositoryError> {
        const QUERY: &str = "UPDATE rides SET status = $2, updated_at = NOW() WHERE id = $1";
        sqlx::query(QUERY)
            .bind(ride_id)
            .bind(codec::encode(status.as_str()))
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_confirmed_match(
        &mut self,
        ride_id: i64,
        match_id: Option<i64>,
    ) -> Result<(), RepositoryError> {
        const QUERY: &str =
            "UPDATE rides SET confirmed_match_id = $2, updated_at = NOW() WHERE id = $1";
        sqlx::query(QUERY)
            .bind(ride_id)
            .bind(match_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn soft_delete(&mut self, ride_id: i64) -> Result<(), RepositoryError> {
        const QUERY: &str =
            "UPDATE rides SET deleted = TRUE, status = $2, updated_at = NOW() WHERE id = $1";
        sqlx::query(QUERY)
            .bind(ride_id)
            .bind(codec::encode(RideStatus::Cancelled.as_str()))
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl MatchStore for PgLifecycleTx {
    async fn find_match(&mut self, match_id: i64) -> Result<RideMatch, RepositoryError> {
        let query = format!("SELECT {MATCH_COLUMNS} FROM ride_matches WHERE id = $1");
        let row: Option<MatchRow> = sqlx::query_as(&query)
            .bind(match_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.ok_or(RepositoryError::NotFound)?.into_match()
    }

    async fn lock_and_load_by_id(
        &mut self,
        match_id: i64,
        ride_id: i64,
    ) -> Result<RideMatch, RepositoryError> {
        let query = format!(
            "SELECT {MATCH_COLUMNS} FROM ride_matches WHERE id = $1 AND ride_id = $2 FOR UPDATE"
        );
        let row: Option<MatchRow> = sqlx::query_as(&query)
            .bind(match_id)
            .bind(ride_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.ok_or(RepositoryError::NotFound)?.into_match()
    }

    async fn find_final_for_ride(
        &mut self,
        ride_id: i64,
    ) -> Result<Option<RideMatch>, RepositoryError> {
        let query = format!(
            r#"
SELECT {MATCH_COLUMNS}
FROM ride_matches
WHERE ride_id = $1 AND status = ANY($2)
ORDER BY id
LIMIT 1
FOR UPDATE
"#
        );
        let row: Option<MatchRow> = sqlx::query_as(&query)
            .bind(ride_id)
            .bind(encoded_all(&MatchStatus::FINAL_POSITIVE))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.map(MatchRow::into_match).transpose()
    }

    async fn find_existing_pair(
        &mut self,
        ride_id: i64,
        driver_id: i64,
        passenger_id: i64,
    ) -> Result<Option<RideMatch>, RepositoryError> {
        let query = format!(
            r#"
SELECT {MATCH_COLUMNS}
FROM ride_matches
WHERE ride_id = $1 AND driver_id = $2 AND passenger_id = $3
ORDER BY id DESC
LIMIT 1
"#
        );
        let row: Option<MatchRow> = sqlx::query_as(&query)
            .bind(ride_id)
            .bind(driver_id)
            .bind(passenger_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.map(MatchRow::into_match).transpose()
    }

    async fn insert_match(
        &mut self,
        ride_id: i64,
        driver_id: i64,
        passenger_id: i64,
        status: MatchStatus,
        confirmed_at: Option<DateTime<Utc>>,
    ) -> Result<RideMatch, RepositoryError> {
        let query = format!(
            r#"
INSERT INTO ride_matches (ride_id, driver_id, passenger_id, status, confirmed_at)
VALUES ($1, $2, $3, $4, $5)
RETURNING {MATCH_COLUMNS}
"#
        );
        let row: MatchRow = sqlx::query_as(&query)
            .bind(ride_id)
            .bind(driver_id)
            .bind(passenger_id)
            .bind(encoded(status))
            .bind(confirmed_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| unique_err(e, ACTIVE_PAIR_INDEX))?;
        row.into_match()
    }

    async fn set_status(
        &mut self,
        match_id: i64,
        status: MatchStatus,
        confirmed_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        const QUERY: &str = r#"
UPDATE ride_matches
SET status = $2, confirmed_at = COALESCE($3, confirmed_at), updated_at = NOW()
WHERE id = $1
"#;
        sqlx::query(QUERY)
            .bind(match_id)
            .bind(encoded(status))
            .bind(confirmed_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn reject_siblings(
        &mut self,
        ride_id: i64,
        except_match_id: i64,
    ) -> Result<u64, RepositoryError> {
        const QUERY: &str = r#"
UPDATE ride_matches
SET status = $3, updated_at = NOW()
WHERE ride_id = $1 AND id <> $2 AND status = $4
"#;
        let result = sqlx::query(QUERY)
            .bind(ride_id)
            .bind(except_match_id)
            .bind(encoded(MatchStatus::Rejected))
            .bind(encoded(MatchStatus::Pending))
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn cancel_open_matches(&mut self, ride_id: i64) -> Result<u64, RepositoryError> {
        const QUERY: &str = r#"
UPDATE ride_matches
SET status = $2, updated_at = NOW()
WHERE ride_id = $1 AND status = ANY($3)
"#;
        let result = sqlx::query(QUERY)
            .bind(ride_id)
            .bind(encoded(MatchStatus::Cancelled))
            .bind(encoded_all(&MatchStatus::NON_TERMINAL))
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ScoreStore for PgLifecycleTx {
    async fn add_score(&mut self, user_id: i64, points: i64) -> Result<(), RepositoryError> {
        const QUERY: &str = r#"
INSERT INTO users (id, score)
VALUES ($1, $2)
ON CONFLICT (id) DO UPDATE SET score = users.score + EXCLUDED.score
"#;
        sqlx::query(QUERY)
            .bind(user_id)
            .bind(points)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn bump_posted_count(
        &mut self,
        user_id: i64,
        kind: RideKind,
    ) -> Result<(), RepositoryError> {
        const OFFERED: &str = r#"
INSERT INTO users (id, rides_offered_count)
VALUES ($1, 1)
ON CONFLICT (id) DO UPDATE SET rides_offered_count = users.rides_offered_count + 1
"#;
        const REQUESTED: &str = r#"
INSERT INTO users (id, rides_requested_count)
VALUES ($1, 1)
ON CONFLICT (id) DO UPDATE SET rides_requested_count = users.rides_requested_count + 1
"#;
        let query = match kind {
            RideKind::Offer => OFFERED,
            RideKind::Request => REQUESTED,
        };
        sqlx::query(query)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn bump_given_count(&mut self, user_id: i64) -> Result<(), RepositoryError> {
        const QUERY: &str = r#"
INSERT INTO users (id, rides_given_count)
VALUES ($1, 1)
ON CONFLICT (id) DO UPDATE SET rides_given_count = users.rides_given_count + 1
"#;
        sqlx::query(QUERY)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn bump_received_count(&mut self, user_id: i64) -> Result<(), RepositoryError> {
        const QUERY: &str = r#"
INSERT INTO users (id, rides_received_count)
VALUES ($1, 1)
ON CONFLICT (id) DO UPDATE SET rides_received_count = users.rides_received_count + 1
"#;
        sqlx::query(QUERY)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn add_rating_aggregate(
        &mut self,
        user_id: i64,
        role: RatedRole,
        stars: i16,
    ) -> Result<(), RepositoryError> {
        const DRIVER: &str = r#"
INSERT INTO users (id, driver_rating_sum, driver_rating_count)
VALUES ($1, $2, 1)
ON CONFLICT (id) DO UPDATE SET
    driver_rating_sum = users.driver_rating_sum + EXCLUDED.driver_rating_sum,
    driver_rating_count = users.driver_rating_count + 1
"#;
        const PASSENGER: &str = r#"
INSERT INTO users (id, passenger_rating_sum, passenger_rating_count)
VALUES ($1, $2, 1)
ON CONFLICT (id) DO UPDATE SET
    passenger_rating_sum = users.passenger_rating_sum + EXCLUDED.passenger_rating_sum,
    passenger_rating_count = users.passenger_rating_count + 1
"#;
        let query = match role {
            RatedRole::Driver => DRIVER,
            RatedRole::Passenger => PASSENGER,
        };
        sqlx::query(query)
            .bind(user_id)
            .bind(i64::from(stars))
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl RatingStore for PgLifecycleTx {
    async fn insert_rating(&mut self, rating: &NewRating) -> Result<Rating, RepositoryError> {
        const QUERY: &str = r#"
INSERT INTO ratings (match_id, rater_id, rated_id, rated_role, stars, comment)
VALUES ($1, $2, $3, $4, $5, $6)
RETURNING id, match_id, rater_id, rated_id, rated_role, stars, comment, created_at
"#;
        let row: RatingRow = sqlx::query_as(QUERY)
            .bind(rating.match_id)
            .bind(rating.rater_id)
            .bind(rating.rated_id)
            .bind(rating.rated_role.as_str())
            .bind(rating.stars)
            .bind(&rating.comment)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| unique_err(e, RATING_UNIQUE_CONSTRAINT))?;
        row.into_rating()
    }
}

#[async_trait]
impl LifecycleTx for PgLifecycleTx {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await.map_err(db_err)
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.rollback().await.map_err(db_err)
    }
}
