use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::debug;

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};
use shared::models::requests::{ChangeRideStatusRequest, CreateRideRequest, SubmitRatingRequest};
use shared::models::responses::{
    MatchAcceptedResponse, MatchCompletedResponse, MatchRequestedResponse, OkResponse,
    RatingResponse, RideResponse, RideStatusResponse,
};
use shared::models::status::{MatchStatus, RideStatus};
use shared::services::match_workflow_service::AcceptOutcome;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rides", post(create_ride))
        .route("/rides/{id}", get(get_ride).delete(delete_ride))
        .route("/rides/{id}/requests", post(request_match))
        .route("/rides/{id}/accept", post(fast_accept))
        .route("/rides/{id}/matches/{match_id}/accept", post(accept_match))
        .route(
            "/rides/{id}/matches/{match_id}/complete",
            post(complete_match),
        )
        .route("/rides/{id}/matches/{match_id}/rating", post(submit_rating))
        .route("/rides/{id}/status", post(change_status))
}

async fn create_ride(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Json(request): Json<CreateRideRequest>,
) -> Result<Json<RideResponse>, ApiError> {
    let ride = state
        .ride_service
        .create_ride(authenticated_user.user_id, &request)
        .await?;
    debug!(ride_id = ride.id, "ride created");
    Ok(Json(RideResponse { ok: true, ride }))
}

async fn get_ride(
    State(state): State<AppState>,
    _authenticated_user: AuthenticatedUser,
    Path(ride_id): Path<i64>,
) -> Result<Json<RideResponse>, ApiError> {
    let ride = state.ride_service.get_ride(ride_id).await?;
    Ok(Json(RideResponse { ok: true, ride }))
}

async fn delete_ride(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(ride_id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .ride_service
        .soft_delete(authenticated_user.user_id, ride_id)
        .await?;
    Ok(Json(OkResponse::new()))
}

async fn request_match(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(ride_id): Path<i64>,
) -> Result<Json<MatchRequestedResponse>, ApiError> {
    let created = state
        .workflow_service
        .request_match(authenticated_user.user_id, ride_id)
        .await?;
    Ok(Json(MatchRequestedResponse {
        ok: true,
        status: MatchStatus::Pending,
        match_id: created.id,
    }))
}

async fn fast_accept(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(ride_id): Path<i64>,
) -> Result<Json<MatchAcceptedResponse>, ApiError> {
    let outcome = state
        .workflow_service
        .fast_accept(authenticated_user.user_id, ride_id)
        .await?;
    Ok(Json(accepted_response(outcome)))
}

async fn accept_match(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path((ride_id, match_id)): Path<(i64, i64)>,
) -> Result<Json<MatchAcceptedResponse>, ApiError> {
    let outcome = state
        .workflow_service
        .accept_match(authenticated_user.user_id, ride_id, match_id)
        .await?;
    Ok(Json(accepted_response(outcome)))
}

async fn complete_match(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path((ride_id, match_id)): Path<(i64, i64)>,
) -> Result<Json<MatchCompletedResponse>, ApiError> {
    let completed = state
        .workflow_service
        .complete_match(authenticated_user.user_id, ride_id, match_id)
        .await?;
    Ok(Json(MatchCompletedResponse {
        ok: true,
        status: completed.status,
    }))
}

async fn submit_rating(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path((ride_id, match_id)): Path<(i64, i64)>,
    Json(request): Json<SubmitRatingRequest>,
) -> Result<Json<RatingResponse>, ApiError> {
    let outcome = state
        .rating_service
        .submit_rating(authenticated_user.user_id, ride_id, match_id, &request)
        .await?;
    Ok(Json(RatingResponse {
        ok: true,
        bonus: outcome.bonus,
    }))
}

async fn change_status(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(ride_id): Path<i64>,
    Json(request): Json<ChangeRideStatusRequest>,
) -> Result<Json<RideStatusResponse>, ApiError> {
    let to = RideStatus::parse(&request.status)
        .ok_or_else(|| ApiError::Validation(format!("Unknown status: {}", request.status)))?;
    let status = state
        .workflow_service
        .change_ride_status(authenticated_user.user_id, ride_id, to)
        .await?;
    Ok(Json(RideStatusResponse { ok: true, status }))
}

fn accepted_response(outcome: AcceptOutcome) -> MatchAcceptedResponse {
    MatchAcceptedResponse {
        ok: true,
        status: outcome.accepted.status,
        bumped_users: outcome.bumped_users(),
        score_delta: outcome.score_delta,
        ride: outcome.ride,
        accepted: outcome.accepted,
    }
}
