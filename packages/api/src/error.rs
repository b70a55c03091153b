use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::models::responses::ErrorResponse;
use shared::services::errors::{
    auth_service_errors::AuthServiceError, match_workflow_errors::MatchWorkflowError,
    rating_service_errors::RatingServiceError, ride_service_errors::RideServiceError,
};

#[derive(Debug)]
pub enum ApiError {
    RideService(RideServiceError),
    MatchWorkflow(MatchWorkflowError),
    RatingService(RatingServiceError),
    AuthService(AuthServiceError),
    Validation(String),
}

impl From<RideServiceError> for ApiError {
    fn from(error: RideServiceError) -> Self {
        ApiError::RideService(error)
    }
}

impl From<MatchWorkflowError> for ApiError {
    fn from(error: MatchWorkflowError) -> Self {
        ApiError::MatchWorkflow(error)
    }
}

impl From<RatingServiceError> for ApiError {
    fn from(error: RatingServiceError) -> Self {
        ApiError::RatingService(error)
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(error: AuthServiceError) -> Self {
        ApiError::AuthService(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::RideService(e) => (status_for(e.code()), e.code()),
            ApiError::MatchWorkflow(e) => (status_for(e.code()), e.code()),
            ApiError::RatingService(e) => (status_for(e.code()), e.code()),

            ApiError::AuthService(
                AuthServiceError::InvalidToken | AuthServiceError::ExpiredToken,
            ) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::AuthService(AuthServiceError::TokenCreation(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error")
            }

            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        };
        (status, Json(ErrorResponse::new(code))).into_response()
    }
}

/// Service errors carry stable machine codes; the HTTP status follows the
/// code so both layers always agree.
fn status_for(code: &str) -> StatusCode {
    match code {
        "not_found" => StatusCode::NOT_FOUND,
        "forbidden" => StatusCode::FORBIDDEN,
        "validation" => StatusCode::UNPROCESSABLE_ENTITY,
        "server_error" => StatusCode::INTERNAL_SERVER_ERROR,
        // own_ride, not_open, not_pending, already_final, already_requested,
        // illegal_transition, no_active_match, bad_state, not_completed,
        // already_rated
        _ => StatusCode::CONFLICT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_conflicts_map_to_409() {
        for error in [
            MatchWorkflowError::OwnRide,
            MatchWorkflowError::RideNotOpen,
            MatchWorkflowError::MatchNotPending,
            MatchWorkflowError::AlreadyFinal,
            MatchWorkflowError::AlreadyRequested,
            MatchWorkflowError::IllegalTransition,
            MatchWorkflowError::NoActiveMatch,
            MatchWorkflowError::BadState,
        ] {
            assert_eq!(status_for(error.code()), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn test_lookup_and_permission_codes() {
        assert_eq!(
            status_for(MatchWorkflowError::RideNotFound.code()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(MatchWorkflowError::NotRideOwner.code()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(RideServiceError::ValidationError("x".to_string()).code()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(RatingServiceError::RepositoryError("x".to_string()).code()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
