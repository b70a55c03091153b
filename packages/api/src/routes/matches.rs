use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};
use shared::models::responses::OkResponse;

pub fn routes() -> Router<AppState> {
    Router::new().route("/matches/{id}/withdraw", post(withdraw))
}

async fn withdraw(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(match_id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .workflow_service
        .withdraw(authenticated_user.user_id, match_id)
        .await?;
    Ok(Json(OkResponse::new()))
}
