use axum::Json;

use shared::models::responses::OkResponse;

pub async fn health_check() -> Json<OkResponse> {
    Json(OkResponse::new())
}
