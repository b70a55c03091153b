use std::sync::Arc;

use shared::services::auth_service::AuthService;
use shared::services::match_workflow_service::MatchWorkflowService;
use shared::services::rating_service::RatingService;
use shared::services::ride_service::RideService;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub ride_service: Arc<RideService>,
    pub workflow_service: Arc<MatchWorkflowService>,
    pub rating_service: Arc<RatingService>,
}
