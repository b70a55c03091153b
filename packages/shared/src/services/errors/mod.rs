pub mod auth_service_errors;
pub mod match_workflow_errors;
pub mod rating_service_errors;
pub mod ride_service_errors;
