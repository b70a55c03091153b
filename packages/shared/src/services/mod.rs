pub mod auth_service;
pub mod errors;
pub mod match_workflow_service;
pub mod notifier;
pub mod rating_service;
pub mod ride_service;
pub mod score_ledger;
