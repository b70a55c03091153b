use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{build_app, state::AppState};
use shared::repositories::postgres::PgLifecycleStore;
use shared::services::auth_service::AuthService;
use shared::services::match_workflow_service::MatchWorkflowService;
use shared::services::notifier::LogNotifier;
use shared::services::rating_service::RatingService;
use shared::services::ride_service::RideService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api=debug,shared=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let store = Arc::new(PgLifecycleStore::new(pool));
    let notifier = Arc::new(LogNotifier);
    let app_state = AppState {
        auth_service: Arc::new(AuthService::from_env()),
        ride_service: Arc::new(RideService::new(store.clone())),
        workflow_service: Arc::new(MatchWorkflowService::new(store.clone(), notifier.clone())),
        rating_service: Arc::new(RatingService::new(store, notifier)),
    };

    let app = build_app(app_state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
