//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{supervise_change_listener, ChangeHub, DbAdapter},
    config::{Config, SeedAdmin},
    error::ApiError,
    web::{auth::hash_password, build_router, rest::ApiDoc, state::AppState},
};
use axum::Router;
use booking_core::domain::BusinessId;
use booking_core::memory::InMemoryStore;
use booking_core::ports::{AuthStore, ChangeFeed, PortError};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Creates the configured administrator unless the email is already registered.
async fn seed_admin(auth: &dyn AuthStore, seed: &SeedAdmin) -> Result<(), ApiError> {
    let business_id = BusinessId::parse(&seed.business_id)
        .ok_or_else(|| ApiError::Internal("ADMIN_BUSINESS_ID must not be blank".to_string()))?;
    let hashed = hash_password(&seed.password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash admin password: {}", e)))?;

    match auth.create_admin(&business_id, &seed.email, &hashed).await {
        Ok(admin) => {
            info!("Seeded admin {} for business '{}'", admin.admin_id, business_id);
            Ok(())
        }
        Err(PortError::UniqueViolation(_)) => {
            info!("Admin {} already exists; skipping seed.", seed.email);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Build the Shared AppState ---
    let app_state = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");

            let hub = Arc::new(ChangeHub::new());
            tokio::spawn(supervise_change_listener(db_pool, hub.clone()));
            let changes: Arc<dyn ChangeFeed> = hub;
            AppState::with_store(db_adapter, changes, config.clone())
        }
        None => {
            warn!("DATABASE_URL is not set; bookings are kept in memory and lost on restart.");
            let store = Arc::new(InMemoryStore::new());
            let changes: Arc<dyn ChangeFeed> = store.clone();
            AppState::with_store(store, changes, config.clone())
        }
    };

    if let Some(seed) = &config.seed_admin {
        seed_admin(app_state.auth.as_ref(), seed).await?;
    }

    // --- 3. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(build_router(Arc::new(app_state))?)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 4. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
