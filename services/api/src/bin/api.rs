//! services/api/src/bin/api.rs

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use crm_api::{
    adapters::{Argon2Adapter, DbAdapter, MemoryKvAdapter},
    config::Config,
    error::ApiError,
    web::{
        batch_visit_update_handler, contract_values_handler, cors::cors_layer,
        list_line_items_handler, login_handler, logout_handler, reconciliation_handler,
        require_auth, rest::ApiDoc, signup_handler, state::AppState, team_performance_handler,
    },
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const KV_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let kv_adapter = Arc::new(MemoryKvAdapter::new());
    let purge_target = kv_adapter.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(KV_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            purge_target.purge_expired().await;
        }
    });
    let hasher = Arc::new(Argon2Adapter::new());

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        db_adapter,
        kv_adapter,
        hasher,
    ));

    let cors = cors_layer(&config.cors_origin)?;

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/reconciliation", post(reconciliation_handler))
        .route("/companies/{company_id}/line-items", get(list_line_items_handler))
        .route(
            "/companies/{company_id}/visits/batch",
            post(batch_visit_update_handler),
        )
        .route("/analytics/contract-values", get(contract_values_handler))
        .route("/analytics/team-performance", get(team_performance_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .map_err(|source| ApiError::Bind {
            address: config.bind_address,
            source,
        })?;
    axum::serve(listener, app).await.map_err(ApiError::Serve)?;

    Ok(())
}
