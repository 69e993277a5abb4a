//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{FileTemplateLoader, HttpAssistantAdapter, PgProjectStore},
    config::Config,
    error::ApiError,
    web::{
        assistant_health_handler, chat_handler, delete_project_handler, get_project_handler,
        health_handler, load_template_handler, save_project_handler, AppState,
    },
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

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
    let project_store = Arc::new(PgProjectStore::new(db_pool.clone()));
    info!("Running database migrations...");
    project_store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Collaborator Adapters ---
    if config.assistant_url.is_none() {
        info!("ASSISTANT_URL is not set; chat will answer with the fallback message");
    }
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| ApiError::Internal(format!("failed to build HTTP client: {e}")))?;
    let assistant = Arc::new(HttpAssistantAdapter::new(
        http_client,
        config.assistant_url.clone(),
    ));
    let templates = Arc::new(FileTemplateLoader::new(config.templates_path.clone()));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        project_store,
        assistant,
        templates,
    ));

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/assistant/health", get(assistant_health_handler))
        .route(
            "/activities/{activity_id}/project",
            get(get_project_handler).delete(delete_project_handler),
        )
        .route(
            "/activities/{activity_id}/project/save",
            post(save_project_handler),
        )
        .route(
            "/activities/{activity_id}/project/chat",
            post(chat_handler),
        )
        .route(
            "/activities/{activity_id}/project/template/{template_id}",
            post(load_template_handler),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
