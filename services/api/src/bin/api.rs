//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{broadcaster::RoomRegistry, db::DbAdapter, memory::MemoryStore},
    config::{Config, StorageBackend},
    error::ApiError,
    web::{self, state::AppState},
};
use classroom_core::ports::{IdentityService, LectureRepository, QuestionRepository, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
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

    // --- 2. Select the Storage Backend ---
    let (lectures, questions, identity): (
        Arc<dyn LectureRepository>,
        Arc<dyn QuestionRepository>,
        Arc<dyn IdentityService>,
    ) = match config.storage {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| ApiError::Internal("DATABASE_URL is required".to_string()))?;
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;
            let db_adapter = Arc::new(DbAdapter::new(db_pool));
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            let lectures: Arc<dyn LectureRepository> = db_adapter.clone();
            let questions: Arc<dyn QuestionRepository> = db_adapter.clone();
            (lectures, questions, db_adapter as Arc<dyn IdentityService>)
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data will not survive a restart.");
            let store = Arc::new(MemoryStore::new());
            for (token, caller) in &config.memory_tokens {
                store.register_token(token.clone(), *caller).await;
            }
            if config.memory_tokens.is_empty() {
                warn!("MEMORY_TOKENS is empty; every request will be rejected as unauthorized.");
            } else {
                info!("Seeded {} memory tokens.", config.memory_tokens.len());
            }
            let lectures: Arc<dyn LectureRepository> = store.clone();
            let questions: Arc<dyn QuestionRepository> = store.clone();
            (lectures, questions, store as Arc<dyn IdentityService>)
        }
    };

    // --- 3. Build the Shared AppState ---
    let rooms = Arc::new(RoomRegistry::new());
    let app_state = Arc::new(AppState::new(
        config.clone(),
        lectures,
        questions,
        identity,
        rooms,
        Arc::new(SystemClock),
    ));

    // --- 4. Create the Web Router ---
    let app = web::router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
