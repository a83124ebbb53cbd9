//! services/api/src/bin/api.rs

use std::str::FromStr;
use std::sync::Arc;

use api_lib::{
    adapters::{LogResultSink, OpenAiContentAdapter, SqliteStore},
    config::Config,
    error::ApiError,
    web::{
        chat_handler, complete_diagnostic_handler, complete_quiz_handler, get_session_handler,
        new_topic_handler, onboarding_handler, select_topic_handler, ApiDoc, AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tutor_core::session::SessionOrchestrator;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Session Store ---
    info!("Opening session store...");
    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;
    let store = Arc::new(SqliteStore::new(pool));
    store.init().await?;

    // --- 3. Initialize Service Adapters ---
    let api_key = config
        .openai_api_key
        .as_ref()
        .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?;
    let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base_url) = &config.openai_base_url {
        openai_config = openai_config.with_api_base(base_url);
    }
    let openai_client = Client::with_config(openai_config);

    let provider = Arc::new(OpenAiContentAdapter::new(
        openai_client,
        config.tutor_model.clone(),
    ));
    let results = Arc::new(LogResultSink);

    // --- 4. Open the Session & Build the Shared AppState ---
    // The store is read once here: a persisted profile resumes at topic
    // selection, otherwise the session starts at onboarding.
    let session = SessionOrchestrator::resume(provider, store, results).await;
    info!(view = ?session.view(), "session opened");
    let app_state = Arc::new(AppState {
        session: Arc::new(Mutex::new(session)),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:5173".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/session", get(get_session_handler))
        .route("/session/onboarding", post(onboarding_handler))
        .route("/session/diagnostic", post(complete_diagnostic_handler))
        .route("/session/topic", post(select_topic_handler))
        .route("/session/quiz", post(complete_quiz_handler))
        .route("/session/new-topic", post(new_topic_handler))
        .route("/session/chat", post(chat_handler))
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
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
