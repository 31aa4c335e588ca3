//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{ClientCredentials, OpenAiAnswerAdapter, RedditApiAdapter, TokenCache},
    config::Config,
    error::ApiError,
    web::{create_router, middleware::DailyQuota, state::AppState},
};
use async_openai::config::OpenAIConfig;
use axum::http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method};
use forum_answers_core::{
    fetcher::ContentFetcher,
    normalizer::ContentNormalizer,
    orchestrator::{OrchestratorSettings, QueryOrchestrator},
    ports::{Clock, SystemClock},
};
use std::{net::SocketAddr, sync::Arc};
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

    // --- 2. Initialize Forum Adapters ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| ApiError::Internal(format!("failed to build HTTP client: {e}")))?;

    let tokens = Arc::new(TokenCache::new(
        http.clone(),
        config.reddit_token_url.clone(),
        config.reddit_user_agent.clone(),
        ClientCredentials {
            client_id: config.reddit_client_id.clone(),
            client_secret: config.reddit_client_secret.clone(),
        },
        clock.clone(),
    ));
    let forum_api = Arc::new(RedditApiAdapter::new(
        http,
        config.reddit_api_base.clone(),
        config.reddit_user_agent.clone(),
        tokens,
    ));
    let snapshots = Arc::new(ContentFetcher::new(forum_api, clock.clone()));

    // --- 3. Initialize the Generation Adapter ---
    let mut openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    if let Some(base_url) = &config.openai_base_url {
        openai_config = openai_config.with_api_base(base_url);
    }
    let generator = Arc::new(OpenAiAnswerAdapter::new(
        openai_config,
        config.generation_timeout,
    ));

    // --- 4. Build the Shared AppState ---
    let settings = OrchestratorSettings {
        allowed_models: config.allowed_models.clone(),
        forum_web_base: config.forum_web_base.clone(),
        ..OrchestratorSettings::default()
    };
    let orchestrator = Arc::new(QueryOrchestrator::new(
        snapshots.clone(),
        generator,
        ContentNormalizer::default(),
        settings,
    ));
    let app_state = Arc::new(AppState {
        config: config.clone(),
        orchestrator,
        snapshots,
        quota: Arc::new(DailyQuota::new(config.daily_question_limit, clock)),
    });

    // --- 5. Create the Web Router ---
    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|_| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}'", config.cors_origin))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([HeaderName::from_static("x-request-id")]);
    let app = create_router(app_state).layer(cors);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    // Peer addresses key the daily question quota.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
