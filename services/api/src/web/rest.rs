//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::{
    error::ApiError,
    web::{
        protocol::{
            AnswerRequest, AnswerResponse, CommentDto, Envelope, ErrorBody, ErrorEnvelope,
            HealthResponse, ModelsResponse, PostDto, SnapshotParams, SnapshotResponse, SourceDto,
        },
        state::AppState,
    },
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::Json,
};
use forum_answers_core::{
    domain::Timeframe,
    fetcher::{MAX_POST_LIMIT, MIN_POST_LIMIT},
    ports::{PortError, PortResult},
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;
use utoipa::OpenApi;

const DEFAULT_SNAPSHOT_LIMIT: u32 = 25;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        models_handler,
        snapshot_handler,
        answer_handler,
    ),
    components(
        schemas(
            AnswerRequest,
            AnswerResponse,
            SourceDto,
            SnapshotResponse,
            PostDto,
            CommentDto,
            ModelsResponse,
            HealthResponse,
            ErrorEnvelope,
            ErrorBody
        )
    ),
    tags(
        (name = "Forum Answers API", description = "Answers questions grounded in recent forum discussion.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Lists the models a caller may choose from.
#[utoipa::path(
    get,
    path = "/models",
    responses((status = 200, description = "Allow-listed models", body = Envelope<ModelsResponse>))
)]
pub async fn models_handler(State(state): State<Arc<AppState>>) -> Json<Envelope<ModelsResponse>> {
    let settings = state.orchestrator.settings();
    Json(Envelope::ok(ModelsResponse {
        models: settings.allowed_models.clone(),
        default: state
            .orchestrator
            .default_model()
            .unwrap_or_default()
            .to_string(),
    }))
}

/// Fetches a ranked snapshot of recent discussion in a forum.
#[utoipa::path(
    get,
    path = "/forums/{forum}/snapshot",
    params(
        ("forum" = String, Path, description = "Forum name without the r/ prefix"),
        SnapshotParams
    ),
    responses(
        (status = 200, description = "Snapshot fetched", body = Envelope<SnapshotResponse>),
        (status = 400, description = "Invalid forum name or limit", body = ErrorEnvelope),
        (status = 403, description = "Forum is private or banned", body = ErrorEnvelope),
        (status = 404, description = "Forum does not exist", body = ErrorEnvelope),
        (status = 500, description = "Upstream failure", body = ErrorEnvelope)
    )
)]
pub async fn snapshot_handler(
    State(state): State<Arc<AppState>>,
    Path(forum): Path<String>,
    Query(params): Query<SnapshotParams>,
) -> Result<Json<Envelope<SnapshotResponse>>, ApiError> {
    let timeframe = params
        .timeframe
        .as_deref()
        .map(Timeframe::parse)
        .unwrap_or_default();
    let limit = match params.limit.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_SNAPSHOT_LIMIT,
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| PortError::Validation(format!("limit must be a number, got '{raw}'")))?
            .clamp(i64::from(MIN_POST_LIMIT), i64::from(MAX_POST_LIMIT))
            as u32,
    };

    let cancel = CancellationToken::new();
    let snapshot = with_deadline(
        state.config.request_deadline,
        &cancel,
        state.snapshots.fetch_snapshot(&forum, timeframe, limit),
    )
    .await?;

    info!(
        "Snapshot for r/{}: {} posts, {} comments",
        snapshot.forum_name,
        snapshot.posts.len(),
        snapshot.comments.len()
    );
    Ok(Json(Envelope::ok(SnapshotResponse::new(
        snapshot,
        timeframe.as_str(),
    ))))
}

/// Answers a question using the forum's recent top posts and comments.
#[utoipa::path(
    post,
    path = "/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer generated", body = Envelope<AnswerResponse>),
        (status = 400, description = "Invalid forum, question or model", body = ErrorEnvelope),
        (status = 404, description = "Forum does not exist", body = ErrorEnvelope),
        (status = 422, description = "Not enough recent discussion", body = ErrorEnvelope),
        (status = 429, description = "Quota or provider rate limit reached", body = ErrorEnvelope),
        (status = 500, description = "Upstream or generation failure", body = ErrorEnvelope),
        (status = 504, description = "Request deadline elapsed", body = ErrorEnvelope)
    )
)]
pub async fn answer_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Json<Envelope<AnswerResponse>>, ApiError> {
    let Json(request) =
        body.map_err(|e| PortError::Validation(format!("malformed request body: {}", e.body_text())))?;

    let model = request
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .or_else(|| state.orchestrator.default_model())
        .unwrap_or_default()
        .to_string();

    let cancel = CancellationToken::new();
    let result = with_deadline(
        state.config.request_deadline,
        &cancel,
        state
            .orchestrator
            .answer(&request.forum, &request.question, &model, &cancel),
    )
    .await?;

    Ok(Json(Envelope::ok(AnswerResponse::from(result))))
}

/// Fires `cancel` once `deadline` elapses and reports the work as cancelled
/// if it has not finished by then.
async fn with_deadline<T>(
    deadline: Duration,
    cancel: &CancellationToken,
    work: impl Future<Output = PortResult<T>>,
) -> PortResult<T> {
    tokio::select! {
        result = work => result,
        _ = tokio::time::sleep(deadline) => {
            cancel.cancel();
            Err(PortError::Cancelled(format!(
                "request exceeded the {}s deadline",
                deadline.as_secs()
            )))
        }
    }
}
