use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{CommandRequest, CommandResponse, ContinueRequest, PlanRequest};
use super::browse::{self, FilesQuery, FilesResponse, ProjectsResponse};
use super::{ApiError, AppState, cors, validate};
use crate::executor::ExecutionRequest;
use crate::images::{ImageAttachment, StagedImages, validate_images};
use crate::relay;

const RUN_FAILED: &str = "Claude CLI execution failed";
const CONTINUE_FAILED: &str = "Session continuation failed";

/// All API routes with CORS and request tracing.
pub fn build_router(state: AppState) -> Router {
    let cors = cors::cors_layer(&state.config.server);
    Router::new()
        .route("/api/health", get(health))
        .route("/api/projects", get(projects))
        .route("/api/files", get(files))
        .route("/api/command", post(command))
        .route("/api/command/stream", post(command_stream))
        .route("/api/command/continue", post(continue_session))
        .route("/api/command/continue/stream", post(continue_stream))
        // Legacy plan-only endpoints
        .route("/api/plan", post(plan))
        .route("/api/plan/stream", post(plan_stream))
        .route("/api/plan/continue", post(continue_session))
        .route("/api/plan/continue/stream", post(continue_stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn projects(State(state): State<AppState>) -> Result<Json<ProjectsResponse>, ApiError> {
    let base = state
        .config
        .server
        .projects_dir()
        .ok_or_else(|| ApiError::Internal("no projects directory configured".into()))?;
    let projects = browse::list_projects(&base).await.map_err(|e| {
        warn!(base = %base.display(), error = %e, "Failed to list projects");
        ApiError::Internal("failed to list projects".into())
    })?;
    info!(base = %base.display(), count = projects.len(), "Listed projects");
    Ok(Json(ProjectsResponse {
        success: true,
        projects,
    }))
}

async fn files(
    State(state): State<AppState>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<FilesResponse>, ApiError> {
    let project = validate::project_dir(&query.project)?;
    let files = browse::list_docs(&project, &state.config.docs).await?;
    info!(
        project = %project.display(),
        count = files.values().map(Vec::len).sum::<usize>(),
        "Listed docs"
    );
    Ok(Json(FilesResponse {
        success: true,
        files,
    }))
}

/// A validated execution plus the images it references.
struct Prepared {
    request: ExecutionRequest,
    images: StagedImages,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::InvalidBody(e.body_text()))
}

fn prepare_command(
    state: &AppState,
    project: &str,
    command: &str,
    args: &str,
    images: &[ImageAttachment],
) -> Result<Prepared, ApiError> {
    let dir = validate::project_dir(project)?;
    let command = validate::command(&state.whitelist, command)?;
    let args = validate::required("args", args)?;
    let decoded = validate_images(images, &state.config.images)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let images = StagedImages::stage(&decoded).map_err(|e| ApiError::Internal(e.to_string()))?;
    let request =
        ExecutionRequest::command(&state.whitelist, dir, command, args, &images.paths())
            .map_err(|source| ApiError::Execution {
                action: RUN_FAILED,
                source,
            })?;
    info!(project, command, image_count = decoded.len(), "Command accepted");
    Ok(Prepared { request, images })
}

fn prepare_continue(req: &ContinueRequest) -> Result<Prepared, ApiError> {
    let dir = validate::project_dir(&req.project)?;
    let session_id = validate::required("session_id", &req.session_id)?;
    let answer = validate::required("answer", &req.answer)?;
    info!(project = %req.project, session_id, "Continuation accepted");
    Ok(Prepared {
        request: ExecutionRequest::continuation(dir, session_id, answer),
        images: StagedImages::default(),
    })
}

/// Run to completion. Dropping the handler (client gone) cancels the run.
async fn run_sync(
    state: &AppState,
    prepared: Prepared,
    action: &'static str,
) -> Result<Json<CommandResponse>, ApiError> {
    let Prepared { request, images } = prepared;
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let result = state
        .executor
        .run_sync(request, cancel)
        .await
        .map_err(|source| ApiError::Execution { action, source })?;
    drop(images);
    Ok(Json(CommandResponse::from(result)))
}

/// Start the run on its own task and relay its events as SSE.
fn run_stream(state: &AppState, prepared: Prepared) -> Response {
    let (tx, rx) = state.executor.channel();
    let cancel = CancellationToken::new();
    let executor = state.executor.clone();
    let run_cancel = cancel.clone();
    tokio::spawn(async move {
        let Prepared { request, images } = prepared;
        let _outcome = executor.run_streaming(request, tx, run_cancel).await;
        drop(images);
    });
    relay::sse_response(rx, cancel, state.config.server.keepalive())
}

async fn command(
    State(state): State<AppState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse>, ApiError> {
    let req = body(payload)?;
    let prepared = prepare_command(&state, &req.project, &req.command, &req.args, &req.images)?;
    run_sync(&state, prepared, RUN_FAILED).await
}

async fn command_stream(
    State(state): State<AppState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = body(payload)?;
    let prepared = prepare_command(&state, &req.project, &req.command, &req.args, &req.images)?;
    Ok(run_stream(&state, prepared))
}

async fn plan(
    State(state): State<AppState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<CommandResponse>, ApiError> {
    let req = body(payload)?;
    let prepared = prepare_command(&state, &req.project, "plan", &req.args, &[])?;
    run_sync(&state, prepared, RUN_FAILED).await
}

async fn plan_stream(
    State(state): State<AppState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = body(payload)?;
    let prepared = prepare_command(&state, &req.project, "plan", &req.args, &[])?;
    Ok(run_stream(&state, prepared))
}

async fn continue_session(
    State(state): State<AppState>,
    payload: Result<Json<ContinueRequest>, JsonRejection>,
) -> Result<Json<CommandResponse>, ApiError> {
    let req = body(payload)?;
    let prepared = prepare_continue(&req)?;
    run_sync(&state, prepared, CONTINUE_FAILED).await
}

async fn continue_stream(
    State(state): State<AppState>,
    payload: Result<Json<ContinueRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = body(payload)?;
    let prepared = prepare_continue(&req)?;
    Ok(run_stream(&state, prepared))
}
