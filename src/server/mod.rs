//! HTTP API server.
//!
//! Thin JSON marshalling over the database and AI layers. Handlers parse
//! the request, call one storage or adapter operation, and serialize the
//! result; all domain rules live below this module.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::ai::pricing::PricingRefresh;
use crate::ai::{AiClient, Provider};
use crate::db::Database;
use crate::error::{ApiError, ErrorCode};
use crate::types::{BlockerInfo, Project, Task, TaskTree};

/// State shared across all API handlers.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Database>,
    ai: Arc<AiClient>,
    default_provider: Provider,
}

impl AppState {
    pub fn new(db: Arc<Database>, ai: Arc<AiClient>, default_provider: Provider) -> Self {
        Self {
            db,
            ai,
            default_provider,
        }
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::UpstreamError | ErrorCode::BadUpstreamResponse => StatusCode::BAD_GATEWAY,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(self.code), Json(self)).into_response()
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ========== PROJECT HANDLERS ==========

#[derive(Debug, serde::Deserialize)]
struct CreateProjectRequest {
    name: String,
    description: Option<String>,
    color: Option<String>,
    ai_context: Option<String>,
}

async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.db.create_project(
        &request.name,
        request.description,
        request.color,
        request.ai_context,
    )?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.db.list_projects()?))
}

async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    let project = state
        .db
        .get_project(&project_id)?
        .ok_or_else(|| ApiError::project_not_found(&project_id))?;
    Ok(Json(project))
}

/// Distinguishes an absent PATCH field (leave untouched) from an explicit
/// `null` (clear the value).
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, serde::Deserialize)]
struct UpdateProjectRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
    color: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    ai_context: Option<Option<String>>,
}

async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    let project = state.db.update_project(
        &project_id,
        request.name,
        request.description,
        request.color,
        request.ai_context,
    )?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.delete_project(&project_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// A project together with its full task forest.
#[derive(Debug, serde::Serialize)]
struct TreeResponse {
    project: Project,
    tasks: Vec<TaskTree>,
}

async fn get_project_tree(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<TreeResponse>, ApiError> {
    let project = state
        .db
        .get_project(&project_id)?
        .ok_or_else(|| ApiError::project_not_found(&project_id))?;
    let tasks = state.db.get_task_tree(&project_id)?;
    Ok(Json(TreeResponse { project, tasks }))
}

// ========== TASK HANDLERS ==========

#[derive(Debug, serde::Deserialize)]
struct CreateTaskRequest {
    project_id: Option<String>,
    parent_id: Option<String>,
    label: String,
}

async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state
        .db
        .create_task(request.project_id, request.parent_id, &request.label)?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, serde::Deserialize)]
struct UpdateTaskRequest {
    label: Option<String>,
    position: Option<i64>,
    expanded: Option<bool>,
}

async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .db
        .update_task(&task_id, request.label, request.position, request.expanded)?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.delete_task(&task_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ========== BLOCKER HANDLERS ==========

async fn list_blockers(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Vec<BlockerInfo>>, ApiError> {
    state
        .db
        .get_task(&task_id)?
        .ok_or_else(|| ApiError::task_not_found(&task_id))?;
    Ok(Json(state.db.list_blockers(&task_id)?))
}

#[derive(Debug, serde::Deserialize)]
struct AddBlockerRequest {
    blocker_id: String,
    note: Option<String>,
}

async fn add_blocker(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(request): Json<AddBlockerRequest>,
) -> Result<(StatusCode, Json<BlockerInfo>), ApiError> {
    let blocker = state
        .db
        .add_blocker(&task_id, &request.blocker_id, request.note)?;
    Ok((StatusCode::CREATED, Json(blocker)))
}

async fn remove_blocker(
    State(state): State<AppState>,
    Path((task_id, blocker_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.db.remove_blocker(&task_id, &blocker_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ========== AI HANDLERS ==========

fn parse_provider(name: Option<&str>, default: Provider) -> Result<Provider, ApiError> {
    match name {
        None => Ok(default),
        Some(s) => Provider::from_str(s).ok_or_else(|| ApiError::unknown_provider(s)),
    }
}

#[derive(Debug, serde::Deserialize)]
struct BreakdownRequest {
    provider: Option<String>,
    label: String,
    context: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct BreakdownResponse {
    provider: Provider,
    subtasks: Vec<String>,
}

async fn ai_breakdown(
    State(state): State<AppState>,
    Json(request): Json<BreakdownRequest>,
) -> Result<Json<BreakdownResponse>, ApiError> {
    let provider = parse_provider(request.provider.as_deref(), state.default_provider)?;
    let subtasks = state
        .ai
        .breakdown(
            provider,
            &request.label,
            request.context.as_deref(),
            request.api_key,
        )
        .await?;
    Ok(Json(BreakdownResponse { provider, subtasks }))
}

#[derive(Debug, serde::Deserialize)]
struct ModelsRequest {
    provider: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct ModelsResponse {
    provider: Provider,
    models: Vec<String>,
}

async fn ai_models(
    State(state): State<AppState>,
    Json(request): Json<ModelsRequest>,
) -> Result<Json<ModelsResponse>, ApiError> {
    let provider = parse_provider(request.provider.as_deref(), state.default_provider)?;
    let models = state.ai.list_models(provider, request.api_key).await?;
    Ok(Json(ModelsResponse { provider, models }))
}

#[derive(Debug, serde::Deserialize)]
struct PricingRequest {
    provider: Option<String>,
    api_key: Option<String>,
    extractor_provider: Option<String>,
}

async fn ai_pricing_refresh(
    State(state): State<AppState>,
    Json(request): Json<PricingRequest>,
) -> Result<Json<PricingRefresh>, ApiError> {
    let provider = parse_provider(request.provider.as_deref(), state.default_provider)?;
    let extractor = match request.extractor_provider.as_deref() {
        Some(s) => Some(Provider::from_str(s).ok_or_else(|| ApiError::unknown_provider(s))?),
        None => None,
    };
    let refresh = state
        .ai
        .refresh_pricing(provider, request.api_key, extractor)
        .await?;
    Ok(Json(refresh))
}

// ========== PROVIDER CONFIG HANDLERS ==========

/// Effective provider settings: stored overrides merged over defaults.
#[derive(Debug, serde::Serialize)]
struct ProviderConfigResponse {
    provider: Provider,
    base_url: String,
    model: String,
    stored: bool,
}

fn effective_config(
    provider: Provider,
    stored: Option<crate::types::ProviderConfig>,
) -> ProviderConfigResponse {
    let is_stored = stored.is_some();
    let (base_url, model) = stored.map(|c| (c.base_url, c.model)).unwrap_or((None, None));
    let pick = |value: Option<String>, default: &str| {
        value
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };
    ProviderConfigResponse {
        provider,
        base_url: pick(base_url, provider.default_base_url()),
        model: pick(model, provider.default_model()),
        stored: is_stored,
    }
}

async fn get_provider_config(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<ProviderConfigResponse>, ApiError> {
    let provider =
        Provider::from_str(&provider).ok_or_else(|| ApiError::unknown_provider(&provider))?;
    let stored = state.db.get_provider_config(provider.as_str())?;
    Ok(Json(effective_config(provider, stored)))
}

#[derive(Debug, serde::Deserialize)]
struct PutProviderConfigRequest {
    base_url: Option<String>,
    model: Option<String>,
}

async fn put_provider_config(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(request): Json<PutProviderConfigRequest>,
) -> Result<Json<ProviderConfigResponse>, ApiError> {
    let provider =
        Provider::from_str(&provider).ok_or_else(|| ApiError::unknown_provider(&provider))?;
    let stored =
        state
            .db
            .put_provider_config(provider.as_str(), request.base_url, request.model)?;
    Ok(Json(effective_config(provider, Some(stored))))
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{project_id}",
            get(get_project)
                .patch(update_project)
                .delete(delete_project),
        )
        .route("/api/projects/{project_id}/tree", get(get_project_tree))
        .route("/api/tasks", post(create_task))
        .route(
            "/api/tasks/{task_id}",
            patch(update_task).delete(delete_task),
        )
        .route(
            "/api/tasks/{task_id}/blockers",
            get(list_blockers).post(add_blocker),
        )
        .route(
            "/api/tasks/{task_id}/blockers/{blocker_id}",
            delete(remove_blocker),
        )
        .route("/api/ai/breakdown", post(ai_breakdown))
        .route("/api/ai/models", post(ai_models))
        .route("/api/ai/pricing/refresh", post(ai_pricing_refresh))
        .route(
            "/api/providers/{provider}",
            get(get_provider_config).put(put_provider_config),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle for a running API server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ServerHandle {
    /// Address the server actually bound. With port 0 this carries the
    /// kernel-assigned port.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal the server to stop accepting connections and drain.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Start the HTTP server on `host:port`.
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<ServerHandle> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    let bound_addr = listener.local_addr()?;

    info!("API server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            })
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr: bound_addr,
        shutdown_tx: Some(shutdown_tx),
    })
}
