//! Conductor Server
//!
//! Axum routes exposing streamed pipeline runs, the workspace catalog and LLM
//! chat, one-shot or streamed.

pub mod api;

use axum::{
    body::Body,
    http::{header, Response, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use conductor_core::bridge::RunBridge;
use conductor_core::llm::{LlmClient, ProviderLlm};
use conductor_core::swarm::{RoleTeam, SingleTurnChat};
use conductor_core::workspace::FileCatalog;
use conductor_core::ConductorConfig;
use std::sync::Arc;
use utoipa::OpenApi;

/// Application state
pub struct AppState {
    pub bridge: RunBridge,
    /// Streams single chat exchanges; never records steps
    pub chat: RunBridge,
    pub catalog: FileCatalog,
    pub llm: Arc<dyn LlmClient>,
    pub config: ConductorConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the role team, recorder and catalog from `config`
    pub fn from_config(config: ConductorConfig) -> Self {
        let llm: Arc<dyn LlmClient> = Arc::new(ProviderLlm::new(config.model.clone()));
        let team = RoleTeam::new(Arc::clone(&llm)).with_cost_per_call(config.cost_per_call);
        Self::with_parts(config, Arc::new(team), llm)
    }

    /// State around an arbitrary pipeline and LLM
    pub fn with_parts(
        config: ConductorConfig,
        pipeline: Arc<dyn conductor_core::swarm::Pipeline>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let mut bridge = RunBridge::new(pipeline).with_options(config.bridge_options());
        if config.record_steps {
            bridge = bridge.with_recorder(
                config.workspace.clone(),
                Arc::clone(&llm),
                config.report_language.clone(),
            );
        }

        let chat = RunBridge::new(Arc::new(SingleTurnChat::new(Arc::clone(&llm))))
            .with_options(config.bridge_options());

        Self {
            bridge,
            chat,
            catalog: FileCatalog::new(config.workspace.clone()),
            llm,
            config,
        }
    }
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Conductor API",
        version = "1.0.0",
        description = "Streams multi-agent pipeline runs and serves their workspace"
    ),
    paths(
        api::run::run_stream,
        api::files::list_files,
        api::files::get_file,
        api::chat::chat,
        api::chat::chat_stream,
        api::system::health
    ),
    components(schemas(
        api::run::RunStreamRequest,
        api::files::FileEntry,
        api::chat::ChatRequest,
        api::chat::ChatResponse,
        api::system::HealthResponse
    )),
    tags(
        (name = "run", description = "Streamed pipeline runs"),
        (name = "files", description = "Workspace catalog"),
        (name = "chat", description = "LLM chat"),
        (name = "system", description = "Health and discovery")
    )
)]
pub struct ApiDoc;

async fn serve_openapi() -> impl IntoResponse {
    match ApiDoc::openapi().to_json() {
        Ok(spec) => ([(header::CONTENT_TYPE, "application/json")], spec).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn not_found() -> Response<Body> {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// All routes, bound to `state`
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/run/stream", post(api::run::run_stream))
        .route("/api/v1/files", get(api::files::list_files))
        .route("/api/v1/files/*path", get(api::files::get_file))
        .route("/api/v1/chat", post(api::chat::chat))
        .route("/api/v1/chat/stream", post(api::chat::chat_stream))
        .route("/api/v1/openapi.json", get(serve_openapi))
        .route("/health", get(api::system::health))
        .fallback(not_found)
        .with_state(state)
}
