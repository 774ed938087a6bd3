//! # Run API
//!
//! Streams one pipeline run as server-sent events, one `data:` block per
//! [`StreamEvent`], ending with `data: {"type":"done"}`.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use conductor_core::swarm::{RunBudget, RunRequest, StreamEvent};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use utoipa::ToSchema;

use crate::SharedState;

/// Goal for a streamed run
#[derive(Debug, Deserialize, ToSchema)]
pub struct RunStreamRequest {
    /// Free-text goal handed to the pipeline
    pub message: String,
    /// Round limit, defaults to the configured value
    #[serde(default)]
    pub n_round: Option<u32>,
    /// Spending cap in dollars, defaults to the configured value
    #[serde(default)]
    pub investment: Option<f64>,
}

impl RunStreamRequest {
    fn into_run_request(self, defaults: RunBudget) -> RunRequest {
        let budget = RunBudget {
            n_round: self.n_round.unwrap_or(defaults.n_round),
            investment: self.investment.unwrap_or(defaults.investment),
        };
        RunRequest::new(self.message).with_budget(budget)
    }
}

fn to_sse(event: &StreamEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_default();
    Event::default().data(json)
}

/// Start a run and stream its events
#[utoipa::path(
    post,
    path = "/api/v1/run/stream",
    tag = "run",
    request_body = RunStreamRequest,
    responses(
        (status = 200, description = "Run events as text/event-stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Empty goal")
    )
)]
pub async fn run_stream(
    State(state): State<SharedState>,
    Json(req): Json<RunStreamRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    if req.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message must not be empty".to_string()));
    }

    let request = req.into_run_request(state.config.budget());
    tracing::info!(
        goal = %request.goal.chars().take(80).collect::<String>(),
        "streaming run"
    );

    let events = state
        .bridge
        .stream_run(request)
        .map(|event| Ok::<_, Infallible>(to_sse(&event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
