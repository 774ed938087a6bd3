//! # Chat API
//!
//! Direct exchanges with the configured LLM, either as one JSON answer or as
//! a server-sent event stream of text chunks ending with `data: [DONE]`.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use conductor_core::swarm::{RunRequest, StreamEvent};
use futures::{future, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use utoipa::ToSchema;

use crate::SharedState;

/// Final data line of a chat stream
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
}

/// Ask the LLM one question
#[utoipa::path(
    post,
    path = "/api/v1/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "LLM answer", body = ChatResponse),
        (status = 500, description = "LLM call failed")
    )
)]
pub async fn chat(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<serde_json::Value>)> {
    match state.llm.ask(&req.message).await {
        Ok(response) => Ok(Json(ChatResponse { response })),
        Err(e) => {
            tracing::error!("chat failed: {:#}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "detail": e.to_string() })),
            ))
        }
    }
}

/// Text of the chat chunk for `event`, if it produces one.
///
/// The reply usually reaches the reasoning channel before it arrives as the
/// run's content, so content equal to the last chunk is not repeated.
fn chat_chunk(last: &mut Option<String>, event: StreamEvent) -> Option<String> {
    let text = match event {
        StreamEvent::Reasoning(text) => text,
        StreamEvent::Content(text) if last.as_deref() == Some(text.as_str()) => return None,
        StreamEvent::Content(text) => text,
        StreamEvent::Status(_) => return None,
        StreamEvent::Error(error) => return Some(format!("Error: {}", error)),
        StreamEvent::Done => return Some(DONE_MARKER.to_string()),
    };
    *last = Some(text.clone());
    Some(text)
}

/// Stream the LLM's answer to one question
#[utoipa::path(
    post,
    path = "/api/v1/chat/stream",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer chunks as text/event-stream, ending with [DONE]", content_type = "text/event-stream", body = String)
    )
)]
pub async fn chat_stream(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!(chars = req.message.len(), "streaming chat");

    let chunks = state
        .chat
        .stream_run(RunRequest::new(req.message))
        .scan(None, |last, event| future::ready(Some(chat_chunk(last, event))))
        .filter_map(future::ready)
        .map(|chunk| Ok::<_, Infallible>(Event::default().data(chunk)));

    Sse::new(chunks).keep_alive(KeepAlive::default())
}
