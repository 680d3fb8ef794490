//! Axum route handlers for interview turns.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{sse::Event, IntoResponse, Response, Sse},
    Json,
};
use bytes::Bytes;
use futures::stream::{self, Stream};
use serde::Serialize;

use crate::errors::AppError;
use crate::interview::reply::NextTurn;
use crate::interview::{run_turn, TurnRequest, TurnRoute};
use crate::state::AppState;

/// Carries the JSON-encoded followups on the raw stream route.
pub const FOLLOWUPS_HEADER: &str = "x-zuri-followups";

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub ok: bool,
    pub next: NextTurn,
}

#[derive(Debug, Serialize)]
struct ChatStreamEvent {
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    delta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<NextTurn>,
}

/// POST /api/zuri/bedrock/turn
pub async fn handle_turn(
    State(state): State<AppState>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let next = run_turn(&state, &req, TurnRoute::Turn).await?;
    Ok(Json(TurnResponse { ok: true, next }))
}

/// POST /api/zuri/bedrock/stream
///
/// Streams the interviewer's message as plain text chunks.
pub async fn handle_stream(
    State(state): State<AppState>,
    Json(req): Json<TurnRequest>,
) -> Result<Response, AppError> {
    let next = run_turn(&state, &req, TurnRoute::Stream).await?;

    let followups = followups_header(&next.followups);
    let chunks = text_chunks(&next.text)
        .into_iter()
        .map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk)));

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream::iter(chunks)),
    )
        .into_response();

    // Always ASCII, so this only fails if serde_json itself does.
    if let Ok(value) = HeaderValue::from_str(&followups) {
        response.headers_mut().insert(FOLLOWUPS_HEADER, value);
    }
    Ok(response)
}

/// POST /api/zuri/chat
///
/// Server-sent events: `start`, one `delta` per text chunk, then `done` with the full turn.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<TurnRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let next = run_turn(&state, &req, TurnRoute::Chat).await?;

    let stream = async_stream::stream! {
        yield Ok(sse_event(&ChatStreamEvent { event: "start", delta: None, next: None }));
        for chunk in text_chunks(&next.text) {
            yield Ok(sse_event(&ChatStreamEvent { event: "delta", delta: Some(chunk), next: None }));
        }
        yield Ok(sse_event(&ChatStreamEvent { event: "done", delta: None, next: Some(next) }));
    };

    Ok(Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::default()))
}

fn sse_event(event: &ChatStreamEvent) -> Event {
    let payload = serde_json::to_string(event).unwrap_or_default();
    Event::default().data(payload)
}

/// JSON-encodes followups with every non-ASCII or DEL character written as a
/// `\uXXXX` escape, so header readers that decode bytes as Latin-1 still get
/// valid, lossless JSON.
fn followups_header(followups: &[String]) -> String {
    let json = serde_json::to_string(followups).unwrap_or_else(|_| "[]".to_string());
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\x7f' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Splits text into word chunks that concatenate back to the original.
fn text_chunks(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}
