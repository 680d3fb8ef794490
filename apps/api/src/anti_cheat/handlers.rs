use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::snapshots::{decode_image, upload_snapshot};
use super::MAX_EVENTS_PER_REQUEST;
use crate::errors::AppError;
use crate::models::session::AntiCheatEvent;
use crate::sessions::load_authorized;
use crate::sessions::store::{closed_conflict, InterviewStore};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingEvent {
    pub kind: String,
    /// Client timestamp; server time is used when absent.
    pub at: Option<DateTime<Utc>>,
    pub detail: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEventsRequest {
    pub session_id: Uuid,
    pub token: Option<String>,
    #[serde(default)]
    pub events: Vec<IncomingEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEventsResponse {
    pub ok: bool,
    pub accepted: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    pub session_id: Uuid,
    pub token: Option<String>,
    /// Base64 image or `data:image/...;base64,` URL.
    pub image: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub ok: bool,
    pub key: String,
}

/// POST /api/zuri/anti-cheat/log
pub async fn handle_log_events(
    State(state): State<AppState>,
    Json(req): Json<LogEventsRequest>,
) -> Result<Json<LogEventsResponse>, AppError> {
    let session = load_authorized(state.store.as_ref(), req.session_id, req.token.as_deref()).await?;
    if session.status.is_closed() {
        return Err(closed_conflict(session.id));
    }

    let events = normalize_events(req.events, Utc::now());
    if events.is_empty() {
        return Ok(Json(LogEventsResponse {
            ok: true,
            accepted: 0,
            total: session.anti_cheat_events.len(),
        }));
    }

    let updated = state.store.append_events(session.id, &events).await?;
    debug!(
        "Logged {} anti-cheat events for session {}",
        events.len(),
        session.id
    );

    Ok(Json(LogEventsResponse {
        ok: true,
        accepted: events.len(),
        total: updated.anti_cheat_events.len(),
    }))
}

/// POST /api/zuri/anti-cheat/snapshot
pub async fn handle_snapshot(
    State(state): State<AppState>,
    Json(req): Json<SnapshotRequest>,
) -> Result<Json<SnapshotResponse>, AppError> {
    let session = load_authorized(state.store.as_ref(), req.session_id, req.token.as_deref()).await?;
    if session.status.is_closed() {
        return Err(closed_conflict(session.id));
    }

    let image = decode_image(&req.image)?;
    let key = upload_snapshot(&state.s3, &state.config.s3_bucket, session.id, image).await?;

    record_snapshot(state.store.as_ref(), session.id, &key, req.reason).await?;

    Ok(Json(SnapshotResponse { ok: true, key }))
}

/// Appends the `snapshot` event for an uploaded object. If the session closed
/// while the upload ran, the object stays in the bucket unreferenced and its
/// key is logged.
async fn record_snapshot(
    store: &dyn InterviewStore,
    session_id: Uuid,
    key: &str,
    reason: Option<String>,
) -> Result<(), AppError> {
    let event = AntiCheatEvent {
        kind: "snapshot".to_string(),
        at: Utc::now(),
        detail: Some(json!({ "key": key, "reason": reason })),
    };
    if let Err(e) = store.append_events(session_id, &[event]).await {
        warn!("Snapshot s3 object {key} is orphaned; recording it on session {session_id} failed: {e}");
        return Err(e);
    }
    Ok(())
}

/// Keeps at most `MAX_EVENTS_PER_REQUEST` events with a non-blank kind.
fn normalize_events(events: Vec<IncomingEvent>, now: DateTime<Utc>) -> Vec<AntiCheatEvent> {
    events
        .into_iter()
        .take(MAX_EVENTS_PER_REQUEST)
        .filter_map(|e| {
            let kind = e.kind.trim();
            (!kind.is_empty()).then(|| AntiCheatEvent {
                kind: kind.to_string(),
                at: e.at.unwrap_or(now),
                detail: e.detail.filter(|d| !d.is_null()),
            })
        })
        .collect()
}
