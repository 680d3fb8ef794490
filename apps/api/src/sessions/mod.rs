// Interview sessions: creation, capability-token auth, step/answer/finish writes.
// Session state lives behind the InterviewStore trait (Postgres in production).

pub mod handlers;
pub mod invite;
#[cfg(test)]
pub mod memory;
pub mod screener;
pub mod store;

use uuid::Uuid;

use crate::errors::AppError;
use crate::models::session::InterviewSession;
use store::{session_not_found, InterviewStore};

/// Loads a session and checks its capability token.
/// Missing token → 401, unknown session → 404, wrong token → 403.
pub async fn load_authorized(
    store: &dyn InterviewStore,
    id: Uuid,
    token: Option<&str>,
) -> Result<InterviewSession, AppError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Session token required".to_string()))?;

    let session = store
        .get_session(id)
        .await?
        .ok_or_else(|| session_not_found(id))?;

    if session.token != token {
        return Err(AppError::Forbidden("Invalid session token".to_string()));
    }
    Ok(session)
}
