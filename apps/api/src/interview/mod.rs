// Interview turns: prompt assembly, per-session turn coordination, reply parsing.
// All three turn routes (turn / stream / chat) share `run_turn`; they differ only
// in persona, minimum gap between calls, and response shape.

pub mod coordinator;
pub mod handlers;
pub mod prompts;
pub mod reply;
pub mod timing;

use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::session::InterviewSession;
use crate::sessions::load_authorized;
use crate::sessions::store::closed_conflict;
use crate::state::AppState;
use prompts::{assemble_prompt, DialogueTurn, PromptContext, ZURI_CHAT_SYSTEM, ZURI_TURN_SYSTEM};
use reply::{parse_reply, NextTurn};

/// Only the most recent turns are replayed into the prompt.
pub const MAX_HISTORY_TURNS: usize = 40;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub session_id: Uuid,
    pub token: Option<String>,
    pub job_context: Option<String>,
    pub resume_summary: Option<String>,
    #[serde(default)]
    pub history: Vec<DialogueTurn>,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRoute {
    Turn,
    Stream,
    Chat,
}

impl TurnRoute {
    fn system(&self) -> &'static str {
        match self {
            TurnRoute::Turn | TurnRoute::Stream => ZURI_TURN_SYSTEM,
            TurnRoute::Chat => ZURI_CHAT_SYSTEM,
        }
    }

    fn min_gap(&self, config: &Config) -> Duration {
        match self {
            TurnRoute::Turn => config.turn_min_gap,
            TurnRoute::Stream => config.stream_min_gap,
            TurnRoute::Chat => config.chat_min_gap,
        }
    }
}

/// Authenticates the session, enriches the prompt with job data, and runs one
/// provider call through the turn coordinator.
pub async fn run_turn(
    state: &AppState,
    req: &TurnRequest,
    route: TurnRoute,
) -> Result<NextTurn, AppError> {
    let session = load_authorized(state.store.as_ref(), req.session_id, req.token.as_deref()).await?;
    if session.status.is_closed() {
        return Err(closed_conflict(session.id));
    }

    // Enrichment is best-effort: a missing job or a lookup failure only drops
    // the rubric and admin guide.
    let job = match state.store.find_job(&session.job_code).await {
        Ok(job) => job,
        Err(e) => {
            warn!("Job lookup for session {} failed: {e}", session.id);
            None
        }
    };
    let rubric_hints = job
        .as_ref()
        .and_then(|j| j.rubric.as_ref())
        .map(|r| r.hints());
    let admin_guide = job.as_ref().and_then(|j| j.admin_guide.as_deref());

    let job_context = non_blank(req.job_context.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| session_job_context(&session));
    let resume_summary = non_blank(req.resume_summary.as_deref())
        .or_else(|| non_blank(session.resume_summary.as_deref()));

    let context = PromptContext {
        job_context: Some(&job_context),
        rubric_hints: rubric_hints.as_deref(),
        resume_summary,
        admin_guide,
    };
    let history = recent_history(&req.history);
    let prompt = assemble_prompt(route.system(), &context, history, &req.answer);

    let raw = state
        .turns
        .run(&session.id.to_string(), route.min_gap(&state.config), || {
            state.llm.complete(&prompt)
        })
        .await?;

    let next = parse_reply(&raw);
    info!(
        "Turn {:?} for session {}: {} chars, {} followups",
        route,
        session.id,
        next.text.len(),
        next.followups.len()
    );
    Ok(next)
}

/// Job context text built from the snapshot taken when the session started.
pub fn session_job_context(session: &InterviewSession) -> String {
    let mut lines = Vec::new();
    match (session.job_title.trim(), session.company.trim()) {
        ("", "") => {}
        (title, "") => lines.push(format!("Role: {title}")),
        ("", company) => lines.push(format!("Company: {company}")),
        (title, company) => lines.push(format!("Role: {title} at {company}")),
    }
    if !session.focus_areas.is_empty() {
        lines.push(format!("Focus areas: {}", session.focus_areas.join(", ")));
    }
    if let Some(jd) = non_blank(Some(&session.jd_text)) {
        lines.push(String::new());
        lines.push(jd.to_string());
    }
    lines.join("\n")
}

fn recent_history(history: &[DialogueTurn]) -> &[DialogueTurn] {
    let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
    &history[skip..]
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
