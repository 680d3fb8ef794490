//! Axum route handlers for the Sessions API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{Job, ScreenerRule};
use crate::models::session::{
    AnswerPatch, Candidate, InterviewSession, ScreenerAnswer, ScreenerEvaluation, SessionStatus,
    SessionView, Step,
};
use crate::sessions::invite::{verify_invite, InviteError};
use crate::sessions::load_authorized;
use crate::sessions::screener::evaluate_screener;
use crate::state::AppState;

const TOKEN_LEN: usize = 40;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub t: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub job_code: String,
    pub candidate: Candidate,
    #[serde(default)]
    pub screener_answers: Vec<ScreenerAnswer>,
    pub resume_summary: Option<String>,
    /// Signed invite issued by the hiring team.
    pub invite: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub id: Uuid,
    pub token: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screener: Option<ScreenerEvaluation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendStepRequest {
    pub question: String,
    pub audio_url: Option<String>,
    pub transcript: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub step_index: usize,
    pub audio_url: Option<String>,
    pub transcript: Option<String>,
    pub duration_sec: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct FinishRequest {
    pub scorecard: Option<Value>,
}

/// What a candidate sees before starting: no rubric, no admin guide.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicJob {
    pub code: String,
    pub title: String,
    pub company: String,
    pub focus_areas: Vec<String>,
    pub screener: Vec<ScreenerRule>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/zuri/jobs/:code
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PublicJob>, AppError> {
    let job = find_active_job(&state, &code).await?;
    Ok(Json(PublicJob {
        code: job.code,
        title: job.title,
        company: job.company,
        focus_areas: job.focus_areas,
        screener: job.screener_rules,
    }))
}

/// POST /api/zuri/sessions
///
/// Starts an interview for a candidate. The job is snapshotted onto the session.
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let candidate = validate_candidate(req.candidate)?;
    let job = find_active_job(&state, &req.job_code).await?;

    if let Some(invite) = req.invite.as_deref().filter(|i| !i.trim().is_empty()) {
        check_invite(&state, invite, &job, &candidate)?;
    }

    let screener = evaluate_screener(&job.screener_rules, &req.screener_answers);
    if let Some(eval) = screener.as_ref().filter(|e| !e.passed) {
        info!(
            "Candidate for job {} failed {} screener rule(s)",
            job.code,
            eval.results.iter().filter(|r| !r.passed).count()
        );
    }

    let now = Utc::now();
    let session = InterviewSession {
        id: Uuid::new_v4(),
        token: generate_token(),
        job_code: job.code,
        job_title: job.title,
        company: job.company,
        jd_text: job.description,
        focus_areas: job.focus_areas,
        candidate,
        resume_summary: req
            .resume_summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        status: SessionStatus::Running,
        steps: Vec::new(),
        screener_answers: req.screener_answers,
        screener,
        scorecard: None,
        anti_cheat_events: Vec::new(),
        created_at: now,
        started_at: Some(now),
        finished_at: None,
    };

    state.store.insert_session(&session).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            id: session.id,
            token: session.token,
            status: session.status,
            screener: session.screener,
        }),
    ))
}

/// GET /api/zuri/sessions/:id?t=TOKEN
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<TokenQuery>,
) -> Result<Json<SessionView>, AppError> {
    let session = load_authorized(state.store.as_ref(), id, q.t.as_deref()).await?;
    Ok(Json(SessionView::from(&session)))
}

/// POST /api/zuri/sessions/:id/append-step?t=TOKEN
pub async fn handle_append_step(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<TokenQuery>,
    Json(req): Json<AppendStepRequest>,
) -> Result<Json<SessionView>, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("question cannot be empty".to_string()));
    }

    load_authorized(state.store.as_ref(), id, q.t.as_deref()).await?;

    let step = Step {
        question: question.to_string(),
        audio_url: non_blank(req.audio_url),
        transcript: non_blank(req.transcript),
        asked_at: Utc::now(),
        answered_at: None,
        duration_sec: None,
    };
    let session = state.store.append_step(id, &step).await?;
    Ok(Json(SessionView::from(&session)))
}

/// POST /api/zuri/sessions/:id/answer?t=TOKEN
pub async fn handle_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<TokenQuery>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<SessionView>, AppError> {
    let patch = AnswerPatch {
        audio_url: non_blank(req.audio_url),
        transcript: non_blank(req.transcript),
        duration_sec: req.duration_sec,
        answered_at: Utc::now(),
    };
    if patch.audio_url.is_none() && patch.transcript.is_none() {
        return Err(AppError::Validation(
            "answer must include audioUrl or transcript".to_string(),
        ));
    }
    if patch.duration_sec.is_some_and(|d| !d.is_finite() || d < 0.0) {
        return Err(AppError::Validation(
            "durationSec must be a non-negative number".to_string(),
        ));
    }

    load_authorized(state.store.as_ref(), id, q.t.as_deref()).await?;

    let session = state.store.record_answer(id, req.step_index, &patch).await?;
    Ok(Json(SessionView::from(&session)))
}

/// POST /api/zuri/sessions/:id/finish?t=TOKEN
pub async fn handle_finish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<TokenQuery>,
    body: Option<Json<FinishRequest>>,
) -> Result<Json<SessionView>, AppError> {
    load_authorized(state.store.as_ref(), id, q.t.as_deref()).await?;

    let scorecard = body.and_then(|Json(b)| b.scorecard).filter(|s| !s.is_null());
    let session = state
        .store
        .finish(id, scorecard.as_ref(), Utc::now())
        .await?;
    Ok(Json(SessionView::from(&session)))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn find_active_job(state: &AppState, code: &str) -> Result<Job, AppError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AppError::Validation("jobCode cannot be empty".to_string()));
    }
    state
        .store
        .find_job(code)
        .await?
        .filter(|job| job.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Job {code} not found")))
}

fn validate_candidate(candidate: Candidate) -> Result<Candidate, AppError> {
    let name = candidate.name.trim().to_string();
    let email = candidate.email.trim().to_lowercase();
    if name.is_empty() {
        return Err(AppError::Validation("candidate.name cannot be empty".to_string()));
    }
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid_email {
        return Err(AppError::Validation(
            "candidate.email must be a valid email address".to_string(),
        ));
    }
    Ok(Candidate {
        name,
        email,
        phone: non_blank(candidate.phone),
    })
}

fn check_invite(
    state: &AppState,
    invite: &str,
    job: &Job,
    candidate: &Candidate,
) -> Result<(), AppError> {
    let secret = state
        .config
        .invite_secret
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Invites are not enabled".to_string()))?;

    let claims = verify_invite(secret, invite, Utc::now()).map_err(|e| {
        warn!("Rejected invite for job {}: {e}", job.code);
        match e {
            InviteError::Expired => AppError::Unauthorized("Invite has expired".to_string()),
            _ => AppError::Unauthorized("Invalid invite".to_string()),
        }
    })?;

    if !claims.job_code.eq_ignore_ascii_case(&job.code) {
        return Err(AppError::Forbidden("Invite is for a different job".to_string()));
    }
    if !claims.email.trim().eq_ignore_ascii_case(&candidate.email) {
        return Err(AppError::Forbidden(
            "Invite was issued to a different email".to_string(),
        ));
    }
    Ok(())
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
