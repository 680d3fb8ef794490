//! Session persistence.
//!
//! Every write is a single-row `UPDATE ... RETURNING` guarded by the session
//! status, so a finished session can never be mutated even by racing requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{Job, JobRow};
use crate::models::session::{AnswerPatch, AntiCheatEvent, InterviewSession, SessionRow, Step};

/// Storage seam for jobs and interview sessions.
///
/// Carried in `AppState` as `Arc<dyn InterviewStore>`. Mutations return
/// `AppError::NotFound` for unknown ids and `AppError::Conflict` for closed sessions.
#[async_trait]
pub trait InterviewStore: Send + Sync {
    /// Case-insensitive lookup by job code.
    async fn find_job(&self, code: &str) -> Result<Option<Job>, AppError>;

    async fn insert_session(&self, session: &InterviewSession) -> Result<(), AppError>;

    async fn get_session(&self, id: Uuid) -> Result<Option<InterviewSession>, AppError>;

    /// Appends a step and moves a pending session to running.
    async fn append_step(&self, id: Uuid, step: &Step) -> Result<InterviewSession, AppError>;

    async fn record_answer(
        &self,
        id: Uuid,
        step_index: usize,
        patch: &AnswerPatch,
    ) -> Result<InterviewSession, AppError>;

    /// Closes the session. The scorecard is only stored if none was set before.
    async fn finish(
        &self,
        id: Uuid,
        scorecard: Option<&Value>,
        finished_at: DateTime<Utc>,
    ) -> Result<InterviewSession, AppError>;

    async fn append_events(
        &self,
        id: Uuid,
        events: &[AntiCheatEvent],
    ) -> Result<InterviewSession, AppError>;
}

pub fn closed_conflict(id: Uuid) -> AppError {
    AppError::Conflict(format!("Session {id} is already finished"))
}

pub fn session_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {id} not found"))
}

pub struct PgInterviewStore {
    pool: PgPool,
}

impl PgInterviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explains why a guarded UPDATE matched no row.
    async fn explain_miss(&self, id: Uuid) -> AppError {
        match self.get_session(id).await {
            Ok(None) => session_not_found(id),
            Ok(Some(session)) if session.status.is_closed() => closed_conflict(id),
            Ok(Some(_)) => AppError::NotFound(format!("Step not found in session {id}")),
            Err(e) => e,
        }
    }

    async fn finish_row(
        &self,
        row: Option<SessionRow>,
        id: Uuid,
    ) -> Result<InterviewSession, AppError> {
        match row {
            Some(row) => Ok(InterviewSession::try_from(row)?),
            None => Err(self.explain_miss(id).await),
        }
    }
}

#[async_trait]
impl InterviewStore for PgInterviewStore {
    async fn find_job(&self, code: &str) -> Result<Option<Job>, AppError> {
        let row: Option<JobRow> =
            sqlx::query_as("SELECT * FROM jobs WHERE UPPER(code) = UPPER($1) LIMIT 1")
                .bind(code.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Job::from))
    }

    async fn insert_session(&self, s: &InterviewSession) -> Result<(), AppError> {
        let screener = s.screener.as_ref().map(Json);
        sqlx::query(
            r#"
            INSERT INTO interview_sessions
                (id, token, job_code, job_title, company, jd_text, focus_areas,
                 candidate_name, candidate_email, candidate_phone, resume_summary,
                 status, steps, screener_answers, screener_result, scorecard,
                 anti_cheat_events, created_at, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20)
            "#,
        )
        .bind(s.id)
        .bind(&s.token)
        .bind(&s.job_code)
        .bind(&s.job_title)
        .bind(&s.company)
        .bind(&s.jd_text)
        .bind(&s.focus_areas)
        .bind(&s.candidate.name)
        .bind(&s.candidate.email)
        .bind(&s.candidate.phone)
        .bind(&s.resume_summary)
        .bind(s.status.as_str())
        .bind(Json(&s.steps))
        .bind(Json(&s.screener_answers))
        .bind(screener)
        .bind(&s.scorecard)
        .bind(Json(&s.anti_cheat_events))
        .bind(s.created_at)
        .bind(s.started_at)
        .bind(s.finished_at)
        .execute(&self.pool)
        .await?;

        info!("Created interview session {} for job {}", s.id, s.job_code);
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<InterviewSession>, AppError> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT * FROM interview_sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(InterviewSession::try_from).transpose()?)
    }

    async fn append_step(&self, id: Uuid, step: &Step) -> Result<InterviewSession, AppError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            UPDATE interview_sessions
            SET steps = steps || jsonb_build_array($2::jsonb),
                status = CASE WHEN status = 'pending' THEN 'running' ELSE status END,
                started_at = COALESCE(started_at, NOW())
            WHERE id = $1 AND status NOT IN ('finished', 'cancelled')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(step))
        .fetch_optional(&self.pool)
        .await?;

        self.finish_row(row, id).await
    }

    async fn record_answer(
        &self,
        id: Uuid,
        step_index: usize,
        patch: &AnswerPatch,
    ) -> Result<InterviewSession, AppError> {
        let index = i32::try_from(step_index)
            .map_err(|_| AppError::Validation("stepIndex is out of range".to_string()))?;

        // Merging the patch object overwrites only the keys it carries.
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            UPDATE interview_sessions
            SET steps = jsonb_set(steps, ARRAY[$2::text], (steps -> $3::int) || $4::jsonb)
            WHERE id = $1
              AND status NOT IN ('finished', 'cancelled')
              AND jsonb_array_length(steps) > $3::int
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(index.to_string())
        .bind(index)
        .bind(Json(patch))
        .fetch_optional(&self.pool)
        .await?;

        self.finish_row(row, id).await
    }

    async fn finish(
        &self,
        id: Uuid,
        scorecard: Option<&Value>,
        finished_at: DateTime<Utc>,
    ) -> Result<InterviewSession, AppError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            UPDATE interview_sessions
            SET status = 'finished',
                finished_at = $2,
                scorecard = COALESCE(scorecard, $3)
            WHERE id = $1 AND status NOT IN ('finished', 'cancelled')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(finished_at)
        .bind(scorecard)
        .fetch_optional(&self.pool)
        .await?;

        let session = self.finish_row(row, id).await?;
        info!("Interview session {id} finished with {} steps", session.steps.len());
        Ok(session)
    }

    async fn append_events(
        &self,
        id: Uuid,
        events: &[AntiCheatEvent],
    ) -> Result<InterviewSession, AppError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            UPDATE interview_sessions
            SET anti_cheat_events = anti_cheat_events || $2::jsonb
            WHERE id = $1 AND status NOT IN ('finished', 'cancelled')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(events))
        .fetch_optional(&self.pool)
        .await?;

        self.finish_row(row, id).await
    }
}
