use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Finished,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Finished => "finished",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SessionStatus::Pending),
            "running" => Some(SessionStatus::Running),
            "finished" => Some(SessionStatus::Finished),
            "cancelled" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }

    /// Closed sessions accept no further writes.
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionStatus::Finished | SessionStatus::Cancelled)
    }
}

/// One question asked during the interview, plus the candidate's answer once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub asked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
}

/// Fields an answer may attach to an existing step. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    pub answered_at: DateTime<Utc>,
}

impl AnswerPatch {
    pub fn apply(&self, step: &mut Step) {
        if let Some(url) = &self.audio_url {
            step.audio_url = Some(url.clone());
        }
        if let Some(transcript) = &self.transcript {
            step.transcript = Some(transcript.clone());
        }
        if let Some(duration) = self.duration_sec {
            step.duration_sec = Some(duration);
        }
        step.answered_at = Some(self.answered_at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerAnswer {
    pub question_id: String,
    pub answer: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    pub question_id: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerEvaluation {
    pub passed: bool,
    pub results: Vec<RuleOutcome>,
}

/// Proctoring telemetry. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiCheatEvent {
    pub kind: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// Interview session. Job fields are a snapshot taken at creation so later
/// job edits never rewrite a running or finished interview.
#[derive(Debug, Clone)]
pub struct InterviewSession {
    pub id: Uuid,
    pub token: String,
    pub job_code: String,
    pub job_title: String,
    pub company: String,
    pub jd_text: String,
    pub focus_areas: Vec<String>,
    pub candidate: Candidate,
    pub resume_summary: Option<String>,
    pub status: SessionStatus,
    pub steps: Vec<Step>,
    pub screener_answers: Vec<ScreenerAnswer>,
    pub screener: Option<ScreenerEvaluation>,
    pub scorecard: Option<Value>,
    pub anti_cheat_events: Vec<AntiCheatEvent>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub token: String,
    pub job_code: String,
    pub job_title: String,
    pub company: String,
    pub jd_text: String,
    pub focus_areas: Vec<String>,
    pub candidate_name: String,
    pub candidate_email: String,
    pub candidate_phone: Option<String>,
    pub resume_summary: Option<String>,
    pub status: String,
    pub steps: Json<Vec<Step>>,
    pub screener_answers: Json<Vec<ScreenerAnswer>>,
    pub screener_result: Option<Json<ScreenerEvaluation>>,
    pub scorecard: Option<Value>,
    pub anti_cheat_events: Json<Vec<AntiCheatEvent>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionRow> for InterviewSession {
    type Error = anyhow::Error;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = SessionStatus::parse(&row.status)
            .ok_or_else(|| anyhow!("session {} has unknown status '{}'", row.id, row.status))?;

        Ok(InterviewSession {
            id: row.id,
            token: row.token,
            job_code: row.job_code,
            job_title: row.job_title,
            company: row.company,
            jd_text: row.jd_text,
            focus_areas: row.focus_areas,
            candidate: Candidate {
                name: row.candidate_name,
                email: row.candidate_email,
                phone: row.candidate_phone,
            },
            resume_summary: row.resume_summary,
            status,
            steps: row.steps.0,
            screener_answers: row.screener_answers.0,
            screener: row.screener_result.map(|j| j.0),
            scorecard: row.scorecard,
            anti_cheat_events: row.anti_cheat_events.0,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

/// Client-facing session representation. Never carries the access token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub status: SessionStatus,
    pub job_code: String,
    pub job_title: String,
    pub company: String,
    pub focus_areas: Vec<String>,
    pub candidate: Candidate,
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screener: Option<ScreenerEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scorecard: Option<Value>,
    pub anti_cheat_event_count: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&InterviewSession> for SessionView {
    fn from(s: &InterviewSession) -> Self {
        SessionView {
            id: s.id,
            status: s.status,
            job_code: s.job_code.clone(),
            job_title: s.job_title.clone(),
            company: s.company.clone(),
            focus_areas: s.focus_areas.clone(),
            candidate: s.candidate.clone(),
            steps: s.steps.clone(),
            screener: s.screener.clone(),
            scorecard: s.scorecard.clone(),
            anti_cheat_event_count: s.anti_cheat_events.len(),
            created_at: s.created_at,
            started_at: s.started_at,
            finished_at: s.finished_at,
        }
    }
}
