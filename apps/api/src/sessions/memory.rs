//! In-process `InterviewStore` used by router tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{closed_conflict, session_not_found, InterviewStore};
use crate::errors::AppError;
use crate::models::job::Job;
use crate::models::session::{
    AnswerPatch, AntiCheatEvent, InterviewSession, SessionStatus, Step,
};

#[derive(Default)]
pub struct MemoryInterviewStore {
    jobs: RwLock<HashMap<String, Job>>,
    sessions: RwLock<HashMap<Uuid, InterviewSession>>,
}

impl MemoryInterviewStore {
    pub async fn add_job(&self, job: Job) {
        self.jobs
            .write()
            .await
            .insert(job.code.to_uppercase(), job);
    }

    async fn mutate<F>(&self, id: Uuid, apply: F) -> Result<InterviewSession, AppError>
    where
        F: FnOnce(&mut InterviewSession) -> Result<(), AppError>,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
        if session.status.is_closed() {
            return Err(closed_conflict(id));
        }
        apply(session)?;
        Ok(session.clone())
    }
}

#[async_trait]
impl InterviewStore for MemoryInterviewStore {
    async fn find_job(&self, code: &str) -> Result<Option<Job>, AppError> {
        Ok(self.jobs.read().await.get(&code.trim().to_uppercase()).cloned())
    }

    async fn insert_session(&self, session: &InterviewSession) -> Result<(), AppError> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<InterviewSession>, AppError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn append_step(&self, id: Uuid, step: &Step) -> Result<InterviewSession, AppError> {
        self.mutate(id, |s| {
            s.steps.push(step.clone());
            if s.status == SessionStatus::Pending {
                s.status = SessionStatus::Running;
            }
            s.started_at.get_or_insert_with(Utc::now);
            Ok(())
        })
        .await
    }

    async fn record_answer(
        &self,
        id: Uuid,
        step_index: usize,
        patch: &AnswerPatch,
    ) -> Result<InterviewSession, AppError> {
        self.mutate(id, |s| {
            let step = s
                .steps
                .get_mut(step_index)
                .ok_or_else(|| AppError::NotFound(format!("Step not found in session {id}")))?;
            patch.apply(step);
            Ok(())
        })
        .await
    }

    async fn finish(
        &self,
        id: Uuid,
        scorecard: Option<&Value>,
        finished_at: DateTime<Utc>,
    ) -> Result<InterviewSession, AppError> {
        self.mutate(id, |s| {
            s.status = SessionStatus::Finished;
            s.finished_at = Some(finished_at);
            if s.scorecard.is_none() {
                s.scorecard = scorecard.cloned();
            }
            Ok(())
        })
        .await
    }

    async fn append_events(
        &self,
        id: Uuid,
        events: &[AntiCheatEvent],
    ) -> Result<InterviewSession, AppError> {
        self.mutate(id, |s| {
            s.anti_cheat_events.extend_from_slice(events);
            Ok(())
        })
        .await
    }
}
