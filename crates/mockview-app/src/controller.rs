// Session lifecycle: start, hint, submit, read, expire.
//
// The controller owns the store, the question bank, the event hub and the
// countdown timers. Every state change goes through `SessionStore::update`
// so concurrent requests on one session cannot interleave.

use std::sync::Arc;

use chrono::Utc;
use mockview_core::config::InterviewConfig;
use mockview_core::model::{InterviewSession, Question, SessionStatus};
use mockview_core::questions::QuestionBank;
use mockview_core::store::{Mutation, SessionStore, StoreError};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::hints::hint_text;
use crate::hub::{session_room, EventHub, ServerEvent};
use crate::scoring::{self, TestResult};
use crate::timer::SessionTimers;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Unknown id, or a session owned by someone else.
    #[error("Session not found")]
    NotFound,

    #[error("Session is {status}")]
    NotActive { status: SessionStatus },

    #[error("question bank is empty")]
    EmptyBank,

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartRequest {
    pub difficulty: Option<String>,
    pub topic: Option<String>,
    pub duration_min: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub session_id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HintResponse {
    pub hint: String,
    pub hints_used: u32,
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

pub struct SessionController {
    store: Arc<dyn SessionStore>,
    bank: QuestionBank,
    hub: Arc<EventHub>,
    timers: SessionTimers,
    settings: InterviewConfig,
}

impl SessionController {
    /// Build the controller. The returned receiver yields ids of sessions
    /// whose countdown ran out; hand it to [`run_expiry_loop`].
    pub fn new(
        store: Arc<dyn SessionStore>,
        bank: QuestionBank,
        hub: Arc<EventHub>,
        settings: InterviewConfig,
    ) -> (Self, mpsc::Receiver<String>) {
        let (timers, expired_rx) = SessionTimers::new(hub.clone());
        let controller = SessionController {
            store,
            bank,
            hub,
            timers,
            settings,
        };
        (controller, expired_rx)
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn timers(&self) -> &SessionTimers {
        &self.timers
    }

    /// Countdown length in seconds for a requested duration in minutes.
    fn duration_sec(&self, duration_min: Option<u64>) -> u64 {
        let max = self.settings.max_duration_min.max(1);
        duration_min
            .unwrap_or(self.settings.default_duration_min)
            .clamp(1, max)
            .saturating_mul(60)
    }

    fn pick_question(&self, req: &StartRequest) -> Result<Question, SessionError> {
        let candidates = self
            .bank
            .candidates(req.difficulty.as_deref(), req.topic.as_deref());
        candidates
            .choose(&mut rand::thread_rng())
            .map(|entry| entry.question.clone())
            .ok_or(SessionError::EmptyBank)
    }

    fn publish(&self, session_id: &str, event: ServerEvent) {
        let receivers = self.hub.publish(&session_room(session_id), event);
        debug!("Published to {receivers} subscriber(s) of session {session_id}");
    }

    /// Publish the last event a session will ever produce, then drop its room.
    fn publish_final(&self, session_id: &str, event: ServerEvent) {
        self.publish(session_id, event);
        if self.hub.close(&session_room(session_id)) {
            debug!("Closed event room for session {session_id}");
        }
    }

    pub async fn start_session(
        &self,
        user_id: &str,
        req: StartRequest,
    ) -> Result<InterviewSession, SessionError> {
        let question = self.pick_question(&req)?;
        let duration_sec = self.duration_sec(req.duration_min);
        let session = InterviewSession::new(user_id, question, duration_sec, Utc::now());

        self.store.insert(&session).await?;
        self.timers.start(&session.id, duration_sec);
        info!(
            "Session {} started for user {user_id}: \"{}\" ({}, {}), {}s",
            session.id,
            session.question.title,
            session.question.difficulty,
            session.question.topic,
            duration_sec
        );

        self.publish(&session.id, ServerEvent::SessionUpdate(session.clone()));
        Ok(session)
    }

    pub async fn request_hint(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<HintResponse, SessionError> {
        let owner = user_id.to_string();
        let mutate: Mutation =
            Arc::new(move |s: &mut InterviewSession| s.user_id == owner && s.record_hint());

        let updated = self
            .store
            .update(session_id, mutate)
            .await?
            .filter(|u| u.session.user_id == user_id)
            .ok_or(SessionError::NotFound)?;

        if !updated.changed {
            return Err(SessionError::NotActive {
                status: updated.session.status,
            });
        }

        let session = updated.session;
        let hint = hint_text(&self.bank, &session.question, session.hints_used);
        info!("Hint {} issued for session {session_id}", session.hints_used);

        self.publish(
            session_id,
            ServerEvent::SessionHint {
                hint: hint.clone(),
                hints_used: session.hints_used,
            },
        );
        Ok(HintResponse {
            hint,
            hints_used: session.hints_used,
        })
    }

    /// Freeze the session with the caller's code and test outcomes.
    ///
    /// Resubmitting a submitted session returns it unchanged.
    pub async fn submit_solution(
        &self,
        user_id: &str,
        req: SubmitRequest,
    ) -> Result<InterviewSession, SessionError> {
        let owner = user_id.to_string();
        let SubmitRequest {
            session_id,
            code,
            test_results,
        } = req;
        let mutate: Mutation = Arc::new(move |s: &mut InterviewSession| {
            if s.user_id != owner || !s.is_active() {
                return false;
            }
            let result = scoring::evaluate(&code, &test_results, s.hints_used);
            s.submit(code.clone(), result, Utc::now())
        });

        let updated = self
            .store
            .update(&session_id, mutate)
            .await?
            .filter(|u| u.session.user_id == user_id)
            .ok_or(SessionError::NotFound)?;

        let session = updated.session;
        if !updated.changed {
            return match session.status {
                SessionStatus::Submitted => {
                    debug!("Session {session_id} already submitted, returning frozen result");
                    Ok(session)
                }
                status => Err(SessionError::NotActive { status }),
            };
        }

        self.timers.stop(&session_id);
        if let Some(result) = &session.result {
            info!(
                "Session {session_id} submitted: {}/{} tests passed",
                result.passed_count, result.total_tests
            );
        }

        self.publish_final(&session_id, ServerEvent::SessionSubmitted(session.clone()));
        Ok(session)
    }

    pub async fn get_history(&self, user_id: &str) -> Result<Vec<InterviewSession>, SessionError> {
        Ok(self.store.list_for_user(user_id).await?)
    }

    pub async fn get_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<InterviewSession, SessionError> {
        self.store
            .get(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or(SessionError::NotFound)
    }

    /// Owner of a session, if it exists.
    pub async fn session_owner(&self, session_id: &str) -> Result<Option<String>, SessionError> {
        Ok(self.store.get(session_id).await?.map(|s| s.user_id))
    }

    /// Mark an active session as expired. Returns whether anything changed.
    pub async fn expire_session(&self, session_id: &str) -> Result<bool, SessionError> {
        let mutate: Mutation = Arc::new(|s: &mut InterviewSession| s.expire(Utc::now()));
        let Some(updated) = self.store.update(session_id, mutate).await? else {
            warn!("Countdown ended for unknown session {session_id}");
            return Ok(false);
        };

        self.timers.stop(session_id);
        if !updated.changed {
            debug!(
                "Session {session_id} already {}, nothing to expire",
                updated.session.status
            );
            return Ok(false);
        }

        info!("Session {session_id} expired");
        self.publish_final(session_id, ServerEvent::SessionUpdate(updated.session));
        Ok(true)
    }

    pub fn shutdown(&self) {
        self.timers.shutdown();
    }
}

/// Expire sessions as their countdowns finish. Runs until every timer
/// sender is gone.
pub async fn run_expiry_loop(controller: Arc<SessionController>, mut expired_rx: mpsc::Receiver<String>) {
    while let Some(session_id) = expired_rx.recv().await {
        if let Err(e) = controller.expire_session(&session_id).await {
            warn!("Failed to expire session {session_id}: {e}");
        }
    }
    debug!("Expiry loop finished");
}
