/// REST client for improvement sessions.
///
/// Owns the single active [`Session`] and its [`ProgressChannel`]. Every
/// per-session call checks the id against the active session first, so a
/// late callback from an old session can't act on a new one.
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::channel::{ChannelEvent, ProgressChannel};
use super::poller::StatusSnapshot;
use super::{
    ApplyRequest, ApplyResult, CancelAck, FileImproveRequest, ProgressUpdate, RepoImproveRequest,
    Session, SessionKind, SessionState, SessionStatus,
};
use crate::error::{ClientError, Result};
use crate::transport::{ChannelFactory, Transport, decode};

/// Poll fetch bound to one session.
pub type StatusSource = Box<dyn FnMut() -> Result<StatusSnapshot> + Send>;

pub struct SessionClient {
    transport: Arc<dyn Transport>,
    channels: Arc<dyn ChannelFactory>,
    session: Option<Session>,
    channel: Option<ProgressChannel>,
}

impl SessionClient {
    pub fn new(transport: Arc<dyn Transport>, channels: Arc<dyn ChannelFactory>) -> Self {
        Self {
            transport,
            channels,
            session: None,
            channel: None,
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// `POST /api/coverage/file/improve-async`.
    pub fn start_file_session(&mut self, request: &FileImproveRequest) -> Result<Session> {
        self.start(SessionKind::File, request)
    }

    /// `POST /api/coverage/repo/improve-async`.
    pub fn start_repository_session(&mut self, request: &RepoImproveRequest) -> Result<Session> {
        self.start(SessionKind::Repository, request)
    }

    fn start<B: Serialize>(&mut self, kind: SessionKind, request: &B) -> Result<Session> {
        self.close_channel();

        let path = format!("/api/coverage/{}/improve-async", kind.route_segment());
        let response = self.transport.post_json(&path, Some(&to_body(request)?))?;
        let id = response
            .get("sessionId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ClientError::protocol(format!("{path} returned no sessionId")))?;

        tracing::info!(session_id = id, %kind, "session started");
        let session = Session::new(id, kind);
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Cancel the active session. A session that already reached a terminal
    /// state is acknowledged locally without another request.
    pub fn cancel(&mut self, session_id: &str) -> Result<CancelAck> {
        self.ensure_active(session_id)?;
        self.close_channel();

        if let Some(session) = self.session.as_ref()
            && session.state().is_terminal()
        {
            tracing::debug!(session_id, state = %session.state(), "cancel skipped, already terminal");
            return Ok(CancelAck {
                session_id: Some(session_id.to_string()),
                cancelled: Some(session.state() == SessionState::Cancelled),
                message: Some(format!("session already {}", session.state())),
                already_terminal: true,
            });
        }

        let path = format!("/api/coverage/session/{session_id}/cancel");
        let response = self.transport.post_json(&path, None)?;
        let mut ack: CancelAck = decode(&path, response)?;
        ack.session_id.get_or_insert_with(|| session_id.to_string());

        if let Some(session) = self.session.as_mut() {
            session.transition(SessionState::Cancelled);
        }
        tracing::info!(session_id, "session cancelled");
        Ok(ack)
    }

    /// `GET /api/coverage/file/session/{id}/status`. The reported lifecycle
    /// and steps are folded into the active session.
    pub fn status(&mut self, session_id: &str) -> Result<SessionStatus> {
        self.ensure_active(session_id)?;
        let status = fetch_status(self.transport.as_ref(), session_id)?;
        if let Some(session) = self.session.as_mut() {
            for step in &status.step {
                session.record_step(step);
            }
            if let Some(state) = status.state() {
                session.transition(state);
            }
        }
        Ok(status)
    }

    /// Apply generated changes. File and repository sessions post to
    /// different routes.
    pub fn apply_changes(&mut self, session_id: &str, request: &ApplyRequest) -> Result<ApplyResult> {
        let kind = self.ensure_active(session_id)?.kind();
        let path = format!("/api/coverage/{}/session/{session_id}/apply", kind.route_segment());
        let response = self.transport.post_json(&path, Some(&to_body(request)?))?;
        let result: ApplyResult = decode(&path, response)?;
        if result.is_success() {
            tracing::info!(session_id, "changes applied");
        } else {
            tracing::warn!(session_id, error = ?result.error, "apply failed");
        }
        Ok(result)
    }

    /// Adopt a session started elsewhere as the active one. Its state stays
    /// `Created` until the next status call.
    pub fn attach(&mut self, session_id: &str, kind: SessionKind) -> Result<Session> {
        let id = session_id.trim();
        if id.is_empty() {
            return Err(ClientError::InvalidRequest("session id is empty".to_string()));
        }
        self.close_channel();
        let session = Session::new(id, kind);
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Drop the active session and its channel.
    pub fn reset(&mut self) {
        self.close_channel();
        self.session = None;
    }

    // -- progress -----------------------------------------------------------

    /// Open the push channel for the active session, replacing any open one.
    pub fn open_progress_channel<C>(&mut self, on_event: C) -> Result<()>
    where
        C: FnMut(ChannelEvent) + Send + 'static,
    {
        let id = self.active()?.id().to_string();
        self.close_channel();
        self.channel = Some(ProgressChannel::open(self.channels.as_ref(), &id, on_event)?);
        Ok(())
    }

    pub fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }

    pub fn channel_open(&self) -> bool {
        self.channel.as_ref().is_some_and(ProgressChannel::is_open)
    }

    /// Fold a progress frame into the active session.
    pub fn record_progress(&mut self, update: &ProgressUpdate) -> Result<()> {
        if let (Some(frame_id), Some(session)) = (update.session_id.as_deref(), self.session.as_ref())
            && frame_id != session.id()
        {
            return Err(ClientError::StaleSession {
                given: frame_id.to_string(),
                active: session.id().to_string(),
            });
        }
        self.active_mut()?.apply_progress(update);
        Ok(())
    }

    /// Append a step message. `Ok(false)` for one already recorded.
    pub fn record_step(&mut self, message: &str) -> Result<bool> {
        Ok(self.active_mut()?.record_step(message))
    }

    pub fn transition(&mut self, state: SessionState) -> Result<()> {
        self.active_mut()?.transition(state);
        Ok(())
    }

    /// A fetch function for [`super::StatusPoller`] bound to the active
    /// session. It holds its own transport handle and outlives `&self`.
    pub fn status_source(&self) -> Result<StatusSource> {
        let id = self.active()?.id().to_string();
        let transport = Arc::clone(&self.transport);
        Ok(Box::new(move || {
            fetch_status(transport.as_ref(), &id).map(|s| s.snapshot())
        }))
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    // -- helpers ------------------------------------------------------------

    fn active(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(ClientError::NoActiveSession)
    }

    fn active_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(ClientError::NoActiveSession)
    }

    /// The active session, if `session_id` names it.
    pub fn ensure_active(&self, session_id: &str) -> Result<&Session> {
        let session = self.active()?;
        if session.id() != session_id {
            return Err(ClientError::StaleSession {
                given: session_id.to_string(),
                active: session.id().to_string(),
            });
        }
        Ok(session)
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("session", &self.session)
            .field("channel", &self.channel)
            .finish()
    }
}

fn fetch_status(transport: &dyn Transport, session_id: &str) -> Result<SessionStatus> {
    let path = format!("/api/coverage/file/session/{session_id}/status");
    decode(&path, transport.get_json(&path, &[])?)
}

fn to_body<B: Serialize>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| ClientError::InvalidRequest(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
