//! Coverage-improvement sessions.
//!
//! A session is one long-running unit of backend work. This module holds
//! the data model; the moving parts live in submodules:
//!
//! - [`client`]: start / cancel / status / apply against the REST API
//! - [`channel`]: WebSocket progress push channel
//! - [`poller`]: step-log status polling with sentinel detection
//! - [`tracker`]: channel first, polling as fallback, until terminal

pub mod channel;
pub mod client;
pub mod poller;
pub mod tracker;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use channel::{ChannelEvent, ProgressChannel};
pub use client::SessionClient;
pub use poller::{Outcome, PollEvent, StatusPoller, StatusSnapshot};
pub use tracker::{TrackReport, TrackerEvent};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// File-level or repository-level improvement. Served by distinct backend
/// routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    File,
    Repository,
}

impl SessionKind {
    /// Route segment: `file` or `repo`.
    pub fn route_segment(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Repository => "repo",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Repository => write!(f, "repository"),
        }
    }
}

/// Client-side lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    Initializing,
    Analyzing,
    Generating,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Map a backend `SessionStatus` name onto the client lifecycle.
    pub fn from_backend_status(status: &str) -> Option<Self> {
        let state = match status {
            "CREATED" => Self::Created,
            "INITIALIZING" => Self::Initializing,
            "ANALYZING_REPOSITORY" | "ANALYZING_FILE" | "PRIORITIZING_FILES" => Self::Analyzing,
            "GENERATING_TESTS" | "VALIDATING_TESTS" | "COMPILING_TESTS"
            | "CALCULATING_COVERAGE" | "APPLYING_CHANGES" | "CREATING_PR" => Self::Generating,
            "READY_FOR_REVIEW" | "COMPLETED" | "PARTIALLY_COMPLETED" => Self::Completed,
            "FAILED" | "ERROR" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            _ => return None,
        };
        Some(state)
    }

    /// Map a progress frame's `type` onto the client lifecycle.
    fn from_progress_type(kind: &str) -> Option<Self> {
        let state = match kind {
            "INITIALIZATION" => Self::Initializing,
            "ANALYSIS" => Self::Analyzing,
            "TEST_GENERATION" | "VALIDATION" => Self::Generating,
            "COMPLETION" => Self::Completed,
            "ERROR" => Self::Failed,
            _ => return None,
        };
        Some(state)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Analyzing => "analyzing",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// The active session tracked by a [`SessionClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: String,
    kind: SessionKind,
    state: SessionState,
    progress: f64,
    steps: Vec<String>,
    seen: HashSet<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, kind: SessionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            state: SessionState::Created,
            progress: 0.0,
            steps: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Progress percentage, clamped to 0–100.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Move to `next` unless the session already reached a terminal state.
    pub fn transition(&mut self, next: SessionState) {
        if !self.state.is_terminal() {
            self.state = next;
        }
    }

    /// Append a step message. Returns `false` for an exact duplicate.
    pub fn record_step(&mut self, message: &str) -> bool {
        if !self.seen.insert(message.to_string()) {
            return false;
        }
        self.steps.push(message.to_string());
        true
    }

    /// Fold a progress frame into the session.
    pub fn apply_progress(&mut self, update: &ProgressUpdate) {
        self.progress = update.percent();
        if let Some(step) = update.current_step.as_deref().filter(|s| !s.is_empty()) {
            self.record_step(step);
        }
        let next = if update.is_complete() {
            Some(SessionState::Completed)
        } else {
            update
                .kind
                .as_deref()
                .and_then(SessionState::from_progress_type)
        };
        if let Some(next) = next {
            self.transition(next);
        }
    }
}

// ---------------------------------------------------------------------------
// Progress frames
// ---------------------------------------------------------------------------

/// One push-channel frame. Transient: applied and dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressUpdate {
    pub session_id: Option<String>,
    pub progress: Option<f64>,
    pub current_step: Option<String>,
    pub message: Option<String>,
    pub current_batch: Option<u32>,
    pub total_batches: Option<u32>,
    pub processed_files: Option<u32>,
    pub total_files: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ProgressUpdate {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Progress as a finite percentage in 0–100.
    pub fn percent(&self) -> f64 {
        match self.progress {
            Some(p) if p.is_finite() => p.clamp(0.0, 100.0),
            _ => 0.0,
        }
    }

    /// 100 % is the completion signal.
    pub fn is_complete(&self) -> bool {
        self.percent() >= 100.0
    }

    /// The line to show under the progress bar: message, else step.
    pub fn status_line(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .or(self.current_step.as_deref())
            .unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Request / response DTOs
// ---------------------------------------------------------------------------

/// Body for `POST /api/coverage/file/improve-async`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileImproveRequest {
    pub repository_url: String,
    pub branch: String,
    pub file_path: String,
    pub target_coverage_increase: f64,
    pub max_tests_per_batch: u32,
    pub validate_tests: bool,
    pub create_pull_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl FileImproveRequest {
    pub fn new(repository_url: &str, branch: &str, file_path: &str) -> Self {
        Self {
            repository_url: repository_url.to_string(),
            branch: branch.to_string(),
            file_path: file_path.to_string(),
            target_coverage_increase: 25.0,
            max_tests_per_batch: 5,
            validate_tests: true,
            create_pull_request: false,
            session_id: None,
        }
    }
}

/// Body for `POST /api/coverage/repo/improve-async`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoImproveRequest {
    pub repository_url: String,
    pub branch: String,
    pub target_coverage_increase: f64,
    pub max_files_to_process: u32,
    pub exclude_patterns: Vec<String>,
    pub force_refresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl RepoImproveRequest {
    pub fn new(repository_url: &str, branch: &str) -> Self {
        Self {
            repository_url: repository_url.to_string(),
            branch: branch.to_string(),
            target_coverage_increase: 20.0,
            max_files_to_process: 50,
            exclude_patterns: vec![
                "**/*Test.java".to_string(),
                "**/test/**".to_string(),
                "**/target/**".to_string(),
            ],
            force_refresh: false,
            session_id: None,
        }
    }
}

/// Backend answer to a cancel request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CancelAck {
    pub session_id: Option<String>,
    pub cancelled: Option<bool>,
    pub message: Option<String>,
    /// Set client-side when the session was already terminal and no
    /// request was sent.
    #[serde(skip)]
    pub already_terminal: bool,
}

/// `GET /api/coverage/file/session/{id}/status`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionStatus {
    pub session_id: Option<String>,
    pub status: Option<String>,
    pub progress: Option<f64>,
    pub current_step: Option<String>,
    #[serde(deserialize_with = "crate::transport::nullable")]
    pub step: Vec<String>,
    #[serde(deserialize_with = "crate::transport::nullable")]
    pub errors: Vec<String>,
    pub results: Option<ImprovementResults>,
}

impl SessionStatus {
    pub fn state(&self) -> Option<SessionState> {
        self.status.as_deref().and_then(SessionState::from_backend_status)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            steps: self.step.clone(),
            status: self.status.clone(),
        }
    }
}

/// Terminal results of an improvement session.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImprovementResults {
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub original_coverage: Option<f64>,
    pub improved_coverage: Option<f64>,
    pub coverage_increase: Option<f64>,
    pub total_tests_generated: Option<u32>,
    pub processing_time_ms: Option<u64>,
    pub status: Option<String>,
    #[serde(deserialize_with = "crate::transport::nullable")]
    pub test_file_paths: Vec<String>,
    #[serde(deserialize_with = "crate::transport::nullable")]
    pub recommendations: Vec<String>,
    #[serde(deserialize_with = "crate::transport::nullable")]
    pub warnings: Vec<String>,
    #[serde(deserialize_with = "crate::transport::nullable")]
    pub errors: Vec<String>,
}

/// Body for the apply routes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub create_pull_request: bool,
    pub pr_title: String,
    pub pr_description: String,
}

impl ApplyRequest {
    pub fn for_session(session_id: &str) -> Self {
        Self {
            create_pull_request: true,
            pr_title: format!("Improve coverage for {session_id}"),
            pr_description: "Generated tests to improve code coverage".to_string(),
        }
    }
}

/// Answer from the apply routes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyResult {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub pull_request: Option<PullRequestInfo>,
    pub error: Option<String>,
}

impl ApplyResult {
    /// An explicit `error`, or `success: false`, means the apply failed.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.success != Some(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequestInfo {
    pub success: bool,
    pub pr_url: Option<String>,
    pub pr_number: Option<u64>,
    pub branch_name: Option<String>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
