//! Issue remediation: submit issues for an automated fix and follow the
//! operation's step log until a sentinel marks it finished.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::session::{Outcome, PollEvent, StatusPoller, StatusSnapshot};
use crate::transport::{Transport, decode, nullable};

/// Progress gained per newly reported step.
const PROGRESS_STEP: f64 = 15.0;

pub const SUCCESS_MESSAGE: &str = "✅ Fix applied successfully!";
pub const FAILURE_MESSAGE: &str = "❌ Fix failed.";

/// One issue to fix, as the apply-fix route expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRef {
    pub key: String,
    pub class_name: String,
    pub description: String,
}

/// Approximate progress: there is no real percentage on this route.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixProgress {
    percent: f64,
}

impl FixProgress {
    pub fn percent(self) -> f64 {
        self.percent
    }

    /// Bump for one new step, capped at 100.
    pub fn advance(&mut self) {
        self.percent = (self.percent + PROGRESS_STEP).min(100.0);
    }

    pub fn finish(&mut self) {
        self.percent = 100.0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FixEvent {
    Step(String),
    Progress(f64),
    Finished(Outcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixReport {
    pub operation_id: String,
    pub outcome: Outcome,
    pub steps: Vec<String>,
}

impl FixReport {
    /// The closing line shown to the user.
    pub fn message(&self) -> &'static str {
        match self.outcome {
            Outcome::Succeeded => SUCCESS_MESSAGE,
            Outcome::Failed | Outcome::Cancelled => FAILURE_MESSAGE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FixStatus {
    #[serde(deserialize_with = "nullable")]
    step: Vec<String>,
}

pub struct IssueFixClient {
    transport: Arc<dyn Transport>,
}

impl IssueFixClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `POST /sonar/issue/apply-fix`. Returns the operation id.
    pub fn apply_fix(&self, issues: &[IssueRef]) -> Result<String> {
        if issues.is_empty() {
            return Err(ClientError::InvalidRequest("no issues selected".to_string()));
        }
        let body = serde_json::to_value(issues).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let path = "/sonar/issue/apply-fix";
        let response = self.transport.post_json(path, Some(&body))?;

        let id = response
            .get("operationId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                let reason = response
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("no operationId in reply");
                ClientError::protocol(format!("{path}: {reason}"))
            })?;
        tracing::info!(operation_id = id, issues = issues.len(), "fix started");
        Ok(id.to_string())
    }

    /// `GET /sonar/issue/fix-status/{operationId}`.
    pub fn fix_status(&self, operation_id: &str) -> Result<StatusSnapshot> {
        fetch_fix_status(self.transport.as_ref(), operation_id)
    }

    /// Poll the operation every `interval` until a sentinel step appears.
    pub fn track<R>(&self, operation_id: &str, interval: Duration, mut render: R) -> Result<FixReport>
    where
        R: FnMut(&FixEvent),
    {
        let transport = Arc::clone(&self.transport);
        let id = operation_id.to_string();
        let poller = StatusPoller::new(move || fetch_fix_status(transport.as_ref(), &id));

        let (tx, rx) = unbounded();
        let mut handle = poller.spawn("fix-poller", interval, move |event| {
            let _ = tx.send(event);
        })?;

        let mut progress = FixProgress::default();
        let mut steps = Vec::new();
        let outcome = loop {
            let Ok(event) = rx.recv() else {
                break Err(ClientError::protocol("fix poller stopped unexpectedly"));
            };
            match event {
                PollEvent::Step(step) => {
                    render(&FixEvent::Step(step.clone()));
                    steps.push(step);
                    progress.advance();
                    render(&FixEvent::Progress(progress.percent()));
                }
                PollEvent::Finished(outcome) => {
                    progress.finish();
                    render(&FixEvent::Progress(progress.percent()));
                    break Ok(outcome);
                }
                PollEvent::Error(err) => break Err(err),
            }
        };
        handle.stop();

        let outcome = outcome?;
        render(&FixEvent::Finished(outcome));
        Ok(FixReport {
            operation_id: operation_id.to_string(),
            outcome,
            steps,
        })
    }
}

fn fetch_fix_status(transport: &dyn Transport, operation_id: &str) -> Result<StatusSnapshot> {
    let path = format!("/sonar/issue/fix-status/{operation_id}");
    let status: FixStatus = decode(&path, transport.get_json(&path, &[])?)?;
    Ok(StatusSnapshot::from_steps(status.step))
}
