/// Follow the active session until it ends.
///
/// The push channel is tried first. When it can't be opened, fails, or is
/// closed by the server before the session finished, tracking falls back
/// to polling the status endpoint. Either way, events from the worker
/// threads arrive over one channel and this loop is the only code that
/// touches the client.
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};

use super::channel::ChannelEvent;
use super::client::SessionClient;
use super::poller::{Outcome, PollEvent, StatusPoller};
use super::{ProgressUpdate, SessionState, SessionStatus};
use crate::error::{ClientError, Result};
use crate::timer::IntervalHandle;

/// Events handed to the renderer while tracking.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Progress(ProgressUpdate),
    /// A step message not shown before.
    Step(String),
    /// The push channel is unavailable; polling from now on.
    FellBack { reason: String },
    Finished(Outcome),
}

/// Summary of a tracked session.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackReport {
    pub session_id: String,
    pub outcome: Outcome,
    /// Final status with results, when it could be fetched.
    pub status: Option<SessionStatus>,
    pub used_fallback: bool,
}

enum Worker {
    Channel(ChannelEvent),
    Poll(PollEvent),
}

/// Track the active session, rendering events as they arrive. Returns once
/// the session reaches a terminal outcome. A polling error ends tracking
/// with that error.
///
/// Step lines are deduplicated against the session's whole step history,
/// not just the poller's own delta. After a fallback, a step already shown
/// as a channel frame's `current_step` is not emitted again as a
/// [`TrackerEvent::Step`].
pub fn track<R>(client: &mut SessionClient, poll_interval: Duration, mut render: R) -> Result<TrackReport>
where
    R: FnMut(&TrackerEvent),
{
    let session_id = client
        .session()
        .map(|s| s.id().to_string())
        .ok_or(ClientError::NoActiveSession)?;

    let (tx, rx) = unbounded::<Worker>();
    let mut poller: Option<IntervalHandle> = None;
    let mut used_fallback = false;

    let channel_tx = tx.clone();
    if let Err(err) = client.open_progress_channel(move |event| {
        let _ = channel_tx.send(Worker::Channel(event));
    }) {
        tracing::warn!(%session_id, "progress channel unavailable: {err}");
        render(&TrackerEvent::FellBack {
            reason: err.to_string(),
        });
        poller = Some(start_poller(client, poll_interval, &tx)?);
        used_fallback = true;
    }

    let outcome = loop {
        let Ok(message) = rx.recv() else {
            break Err(ClientError::protocol("tracking workers disconnected"));
        };

        match message {
            Worker::Channel(_) if used_fallback => {}
            Worker::Channel(ChannelEvent::Progress(update)) => {
                if let Err(err) = client.record_progress(&update) {
                    tracing::warn!(%session_id, "ignoring progress frame: {err}");
                    continue;
                }
                render(&TrackerEvent::Progress(update.clone()));
                if let Some(outcome) = client.session().and_then(|s| terminal_outcome(s.state())) {
                    client.close_channel();
                    break Ok(outcome);
                }
            }
            Worker::Channel(ChannelEvent::Closed | ChannelEvent::Error(_)) => {
                client.close_channel();
                tracing::warn!(%session_id, "progress channel ended early, polling status");
                render(&TrackerEvent::FellBack {
                    reason: "progress channel closed".to_string(),
                });
                poller = Some(start_poller(client, poll_interval, &tx)?);
                used_fallback = true;
            }
            Worker::Poll(PollEvent::Step(step)) => {
                if client.record_step(&step)? {
                    render(&TrackerEvent::Step(step));
                }
            }
            Worker::Poll(PollEvent::Finished(outcome)) => break Ok(outcome),
            Worker::Poll(PollEvent::Error(err)) => break Err(err),
        }
    };

    if let Some(mut handle) = poller.take() {
        handle.stop();
    }
    client.close_channel();
    let outcome = outcome?;

    client.transition(match outcome {
        Outcome::Succeeded => SessionState::Completed,
        Outcome::Failed => SessionState::Failed,
        Outcome::Cancelled => SessionState::Cancelled,
    })?;

    let status = match client.status(&session_id) {
        Ok(status) => Some(status),
        Err(err) => {
            tracing::warn!(%session_id, "could not fetch final status: {err}");
            None
        }
    };

    render(&TrackerEvent::Finished(outcome));
    Ok(TrackReport {
        session_id,
        outcome,
        status,
        used_fallback,
    })
}

fn start_poller(client: &SessionClient, interval: Duration, tx: &Sender<Worker>) -> Result<IntervalHandle> {
    let poll_tx = tx.clone();
    let source = client.status_source()?;
    StatusPoller::new(source).spawn("status-poller", interval, move |event| {
        let _ = poll_tx.send(Worker::Poll(event));
    })
}

fn terminal_outcome(state: SessionState) -> Option<Outcome> {
    match state {
        SessionState::Completed => Some(Outcome::Succeeded),
        SessionState::Failed => Some(Outcome::Failed),
        SessionState::Cancelled => Some(Outcome::Cancelled),
        _ => None,
    }
}
